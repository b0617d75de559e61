//! Fixtures and in-process stand-ins for the external tools.

use crate::{
    config::AssemblyParameters,
    dna_sequence::{circular_range, reverse_complement},
    error::{PrimerError, ToolError},
    frag::{Frag, FragKey, FragKind},
    hairpin::HairpinOracle,
    primers::{Primer, PrimerDesigner, bp_to_add, shrink},
};
use std::cell::Cell;

const PRIMER_LENGTH: i64 = 20;

/// A reproducible pseudo-random ACGT sequence of `len` bp.
pub fn target(len: usize) -> String {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            b"ACGT"[(state >> 33) as usize % 4] as char
        })
        .collect()
}

/// A PCR fragment spanning `start..=end` whose key ignores wraparound.
pub fn frag(id: &str, start: i64, end: i64) -> Frag {
    let len = (end - start + 1).max(0) as usize;
    Frag {
        id: id.to_string(),
        key: FragKey::new(id, start, 1_000_000),
        seq: target(len),
        pcr_seq: String::new(),
        start,
        end,
        feature_start: start,
        feature_end: end,
        kind: FragKind::Pcr,
        database: String::new(),
        url: String::new(),
        procurement_cost: 0.0,
        template: None,
        primers: vec![],
    }
}

/// `f` keyed for a target of `target_length` bp, so copies one revolution
/// apart share a key.
pub fn keyed(mut f: Frag, target_length: usize) -> Frag {
    f.key = FragKey::new(&f.id, f.start, target_length);
    f
}

/// A PCR fragment holding `target[start..=end]`, wrapping around the origin.
pub fn frag_on(target: &str, id: &str, start: i64, end: i64) -> Frag {
    let bytes = target.as_bytes();
    let len = bytes.len() as i64;
    let seq: String = (start..=end)
        .map(|i| bytes[i.rem_euclid(len) as usize] as char)
        .collect();
    Frag {
        seq,
        ..keyed(frag(id, start, end), target.len())
    }
}

/// Concatenates `frags` at their junctions, dropping the closing overlap.
pub fn assemble(frags: &[Frag], min_homology: usize, max_homology: usize) -> String {
    let mut seq = String::new();
    for (i, f) in frags.iter().enumerate() {
        let overlap = if i == 0 {
            0
        } else {
            frags[i - 1]
                .junction(f, min_homology, max_homology)
                .map_or(0, |j| j.len())
        };
        seq.push_str(&f.assembled_seq()[overlap..]);
    }
    if frags.len() > 1 {
        let closing = frags[frags.len() - 1]
            .junction(&frags[0], min_homology, max_homology)
            .map_or(0, |j| j.len());
        seq.truncate(seq.len() - closing);
    }
    seq
}

/// Designs 20bp primers straight off the target, adding whatever homology
/// the neighbours need.
#[derive(Debug, Default)]
pub struct MockDesigner {
    calls: Cell<usize>,
    reject: Option<String>,
    failure: Option<PrimerError>,
}

impl MockDesigner {
    pub fn rejecting(id: &str) -> Self {
        Self {
            reject: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_with(failure: PrimerError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl PrimerDesigner for MockDesigner {
    fn design(
        &self,
        last: &Frag,
        frag: &Frag,
        next: &Frag,
        target: &str,
        params: &AssemblyParameters,
    ) -> Result<[Primer; 2], PrimerError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if self.reject.as_deref() == Some(frag.id.as_str()) {
            return Err(PrimerError::NoPrimers {
                id: frag.id.clone(),
                reason: "rejected".to_string(),
            });
        }

        let mut f = frag.clone();
        shrink(&mut f, next, params.max_homology, params.pcr_min_length);
        let start = f.start - bp_to_add(last, &f, params) as i64;
        let end = f.end + bp_to_add(&f, next, params) as i64;

        let no_primers = || PrimerError::NoPrimers {
            id: f.id.clone(),
            reason: "outside the target".to_string(),
        };
        let left = circular_range(target, start..start + PRIMER_LENGTH).ok_or_else(no_primers)?;
        let right = circular_range(target, end + 1 - PRIMER_LENGTH..end + 1).ok_or_else(no_primers)?;

        let mut forward = Primer::new(left);
        forward.range = (start, start + PRIMER_LENGTH - 1);
        forward.pair_penalty = 1.0;
        let mut reverse = Primer::new(reverse_complement(&right));
        reverse.strand = false;
        reverse.range = (end + 1 - PRIMER_LENGTH, end);
        reverse.pair_penalty = 1.0;
        Ok([forward, reverse])
    }
}

/// Reports the same melting temperature for every sequence.
#[derive(Debug, Clone, Copy)]
pub struct ConstantOracle(pub f64);

impl HairpinOracle for ConstantOracle {
    fn melting_temp(&self, _seq: &str) -> Result<f64, ToolError> {
        Ok(self.0)
    }
}
