use crate::{
    assembly::Assembly,
    config::AssemblyParameters,
    dna_sequence::circular_range,
    error::{AssemblyError, PrimerError},
    frag::{Frag, FragKey, FragKind},
    hairpin::HairpinOracle,
    primers::{PrimerCache, PrimerDesigner},
};

/// Turns closed assemblies into buildable fragments: primers for every
/// fragment that needs amplifying, synthetic fragments across gaps PCR
/// cannot bridge, and a final check that each neighbouring pair anneals.
///
/// Every assembly is filled from its own copy of the fragments, so a
/// rejected one leaves nothing behind except entries in the primer cache.
/// The cache belongs to the caller and should live for one planning run.
pub struct AssemblyFiller<'a> {
    target: String,
    params: &'a AssemblyParameters,
    designer: &'a dyn PrimerDesigner,
    oracle: &'a dyn HairpinOracle,
    cache: &'a mut PrimerCache,
}

impl<'a> AssemblyFiller<'a> {
    pub fn new(
        target: &str,
        params: &'a AssemblyParameters,
        designer: &'a dyn PrimerDesigner,
        oracle: &'a dyn HairpinOracle,
        cache: &'a mut PrimerCache,
    ) -> Self {
        Self {
            target: target.to_ascii_uppercase(),
            params,
            designer,
            oracle,
            cache,
        }
    }

    fn target_length(&self) -> i64 {
        self.target.len() as i64
    }

    pub fn fill(&mut self, assembly: &Assembly) -> Result<Vec<Frag>, AssemblyError> {
        if assembly.frags.is_empty() || self.target.is_empty() {
            return Err(AssemblyError::Construction("nothing to fill".to_string()));
        }
        let min = self.params.min_homology;
        let max = self.params.max_homology;

        check_duplicate_junctions(&assembly.frags, min, max)?;

        if assembly.len() == 1 && assembly.frags[0].len() >= self.target.len() {
            return Ok(vec![self.pass_through(&assembly.frags[0])]);
        }

        let frags = self.place_primers(&assembly.frags)?;
        let frags = self.fill_synthesis(frags)?;
        validate_junctions(&frags, min, max)?;
        Ok(frags)
    }

    /// A fragment that already holds the whole target, used as is.
    fn pass_through(&self, f: &Frag) -> Frag {
        let mut seq = f.seq.to_ascii_uppercase();
        seq.truncate(self.target.len());
        Frag {
            seq,
            pcr_seq: String::new(),
            end: f.start + self.target_length() - 1,
            kind: FragKind::Circular,
            primers: vec![],
            ..f.clone()
        }
    }

    /// Designs primers for every fragment that needs amplifying or lacks
    /// natural overlap with a neighbour. Neighbours are taken from the
    /// unmodified path so earlier designs do not shift later ones.
    fn place_primers(&mut self, frags: &[Frag]) -> Result<Vec<Frag>, AssemblyError> {
        let n = frags.len();
        let length = self.target_length();
        let mut placed = Vec::with_capacity(n);

        for (i, f) in frags.iter().enumerate() {
            let last = if i == 0 {
                frags[n - 1].shifted(-length)
            } else {
                frags[i - 1].clone()
            };
            let next = if i + 1 < n {
                frags[i + 1].clone()
            } else {
                frags[0].shifted(length)
            };

            let last_pcr = !last.overlaps_via_homology(f, self.params)
                && last.overlaps_via_pcr(f, self.params);
            let next_pcr = !f.overlaps_via_homology(&next, self.params)
                && f.overlaps_via_pcr(&next, self.params);

            let mut f = f.clone();
            if f.kind.needs_pcr() || last_pcr || next_pcr {
                self.amplify(&mut f, &last, &next)?;
            }
            placed.push(f);
        }
        Ok(placed)
    }

    fn amplify(&mut self, f: &mut Frag, last: &Frag, next: &Frag) -> Result<(), AssemblyError> {
        let rejected = |source: PrimerError| AssemblyError::Primer {
            id: f.id.clone(),
            source,
        };
        let primers = self
            .cache
            .design(self.designer, last, f, next, &self.target, self.params)
            .map_err(rejected)?;

        let start = primers[0].range.0;
        let end = primers[1].range.1;
        let pcr_seq = circular_range(&self.target, start..end + 1).ok_or_else(|| {
            rejected(PrimerError::NoPrimers {
                id: f.id.clone(),
                reason: format!("product {start}..{end} is longer than the target"),
            })
        })?;

        // the fragment is now whatever the primers amplify
        f.start = start;
        f.end = end;
        f.seq = pcr_seq.clone();
        f.pcr_seq = pcr_seq;
        f.primers = primers.to_vec();
        f.kind = FragKind::Pcr;
        Ok(())
    }

    /// Inserts synthetic fragments after every fragment that cannot reach
    /// its successor by PCR. Reads the boundaries set by primer design.
    fn fill_synthesis(&self, frags: Vec<Frag>) -> Result<Vec<Frag>, AssemblyError> {
        let length = self.target_length();
        let mut filled = Vec::with_capacity(frags.len());
        for (i, f) in frags.iter().enumerate() {
            let next = match frags.get(i + 1) {
                Some(next) => next.clone(),
                None => frags[0].shifted(length),
            };
            filled.push(f.clone());
            filled.extend(self.synthesize_between(f, &next)?);
        }
        Ok(filled)
    }

    /// Synthetic fragments bridging `f` to `next`, each overlapping its
    /// neighbours by the minimum homology. A piece whose closing junction
    /// would form a hairpin is extended until it no longer does.
    pub fn synthesize_between(&self, f: &Frag, next: &Frag) -> Result<Vec<Frag>, AssemblyError> {
        let count = f.synthesis_count(next, self.params);
        if count == 0 {
            return Ok(vec![]);
        }

        let length = self.target_length();
        let junction = self.params.min_homology as i64;
        let piece_length = (f.distance_to(next) / count as i64 + 2 * junction)
            .max(self.params.synthetic_min_length as i64);

        // the target four times over, offset by one revolution
        let repeated = self.target.repeat(4);
        let out_of_range = |start: i64, end: i64| AssemblyError::Synthesis {
            message: format!(
                "cannot synthesize {}..{} between {} and {}",
                start - length,
                end - length,
                f.id,
                next.id
            ),
        };

        let mut synths = Vec::with_capacity(count);
        let mut start = f.end - junction + length;
        while synths.len() < count {
            let mut end = start + piece_length + 1;
            let mut seq = slice(&repeated, start, end).ok_or_else(|| out_of_range(start, end))?;
            loop {
                let tail = &seq[seq.len().saturating_sub(junction as usize)..];
                if self.oracle.melting_temp(tail)? <= self.params.max_hairpin_melt {
                    break;
                }
                end += (junction / 2).max(1);
                seq = slice(&repeated, start, end).ok_or_else(|| out_of_range(start, end))?;
            }

            let id = format!("{}-{}-synthesis-{}", f.id, next.id, synths.len() + 1);
            synths.push(Frag {
                key: FragKey::new(&id, start - length, self.target.len()),
                id,
                seq: seq.to_string(),
                pcr_seq: String::new(),
                start: start - length,
                end: end - 1 - length,
                feature_start: start - length,
                feature_end: end - 1 - length,
                kind: FragKind::Synthetic,
                database: String::new(),
                url: String::new(),
                procurement_cost: 0.0,
                template: None,
                primers: vec![],
            });
            start = end - junction;
        }
        Ok(synths)
    }
}

fn slice(seq: &str, start: i64, end: i64) -> Option<&str> {
    if start < 0 || end <= start || end > seq.len() as i64 {
        return None;
    }
    seq.get(start as usize..end as usize)
}

/// Rejects paths where a fragment anneals to itself or to a fragment other
/// than its successor. Every rotation of a path gives the same answer.
pub fn check_duplicate_junctions(frags: &[Frag], min: usize, max: usize) -> Result<(), AssemblyError> {
    let c = frags.len();
    for (i, f) in frags.iter().enumerate() {
        if c > 1 {
            if let Some(junction) = f.junction(f, min, max) {
                if junction.len() < f.seq.len() {
                    return Err(AssemblyError::Junction {
                        left: f.id.clone(),
                        right: f.id.clone(),
                        junction,
                    });
                }
            }
        }
        // i + 1 is supposed to anneal to i
        for j in 2..c {
            let other = &frags[(i + j) % c];
            if let Some(junction) = f.junction(other, min, max) {
                return Err(AssemblyError::Junction {
                    left: f.id.clone(),
                    right: other.id.clone(),
                    junction,
                });
            }
        }
    }
    Ok(())
}

/// Confirms each fragment shares a junction with its successor, the last
/// one wrapping around to the first.
pub fn validate_junctions(frags: &[Frag], min: usize, max: usize) -> Result<(), AssemblyError> {
    for (i, f) in frags.iter().enumerate() {
        let next = &frags[(i + 1) % frags.len()];
        if f.junction(next, min, max).is_none() {
            return Err(AssemblyError::Synthesis {
                message: format!("no junction between {} and {}", f.id, next.id),
            });
        }
    }
    Ok(())
}
