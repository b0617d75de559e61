use crate::{
    config::AssemblyParameters,
    dna_sequence::{DNAsequence, circular_range, find_all_subsequences, reverse_complement},
    frag::{Frag, FragKey, FragKind, parse_url},
    matcher::Database,
};
use std::collections::BTreeMap;

/// A plasmid described as named features laid back to back around a ring.
/// Feature `i` covers `offsets[i]..offsets[i + 1]` of the joined sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTarget {
    name: String,
    features: Vec<DNAsequence>,
    offsets: Vec<usize>,
    seq: String,
}

/// Consecutive features found back to back in one strand of an entry.
#[derive(Debug, Clone, PartialEq)]
struct FeatureRun {
    first: usize,
    count: usize,
    seq: String,
}

impl FeatureTarget {
    /// Empty features are dropped.
    pub fn new(name: &str, features: Vec<DNAsequence>) -> Self {
        let features: Vec<DNAsequence> = features.into_iter().filter(|f| !f.is_empty()).collect();
        let mut offsets = Vec::with_capacity(features.len() + 1);
        let mut seq = String::new();
        for feature in &features {
            offsets.push(seq.len());
            seq.push_str(feature.forward());
        }
        offsets.push(seq.len());
        Self {
            name: name.to_string(),
            features,
            offsets,
            seq,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[DNAsequence] {
        &self.features
    }

    pub fn seq(&self) -> &str {
        &self.seq
    }

    pub fn to_sequence(&self) -> DNAsequence {
        DNAsequence::new(&self.name, &self.seq, true)
    }

    /// Where feature `index` starts on the joined sequence. Indexes past the
    /// last feature continue on the next revolution.
    pub fn position(&self, index: usize) -> i64 {
        let n = self.len().max(1);
        ((index / n) * self.seq.len() + self.offsets[index % n]) as i64
    }

    /// Graph nodes for every run of consecutive features in the databases'
    /// entries, each with its copy one revolution on. Feature spans are
    /// feature indexes; `start` and `end` are bp on the joined sequence.
    pub fn frags(&self, databases: &[Database], params: &AssemblyParameters) -> Vec<Frag> {
        let mut frags = vec![];
        for database in databases {
            for entry in &database.entries {
                // one run per first feature, the longest on either strand
                let mut longest: BTreeMap<usize, FeatureRun> = BTreeMap::new();
                for run in self.runs(entry) {
                    match longest.get(&run.first) {
                        Some(kept) if kept.count >= run.count => {}
                        _ => {
                            longest.insert(run.first, run);
                        }
                    }
                }
                for run in longest.values() {
                    let f = self.frag(database, entry, run, params);
                    frags.push(self.revolved(&f));
                    frags.push(f);
                }
            }
        }
        frags.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.end.cmp(&a.end))
                .then_with(|| a.id.cmp(&b.id))
        });
        log::debug!("{} feature fragments for {}", frags.len(), self.name);
        frags
    }

    fn frag(
        &self,
        database: &Database,
        entry: &DNAsequence,
        run: &FeatureRun,
        params: &AssemblyParameters,
    ) -> Frag {
        let start = self.position(run.first);
        let end = self.position(run.first + run.count) - 1;
        Frag {
            id: entry.name().to_string(),
            key: FragKey::new(entry.name(), start, self.seq.len()),
            seq: run.seq.clone(),
            pcr_seq: String::new(),
            start,
            end,
            feature_start: run.first as i64,
            feature_end: (run.first + run.count - 1) as i64,
            kind: if entry.is_circular() {
                FragKind::Circular
            } else {
                FragKind::Pcr
            },
            database: database.name.clone(),
            url: parse_url(entry.name(), &database.name),
            procurement_cost: params.procurement_cost(&database.name),
            template: Some(entry.forward().to_string()),
            primers: vec![],
        }
    }

    /// `f` one revolution on, in bp and in features.
    fn revolved(&self, f: &Frag) -> Frag {
        let mut copy = f.shifted(self.seq.len() as i64);
        copy.feature_start = f.feature_start + self.len() as i64;
        copy.feature_end = f.feature_end + self.len() as i64;
        copy
    }

    fn feature_length(&self, index: usize) -> usize {
        self.features[index].len()
    }

    /// Runs of features that follow each other without a gap, on both
    /// strands. Runs in circular entries may cross the entry's origin.
    fn runs(&self, entry: &DNAsequence) -> Vec<FeatureRun> {
        let n = self.len();
        let mut runs = vec![];
        if n == 0 || entry.is_empty() {
            return runs;
        }
        let entry_length = entry.len();
        for strand in [entry.forward().to_string(), reverse_complement(entry.forward())] {
            let searchable = if entry.is_circular() {
                strand.repeat(2)
            } else {
                strand.clone()
            };

            // (position, feature), sorted, within one revolution of the entry
            let mut hits: Vec<(usize, usize)> = vec![];
            for (i, feature) in self.features.iter().enumerate() {
                hits.extend(
                    find_all_subsequences(searchable.as_bytes(), feature.forward().as_bytes())
                        .into_iter()
                        .filter(|p| *p < entry_length)
                        .map(|p| (p, i)),
                );
            }
            hits.sort_unstable();
            if entry.is_circular() {
                let wrapped: Vec<(usize, usize)> =
                    hits.iter().map(|(p, i)| (p + entry_length, *i)).collect();
                hits.extend(wrapped);
            }

            let mut continued = vec![false; hits.len()];
            for k in 0..hits.len() {
                let (start, first) = hits[k];
                if start >= entry_length || continued[k] {
                    continue;
                }
                let mut count = 1;
                let mut end = start + self.feature_length(first);
                while count < n {
                    let wanted = (end, (first + count) % n);
                    let Ok(next) = hits.binary_search(&wanted) else {
                        break;
                    };
                    continued[next] = true;
                    end += self.feature_length(wanted.1);
                    count += 1;
                }

                let seq = if entry.is_circular() {
                    circular_range(&strand, start as i64..end as i64)
                } else {
                    strand.get(start..end).map(str::to_string)
                };
                if let Some(seq) = seq {
                    runs.push(FeatureRun { first, count, seq });
                }
            }
        }
        runs
    }
}
