use crate::{
    config::AssemblyParameters,
    dna_sequence::{DNAsequence, reverse_complement},
    error::ToolError,
};
use rayon::prelude::*;
use std::{cmp::Ordering, collections::HashMap};

const MAX_SEED_LENGTH: usize = 16;

/// A stretch of a database entry that is identical to part of the query.
/// Query coordinates are 0-indexed and inclusive, in whatever coordinate
/// space the caller searched (usually the target doubled, to catch matches
/// across the origin).
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub entry: String,
    pub seq: String,
    pub query_start: usize,
    pub query_end: usize,
    pub database: String,
    pub circular: bool,
    pub mismatching: usize,
    /// Full sequence of the source entry, when known.
    pub template: Option<String>,
}

impl Match {
    pub fn length(&self) -> usize {
        self.query_end + 1 - self.query_start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub name: String,
    pub entries: Vec<DNAsequence>,
}

impl Database {
    pub fn new(name: &str, entries: Vec<DNAsequence>) -> Self {
        Self {
            name: name.to_string(),
            entries,
        }
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(path, DNAsequence::from_file(path)?))
    }
}

pub trait Matcher {
    /// Every match of at least `min_match_length` bp between `query` and the
    /// entries of `databases`.
    fn find(
        &self,
        query: &str,
        databases: &[Database],
        min_match_length: usize,
    ) -> Result<Vec<Match>, ToolError>;
}

/// In-process matcher reporting maximal exact matches on both strands.
#[derive(Debug, Clone, Default)]
pub struct ExactMatcher;

impl ExactMatcher {
    fn match_entry(
        query: &[u8],
        database: &Database,
        entry: &DNAsequence,
        min_match_length: usize,
    ) -> Vec<Match> {
        let mut ret = vec![];
        if entry.is_empty() || query.is_empty() {
            return ret;
        }
        let strands = [
            entry.forward().to_string(),
            reverse_complement(entry.forward()),
        ];
        for subject in strands {
            let mut searchable = subject.clone();
            if entry.is_circular() {
                searchable.push_str(&subject[..subject.len() - 1]);
            }
            for (start, end) in maximal_matches(query, searchable.as_bytes(), subject.len(), min_match_length) {
                ret.push(Match {
                    entry: entry.name().to_string(),
                    seq: String::from_utf8_lossy(&query[start..=end]).to_string(),
                    query_start: start,
                    query_end: end,
                    database: database.name.clone(),
                    circular: entry.is_circular(),
                    mismatching: 0,
                    template: Some(entry.forward().to_string()),
                });
            }
        }
        ret
    }
}

impl Matcher for ExactMatcher {
    fn find(
        &self,
        query: &str,
        databases: &[Database],
        min_match_length: usize,
    ) -> Result<Vec<Match>, ToolError> {
        let query = DNAsequence::validate_dna_sequence(query);
        let pairs: Vec<(&Database, &DNAsequence)> = databases
            .iter()
            .flat_map(|db| db.entries.iter().map(move |e| (db, e)))
            .collect();

        let mut matches: Vec<Match> = pairs
            .par_iter()
            .flat_map_iter(|(db, entry)| {
                Self::match_entry(query.as_bytes(), db, entry, min_match_length)
            })
            .collect();

        sort_matches(&mut matches);
        matches.dedup_by(|a, b| {
            a.entry == b.entry
                && a.database == b.database
                && a.query_start == b.query_start
                && a.query_end == b.query_end
        });
        log::debug!("{} exact matches of >= {min_match_length}bp", matches.len());
        Ok(matches)
    }
}

/// Inclusive query ranges of left-maximal exact matches between `query` and
/// `subject`, each capped at `max_length` bp.
fn maximal_matches(
    query: &[u8],
    subject: &[u8],
    max_length: usize,
    min_length: usize,
) -> Vec<(usize, usize)> {
    let k = min_length.clamp(1, MAX_SEED_LENGTH);
    let mut ret = vec![];
    if query.len() < k || subject.len() < k || max_length < min_length {
        return ret;
    }

    let mut seeds: HashMap<&[u8], Vec<usize>> = HashMap::new();
    for (j, kmer) in subject.windows(k).enumerate() {
        seeds.entry(kmer).or_default().push(j);
    }

    for (i, kmer) in query.windows(k).enumerate() {
        let Some(hits) = seeds.get(kmer) else {
            continue;
        };
        for &j in hits {
            // not the left end of a match; it was reported from further left
            if i > 0 && j > 0 && query[i - 1] == subject[j - 1] {
                continue;
            }
            let mut length = k;
            while length < max_length
                && i + length < query.len()
                && j + length < subject.len()
                && query[i + length] == subject[j + length]
            {
                length += 1;
            }
            if length >= min_length {
                ret.push((i, i + length - 1));
            }
        }
    }
    ret
}

/// Sorts by query start; for equal starts the longer match comes first.
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        a.query_start
            .cmp(&b.query_start)
            .then_with(|| b.length().cmp(&a.length()))
            .then_with(|| b.entry.cmp(&a.entry))
            .then_with(|| a.database.cmp(&b.database))
    });
}

/// Removes matches shorter than `min_length` and matches engulfed by a
/// larger one. Free matches are culled only against other free matches, so a
/// priced match never hides a cheaper one.
pub fn cull(matches: Vec<Match>, min_length: usize, params: &AssemblyParameters) -> Vec<Match> {
    let (free, priced): (Vec<Match>, Vec<Match>) = matches
        .into_iter()
        .filter(|m| m.length() >= min_length)
        .partition(|m| params.procurement_cost(&m.database) == 0.0);

    let mut culled = properize(free);
    culled.extend(properize(priced));
    sort_matches(&mut culled);
    culled
}

/// Keeps only matches that reach further than every match starting before them.
fn properize(mut matches: Vec<Match>) -> Vec<Match> {
    sort_matches(&mut matches);
    let mut culled: Vec<Match> = vec![];
    for m in matches {
        let keep = match culled.last() {
            Some(last) => m.query_end.cmp(&last.query_end) == Ordering::Greater,
            None => true,
        };
        if keep {
            culled.push(m);
        }
    }
    culled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(entry: &str, db: &str, start: usize, end: usize) -> Match {
        Match {
            entry: entry.to_string(),
            seq: "A".repeat(end + 1 - start),
            query_start: start,
            query_end: end,
            database: db.to_string(),
            circular: false,
            mismatching: 0,
            template: None,
        }
    }

    #[test]
    fn test_cull_removes_engulfed_and_short() {
        let params = AssemblyParameters::default();
        let matches = vec![
            hit("big", "addgene", 0, 200),
            hit("inside", "addgene", 50, 150),
            hit("tiny", "addgene", 300, 310),
            hit("next", "addgene", 180, 400),
        ];
        let culled = cull(matches, 60, &params);
        let names: Vec<&str> = culled.iter().map(|m| m.entry.as_str()).collect();
        assert_eq!(names, vec!["big", "next"]);
    }

    #[test]
    fn test_cull_keeps_free_matches_inside_priced_ones() {
        let params = AssemblyParameters::default();
        let matches = vec![
            hit("big", "addgene", 0, 200),
            hit("local", "my_parts", 50, 150),
        ];
        let culled = cull(matches, 60, &params);
        assert_eq!(culled.len(), 2);
    }

    #[test]
    fn test_exact_matcher_forward_and_reverse() {
        let target = "ACGTTGCAAGCTTGGCACTGGCCGTCGTTTTACAACGTCGTGACTGGGAAAACCCTGGCG";
        let part = &target[10..50];
        let db = Database::new(
            "parts",
            vec![
                DNAsequence::new("fwd", &format!("TTTTT{part}TTTTT"), false),
                DNAsequence::new("rev", &reverse_complement(part), false),
            ],
        );
        let matches = ExactMatcher.find(target, &[db], 30).unwrap();
        assert_eq!(matches.len(), 2);
        for m in &matches {
            assert_eq!((m.query_start, m.query_end), (10, 49));
            assert_eq!(m.seq, part);
        }
    }

    #[test]
    fn test_exact_matcher_across_circular_origin() {
        let target = "ACGTTGCAAGCTTGGCACTGGCCGTCGTTTTACAACGTCGTGACTGGGAAAACCCTGGCG";
        // entry is the target rotated, so the match crosses the entry's origin
        let rotated = format!("{}{}", &target[30..], &target[..30]);
        let db = Database::new("lab", vec![DNAsequence::new("pRot", &rotated, true)]);
        let matches = ExactMatcher.find(target, &[db], 40).unwrap();
        assert!(
            matches
                .iter()
                .any(|m| m.query_start == 0 && m.length() == target.len())
        );
    }
}
