use crate::{config::AssemblyParameters, matcher::Match, primers::Primer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a fragment is obtained for the assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragKind {
    /// Used as submitted, without PCR or synthesis.
    Linear,
    /// An existing circular plasmid.
    Circular,
    /// Amplified from a template with primers.
    Pcr,
    /// Made from scratch.
    Synthetic,
}

impl FragKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Circular => "plasmid",
            Self::Pcr => "pcr",
            Self::Synthetic => "synthetic",
        }
    }

    /// Whether the fragment has to be amplified before it can be assembled.
    pub fn needs_pcr(&self) -> bool {
        matches!(self, Self::Pcr | Self::Circular)
    }
}

impl fmt::Display for FragKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of one logical fragment: its source entry and where it starts on
/// the target, modulo the target length. The copy of a fragment one
/// revolution further along the searched sequence shares its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragKey {
    pub source: String,
    pub offset: usize,
}

impl FragKey {
    pub fn new(source: &str, start: i64, target_length: usize) -> Self {
        let offset = if target_length == 0 {
            0
        } else {
            start.rem_euclid(target_length as i64) as usize
        };
        Self {
            source: source.to_string(),
            offset,
        }
    }
}

impl fmt::Display for FragKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source, self.offset)
    }
}

/// A candidate building block positioned on the target. `start` and `end`
/// are inclusive coordinates in the searched (multi-revolution) space.
#[derive(Debug, Clone, PartialEq)]
pub struct Frag {
    pub id: String,
    pub key: FragKey,
    pub seq: String,
    /// Sequence after PCR, including homology added by the primers.
    pub pcr_seq: String,
    pub start: i64,
    pub end: i64,
    pub feature_start: i64,
    pub feature_end: i64,
    pub kind: FragKind,
    pub database: String,
    pub url: String,
    pub procurement_cost: f64,
    /// Full source sequence, used to check primers for off-target sites.
    pub template: Option<String>,
    pub primers: Vec<Primer>,
}

impl Frag {
    pub fn from_match(m: &Match, target_length: usize, params: &AssemblyParameters) -> Self {
        let start = m.query_start as i64;
        let end = m.query_end as i64;
        Self {
            id: m.entry.clone(),
            key: FragKey::new(&m.entry, start, target_length),
            seq: m.seq.to_ascii_uppercase(),
            pcr_seq: String::new(),
            start,
            end,
            feature_start: start,
            feature_end: end,
            kind: if m.circular {
                FragKind::Circular
            } else {
                FragKind::Pcr
            },
            database: m.database.clone(),
            url: parse_url(&m.entry, &m.database),
            procurement_cost: params.procurement_cost(&m.database),
            template: m.template.clone(),
            primers: vec![],
        }
    }

    /// A copy moved `by` bp along the target, keeping its identity.
    pub fn shifted(&self, by: i64) -> Self {
        let mut ret = self.clone();
        ret.start += by;
        ret.end += by;
        ret.feature_start += by;
        ret.feature_end += by;
        ret
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// PCR product if the fragment was amplified, its sequence otherwise.
    pub fn assembled_seq(&self) -> &str {
        if self.pcr_seq.is_empty() {
            &self.seq
        } else {
            &self.pcr_seq
        }
    }

    /// bp from the end of this fragment to the start of `other`; negative
    /// when they overlap.
    pub fn distance_to(&self, other: &Frag) -> i64 {
        other.start - self.end
    }

    /// Whether a primer could bridge the gap to `other`.
    pub fn overlaps_via_pcr(&self, other: &Frag, params: &AssemblyParameters) -> bool {
        self.distance_to(other) <= params.pcr_max_embed_length
    }

    /// Whether there is already enough overlap with `other` to anneal.
    pub fn overlaps_via_homology(&self, other: &Frag, params: &AssemblyParameters) -> bool {
        self.distance_to(other) <= -(params.min_homology as i64)
    }

    /// Synthetic fragments needed to bridge to `other` directly.
    pub fn synthesis_count(&self, other: &Frag, params: &AssemblyParameters) -> usize {
        if self.overlaps_via_pcr(other, params) {
            return 0;
        }
        let distance = self.distance_to(other).max(1) as usize;
        distance.div_ceil(params.synthetic_max_length.max(1))
    }

    fn is_same(&self, other: &Frag) -> bool {
        std::ptr::eq(self, other)
            || (self.key == other.key && self.start == other.start && self.end == other.end)
    }

    /// Estimated dollars to get from this fragment to `other`, by PCR if
    /// primers can reach it, by synthesis otherwise. Procurement is not
    /// included.
    pub fn cost_to(&self, other: &Frag, params: &AssemblyParameters) -> f64 {
        let needs_pcr = self.kind.needs_pcr();
        let pcr_no_homology = params.pcr_no_homology_cost();

        if self.is_same(other) {
            return if needs_pcr { pcr_no_homology } else { 0.0 };
        }

        if self.overlaps_via_pcr(other, params) {
            if self.overlaps_via_homology(other, params) {
                return pcr_no_homology;
            }
            return params.pcr_homology_cost();
        }

        let gap = self.distance_to(other) + 2 * params.min_homology as i64;
        let synth_cost = params.synth_fragment_cost(gap.max(1) as usize);
        if needs_pcr {
            synth_cost + pcr_no_homology
        } else {
            synth_cost
        }
    }

    /// Cost of this fragment as prepared; procurement only if `procure`.
    pub fn cost(&self, procure: bool, params: &AssemblyParameters) -> f64 {
        let mut c = 0.0;
        if procure {
            c += self.procurement_cost;
        }
        match self.kind {
            FragKind::Pcr if self.primers.len() == 2 => {
                let primer_bp = self.primers[0].seq.len() + self.primers[1].seq.len();
                c += primer_bp as f64 * params.pcr_bp_cost;
                c += params.pcr_rxn_cost;
            }
            FragKind::Synthetic => c += params.synth_fragment_cost(self.seq.len()),
            _ => {}
        }
        c
    }

    /// Indexes of the fragments this one can be joined to in `frags`, sorted
    /// by start. Fragments engulfed by this one are skipped, and the scan
    /// stops at (and includes) this fragment's copy one revolution on.
    pub fn reach(&self, frags: &[Frag], i: usize, features: bool) -> Vec<usize> {
        let mut reachable = vec![];
        for (j, other) in frags.iter().enumerate().skip(i + 1) {
            let engulfed = if features {
                other.feature_end <= self.feature_end
            } else {
                other.end < self.end
            };
            if engulfed {
                continue;
            }
            reachable.push(j);
            if other.key == self.key {
                break;
            }
        }
        reachable
    }

    /// The exact homology between the end of this fragment and the start of
    /// `other`, between `min_homology` and `max_homology` bp long. The
    /// longest candidate wins.
    pub fn junction(&self, other: &Frag, min_homology: usize, max_homology: usize) -> Option<String> {
        junction(self.assembled_seq(), other.assembled_seq(), min_homology, max_homology)
    }
}

pub fn junction(left: &str, right: &str, min_homology: usize, max_homology: usize) -> Option<String> {
    let s1 = left.to_ascii_uppercase();
    let s2 = right.to_ascii_uppercase();
    if s1.is_empty() || s2.is_empty() || min_homology == 0 {
        return None;
    }
    let first = s1.len().saturating_sub(max_homology);
    let last = s1.len().saturating_sub(min_homology);
    (first..=last)
        .map(|i| &s1[i..])
        .find(|suffix| !suffix.is_empty() && s2.starts_with(suffix))
        .map(|suffix| suffix.to_string())
}

/// Link to the repository page of an entry, for known repositories.
pub fn parse_url(entry: &str, database: &str) -> String {
    let database = database.to_ascii_lowercase();
    if database.contains("addgene") {
        let id = entry.split('.').next().unwrap_or(entry);
        format!("https://www.addgene.org/{id}/")
    } else if database.contains("igem") {
        format!("http://parts.igem.org/Part:{entry}")
    } else if database.contains("dnasu") {
        format!("http://dnasu.org/DNASU/GetCloneDetail.do?cloneid={entry}")
    } else {
        String::new()
    }
}

/// Graph nodes for the culled matches. A fragment whose end anneals to its
/// own start is trimmed so it cannot circularize alone; it is dropped if
/// that leaves it too short to amplify.
pub fn new_frags(matches: &[Match], target_length: usize, params: &AssemblyParameters) -> Vec<Frag> {
    let mut frags = vec![];
    for m in matches {
        let mut f = Frag::from_match(m, target_length, params);
        if let Some(self_junction) = f.junction(&f, params.min_homology, params.max_homology) {
            if self_junction.len() >= f.seq.len() {
                continue;
            }
            f.end -= self_junction.len() as i64;
            f.feature_end = f.feature_end.min(f.end);
            if f.end - f.start < params.pcr_min_length as i64 {
                continue;
            }
            f.seq.truncate(f.seq.len() - self_junction.len());
        }
        frags.push(f);
    }
    frags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::frag;

    fn params() -> AssemblyParameters {
        AssemblyParameters {
            min_homology: 10,
            max_homology: 50,
            pcr_max_embed_length: 20,
            synthetic_max_length: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_distance_and_overlap() {
        let p = params();
        let a = frag("a", 0, 99);
        let b = frag("b", 80, 200);
        let c = frag("c", 115, 200);
        assert_eq!(a.distance_to(&b), -19);
        assert!(a.overlaps_via_homology(&b, &p));
        assert!(a.overlaps_via_pcr(&b, &p));
        assert_eq!(a.distance_to(&c), 16);
        assert!(!a.overlaps_via_homology(&c, &p));
        assert!(a.overlaps_via_pcr(&c, &p));
    }

    #[test]
    fn test_synthesis_count() {
        let p = params();
        let a = frag("a", 0, 99);
        assert_eq!(a.synthesis_count(&frag("b", 110, 300), &p), 0);
        assert_eq!(a.synthesis_count(&frag("b", 150, 300), &p), 1);
        assert_eq!(a.synthesis_count(&frag("b", 199, 300), &p), 1);
        assert_eq!(a.synthesis_count(&frag("b", 201, 400), &p), 2);
    }

    #[test]
    fn test_cost_to() {
        let p = params();
        let a = frag("a", 0, 99);
        assert_eq!(a.cost_to(&a, &p), p.pcr_no_homology_cost());
        assert_eq!(a.cost_to(&frag("b", 50, 200), &p), p.pcr_no_homology_cost());
        assert_eq!(a.cost_to(&frag("b", 95, 200), &p), p.pcr_homology_cost());

        let far = frag("b", 400, 600);
        let expected = p.synth_fragment_cost((400 - 99 + 20) as usize) + p.pcr_no_homology_cost();
        assert_eq!(a.cost_to(&far, &p), expected);

        let mut linear = frag("l", 0, 99);
        linear.kind = FragKind::Linear;
        assert_eq!(linear.cost_to(&linear, &p), 0.0);
        assert_eq!(
            linear.cost_to(&far, &p),
            p.synth_fragment_cost((400 - 99 + 20) as usize)
        );
    }

    #[test]
    fn test_reach_skips_engulfed_and_stops_at_own_copy() {
        let frags = vec![
            frag("a", 0, 100),
            frag("inner", 10, 50),
            frag("b", 60, 200),
            frag("c", 150, 300),
            frag("a", 400, 500),
            frag("d", 450, 600),
        ];
        let target_length = 400;
        let frags: Vec<Frag> = frags
            .into_iter()
            .map(|mut f| {
                f.key = FragKey::new(&f.id, f.start, target_length);
                f
            })
            .collect();
        assert_eq!(frags[0].reach(&frags, 0, false), vec![2, 3, 4]);
        assert_eq!(frags[2].reach(&frags, 2, false), vec![3, 4, 5]);
    }

    #[test]
    fn test_junction() {
        assert_eq!(
            junction("AAAAAGGGCCCTTT", "GGGCCCTTTAAAA", 4, 10),
            Some("GGGCCCTTT".to_string())
        );
        assert_eq!(junction("AAAAAGGGCCCTTT", "CCCTTTA", 7, 10), None);
        assert_eq!(junction("AAAA", "", 1, 4), None);
    }

    #[test]
    fn test_new_frags_trims_self_junction() {
        let p = AssemblyParameters {
            min_homology: 5,
            max_homology: 20,
            pcr_min_length: 10,
            ..Default::default()
        };
        // ends with its own first 8bp
        let seq = "ACGTACCATTGTTGCCAGACGTACCA";
        let m = Match {
            entry: "pX".to_string(),
            seq: seq.to_string(),
            query_start: 0,
            query_end: seq.len() - 1,
            database: "addgene".to_string(),
            circular: false,
            mismatching: 0,
            template: None,
        };
        let frags = new_frags(&[m], 1000, &p);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].seq, &seq[..seq.len() - 8]);
        assert_eq!(frags[0].end, (seq.len() - 9) as i64);
        assert_eq!(frags[0].url, "https://www.addgene.org/pX/");
        assert_eq!(frags[0].procurement_cost, 65.0);
    }

    #[test]
    fn test_cost_with_primers() {
        let p = params();
        let mut f = frag("a", 0, 99);
        f.procurement_cost = 65.0;
        assert_eq!(f.cost(true, &p), 65.0);
        f.primers = vec![Primer::new("A".repeat(20)), Primer::new("C".repeat(30))];
        assert!((f.cost(false, &p) - (50.0 * p.pcr_bp_cost + p.pcr_rxn_cost)).abs() < 1e-9);
    }
}
