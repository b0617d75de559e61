use crate::{
    cancel::CancelToken,
    config::AssemblyParameters,
    error::AssemblyError,
    frag::Frag,
};
use itertools::Itertools;

/// Flat estimate for one junction between features in feature mode.
const FEATURE_ANNEAL_COST: f64 = 10.0;

/// An ordered path of fragments along the target, with its estimated cost
/// and the number of synthetic fragments it will need. Extending an
/// assembly returns a new value; the original is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub frags: Vec<Frag>,
    pub cost: f64,
    pub synths: usize,
}

impl Assembly {
    /// A path holding just `f`: the cost of amplifying and procuring it.
    pub fn seed(f: &Frag, params: &AssemblyParameters) -> Self {
        Self {
            frags: vec![f.clone()],
            cost: f.cost_to(f, params) + f.procurement_cost,
            synths: 0,
        }
    }

    /// Fragments plus the synthetic fragments still to be made.
    pub fn len(&self) -> usize {
        self.frags.len() + self.synths
    }

    pub fn is_empty(&self) -> bool {
        self.frags.is_empty()
    }

    /// Extends the path with `f`. Returns the new assembly and whether it now
    /// wraps around the whole target. Fails if the result would have too
    /// many fragments or would add too short a stretch to amplify.
    ///
    /// In feature mode positions are feature indexes and `target_length` is
    /// the number of features on the target.
    pub fn add(
        &self,
        f: &Frag,
        target_length: usize,
        features: bool,
        params: &AssemblyParameters,
    ) -> Result<(Assembly, bool), AssemblyError> {
        let (Some(first), Some(last)) = (self.frags.first(), self.frags.last()) else {
            return Err(AssemblyError::Construction("empty assembly".to_string()));
        };

        let (first_start, start, end, last_end) = if features {
            (first.feature_start, f.feature_start, f.feature_end, last.feature_end)
        } else {
            (first.start, f.start, f.end, last.end)
        };

        // feature spans are inclusive, so covering the last feature closes
        let circularized = if features {
            end >= first_start + target_length as i64 - 1
        } else {
            end >= first_start + target_length as i64
        };
        let self_annealing = f.key == first.key;

        let synths = if features && start > last_end {
            (start - last_end - 1) as usize
        } else {
            last.synthesis_count(f, params)
        };

        let new_count = self.len() + synths + usize::from(!self_annealing);
        if new_count > params.fragments_max_count {
            return Err(AssemblyError::Construction(format!(
                "{new_count} fragments exceeds the maximum of {}",
                params.fragments_max_count
            )));
        }
        if !features && end - last_end < params.pcr_min_length as i64 {
            return Err(AssemblyError::Construction(format!(
                "{} adds {}bp, less than the {}bp PCR minimum",
                f.id,
                end - last_end,
                params.pcr_min_length
            )));
        }

        let mut anneal_cost = if features {
            FEATURE_ANNEAL_COST
        } else {
            last.cost_to(f, params)
        };
        // closing onto the first fragment costs nothing extra
        if self_annealing && synths == 0 {
            anneal_cost = 0.0;
        }

        // procurement is paid once per source entry
        let contained = self.frags.iter().any(|included| included.id == f.id);
        if !contained {
            anneal_cost += f.procurement_cost;
        }

        let mut frags = self.frags.clone();
        if !self_annealing {
            frags.push(f.clone());
        }

        Ok((
            Assembly {
                frags,
                cost: self.cost + anneal_cost,
                synths: self.synths + synths,
            },
            circularized,
        ))
    }

    pub fn describe(&self) -> String {
        format!(
            "{} - ${:.2}",
            self.frags
                .iter()
                .map(|f| format!("{}:{}", f.id, f.kind))
                .join(" "),
            self.cost
        )
    }
}

/// Builds every closed (circularized) assembly within the fragment limit by
/// walking fragments in order of their start on the target.
pub struct AssemblyBuilder<'a> {
    pub target_length: usize,
    /// Length of the searched sequence (the target repeated to catch matches
    /// across its origin). Fragments starting beyond it are ignored.
    pub search_length: usize,
    /// Number of features on the target when planning over feature spans.
    pub feature_count: Option<usize>,
    pub params: &'a AssemblyParameters,
    pub cancel: &'a CancelToken,
}

impl<'a> AssemblyBuilder<'a> {
    pub fn new(
        target_length: usize,
        search_length: usize,
        params: &'a AssemblyParameters,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            target_length,
            search_length,
            feature_count: None,
            params,
            cancel,
        }
    }

    /// Plans over feature spans instead of bp, for a target made of
    /// `feature_count` features.
    pub fn with_features(mut self, feature_count: usize) -> Self {
        self.feature_count = Some(feature_count);
        self
    }

    /// Closed assemblies in discovery order. A fragment that alone covers
    /// the target short-circuits the search to that one fragment.
    pub fn build(&self, frags: &[Frag]) -> Vec<Assembly> {
        let mut frags: Vec<Frag> = frags
            .iter()
            .filter(|f| f.start < self.search_length as i64)
            .cloned()
            .collect();
        frags.sort_by_key(|f| f.start);

        if let Some(whole) = frags.iter().find(|f| f.len() >= self.target_length) {
            log::info!("{} covers the whole target", whole.id);
            return vec![Assembly {
                frags: vec![whole.clone()],
                cost: whole.procurement_cost,
                synths: 0,
            }];
        }

        // partial assemblies ending at each fragment
        let mut working: Vec<Vec<Assembly>> = frags
            .iter()
            .map(|f| vec![Assembly::seed(f, self.params)])
            .collect();

        let features = self.feature_count.is_some();
        let span = self.feature_count.unwrap_or(self.target_length);
        let mut closed = vec![];
        for (i, f) in frags.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!(
                    "assembly search cancelled after {i} of {} fragments",
                    frags.len()
                );
                break;
            }

            // later fragments never extend back to i, so its list is final
            let reaching = std::mem::take(&mut working[i]);
            for j in f.reach(&frags, i, features) {
                for assembly in &reaching {
                    match assembly.add(&frags[j], span, features, self.params) {
                        Ok((extended, true)) => closed.push(extended),
                        Ok((extended, false)) => working[j].push(extended),
                        Err(e) => log::trace!("not extending {}: {e}", assembly.describe()),
                    }
                }
            }
        }

        log::debug!("{} assemblies made", closed.len());
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frag, keyed};

    fn params() -> AssemblyParameters {
        AssemblyParameters {
            min_homology: 10,
            max_homology: 50,
            pcr_min_length: 20,
            fragments_max_count: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_add_returns_new_value() {
        let p = params();
        let a = keyed(frag("a", 0, 59), 100);
        let b = keyed(frag("b", 40, 99), 100);
        let seed = Assembly::seed(&a, &p);
        let (extended, circularized) = seed.add(&b, 100, false, &p).unwrap();
        assert!(!circularized);
        assert_eq!(seed.frags.len(), 1);
        assert_eq!(extended.frags.len(), 2);
        assert_eq!(
            extended.cost,
            2.0 * p.pcr_no_homology_cost() + b.procurement_cost
        );
    }

    #[test]
    fn test_add_closing_onto_first_fragment() {
        let p = params();
        let a = keyed(frag("a", 0, 59), 100);
        let b = keyed(frag("b", 40, 99), 100);
        let a2 = keyed(frag("a", 100, 159), 100);
        let (ab, _) = Assembly::seed(&a, &p).add(&b, 100, false, &p).unwrap();
        let (closed, circularized) = ab.add(&a2, 100, false, &p).unwrap();
        assert!(circularized);
        assert_eq!(closed.len(), 2);
        assert_eq!(closed.cost, ab.cost);
    }

    #[test]
    fn test_add_rejects_too_many_fragments() {
        let p = AssemblyParameters {
            fragments_max_count: 1,
            ..params()
        };
        let a = keyed(frag("a", 0, 59), 100);
        let b = keyed(frag("b", 40, 119), 100);
        let err = Assembly::seed(&a, &p).add(&b, 100, false, &p).unwrap_err();
        assert!(matches!(err, AssemblyError::Construction(_)));
    }

    #[test]
    fn test_add_rejects_short_step() {
        let p = params();
        let a = keyed(frag("a", 0, 59), 100);
        let b = keyed(frag("b", 10, 65), 100);
        assert!(Assembly::seed(&a, &p).add(&b, 100, false, &p).is_err());
    }

    #[test]
    fn test_add_counts_synthetic_fragments() {
        let p = AssemblyParameters {
            synthetic_max_length: 100,
            ..params()
        };
        let a = keyed(frag("a", 0, 59), 1000);
        let b = keyed(frag("b", 300, 400), 1000);
        let (ab, _) = Assembly::seed(&a, &p).add(&b, 1000, false, &p).unwrap();
        assert_eq!(ab.synths, 3);
        assert_eq!(ab.len(), 5);
    }

    #[test]
    fn test_build_three_fragment_ring() {
        let p = params();
        let target_length = 120;
        let frags: Vec<Frag> = [
            ("a", 0, 59),
            ("b", 40, 99),
            ("c", 80, 139),
            ("a", 120, 179),
            ("b", 160, 219),
            ("c", 200, 259),
        ]
        .into_iter()
        .map(|(id, s, e)| keyed(frag(id, s, e), target_length))
        .collect();
        let cancel = CancelToken::new();
        let closed = AssemblyBuilder::new(target_length, 2 * target_length, &p, &cancel).build(&frags);
        assert!(!closed.is_empty());
        let abc = closed
            .iter()
            .find(|a| a.frags.iter().map(|f| f.id.as_str()).collect::<Vec<_>>() == ["a", "b", "c"])
            .unwrap();
        assert_eq!(abc.synths, 0);
        assert_eq!(abc.cost, 3.0 * p.pcr_no_homology_cost());
        assert!(closed.iter().all(|a| a.len() <= p.fragments_max_count));
    }

    #[test]
    fn test_build_short_circuits_on_whole_target() {
        let p = params();
        let frags = vec![
            keyed(frag("part", 0, 59), 100),
            keyed(frag("whole", 20, 169), 100),
        ];
        let cancel = CancelToken::new();
        let closed = AssemblyBuilder::new(100, 200, &p, &cancel).build(&frags);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].frags[0].id, "whole");
    }

    fn spanning(id: &str, bp: (i64, i64), features: (i64, i64), target_length: usize) -> Frag {
        let mut f = keyed(frag(id, bp.0, bp.1), target_length);
        f.feature_start = features.0;
        f.feature_end = features.1;
        f
    }

    fn ids(assembly: &Assembly) -> Vec<&str> {
        assembly.frags.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_build_feature_mode_counts_missing_features() {
        let p = params();
        // three 40bp features, x holds the first and y the last
        let frags = vec![
            spanning("x", (0, 39), (0, 0), 120),
            spanning("y", (80, 119), (2, 2), 120),
            spanning("x", (120, 159), (3, 3), 120),
            spanning("y", (200, 239), (5, 5), 120),
        ];
        let cancel = CancelToken::new();
        let closed = AssemblyBuilder::new(120, 240, &p, &cancel)
            .with_features(3)
            .build(&frags);

        let xy = closed.iter().find(|a| ids(a) == ["x", "y"]).unwrap();
        assert_eq!(xy.synths, 1);
        assert_eq!(xy.len(), 3);
        assert_eq!(
            xy.cost,
            Assembly::seed(&frags[0], &p).cost + FEATURE_ANNEAL_COST
        );
        // x alone closes by synthesizing the two features it lacks
        let x = closed.iter().find(|a| ids(a) == ["x"]).unwrap();
        assert_eq!(x.synths, 2);
    }

    #[test]
    fn test_build_feature_mode_ignores_bp_gaps() {
        let p = params();
        // consecutive features with 3bp between them on the target
        let frags = vec![
            spanning("a", (0, 49), (0, 0), 100),
            spanning("b", (53, 99), (1, 1), 100),
            spanning("a", (100, 149), (2, 2), 100),
            spanning("b", (153, 199), (3, 3), 100),
        ];
        let cancel = CancelToken::new();
        let closed = AssemblyBuilder::new(100, 200, &p, &cancel)
            .with_features(2)
            .build(&frags);

        let ab = closed.iter().find(|a| ids(a) == ["a", "b"]).unwrap();
        assert_eq!(ab.synths, 0);
        assert_eq!(ab.len(), 2);
        assert!(closed.iter().all(|a| a.synths <= 1));
    }

    #[test]
    fn test_build_stops_when_cancelled() {
        let p = params();
        let frags = vec![keyed(frag("a", 0, 59), 100), keyed(frag("a", 100, 159), 100)];
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(AssemblyBuilder::new(100, 200, &p, &cancel).build(&frags).is_empty());
    }
}
