use crate::assembly::Assembly;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Closed assemblies bucketed by fragment count, cheapest first within each
/// bucket. Equal costs keep their discovery order.
#[derive(Debug, Clone, Default)]
pub struct ParetoGroups {
    pub counts: Vec<usize>,
    pub buckets: BTreeMap<usize, Vec<Assembly>>,
}

impl ParetoGroups {
    pub fn new(assemblies: Vec<Assembly>) -> Self {
        let buckets: BTreeMap<usize, Vec<Assembly>> = assemblies
            .into_iter()
            .into_group_map_by(|a| a.len())
            .into_iter()
            .map(|(count, mut bucket)| {
                bucket.sort_by(|a, b| a.cost.total_cmp(&b.cost));
                (count, bucket)
            })
            .collect();
        let counts = buckets.keys().copied().collect();
        Self { counts, buckets }
    }

    /// Buckets in ascending fragment count.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Assembly])> {
        self.buckets
            .iter()
            .map(|(count, bucket)| (*count, bucket.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::frag;

    fn assembly(ids: &[&str], synths: usize, cost: f64) -> Assembly {
        Assembly {
            frags: ids.iter().map(|id| frag(id, 0, 99)).collect(),
            cost,
            synths,
        }
    }

    #[test]
    fn test_groups_by_count_and_sorts_by_cost() {
        let groups = ParetoGroups::new(vec![
            assembly(&["a", "b", "c"], 0, 90.0),
            assembly(&["a"], 1, 150.0),
            assembly(&["b", "c"], 1, 120.0),
            assembly(&["a", "b"], 0, 60.0),
            assembly(&["c", "a", "b"], 0, 75.0),
        ]);
        assert_eq!(groups.counts, vec![2, 3]);
        assert_eq!(groups.len(), 5);

        let costs: Vec<(usize, Vec<f64>)> = groups
            .iter()
            .map(|(count, bucket)| (count, bucket.iter().map(|a| a.cost).collect()))
            .collect();
        assert_eq!(
            costs,
            vec![(2, vec![60.0, 150.0]), (3, vec![75.0, 90.0, 120.0])]
        );
    }

    #[test]
    fn test_equal_costs_keep_discovery_order() {
        let groups = ParetoGroups::new(vec![
            assembly(&["x", "y"], 0, 50.0),
            assembly(&["y", "x"], 0, 50.0),
        ]);
        let firsts: Vec<&str> = groups.buckets[&2]
            .iter()
            .map(|a| a.frags[0].id.as_str())
            .collect();
        assert_eq!(firsts, vec!["x", "y"]);
    }

    #[test]
    fn test_empty() {
        let groups = ParetoGroups::new(vec![]);
        assert!(groups.is_empty());
        assert!(groups.counts.is_empty());
    }
}
