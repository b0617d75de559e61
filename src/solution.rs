use crate::{
    cancel::CancelToken,
    config::AssemblyParameters,
    error::AssemblyError,
    fill::AssemblyFiller,
    frag::{Frag, FragKind},
    pareto::ParetoGroups,
};
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};

/// A filled assembly: every fragment concretely typed, with primers or a
/// synthetic sequence where needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub fragments: Vec<Frag>,
    pub cost: f64,
    pub count: usize,
}

impl Solution {
    pub fn new(fragments: Vec<Frag>, params: &AssemblyParameters) -> Self {
        Self {
            cost: solution_cost(&fragments, params),
            count: fragments.len(),
            fragments,
        }
    }
}

/// Dollar cost of building from `frags`: each fragment's preparation,
/// procurement once per source entry, and the Gibson and PCR surcharges
/// when any fragment is made rather than used as is.
pub fn solution_cost(frags: &[Frag], params: &AssemblyParameters) -> f64 {
    let mut procured = HashSet::new();
    let mut cost: f64 = frags
        .iter()
        .map(|f| f.cost(procured.insert(f.id.as_str()), params))
        .sum();

    let pcr = frags.iter().any(|f| f.kind == FragKind::Pcr);
    let synthetic = frags.iter().any(|f| f.kind == FragKind::Synthetic);
    if pcr || synthetic {
        cost += params.gibson_cost + params.gibson_time_cost;
    }
    if pcr {
        cost += params.pcr_time_cost;
    }
    cost
}

/// Cheapest solution found for each fragment count. A solution is only
/// kept if it is cheaper than every solution with fewer fragments.
#[derive(Debug)]
pub struct Frontier {
    best: BTreeMap<usize, Solution>,
    min_cost: f64,
}

impl Default for Frontier {
    fn default() -> Self {
        Self {
            best: BTreeMap::new(),
            min_cost: f64::INFINITY,
        }
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cost of the cheapest solution so far.
    pub fn min_cost(&self) -> f64 {
        self.min_cost
    }

    /// Records `solution` unless it is no cheaper than the best so far or
    /// has too many fragments. Solutions it dominates are evicted.
    pub fn offer(&mut self, solution: Solution, max_count: usize) -> bool {
        if solution.cost >= self.min_cost || solution.count > max_count {
            return false;
        }
        self.min_cost = solution.cost;
        self.best.retain(|count, existing| {
            let dominated = *count >= solution.count && existing.cost >= solution.cost;
            if dominated {
                log::debug!(
                    "evicting {count}-fragment solution (${:.2})",
                    existing.cost
                );
            }
            !dominated
        });
        log::debug!(
            "{}-fragment solution (${:.2})",
            solution.count,
            solution.cost
        );
        self.best.insert(solution.count, solution);
        true
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// Solutions in ascending fragment count.
    pub fn into_solutions(self) -> Vec<Solution> {
        self.best.into_values().collect()
    }
}

/// Fills assemblies in order of fragment count, then estimated cost, and
/// keeps the pareto frontier of the results. Within a bucket, once an
/// estimate exceeds the best realised cost the rest are skipped: filling
/// only adds cost. A tool failure aborts; other failures skip one assembly.
pub fn fill_assemblies(
    groups: &ParetoGroups,
    filler: &mut AssemblyFiller<'_>,
    params: &AssemblyParameters,
    cancel: &CancelToken,
) -> Result<Vec<Solution>, AssemblyError> {
    let mut frontier = Frontier::new();

    'buckets: for (count, bucket) in groups.iter() {
        for assembly in bucket {
            if cancel.is_cancelled() {
                log::warn!(
                    "filling cancelled at {count}-fragment assemblies, keeping {} solutions",
                    frontier.len()
                );
                break 'buckets;
            }
            if assembly.cost > frontier.min_cost() {
                break;
            }

            let frags = match filler.fill(assembly) {
                Ok(frags) => frags,
                Err(e) if e.is_tool_failure() => return Err(e),
                Err(e) => {
                    log::debug!("rejected {}: {e}", assembly.describe());
                    continue;
                }
            };
            frontier.offer(Solution::new(frags, params), params.fragments_max_count);
        }
    }

    log::info!(
        "{} solutions: {}",
        frontier.len(),
        frontier
            .best
            .values()
            .map(|s| format!("{} fragments ${:.2}", s.count, s.cost))
            .join(", ")
    );
    Ok(frontier.into_solutions())
}
