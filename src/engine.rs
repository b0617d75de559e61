use crate::{
    assembly::AssemblyBuilder,
    cancel::CancelToken,
    config::AssemblyParameters,
    dna_sequence::DNAsequence,
    error::AssemblyError,
    features::FeatureTarget,
    fill::AssemblyFiller,
    frag::{Frag, FragKey, FragKind, new_frags},
    hairpin::HairpinOracle,
    matcher::{Database, Matcher, cull},
    pareto::ParetoGroups,
    primers::{PrimerCache, PrimerDesigner},
    solution::{Solution, fill_assemblies},
};
use std::time::{Duration, Instant};

/// The outcome of one planning run: the pareto frontier of solutions over
/// (fragment count, cost), in ascending fragment count.
#[derive(Debug, Clone)]
pub struct Plan {
    pub target: String,
    /// The sequence that was built, including any backbone.
    pub seq: String,
    pub solutions: Vec<Solution>,
    pub elapsed: Duration,
}

pub trait Planner {
    fn plan(
        &self,
        target: &DNAsequence,
        databases: &[Database],
        backbone: Option<&DNAsequence>,
    ) -> Result<Plan, AssemblyError>;
}

/// Plans Gibson Assemblies against the given matcher, primer designer and
/// hairpin oracle.
pub struct GibsonEngine<'a> {
    params: AssemblyParameters,
    matcher: &'a dyn Matcher,
    designer: &'a dyn PrimerDesigner,
    oracle: &'a dyn HairpinOracle,
    cancel: CancelToken,
}

impl<'a> GibsonEngine<'a> {
    pub fn new(
        params: AssemblyParameters,
        matcher: &'a dyn Matcher,
        designer: &'a dyn PrimerDesigner,
        oracle: &'a dyn HairpinOracle,
    ) -> Result<Self, AssemblyError> {
        params.validate()?;
        Ok(Self {
            params,
            matcher,
            designer,
            oracle,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn params(&self) -> &AssemblyParameters {
        &self.params
    }

    /// Plans from fragments already positioned on `target`. Fragments must
    /// be keyed for the target's length and include their copies one
    /// revolution on, so that paths can close.
    pub fn plan_frags(&self, target: &DNAsequence, frags: Vec<Frag>) -> Result<Plan, AssemblyError> {
        self.solve(target, frags, None)
    }

    /// Plans a ring of features laid back to back, built from database
    /// entries that hold runs of consecutive features.
    pub fn plan_features(
        &self,
        target: &FeatureTarget,
        databases: &[Database],
    ) -> Result<Plan, AssemblyError> {
        let started = Instant::now();
        if target.is_empty() {
            return Err(AssemblyError::InvalidInput(format!(
                "'{}' has no features",
                target.name()
            )));
        }
        log::info!(
            "planning {} from {} features ({}bp)",
            target.name(),
            target.len(),
            target.seq().len()
        );

        let frags = target.frags(databases, &self.params);
        let mut plan = self.solve(&target.to_sequence(), frags, Some(target.len()))?;
        plan.elapsed = started.elapsed();
        log::info!(
            "{} solutions for {} in {:.2}s",
            plan.solutions.len(),
            plan.target,
            plan.elapsed.as_secs_f64()
        );
        Ok(plan)
    }

    fn solve(
        &self,
        target: &DNAsequence,
        frags: Vec<Frag>,
        feature_count: Option<usize>,
    ) -> Result<Plan, AssemblyError> {
        let started = Instant::now();
        let seq = target.forward();
        if seq.is_empty() {
            return Err(AssemblyError::InvalidInput(format!(
                "target '{}' has no sequence",
                target.name()
            )));
        }

        let mut builder = AssemblyBuilder::new(seq.len(), 2 * seq.len(), &self.params, &self.cancel);
        if let Some(count) = feature_count {
            builder = builder.with_features(count);
        }
        let assemblies = builder.build(&frags);
        let groups = ParetoGroups::new(assemblies);
        log::info!(
            "{} closed assemblies over counts {:?}",
            groups.len(),
            groups.counts
        );

        let mut cache = PrimerCache::new();
        let mut filler = AssemblyFiller::new(seq, &self.params, self.designer, self.oracle, &mut cache);
        let solutions = fill_assemblies(&groups, &mut filler, &self.params, &self.cancel)?;
        log::debug!("primer cache: {} entries, {} hits", cache.len(), cache.hits());

        if solutions.is_empty() {
            return Err(AssemblyError::NoSolution {
                target: target.name().to_string(),
            });
        }
        Ok(Plan {
            target: target.name().to_string(),
            seq: seq.to_string(),
            solutions,
            elapsed: started.elapsed(),
        })
    }
}

impl Planner for GibsonEngine<'_> {
    fn plan(
        &self,
        target: &DNAsequence,
        databases: &[Database],
        backbone: Option<&DNAsequence>,
    ) -> Result<Plan, AssemblyError> {
        let started = Instant::now();
        let insert_length = target.len();
        let mut target = target.clone();
        if let Some(backbone) = backbone {
            target.append(backbone);
        }
        let seq = target.forward().to_string();
        if seq.is_empty() {
            return Err(AssemblyError::InvalidInput(format!(
                "target '{}' has no sequence",
                target.name()
            )));
        }
        log::info!("planning {} ({}bp)", target.name(), seq.len());

        // doubled, to find matches across the origin
        let query = seq.repeat(2);
        let matches = self
            .matcher
            .find(&query, databases, self.params.pcr_min_length)?;
        log::debug!("{} matches", matches.len());
        let matches = cull(matches, self.params.pcr_min_length, &self.params);
        log::debug!("{} matches after culling", matches.len());

        let mut frags = new_frags(&matches, seq.len(), &self.params);
        if let Some(backbone) = backbone {
            frags.extend(backbone_frags(backbone, insert_length, seq.len()));
        }
        log::debug!("{} fragments", frags.len());

        let mut plan = self.plan_frags(&target, frags)?;
        plan.elapsed = started.elapsed();
        log::info!(
            "{} solutions for {} in {:.2}s",
            plan.solutions.len(),
            plan.target,
            plan.elapsed.as_secs_f64()
        );
        Ok(plan)
    }
}

/// A linearized backbone placed after the insert, and its copy one
/// revolution on. Backbones are used as they are.
pub fn backbone_frags(backbone: &DNAsequence, insert_length: usize, target_length: usize) -> Vec<Frag> {
    let start = insert_length as i64;
    let end = start + backbone.len() as i64 - 1;
    let f = Frag {
        id: backbone.name().to_string(),
        key: FragKey::new(backbone.name(), start, target_length),
        seq: backbone.forward().to_string(),
        pcr_seq: String::new(),
        start,
        end,
        feature_start: start,
        feature_end: end,
        kind: FragKind::Linear,
        database: String::new(),
        url: String::new(),
        procurement_cost: 0.0,
        template: Some(backbone.forward().to_string()),
        primers: vec![],
    };
    let copy = f.shifted(target_length as i64);
    vec![f, copy]
}
