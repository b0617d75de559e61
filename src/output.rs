use crate::{
    config::AssemblyParameters,
    engine::Plan,
    error::AssemblyError,
    frag::Frag,
    primers::Primer,
    solution::Solution,
};
use gibson_protocol::{AssemblyReport, FragmentRecord, PrimerRecord, SolutionRecord};
use std::{
    collections::HashSet,
    time::{SystemTime, UNIX_EPOCH},
};

/// Rounds a dollar amount to cents.
pub fn round_cost(cost: f64) -> f64 {
    (cost * 100.0).round() / 100.0
}

fn primer_record(primer: &Primer) -> PrimerRecord {
    PrimerRecord {
        seq: primer.seq.clone(),
        strand: primer.strand,
        penalty: primer.penalty,
        pair_penalty: primer.pair_penalty,
        tm: primer.tm,
        gc: primer.gc,
    }
}

fn fragment_record(f: &Frag, procure: bool, params: &AssemblyParameters) -> FragmentRecord {
    FragmentRecord {
        id: f.id.clone(),
        kind: f.kind.as_str().to_string(),
        cost: round_cost(f.cost(procure, params)),
        url: f.url.clone(),
        seq: f.seq.clone(),
        pcr_seq: f.pcr_seq.clone(),
        primers: f.primers.iter().map(primer_record).collect(),
    }
}

fn solution_record(solution: &Solution, params: &AssemblyParameters) -> SolutionRecord {
    let mut procured = HashSet::new();
    SolutionRecord {
        count: solution.count,
        cost: round_cost(solution.cost),
        fragments: solution
            .fragments
            .iter()
            .map(|f| fragment_record(f, procured.insert(f.id.as_str()), params))
            .collect(),
    }
}

/// The machine-readable report of `plan`.
pub fn report(plan: &Plan, params: &AssemblyParameters) -> AssemblyReport {
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut report = AssemblyReport::new(&plan.target, &plan.seq, time, plan.elapsed.as_secs_f64());
    report.solutions = plan
        .solutions
        .iter()
        .map(|s| solution_record(s, params))
        .collect();
    report
}

pub fn write_report(plan: &Plan, params: &AssemblyParameters, path: &str) -> Result<(), AssemblyError> {
    let text = report(plan, params).to_json()?;
    std::fs::write(path, text)?;
    Ok(())
}
