//! Machine-readable records describing an assembly plan.
//!
//! These are the stable output contract of the planner: everything a
//! downstream renderer needs (ordering, fragment types, sequences, primers
//! and costs) is carried here, so other formats can be derived from a
//! report without re-running the search.

use serde::{Deserialize, Serialize};

pub const REPORT_SCHEMA: &str = "gibson.assembly_report.v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrimerRecord {
    pub seq: String,
    /// `true` for the top-strand (forward) primer.
    pub strand: bool,
    pub penalty: f64,
    #[serde(rename = "pairPenalty")]
    pub pair_penalty: f64,
    pub tm: f64,
    pub gc: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FragmentRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub cost: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seq: String,
    #[serde(rename = "pcrSeq", default, skip_serializing_if = "String::is_empty")]
    pub pcr_seq: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primers: Vec<PrimerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolutionRecord {
    pub count: usize,
    pub cost: f64,
    pub fragments: Vec<FragmentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssemblyReport {
    pub schema: String,
    pub target: String,
    pub seq: String,
    /// Wall clock time the report was written, as unix seconds.
    pub time: u64,
    /// Seconds spent planning.
    pub execution: f64,
    pub solutions: Vec<SolutionRecord>,
}

impl AssemblyReport {
    pub fn new(target: &str, seq: &str, time: u64, execution: f64) -> Self {
        Self {
            schema: REPORT_SCHEMA.to_string(),
            target: target.to_string(),
            seq: seq.to_string(),
            time,
            execution,
            solutions: vec![],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
