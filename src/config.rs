use crate::error::AssemblyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price of synthesizing DNA up to a tier's length bound. Either a fixed
/// price for the whole piece or a per-bp price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthCost {
    pub fixed: bool,
    pub cost: f64,
}

impl SynthCost {
    pub const fn fixed(cost: f64) -> Self {
        Self { fixed: true, cost }
    }
}

/// Cost used for synthesis requests no tier can serve.
pub const UNSYNTHESIZABLE_COST: f64 = i32::MAX as f64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AssemblyParameters {
    /// Upper bound on fragments (including synthetic ones) in an assembly.
    pub fragments_max_count: usize,
    #[serde(rename = "fragments-min-junction-length")]
    pub min_homology: usize,
    #[serde(rename = "fragments-max-junction-length")]
    pub max_homology: usize,
    /// Celsius.
    #[serde(rename = "fragments-max-junction-hairpin")]
    pub max_hairpin_melt: f64,

    pub pcr_bp_cost: f64,
    pub pcr_rxn_cost: f64,
    pub pcr_time_cost: f64,
    pub pcr_min_length: usize,
    #[serde(rename = "pcr-primer-max-pair-penalty")]
    pub pcr_max_penalty: f64,
    #[serde(rename = "pcr-primer-max-embed-length")]
    pub pcr_max_embed_length: i64,
    #[serde(rename = "pcr-primer-max-ectopic-tm")]
    pub pcr_max_offtarget_tm: f64,
    #[serde(rename = "pcr-buffer-length")]
    pub pcr_buffer_length: usize,

    #[serde(rename = "gibson-assembly-cost")]
    pub gibson_cost: f64,
    #[serde(rename = "gibson-assembly-time-cost")]
    pub gibson_time_cost: f64,

    pub synthetic_min_length: usize,
    pub synthetic_max_length: usize,
    pub synthetic_fragment_cost: BTreeMap<usize, SynthCost>,

    /// Procurement price per fragment, keyed by a substring of the source
    /// database name.
    pub procurement_costs: BTreeMap<String, f64>,
}

impl Default for AssemblyParameters {
    fn default() -> Self {
        let synthetic_fragment_cost = [
            (500, 89.0),
            (750, 129.0),
            (1000, 149.0),
            (1250, 209.0),
            (1500, 249.0),
            (1750, 289.0),
            (2000, 329.0),
            (2250, 399.0),
            (2500, 449.0),
            (2750, 499.0),
            (3000, 549.0),
        ]
        .into_iter()
        .map(|(len, cost)| (len, SynthCost::fixed(cost)))
        .collect();

        let procurement_costs = [("addgene", 65.0), ("igem", 0.0), ("dnasu", 55.0)]
            .into_iter()
            .map(|(db, cost)| (db.to_string(), cost))
            .collect();

        Self {
            fragments_max_count: 6,
            min_homology: 15,
            max_homology: 120,
            max_hairpin_melt: 47.0,
            pcr_bp_cost: 0.6,
            pcr_rxn_cost: 27.84,
            pcr_time_cost: 0.0,
            pcr_min_length: 60,
            pcr_max_penalty: 30.0,
            pcr_max_embed_length: 20,
            pcr_max_offtarget_tm: 55.0,
            pcr_buffer_length: 20,
            gibson_cost: 12.98,
            gibson_time_cost: 0.0,
            synthetic_min_length: 125,
            synthetic_max_length: 3000,
            synthetic_fragment_cost,
            procurement_costs,
        }
    }
}

impl AssemblyParameters {
    pub fn load_from_path(path: &str) -> Result<Self, AssemblyError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AssemblyError::InvalidInput(format!("Could not read settings file '{path}': {e}"))
        })?;
        let params: Self = serde_json::from_str(&text).map_err(|e| {
            AssemblyError::InvalidInput(format!("Could not parse settings JSON '{path}': {e}"))
        })?;
        params.validate()?;
        Ok(params)
    }

    pub fn save_to_path(&self, path: &str) -> Result<(), AssemblyError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AssemblyError> {
        let fail = |message: &str| Err(AssemblyError::InvalidInput(message.to_string()));
        if self.fragments_max_count == 0 {
            return fail("fragments-max-count must be at least 1");
        }
        if self.min_homology == 0 || self.min_homology > self.max_homology {
            return fail("fragments-min-junction-length must be in 1..=fragments-max-junction-length");
        }
        if self.synthetic_max_length == 0 {
            return fail("synthetic-max-length must be positive");
        }
        if self.synthetic_min_length > self.synthetic_max_length {
            return fail("synthetic-min-length exceeds synthetic-max-length");
        }
        if self.synthetic_fragment_cost.is_empty() {
            return fail("synthetic-fragment-cost needs at least one tier");
        }
        let costs = [
            self.pcr_bp_cost,
            self.pcr_rxn_cost,
            self.pcr_time_cost,
            self.gibson_cost,
            self.gibson_time_cost,
        ];
        if costs.iter().any(|c| *c < 0.0)
            || self.synthetic_fragment_cost.values().any(|c| c.cost < 0.0)
            || self.procurement_costs.values().any(|c| *c < 0.0)
        {
            return fail("costs must not be negative");
        }
        Ok(())
    }

    /// Cost of synthesizing a linear stretch of `length` bp, split into equal
    /// pieces when it exceeds the maximum synthesis length.
    pub fn synth_fragment_cost(&self, length: usize) -> f64 {
        let length = length.max(1);
        let pieces = length.div_ceil(self.synthetic_max_length.max(1));
        let piece_length = length / pieces;

        let tier = self.synth_tier(piece_length);
        if tier.fixed {
            pieces as f64 * tier.cost
        } else {
            pieces as f64 * piece_length as f64 * tier.cost
        }
    }

    /// Smallest tier whose length bound covers `length`.
    fn synth_tier(&self, length: usize) -> SynthCost {
        self.synthetic_fragment_cost
            .range(length..)
            .next()
            .map(|(_, cost)| *cost)
            .unwrap_or(SynthCost::fixed(UNSYNTHESIZABLE_COST))
    }

    /// Procurement price of an entry from `database`; unknown databases are free.
    pub fn procurement_cost(&self, database: &str) -> f64 {
        let database = database.to_ascii_lowercase();
        self.procurement_costs
            .iter()
            .find(|(key, _)| database.contains(&key.to_ascii_lowercase()))
            .map(|(_, cost)| *cost)
            .unwrap_or(0.0)
    }

    /// Estimated cost of a primer pair of 25bp primers with no added homology.
    pub fn pcr_no_homology_cost(&self) -> f64 {
        50.0 * self.pcr_bp_cost
    }

    /// Estimated cost of a primer pair that also adds `min_homology` bp.
    pub fn pcr_homology_cost(&self) -> f64 {
        (50.0 + self.min_homology as f64) * self.pcr_bp_cost
    }
}
