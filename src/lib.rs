pub mod about;
pub mod assembly;
pub mod cancel;
pub mod config;
pub mod dna_sequence;
pub mod engine;
pub mod error;
pub mod features;
pub mod fill;
pub mod frag;
pub mod hairpin;
pub mod matcher;
pub mod output;
pub mod pareto;
pub mod primers;
pub mod solution;
pub mod tool;

#[cfg(test)]
pub(crate) mod test_support;
