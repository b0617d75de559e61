use crate::{
    error::ToolError,
    tool::{parse_float_output, run_tool, tool_executable},
};

const DEFAULT_NTTHAL_BIN: &str = "ntthal";
pub const NTTHAL_ENV_BIN: &str = "GIBSON_NTTHAL_BIN";
pub const PRIMER3_ENV_CONFIG: &str = "GIBSON_PRIMER3_CONFIG";

/// Longest sequence ntthal accepts.
const MAX_NTTHAL_LENGTH: usize = 60;

/// Gibson assembly runs at 50°C.
const ASSEMBLY_TEMPERATURE: &str = "50";

/// Melting temperature of the strongest hairpin in a sequence, in °C.
pub trait HairpinOracle {
    fn melting_temp(&self, seq: &str) -> Result<f64, ToolError>;
}

/// Hairpin melting temperatures from primer3's `ntthal`.
#[derive(Debug, Clone)]
pub struct NtthalOracle {
    executable: String,
    config_dir: Option<String>,
}

impl Default for NtthalOracle {
    fn default() -> Self {
        Self {
            executable: tool_executable(NTTHAL_ENV_BIN, DEFAULT_NTTHAL_BIN),
            config_dir: std::env::var(PRIMER3_ENV_CONFIG)
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

impl NtthalOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
            ..Self::default()
        }
    }

    fn args(&self, seq: &str) -> Vec<String> {
        let mut args: Vec<String> = ["-a", "HAIRPIN", "-r", "-t", ASSEMBLY_TEMPERATURE, "-s1", seq]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(dir) = &self.config_dir {
            args.push("-path".to_string());
            args.push(dir.clone());
        }
        args
    }
}

impl HairpinOracle for NtthalOracle {
    fn melting_temp(&self, seq: &str) -> Result<f64, ToolError> {
        windowed_melting_temp(seq, |window| {
            let output = run_tool(&self.executable, &self.args(window))?;
            parse_float_output(&self.executable, &output)
        })
    }
}

/// Applies `melt` to `seq`, or to its first and last 60bp when it is longer
/// than ntthal accepts, returning the higher of the two.
pub fn windowed_melting_temp<F>(seq: &str, melt: F) -> Result<f64, ToolError>
where
    F: Fn(&str) -> Result<f64, ToolError>,
{
    if seq.len() <= MAX_NTTHAL_LENGTH {
        return melt(seq);
    }
    let head = melt(&seq[..MAX_NTTHAL_LENGTH])?;
    let tail = melt(&seq[seq.len() - MAX_NTTHAL_LENGTH..])?;
    Ok(head.max(tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_short_sequence_is_one_window() {
        let seen = RefCell::new(vec![]);
        let tm = windowed_melting_temp("ACGT", |s| {
            seen.borrow_mut().push(s.to_string());
            Ok(12.5)
        })
        .unwrap();
        assert_eq!(tm, 12.5);
        assert_eq!(seen.into_inner(), vec!["ACGT".to_string()]);
    }

    #[test]
    fn test_long_sequence_takes_max_of_ends() {
        let seq = format!("{}{}{}", "A".repeat(60), "T".repeat(20), "G".repeat(60));
        let seen = RefCell::new(vec![]);
        let tm = windowed_melting_temp(&seq, |s| {
            seen.borrow_mut().push(s.to_string());
            Ok(if s.starts_with('G') { 51.0 } else { 20.0 })
        })
        .unwrap();
        assert_eq!(tm, 51.0);
        let seen = seen.into_inner();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], "A".repeat(60));
        assert_eq!(seen[1], "G".repeat(60));
    }

    #[test]
    fn test_args() {
        let oracle = NtthalOracle {
            executable: "ntthal".to_string(),
            config_dir: Some("/opt/primer3_config/".to_string()),
        };
        assert_eq!(
            oracle.args("ACGT").join(" "),
            "-a HAIRPIN -r -t 50 -s1 ACGT -path /opt/primer3_config/"
        );
    }

    #[test]
    fn test_missing_ntthal_is_a_tool_failure() {
        let oracle = NtthalOracle::with_executable("gibson-planner-no-such-ntthal");
        assert!(matches!(
            oracle.melting_temp("ACGTACGT"),
            Err(ToolError::NotFound { .. })
        ));
    }
}
