use std::error::Error;
use std::fmt;

/// Failure of an external program (matcher, primer designer, hairpin oracle).
///
/// These signal a broken environment rather than an infeasible design, so
/// they are never retried and abort the planning run.
#[derive(Debug, Clone)]
pub enum ToolError {
    NotFound {
        executable: String,
    },
    Failed {
        executable: String,
        args: Vec<String>,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    Unparseable {
        executable: String,
        output: String,
    },
    Io {
        message: String,
    },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { executable } => {
                write!(f, "Could not find executable '{executable}'")
            }
            Self::Failed {
                executable,
                args,
                status,
                stdout,
                stderr,
            } => write!(
                f,
                "{} {} failed (status={:?}, stdout='{}', stderr='{}')",
                executable,
                args.join(" "),
                status,
                stdout.trim(),
                stderr.trim()
            ),
            Self::Unparseable { executable, output } => {
                write!(f, "Could not parse output of '{executable}': '{}'", output.trim())
            }
            Self::Io { message } => write!(f, "{message}"),
        }
    }
}

impl Error for ToolError {}

/// Reasons a primer pair could not be made for one fragment.
#[derive(Debug, Clone)]
pub enum PrimerError {
    PenaltyTooHigh { pair_penalty: f64, max: f64 },
    OffTargetMismatch { primer: String, site: String },
    ProductTooShort { id: String, length: usize, min: usize },
    NoPrimers { id: String, reason: String },
    ToolFailure(ToolError),
}

impl PrimerError {
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::ToolFailure(_))
    }
}

impl fmt::Display for PrimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PenaltyTooHigh { pair_penalty, max } => write!(
                f,
                "primer pair penalty {pair_penalty:.2} exceeds the maximum of {max:.2}"
            ),
            Self::OffTargetMismatch { primer, site } => {
                write!(f, "primer {primer} has an off-target binding site {site}")
            }
            Self::ProductTooShort { id, length, min } => {
                write!(f, "PCR product of {id} is {length}bp, needs at least {min}bp")
            }
            Self::NoPrimers { id, reason } => write!(f, "no primers for {id}: {reason}"),
            Self::ToolFailure(e) => write!(f, "{e}"),
        }
    }
}

impl Error for PrimerError {}

impl From<ToolError> for PrimerError {
    fn from(err: ToolError) -> Self {
        PrimerError::ToolFailure(err)
    }
}

#[derive(Debug)]
pub enum AssemblyError {
    /// An extension that cannot be made (too many fragments, too short a step).
    Construction(String),
    /// Two fragments that should not anneal share homology.
    Junction {
        left: String,
        right: String,
        junction: String,
    },
    Primer { id: String, source: PrimerError },
    Synthesis { message: String },
    ToolFailure(ToolError),
    NoSolution { target: String },
    InvalidInput(String),
    Io(std::io::Error),
    Serde(serde_json::Error),
}

impl AssemblyError {
    /// Whether this error rejects a single candidate only (search continues).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Construction(_)
                | Self::Junction { .. }
                | Self::Synthesis { .. }
                | Self::Primer { .. }
        ) && !self.is_tool_failure()
    }

    pub fn is_tool_failure(&self) -> bool {
        match self {
            Self::ToolFailure(_) => true,
            Self::Primer { source, .. } => source.is_tool_failure(),
            _ => false,
        }
    }
}

impl Error for AssemblyError {}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction(message) => write!(f, "cannot extend assembly: {message}"),
            Self::Junction {
                left,
                right,
                junction,
            } => write!(f, "duplicate junction between {left} and {right}: {junction}"),
            Self::Primer { id, source } => write!(f, "failed to PCR {id}: {source}"),
            Self::Synthesis { message } => write!(f, "synthesis failed: {message}"),
            Self::ToolFailure(e) => write!(f, "external tool failure: {e}"),
            Self::NoSolution { target } => {
                write!(f, "no feasible combination of fragments builds {target}")
            }
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Io(e) => write!(f, "{e}"),
            Self::Serde(e) => write!(f, "{e}"),
        }
    }
}

impl From<ToolError> for AssemblyError {
    fn from(err: ToolError) -> Self {
        AssemblyError::ToolFailure(err)
    }
}

impl From<std::io::Error> for AssemblyError {
    fn from(err: std::io::Error) -> Self {
        AssemblyError::Io(err)
    }
}

impl From<serde_json::Error> for AssemblyError {
    fn from(err: serde_json::Error) -> Self {
        AssemblyError::Serde(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primer_tool_failure_is_not_a_rejection() {
        let err = AssemblyError::Primer {
            id: "p1".to_string(),
            source: PrimerError::ToolFailure(ToolError::NotFound {
                executable: "primer3_core".to_string(),
            }),
        };
        assert!(err.is_tool_failure());
        assert!(!err.is_rejection());

        let err = AssemblyError::Primer {
            id: "p1".to_string(),
            source: PrimerError::PenaltyTooHigh {
                pair_penalty: 40.0,
                max: 30.0,
            },
        };
        assert!(err.is_rejection());
        assert!(err.to_string().contains("p1"));
    }

    #[test]
    fn test_junction_message() {
        let err = AssemblyError::Junction {
            left: "a".to_string(),
            right: "c".to_string(),
            junction: "ATGCATGCATGC".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate junction between a and c: ATGCATGCATGC"
        );
    }
}
