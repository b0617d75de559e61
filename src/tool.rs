use crate::error::ToolError;
use std::{
    io::ErrorKind,
    process::{Command, Output},
};

/// Executable named by the environment variable `env`, or `default`.
pub fn tool_executable(env: &str, default: &str) -> String {
    std::env::var(env)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Runs `executable` to completion; a non-zero exit status is an error.
pub fn run_tool(executable: &str, args: &[String]) -> Result<Output, ToolError> {
    let output = Command::new(executable).args(args).output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ToolError::NotFound {
                executable: executable.to_string(),
            }
        } else {
            ToolError::Io {
                message: format!(
                    "Could not run '{}' with args [{}]: {}",
                    executable,
                    args.join(" "),
                    e
                ),
            }
        }
    })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            executable: executable.to_string(),
            args: args.to_vec(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(output)
}

/// Parses the single float a tool printed, as ntthal does with `-r`.
pub fn parse_float_output(executable: &str, output: &Output) -> Result<f64, ToolError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .trim()
        .parse::<f64>()
        .map_err(|_| ToolError::Unparseable {
            executable: executable.to_string(),
            output: stdout.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable() {
        let err = run_tool("gibson-planner-no-such-tool", &[]).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[test]
    fn test_default_executable() {
        assert_eq!(
            tool_executable("GIBSON_TEST_UNSET_TOOL_VARIABLE", "ntthal"),
            "ntthal"
        );
    }
}
