//! External command execution with consistent error handling.

use std::process::{Command, Output};

use crate::error::{Error, Result};

/// Run a command and return trimmed stdout on success.
///
/// A non-zero exit is an error carrying stderr (or stdout when stderr is empty).
pub fn run(program: &str, args: &[&str], context: &str) -> Result<String> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        Error::internal_io(
            format!("Failed to run {}: {}", context, e),
            Some(context.to_string()),
        )
    })?;

    if !output.status.success() {
        return Err(Error::internal_io(
            format!("{} failed: {}", context, error_text(&output)),
            Some(context.to_string()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Extract error text from command output, preferring stderr.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_trimmed_stdout() {
        assert_eq!(run("echo", &["r1234"], "echo test").unwrap(), "r1234");
    }

    #[test]
    fn run_fails_for_missing_program() {
        let err = run("nonexistent_command_xyz", &[], "svn list").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
        assert!(err.message.contains("svn list"));
    }

    #[test]
    fn error_text_prefers_stderr() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"listing".to_vec(),
            stderr: b"svn: E170013: Unable to connect".to_vec(),
        };
        assert_eq!(error_text(&output), "svn: E170013: Unable to connect");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"listing".to_vec(),
            stderr: Vec::new(),
        };
        assert_eq!(error_text(&output), "listing");
    }
}
