// Process execution for resolved command steps.
//
// The pipeline only needs a yes/no answer per step; stdout/stderr are
// captured for the run record and never inspected.

use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;

use crate::environment::Environment;
use crate::pipeline::CommandStep;

/// Captured result of running one command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// Prefers stderr, falls back to stdout if stderr is empty.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Runs one fully resolved command step.
pub trait StepExecutor {
    fn execute(&self, step: &CommandStep) -> CommandOutput;
}

impl<T: StepExecutor + ?Sized> StepExecutor for &T {
    fn execute(&self, step: &CommandStep) -> CommandOutput {
        (**self).execute(step)
    }
}

/// Executes steps through the platform shell (`cmd /C` on Windows, `sh -c` elsewhere).
///
/// Multi-line commands run as one script, so a leading `cd` applies to the
/// lines after it.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    current_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every step from `dir` (normally the build workspace).
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Export the build environment to child processes.
    pub fn with_env(mut self, env: &Environment) -> Self {
        self.env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    fn command_for(&self, script: &str) -> Command {
        // cmd.exe does its own parsing, so the line goes through unquoted.
        // `/S` strips exactly the outer quote pair and keeps inner quotes.
        #[cfg(windows)]
        let mut cmd = {
            use std::os::windows::process::CommandExt;

            let joined = script.replace('\n', " & ");
            let mut cmd = Command::new("cmd");
            cmd.args(["/S", "/C"]).raw_arg(format!("\"{}\"", joined));
            cmd
        };

        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", script]);
            cmd
        };

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd
    }
}

impl StepExecutor for ShellExecutor {
    fn execute(&self, step: &CommandStep) -> CommandOutput {
        match self.command_for(step.command()).output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::failed(-1, format!("Command error: {}", e)),
        }
    }
}


#[cfg(all(test, windows))]
mod windows_tests {
    use super::*;

    #[test]
    fn quoted_arguments_reach_the_command_intact() {
        let output =
            ShellExecutor::new().execute(&CommandStep::new("find", r#"echo "a b" | FIND "a b""#));
        assert!(output.success, "stderr: {}", output.stderr);
        assert!(output.stdout.contains("a b"));
    }

    #[test]
    fn multi_line_scripts_run_each_line() {
        let output = ShellExecutor::new().execute(&CommandStep::new("two", "echo one\necho two"));
        assert!(output.success);
        assert!(output.stdout.contains("one"));
        assert!(output.stdout.contains("two"));
    }
}
