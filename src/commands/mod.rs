use std::io::Read;
use std::path::Path;

use buildstep::environment::{self, Environment};

pub type CmdResult<T> = buildstep::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

// ============================================================================
// JSON Input Parsing (CLI layer)
// ============================================================================

/// Read JSON spec from string, file (@path), or stdin (-).
fn read_json_spec_to_string(spec: &str) -> buildstep::Result<String> {
    use std::io::IsTerminal;

    if spec.trim() == "-" {
        let mut buf = String::new();
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(buildstep::Error::validation_invalid_argument(
                "json",
                "Cannot read JSON from stdin when stdin is a TTY",
                None,
                None,
            ));
        }
        stdin.read_to_string(&mut buf).map_err(|e| {
            buildstep::Error::internal_io(e.to_string(), Some("read stdin".to_string()))
        })?;
        return Ok(buf);
    }

    if let Some(path) = spec.strip_prefix('@') {
        if path.trim().is_empty() {
            return Err(buildstep::Error::validation_invalid_argument(
                "json",
                "Invalid JSON spec '@' (missing file path)",
                None,
                None,
            ));
        }
        return std::fs::read_to_string(Path::new(path)).map_err(|e| {
            buildstep::Error::internal_io(e.to_string(), Some(format!("read {}", path)))
        });
    }

    Ok(spec.to_string())
}

/// Resolve a `--json` argument to its raw text.
pub(crate) fn json_spec(spec: &str) -> buildstep::Result<String> {
    let raw = read_json_spec_to_string(spec)?;
    buildstep::utils::validation::require_non_empty(&raw, "json", "JSON spec is empty")?;
    Ok(raw)
}

/// Build environment: process variables, then `--env-file`, then `--env K=V` flags.
/// Later layers win.
pub(crate) fn build_environment(
    env_file: Option<&Path>,
    assignments: &[String],
) -> buildstep::Result<Environment> {
    let mut env = Environment::from_process();

    if let Some(path) = env_file {
        env.extend(Environment::load_file(path)?);
    }

    for raw in assignments {
        let (key, value) = environment::parse_assignment(raw)?;
        env.insert(key, value);
    }

    Ok(env)
}

pub mod config;
pub mod param;
pub mod step;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (buildstep::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Step(args) => dispatch!(args, global, step),
        crate::Commands::Param(args) => dispatch!(args, global, param),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
