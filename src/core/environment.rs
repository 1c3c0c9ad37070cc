//! Build environment variables and `$VAR` / `${VAR}` expansion.
//!
//! An [`Environment`] is captured once per build-step invocation and is
//! read-only afterwards. Lookups are case-insensitive, the way CI hosts
//! treat build variables, and unknown references are left untouched so
//! callers can see exactly what was not defined.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Variable holding the build's workspace directory.
pub const WORKSPACE: &str = "WORKSPACE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Load variables from a JSON object file (`{"NAME": "value", ...}`).
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::environment_unavailable(format!("read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::environment_unavailable(format!("parse {}: {}", path.display(), e))
        })
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Some(existing) = self.matching_key(&key) {
            self.vars.remove(&existing);
        }
        self.vars.insert(key, value.into());
    }

    /// Overlay `other` on top of this environment.
    pub fn extend(&mut self, other: Environment) {
        for (key, value) in other.vars {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.vars.get(key) {
            return Some(value.as_str());
        }
        self.vars
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn workspace(&self) -> Option<&str> {
        self.get(WORKSPACE).filter(|w| !w.is_empty())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace `$NAME` and `${NAME}` references with their values.
    ///
    /// References to undefined variables are passed through unchanged.
    pub fn expand(&self, input: &str) -> String {
        shellexpand::env_with_context_no_errors(input, |name| self.get(name)).into_owned()
    }

    fn matching_key(&self, key: &str) -> Option<String> {
        self.vars
            .keys()
            .find(|k| k.eq_ignore_ascii_case(key))
            .cloned()
    }
}

/// Parse a `NAME=value` assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::validation_invalid_argument(
            "env",
            format!("Expected NAME=value, got '{}'", raw),
            None,
            None,
        )),
    }
}
