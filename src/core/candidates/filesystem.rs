//! Subdirectory names under a staging directory.

use std::fs;
use std::path::PathBuf;

use super::{CandidateSource, MaxCount};
use crate::error::{Error, Result};

const SOURCE: &str = "filesystem";

pub struct DirectorySource {
    pub root: PathBuf,
    pub max: MaxCount,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, max: MaxCount) -> Self {
        Self {
            root: root.into(),
            max,
        }
    }
}

impl CandidateSource for DirectorySource {
    fn kind(&self) -> &'static str {
        SOURCE
    }

    /// Directory names in lexicographic order. The limit is checked before
    /// each entry against the count already taken, so up to `max + 1` names
    /// are returned.
    fn fetch(&self) -> Result<Vec<String>> {
        let location = self.root.display().to_string();

        if !self.root.is_dir() {
            return Err(Error::source_unreachable(
                SOURCE,
                &location,
                "Invalid staging path or no access",
            ));
        }

        let mut entries: Vec<(String, bool)> = fs::read_dir(&self.root)
            .map_err(|e| Error::source_unreachable(SOURCE, &location, e.to_string()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                (name, entry.path().is_dir())
            })
            .collect();

        if entries.is_empty() {
            return Err(Error::source_malformed(
                SOURCE,
                &location,
                "No subdirectories found at given path",
            ));
        }

        entries.sort();

        let mut names = Vec::new();
        for (name, is_dir) in entries {
            if self.max.exceeded(names.len()) {
                break;
            }
            if is_dir {
                names.push(name);
            }
        }

        if names.is_empty() {
            return Err(Error::source_malformed(
                SOURCE,
                &location,
                "No subdirectories found at given path",
            ));
        }

        log_status!("refresh", "{} directories under {}", names.len(), location);
        Ok(names)
    }
}
