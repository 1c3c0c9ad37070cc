//! Branch paths from a version-control tree.

use super::{most_recent_first, CandidateSource, MaxCount};
use crate::error::{Error, Result};
use crate::utils::command;

const SOURCE: &str = "vcs";

/// Lists the immediate subdirectories of a repository location at its latest revision.
pub trait DirectoryLister {
    fn list_dirs(&self, location: &str) -> Result<Vec<String>>;
}

/// `svn list` against HEAD.
#[derive(Debug, Clone, Default)]
pub struct SvnLister {
    username: Option<String>,
    password: Option<String>,
}

impl SvnLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    fn args<'a>(&'a self, location: &'a str) -> Vec<&'a str> {
        let mut args = vec!["list", "--non-interactive", "--no-auth-cache", "-r", "HEAD"];
        if let Some(username) = &self.username {
            args.extend(["--username", username.as_str()]);
        }
        if let Some(password) = &self.password {
            args.extend(["--password", password.as_str()]);
        }
        args.push(location);
        args
    }
}

impl DirectoryLister for SvnLister {
    fn list_dirs(&self, location: &str) -> Result<Vec<String>> {
        let stdout = command::run("svn", &self.args(location), "svn list").map_err(|e| {
            let detail = e.details["error"].as_str().unwrap_or(&e.message).to_string();
            Error::source_unreachable(SOURCE, location, detail)
        })?;
        Ok(parse_listing(&stdout))
    }
}

/// Directory names from `svn list` output (entries ending in `/`).
pub fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_suffix('/'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalise a comma separated subdirectory list. Empty input falls back to `default`.
pub fn parse_subdirectories(raw: &str, default: &str) -> Vec<String> {
    let subdirs: Vec<String> = raw
        .replace('\\', "/")
        .split(',')
        .map(|s| s.trim().trim_matches('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if subdirs.is_empty() {
        vec![default.to_string()]
    } else {
        subdirs
    }
}

pub struct BranchSource {
    pub url: String,
    pub subdirectories: Vec<String>,
    pub implicit_branch: String,
    pub max: MaxCount,
    lister: Box<dyn DirectoryLister>,
}

impl BranchSource {
    pub fn new(
        url: impl Into<String>,
        subdirectories: Vec<String>,
        implicit_branch: impl Into<String>,
        max: MaxCount,
        lister: Box<dyn DirectoryLister>,
    ) -> Self {
        Self {
            url: url.into(),
            subdirectories,
            implicit_branch: implicit_branch.into(),
            max,
            lister,
        }
    }
}

impl CandidateSource for BranchSource {
    fn kind(&self) -> &'static str {
        SOURCE
    }

    /// Entries are discovered per subdirectory in name order, with the
    /// implicit branch discovered last so it is always the first one kept.
    /// The kept entries are returned sorted.
    fn fetch(&self) -> Result<Vec<String>> {
        let base = self.url.trim_end_matches('/');
        let mut discovered = Vec::new();

        for subdir in &self.subdirectories {
            let mut names = self.lister.list_dirs(&format!("{}/{}", base, subdir))?;
            names.sort();
            discovered.extend(names.into_iter().map(|name| format!("{}/{}", subdir, name)));
        }
        discovered.push(self.implicit_branch.clone());

        log_status!("refresh", "{} branches under {}", discovered.len(), base);

        let mut kept = most_recent_first(discovered, self.max);
        kept.sort();
        kept.dedup();
        Ok(kept)
    }
}
