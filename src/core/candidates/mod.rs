//! Bounded candidate lists for selectable build parameters.
//!
//! A [`CandidateSource`] produces the ranked, truncated list for one kind of
//! external listing. The resulting [`CandidateSet`] is the only authority
//! for validating a later selection.

pub mod artifact;
pub mod filesystem;
pub mod vcs;

use serde::Serialize;

use crate::error::{Error, Result};

pub use artifact::{ArtifactIndexSource, HttpIndexFetcher, IndexFetcher, IndexRecord};
pub use filesystem::DirectorySource;
pub use vcs::{BranchSource, DirectoryLister, SvnLister};

/// Produces a fresh candidate list. Implementations fail rather than return
/// an empty list when the listing cannot be obtained.
pub trait CandidateSource {
    /// Short name used in errors and logs (`artifact`, `vcs`, `filesystem`).
    fn kind(&self) -> &'static str;

    fn fetch(&self) -> Result<Vec<String>>;
}

/// Configured upper bound on the number of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxCount {
    Unlimited,
    Limit(usize),
}

impl MaxCount {
    /// Unset, non-numeric, zero and negative values all mean "no limit".
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            Some(n) if n > 0 => MaxCount::Limit(n as usize),
            _ => MaxCount::Unlimited,
        }
    }

    /// True once `count` candidates have been taken and no more may follow.
    pub fn reached(&self, count: usize) -> bool {
        matches!(self, MaxCount::Limit(max) if count >= *max)
    }

    /// True once `count` strictly exceeds the limit.
    pub fn exceeded(&self, count: usize) -> bool {
        matches!(self, MaxCount::Limit(max) if count > *max)
    }
}

/// Reverse discovery order, stopping once `max` entries are taken.
pub fn most_recent_first(discovered: Vec<String>, max: MaxCount) -> Vec<String> {
    let mut taken = Vec::new();
    for entry in discovered.into_iter().rev() {
        if max.reached(taken.len()) {
            break;
        }
        taken.push(entry);
    }
    taken
}

/// Result of the last refresh, in presentation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateSet {
    values: Vec<String>,
}

impl CandidateSet {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Reject `value` unless it is a member of this set.
    pub fn validate(&self, parameter: &str, value: &str) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(Error::selection_invalid(parameter, value, self.values.clone()))
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_count_parsing() {
        assert_eq!(MaxCount::parse(Some("3")), MaxCount::Limit(3));
        assert_eq!(MaxCount::parse(Some(" 12 ")), MaxCount::Limit(12));
        assert_eq!(MaxCount::parse(Some("0")), MaxCount::Unlimited);
        assert_eq!(MaxCount::parse(Some("-4")), MaxCount::Unlimited);
        assert_eq!(MaxCount::parse(Some("ten")), MaxCount::Unlimited);
        assert_eq!(MaxCount::parse(Some("")), MaxCount::Unlimited);
        assert_eq!(MaxCount::parse(None), MaxCount::Unlimited);
    }

    #[test]
    fn most_recent_first_reverses_and_truncates() {
        let discovered = (1..=10).map(|i| format!("1.{}", i)).collect();
        let taken = most_recent_first(discovered, MaxCount::Limit(3));
        assert_eq!(taken, vec!["1.10", "1.9", "1.8"]);
    }

    #[test]
    fn most_recent_first_unlimited_keeps_everything() {
        let taken = most_recent_first(vec!["a".into(), "b".into()], MaxCount::Unlimited);
        assert_eq!(taken, vec!["b", "a"]);
    }

    #[test]
    fn validate_accepts_members_only() {
        let set = CandidateSet::new(vec!["1.0".into(), "1.1".into(), "2.0".into()]);
        assert!(set.validate("VERSION", "1.1").is_ok());

        let err = set.validate("VERSION", "9.9").unwrap_err();
        assert_eq!(err.code.as_str(), "selection.invalid");
        assert_eq!(err.message, "Illegal choice: 9.9");
    }

    #[test]
    fn empty_set_rejects_everything() {
        assert!(CandidateSet::default().validate("X", "").is_err());
    }
}
