//! Decompose artifact version strings like `2.3.1-hotfix-45`.
//!
//! The core (`2.3.1`) is followed by up to three dash-separated segments.
//! Segments 1 and 2 are classified: an integer is the build number, a
//! repository qualifier (`SNAPSHOT`, `RC`, `RELEASE`) is dropped, anything
//! else is the qualifier. Shapes that do not fit leave fields empty.

use serde::Serialize;

use crate::error::{Error, Result};

/// Qualifiers that describe the repository rather than the build.
pub const REPOSITORY_QUALIFIERS: [&str; 3] = ["SNAPSHOT", "RC", "RELEASE"];

pub const MAJOR_VERSION: &str = "major_version";
pub const MINOR_VERSION: &str = "minor_version";
pub const INCREMENTAL_VERSION: &str = "incremental_version";
pub const QUALIFIER: &str = "qualifier";
pub const BUILD_NUMBER: &str = "build_number";

/// Best-effort decomposition. Empty strings mean "not present".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionTag {
    pub major: String,
    pub minor: String,
    pub incremental: String,
    pub qualifier: String,
    pub build_number: String,
}

impl VersionTag {
    /// Lenient parse. Never fails.
    pub fn parse(value: &str) -> Self {
        let segments = split_dropping_trailing_empty(value, '-');
        let mut tag = VersionTag::default();

        let core = match segments.len() {
            1..=4 => segments[0],
            _ => "",
        };

        if segments.len() <= 4 {
            for segment in segments.iter().skip(1).take(2) {
                if is_number(segment) {
                    tag.build_number = segment.to_string();
                } else if !is_repository_qualifier(segment) {
                    tag.qualifier = segment.to_string();
                }
            }
        }

        let fields = split_dropping_trailing_empty(core, '.');
        if fields.len() <= 3 {
            let mut fields = fields.into_iter();
            tag.major = fields.next().unwrap_or_default().to_string();
            tag.minor = fields.next().unwrap_or_default().to_string();
            tag.incremental = fields.next().unwrap_or_default().to_string();
        }

        tag
    }

    /// Parse and require a numeric `major[.minor[.incremental]]` core with
    /// no more than three trailing segments.
    pub fn parse_strict(value: &str) -> Result<Self> {
        let invalid = |problem: &str| {
            Error::validation_invalid_argument("version", problem, Some(value.to_string()), None)
        };

        let segments: Vec<&str> = value.split('-').collect();
        if segments.len() > 4 {
            return Err(invalid("More than four dash-separated segments"));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("Empty segment"));
        }

        let core: Vec<&str> = segments[0].split('.').collect();
        if core.len() > 3 {
            return Err(invalid("Version core has more than three fields"));
        }
        if core.iter().any(|f| f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit())) {
            return Err(invalid("Version core fields must be numeric"));
        }

        Ok(Self::parse(value))
    }

    /// Variables exported alongside the parameter value, lower and upper case.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let fields = [
            (MAJOR_VERSION, &self.major),
            (MINOR_VERSION, &self.minor),
            (INCREMENTAL_VERSION, &self.incremental),
            (QUALIFIER, &self.qualifier),
            (BUILD_NUMBER, &self.build_number),
        ];

        fields
            .iter()
            .flat_map(|(name, value)| {
                [
                    (name.to_string(), value.to_string()),
                    (name.to_uppercase(), value.to_string()),
                ]
            })
            .collect()
    }
}

fn is_number(segment: &str) -> bool {
    segment.parse::<i32>().is_ok()
}

fn is_repository_qualifier(segment: &str) -> bool {
    REPOSITORY_QUALIFIERS.contains(&segment)
}

/// `str::split` minus trailing empty pieces. An empty input yields one empty piece.
fn split_dropping_trailing_empty(value: &str, separator: char) -> Vec<&str> {
    let mut pieces: Vec<&str> = value.split(separator).collect();
    while pieces.len() > 1 && pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    if pieces.len() == 1 && pieces[0].is_empty() && !value.is_empty() {
        // input consisted only of separators
        pieces.clear();
    }
    pieces
}
