//! Artifact versions from a repository manager's data index.

use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use serde::Serialize;

use super::{most_recent_first, CandidateSource, MaxCount};
use crate::error::{Error, Result};
use crate::http;

const SOURCE: &str = "artifact";

/// One `<artifact>` entry of the index response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub repo_id: String,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

/// Retrieves the raw index document for a query URL.
pub trait IndexFetcher {
    fn fetch_index(&self, url: &str) -> Result<String>;
}

pub struct HttpIndexFetcher {
    client: Client,
}

impl HttpIndexFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
        })
    }
}

impl IndexFetcher for HttpIndexFetcher {
    fn fetch_index(&self, url: &str) -> Result<String> {
        http::get_text(&self.client, SOURCE, url)
    }
}

pub struct ArtifactIndexSource {
    pub base_url: String,
    pub index_path: String,
    pub group_id: String,
    pub artifact_id: String,
    pub repositories: Vec<String>,
    pub max: MaxCount,
    fetcher: Box<dyn IndexFetcher>,
}

impl ArtifactIndexSource {
    pub fn new(
        base_url: impl Into<String>,
        index_path: impl Into<String>,
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        repositories: Vec<String>,
        max: MaxCount,
        fetcher: Box<dyn IndexFetcher>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            index_path: index_path.into(),
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            repositories,
            max,
            fetcher,
        }
    }

    pub fn query_url(&self) -> String {
        format!(
            "{}{}?q={}",
            self.base_url.trim_end_matches('/'),
            self.index_path,
            self.artifact_id
        )
    }

    fn accepts(&self, record: &IndexRecord) -> bool {
        self.repositories.iter().any(|r| *r == record.repo_id)
            && record.group_id == self.group_id
            && record.artifact_id == self.artifact_id
    }
}

impl CandidateSource for ArtifactIndexSource {
    fn kind(&self) -> &'static str {
        SOURCE
    }

    fn fetch(&self) -> Result<Vec<String>> {
        let url = self.query_url();
        let body = self.fetcher.fetch_index(&url)?;
        let records = parse_index(&body, &url)?;

        let discovered: Vec<String> = records
            .into_iter()
            .filter(|r| self.accepts(r))
            .map(|r| r.version)
            .collect();

        log_status!(
            "refresh",
            "{} matching versions of {}:{}",
            discovered.len(),
            self.group_id,
            self.artifact_id
        );

        Ok(most_recent_first(discovered, self.max))
    }
}

/// Split a comma separated repository allow-list. An empty list falls back to `default`.
pub fn parse_repositories(raw: &str, default: &str) -> Vec<String> {
    let repos: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();

    if repos.is_empty() {
        vec![default.to_string()]
    } else {
        repos
    }
}

/// Extract every `<artifact>` record, in document order.
pub fn parse_index(body: &str, location: &str) -> Result<Vec<IndexRecord>> {
    let malformed = |problem: String| Error::source_malformed(SOURCE, location, problem);

    if !body.trim_start().starts_with('<') {
        return Err(malformed("response is not an XML document".to_string()));
    }

    let block = Regex::new(r"(?s)<artifact\s*>(.*?)</artifact\s*>")
        .map_err(|e| Error::internal_unexpected(e.to_string()))?;

    block
        .captures_iter(body)
        .enumerate()
        .map(|(i, caps)| {
            let inner = &caps[1];
            let field = |name: &str| {
                element_text(inner, name)?.ok_or_else(|| {
                    malformed(format!("artifact record {} has no <{}>", i + 1, name))
                })
            };

            Ok(IndexRecord {
                repo_id: field("repoId")?,
                group_id: field("groupId")?,
                artifact_id: field("artifactId")?,
                version: field("version")?,
            })
        })
        .collect()
}

fn element_text(xml: &str, name: &str) -> Result<Option<String>> {
    let pattern = format!(r"(?s)<{0}\s*>\s*(.*?)\s*</{0}\s*>", regex::escape(name));
    let re = Regex::new(&pattern).map_err(|e| Error::internal_unexpected(e.to_string()))?;
    Ok(re.captures(xml).map(|c| unescape(&c[1])))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
