//! Selectable build parameters backed by a refreshable candidate list.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::candidates::artifact::parse_repositories;
use crate::candidates::vcs::parse_subdirectories;
use crate::candidates::{
    ArtifactIndexSource, BranchSource, CandidateSet, CandidateSource, DirectoryLister,
    DirectorySource, IndexFetcher, MaxCount,
};
use crate::defaults::CandidatesConfig;
use crate::error::Result;
use crate::version_tag::VersionTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    /// Versions of one artifact from a repository manager index.
    ArtifactVersion,
    /// Branch paths from a version-control tree.
    Branch,
    /// Subdirectories of a staging directory.
    StagingDirectory,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::ArtifactVersion => "artifact-version",
            ParameterKind::Branch => "branch",
            ParameterKind::StagingDirectory => "staging-directory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub repo_ids: String,
    #[serde(default)]
    pub max_versions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub svn_url: String,
    #[serde(default)]
    pub sub_directories: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub max_versions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingDirectorySpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub staging_path: PathBuf,
    #[serde(default)]
    pub max_versions: Option<String>,
}

/// A parameter definition that owns its candidate set.
///
/// Construction refreshes immediately, so a definition whose source cannot
/// be listed is never created.
pub struct ParameterDefinition {
    name: String,
    description: Option<String>,
    kind: ParameterKind,
    default: Option<String>,
    source: Box<dyn CandidateSource>,
    candidates: CandidateSet,
}

impl std::fmt::Debug for ParameterDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("source", &self.source.kind())
            .field("candidates", &self.candidates)
            .finish()
    }
}

impl ParameterDefinition {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        kind: ParameterKind,
        source: Box<dyn CandidateSource>,
    ) -> Result<Self> {
        let mut definition = Self {
            name: name.into(),
            description,
            kind,
            default: None,
            source,
            candidates: CandidateSet::default(),
        };
        definition.refresh()?;
        Ok(definition)
    }

    pub fn artifact_version(
        spec: ArtifactVersionSpec,
        config: &CandidatesConfig,
        fetcher: Box<dyn IndexFetcher>,
    ) -> Result<Self> {
        let source = ArtifactIndexSource::new(
            spec.url,
            config.index_path.clone(),
            spec.group_id,
            spec.artifact_id,
            parse_repositories(&spec.repo_ids, &config.default_repository),
            MaxCount::parse(spec.max_versions.as_deref()),
            fetcher,
        );
        Self::new(
            spec.name,
            spec.description,
            ParameterKind::ArtifactVersion,
            Box::new(source),
        )
    }

    pub fn branch(
        spec: BranchSpec,
        config: &CandidatesConfig,
        lister: Box<dyn DirectoryLister>,
    ) -> Result<Self> {
        let source = BranchSource::new(
            spec.svn_url,
            parse_subdirectories(&spec.sub_directories, &config.default_subdirectory),
            config.implicit_branch.clone(),
            MaxCount::parse(spec.max_versions.as_deref()),
            lister,
        );
        let mut definition = Self::new(
            spec.name,
            spec.description,
            ParameterKind::Branch,
            Box::new(source),
        )?;
        definition.default = Some(config.implicit_branch.clone());
        Ok(definition)
    }

    pub fn staging_directory(spec: StagingDirectorySpec) -> Result<Self> {
        let source = DirectorySource::new(
            spec.staging_path,
            MaxCount::parse(spec.max_versions.as_deref()),
        );
        Self::new(
            spec.name,
            spec.description,
            ParameterKind::StagingDirectory,
            Box::new(source),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Re-query the source and replace the candidate set wholesale.
    /// On failure the previous set is kept and the error returned.
    pub fn refresh(&mut self) -> Result<&CandidateSet> {
        let values = self.source.fetch()?;
        self.candidates = CandidateSet::new(values);
        Ok(&self.candidates)
    }

    pub fn validate(&self, value: &str) -> Result<()> {
        self.candidates.validate(&self.name, value)
    }

    /// Build a value for a submitted selection. Non-members are rejected.
    pub fn create_value(&self, value: impl Into<String>) -> Result<ParameterValue> {
        let value = value.into();
        self.validate(&value)?;
        Ok(ParameterValue {
            name: self.name.clone(),
            value,
            description: self.description.clone(),
            kind: self.kind,
        })
    }

    /// The preselected value, validated like any submitted selection.
    pub fn default_value(&self) -> Result<Option<ParameterValue>> {
        self.default
            .as_deref()
            .map(|value| self.create_value(value))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: ParameterKind,
}

impl ParameterValue {
    /// Build variables contributed by this value.
    ///
    /// Always `name` and `NAME`; artifact versions add the parsed version fields.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            (self.name.clone(), self.value.clone()),
            (self.name.to_uppercase(), self.value.clone()),
        ];

        if self.kind == ParameterKind::ArtifactVersion {
            vars.extend(VersionTag::parse(&self.value).env_vars());
        }

        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::builtin_defaults;
    use crate::error::Error;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Returns a different list on each fetch.
    struct Rotating {
        lists: Vec<Vec<&'static str>>,
        calls: Rc<Cell<usize>>,
    }

    impl CandidateSource for Rotating {
        fn kind(&self) -> &'static str {
            "test"
        }

        fn fetch(&self) -> Result<Vec<String>> {
            let i = self.calls.get();
            self.calls.set(i + 1);
            match self.lists.get(i) {
                Some(list) => Ok(list.iter().map(|s| s.to_string()).collect()),
                None => Err(Error::source_unreachable("test", "nowhere", "gone")),
            }
        }
    }

    fn definition(lists: Vec<Vec<&'static str>>) -> (ParameterDefinition, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let source = Rotating {
            lists,
            calls: calls.clone(),
        };
        let def = ParameterDefinition::new(
            "VERSION",
            None,
            ParameterKind::ArtifactVersion,
            Box::new(source),
        )
        .unwrap();
        (def, calls)
    }

    #[test]
    fn construction_refreshes_once() {
        let (def, calls) = definition(vec![vec!["1.0", "1.1", "2.0"]]);
        assert_eq!(calls.get(), 1);
        assert_eq!(def.candidates().len(), 3);
    }

    #[test]
    fn validate_uses_current_set() {
        let (def, _) = definition(vec![vec!["1.0", "1.1", "2.0"]]);
        assert!(def.validate("1.1").is_ok());
        assert_eq!(
            def.validate("9.9").unwrap_err().code.as_str(),
            "selection.invalid"
        );
    }

    #[test]
    fn refresh_replaces_rather_than_merges() {
        let (mut def, _) = definition(vec![vec!["1.0"], vec!["2.0"]]);
        def.refresh().unwrap();
        assert!(def.validate("2.0").is_ok());
        assert!(def.validate("1.0").is_err());
    }

    #[test]
    fn failed_refresh_surfaces_error() {
        let (mut def, _) = definition(vec![vec!["1.0"]]);
        assert_eq!(
            def.refresh().unwrap_err().code.as_str(),
            "source.unreachable"
        );
    }

    #[test]
    fn failed_initial_refresh_prevents_construction() {
        let source = Rotating {
            lists: vec![],
            calls: Rc::new(Cell::new(0)),
        };
        let result =
            ParameterDefinition::new("V", None, ParameterKind::Branch, Box::new(source));
        assert!(result.is_err());
    }

    #[test]
    fn create_value_rejects_unknown_selection() {
        let (def, _) = definition(vec![vec!["1.0"]]);
        let err = def.create_value("1.5").unwrap_err();
        assert_eq!(err.message, "Illegal choice: 1.5");
        assert_eq!(def.create_value("1.0").unwrap().value, "1.0");
    }

    #[test]
    fn artifact_value_exports_version_fields() {
        let (def, _) = definition(vec![vec!["2.3.1-hotfix-45"]]);
        let vars = def.create_value("2.3.1-hotfix-45").unwrap().env_vars();

        assert!(vars.contains(&("VERSION".to_string(), "2.3.1-hotfix-45".to_string())));
        assert!(vars.contains(&("qualifier".to_string(), "hotfix".to_string())));
        assert!(vars.contains(&("BUILD_NUMBER".to_string(), "45".to_string())));
        assert_eq!(vars.len(), 12);
    }

    #[test]
    fn staging_value_exports_name_only() {
        let value = ParameterValue {
            name: "drop".to_string(),
            value: "2024-01-01".to_string(),
            description: None,
            kind: ParameterKind::StagingDirectory,
        };
        assert_eq!(
            value.env_vars(),
            vec![
                ("drop".to_string(), "2024-01-01".to_string()),
                ("DROP".to_string(), "2024-01-01".to_string()),
            ]
        );
    }

    #[test]
    fn branch_default_is_validated_trunk() {
        struct Empty;
        impl DirectoryLister for Empty {
            fn list_dirs(&self, _: &str) -> Result<Vec<String>> {
                Ok(vec!["feature-x".to_string()])
            }
        }

        let spec: BranchSpec = serde_json::from_str(
            r#"{"name": "BRANCH", "svnUrl": "svn://repo/app", "maxVersions": "5"}"#,
        )
        .unwrap();
        let def =
            ParameterDefinition::branch(spec, &builtin_defaults().candidates, Box::new(Empty))
                .unwrap();

        let default = def.default_value().unwrap().unwrap();
        assert_eq!(default.value, "trunk");
        assert!(def.validate("branches/feature-x").is_ok());
    }

    #[test]
    fn other_kinds_have_no_default() {
        let (def, _) = definition(vec![vec!["1.0"]]);
        assert!(def.default_value().unwrap().is_none());
    }

    #[test]
    fn staging_directory_definition_reads_disk() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("drop-1")).unwrap();
        let spec = StagingDirectorySpec {
            name: "DROP".to_string(),
            description: None,
            staging_path: root.path().to_path_buf(),
            max_versions: None,
        };

        let def = ParameterDefinition::staging_directory(spec).unwrap();
        assert_eq!(def.kind(), ParameterKind::StagingDirectory);
        assert!(def.validate("drop-1").is_ok());
    }
}
