use serde::Deserialize;

use super::{require_field, workspace_dir, BuildStep, Resource, StepKind};
use crate::defaults::Defaults;
use crate::environment::Environment;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::template::{CommandTemplate, Substitutions};

/// POM that copies the requested artifact into `./target` during `mvn package`.
const FETCH_POM: &str = include_str!("resources/fetch-artifact-pom.xml");

const CLEAN_WORKSPACE: CommandTemplate = CommandTemplate::new("clean-workspace", "mvn clean");

const FETCH_ARTIFACT: CommandTemplate = CommandTemplate::new(
    "fetch-artifact",
    "mvn package -DgrpId={groupId} -DartId={artifactId} -Dvers={version} -Dext={ext}",
);

const RENAME_ARTIFACT: CommandTemplate = CommandTemplate::new(
    "rename-artifact",
    "rename .\\target\\{artifactId}*.{ext} {name}",
);

/// Download one artifact into the workspace, optionally renaming it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNexusArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    #[serde(default)]
    pub name: String,
}

impl BuildStep for GetNexusArtifact {
    fn kind(&self) -> StepKind {
        StepKind::GetNexusArtifact
    }

    fn plan(&self, env: &Environment, _defaults: &Defaults) -> Result<Pipeline> {
        require_field(&self.group_id, "groupId")?;
        require_field(&self.artifact_id, "artifactId")?;
        require_field(&self.version, "version")?;
        require_field(&self.artifact_type, "type")?;

        let subs = Substitutions::new()
            .with("groupId", &self.group_id)
            .with("artifactId", &self.artifact_id)
            .with("version", &self.version)
            .with("ext", &self.artifact_type)
            .with("name", &self.name);

        let mut pipeline = Pipeline::new()
            .then(CLEAN_WORKSPACE.resolve(&subs, env))
            .then(FETCH_ARTIFACT.resolve(&subs, env));

        if !self.name.trim().is_empty() {
            pipeline.push(RENAME_ARTIFACT.resolve(&subs, env));
        }

        Ok(pipeline)
    }

    fn resources(&self, env: &Environment) -> Result<Vec<Resource>> {
        let workspace = workspace_dir(env)?;
        Ok(vec![Resource::new(
            workspace.join("pom.xml"),
            FETCH_POM.as_bytes(),
        )])
    }
}
