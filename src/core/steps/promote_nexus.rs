use serde::Deserialize;

use super::{require_field, BuildStep, StepKind};
use crate::defaults::Defaults;
use crate::environment::Environment;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::template::{CommandTemplate, Substitutions};

const SET_RELEASE_VERSION: CommandTemplate = CommandTemplate::new(
    "set-release-version",
    "mvn org.codehaus.mojo:versions-maven-plugin:1.2:set -f./target/pom.xml -DnewVersion={releaseVersion} -DgenerateBackupPoms=false",
);

const PROMOTE_ARTIFACT: CommandTemplate = CommandTemplate::new(
    "promote-artifact",
    "mvn org.apache.maven.plugins:maven-deploy-plugin:2.5:deploy-file -Durl={repoUrl} -DrepositoryId={repoId} -DpomFile=.\\target\\pom.xml -Dfile=.\\target\\{artifactId}-{releaseVersion}.{ext} -DuniqueVersion=false",
);

/// Re-deploy a fetched artifact under its release version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteNexus {
    pub artifact_id: String,
    pub release_version: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub repository_url: String,
    pub repository_id: String,
}

impl BuildStep for PromoteNexus {
    fn kind(&self) -> StepKind {
        StepKind::PromoteNexus
    }

    fn plan(&self, env: &Environment, _defaults: &Defaults) -> Result<Pipeline> {
        require_field(&self.artifact_id, "artifactId")?;
        require_field(&self.release_version, "releaseVersion")?;
        require_field(&self.artifact_type, "type")?;
        require_field(&self.repository_url, "repositoryUrl")?;
        require_field(&self.repository_id, "repositoryId")?;

        let subs = Substitutions::new()
            .with("releaseVersion", &self.release_version)
            .with("repoUrl", &self.repository_url)
            .with("repoId", &self.repository_id)
            .with("artifactId", &self.artifact_id)
            .with("ext", &self.artifact_type);

        Ok(Pipeline::new()
            .then(SET_RELEASE_VERSION.resolve(&subs, env))
            .then(PROMOTE_ARTIFACT.resolve(&subs, env)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_release_version_from_environment() {
        let step = PromoteNexus {
            artifact_id: "portal".to_string(),
            release_version: "${RELEASE_VERSION}".to_string(),
            artifact_type: "war".to_string(),
            repository_url: "http://nexus/releases".to_string(),
            repository_id: "releases".to_string(),
        };
        let env = Environment::new().with("RELEASE_VERSION", "4.0.0");

        let pipeline = step.plan(&env, &Defaults::default()).unwrap();
        let commands: Vec<&str> = pipeline.steps().map(|s| s.command()).collect();

        assert_eq!(pipeline.len(), 2);
        assert!(commands[0].contains("-DnewVersion=4.0.0 "));
        assert!(commands[1].ends_with(
            "-Dfile=.\\target\\portal-4.0.0.war -DuniqueVersion=false"
        ));
        assert!(commands[1].contains("-DrepositoryId=releases"));
    }
}
