use serde::Deserialize;

use super::{expanded_path, require_field, BuildStep, StepKind};
use crate::defaults::Defaults;
use crate::environment::Environment;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::pom;
use crate::template::{CommandTemplate, Substitutions};

const SET_VERSION: CommandTemplate = CommandTemplate::new(
    "set-version",
    "cd {dir} \nmvn versions:set -DnewVersion={version} -DgenerateBackupPoms=false",
);

const RENAME_ARTIFACT: CommandTemplate = CommandTemplate::new(
    "rename-artifact",
    "cd {dir} \nrename {artifactId}*.{ext} {artifactId}-{version}.{ext}",
);

const DEPLOY_ARTIFACT: CommandTemplate = CommandTemplate::new(
    "deploy-artifact",
    "cd {dir} \nmvn org.apache.maven.plugins:maven-deploy-plugin:2.5:deploy-file -Durl={repoUrl} -DrepositoryId={repoId} -DpomFile=pom.xml -Dfile={artifactId}-{version}.{ext} -DuniqueVersion=true",
);

/// Version, rename and upload a freshly built artifact, stamping the source
/// revision into its POM first.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployNexus {
    pub target_dir: String,
    pub artifact_id: String,
    #[serde(default)]
    pub group_id: String,
    pub version: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub svn_revision: String,
    pub repository_url: String,
    pub repository_id: String,
}

impl DeployNexus {
    fn substitutions(&self) -> Substitutions {
        Substitutions::new()
            .with("dir", &self.target_dir)
            .with("artifactId", &self.artifact_id)
            .with("version", &self.version)
            .with("ext", &self.artifact_type)
            .with("repoUrl", &self.repository_url)
            .with("repoId", &self.repository_id)
    }
}

impl BuildStep for DeployNexus {
    fn kind(&self) -> StepKind {
        StepKind::DeployNexus
    }

    fn plan(&self, env: &Environment, _defaults: &Defaults) -> Result<Pipeline> {
        require_field(&self.target_dir, "targetDir")?;
        require_field(&self.artifact_id, "artifactId")?;
        require_field(&self.version, "version")?;
        require_field(&self.artifact_type, "type")?;
        require_field(&self.repository_url, "repositoryUrl")?;
        require_field(&self.repository_id, "repositoryId")?;

        let subs = self.substitutions();
        Ok(Pipeline::new()
            .then(SET_VERSION.resolve(&subs, env))
            .then(RENAME_ARTIFACT.resolve(&subs, env))
            .then(DEPLOY_ARTIFACT.resolve(&subs, env)))
    }

    /// Stamp `<svnRevision>` into `{targetDir}/pom.xml`. A malformed POM aborts
    /// the step before any command runs.
    fn prepare(&self, env: &Environment) -> Result<()> {
        let pom_path = expanded_path(env, &self.target_dir).join("pom.xml");
        pom::rewrite_svn_revision(&pom_path, &env.expand(&self.svn_revision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::SpyExecutor;
    use crate::steps::BuildContext;

    fn step(target_dir: &str) -> DeployNexus {
        serde_json::from_value(serde_json::json!({
            "targetDir": target_dir,
            "artifactId": "portal",
            "groupId": "com.example",
            "version": "2.3.1",
            "type": "war",
            "svnRevision": "${SVN_REVISION}",
            "repositoryUrl": "http://nexus/content/repositories/releases",
            "repositoryId": "releases"
        }))
        .unwrap()
    }

    #[test]
    fn resolves_commands_against_workspace() {
        let env = Environment::new().with("WORKSPACE", "/build/42");
        let pipeline = step("${WORKSPACE}/target")
            .plan(&env, &Defaults::default())
            .unwrap();
        let commands: Vec<&str> = pipeline.steps().map(|s| s.command()).collect();

        assert_eq!(
            commands[0],
            "cd /build/42/target \nmvn versions:set -DnewVersion=2.3.1 -DgenerateBackupPoms=false"
        );
        assert_eq!(
            commands[1],
            "cd /build/42/target \nrename portal*.war portal-2.3.1.war"
        );
        assert!(commands[2].contains("-Durl=http://nexus/content/repositories/releases"));
        assert!(commands[2].contains("-Dfile=portal-2.3.1.war -DuniqueVersion=true"));
    }

    #[test]
    fn stamps_revision_before_running() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("pom.xml"), "<project></project>").unwrap();
        let env = Environment::new()
            .with("WORKSPACE", ws.path().display().to_string())
            .with("SVN_REVISION", "8812");
        let spy = SpyExecutor::new();
        let ctx = BuildContext::new(env, &spy);

        let run = step("${WORKSPACE}").execute(&ctx).unwrap();

        assert!(run.succeeded());
        let pom = std::fs::read_to_string(ws.path().join("pom.xml")).unwrap();
        assert!(pom.contains("<svnRevision>8812</svnRevision>"));
        assert_eq!(spy.commands().len(), 3);
    }

    #[test]
    fn malformed_pom_runs_no_commands() {
        let ws = tempfile::tempdir().unwrap();
        let pom = "<project><properties/><properties></properties><properties></properties></project>";
        std::fs::write(ws.path().join("pom.xml"), pom).unwrap();
        let env = Environment::new().with("WORKSPACE", ws.path().display().to_string());
        let spy = SpyExecutor::new();
        let ctx = BuildContext::new(env, &spy);

        let err = step("${WORKSPACE}").execute(&ctx).unwrap_err();

        assert_eq!(err.code.as_str(), "artifact.malformed");
        assert!(spy.commands().is_empty());
    }
}
