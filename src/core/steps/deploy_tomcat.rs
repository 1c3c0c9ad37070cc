use serde::Deserialize;

use super::{require_field, BuildStep, StepKind};
use crate::defaults::Defaults;
use crate::environment::Environment;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::template::{CommandTemplate, Substitutions};

const CLEAN_WEBAPP_DIRECTORY: CommandTemplate = CommandTemplate::new(
    "clean-webapp-directory",
    "rmdir /s /q \"{tomcatRootDirectory}\\webapps\\{sourceWar}\"",
);

const CLEAN_WEBAPP_ARCHIVE: CommandTemplate = CommandTemplate::new(
    "clean-webapp-archive",
    "del \"{tomcatRootDirectory}\\webapps\\{sourceWar}.war\"",
);

/// `{sourceWar}` here is the context name, `#` replaced by `_`.
const CLEAN_WORK_DIRECTORY: CommandTemplate = CommandTemplate::new(
    "clean-work-directory",
    "rmdir /s /q \"{tomcatRootDirectory}\\work\\Catalina\\localhost\\{sourceWar}\"",
);

const COPY_ARCHIVE: CommandTemplate = CommandTemplate::new(
    "copy-archive",
    "copy \"{sourceDirectory}\\{sourceWar}.war\" \"{tomcatRootDirectory}\\webapps\\{sourceWar}.war\"",
);

const EXTRACT_ARCHIVE: CommandTemplate = CommandTemplate::new(
    "extract-archive",
    "unzip \"{tomcatRootDirectory}\\webapps\\{sourceWar}.war\" -d\"{tomcatRootDirectory}\\webapps\\{sourceWar}\"",
);

/// Replace a deployed web application with a fresh archive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTomcat {
    pub source_war: String,
    pub source_directory: String,
    pub tomcat_root_directory: String,
}

impl BuildStep for DeployTomcat {
    fn kind(&self) -> StepKind {
        StepKind::DeployTomcat
    }

    fn plan(&self, env: &Environment, _defaults: &Defaults) -> Result<Pipeline> {
        require_field(&self.source_war, "sourceWar")?;
        require_field(&self.source_directory, "sourceDirectory")?;
        require_field(&self.tomcat_root_directory, "tomcatRootDirectory")?;

        let subs = Substitutions::new()
            .with("sourceWar", &self.source_war)
            .with("sourceDirectory", &self.source_directory)
            .with("tomcatRootDirectory", &self.tomcat_root_directory);
        let work_subs = subs
            .clone()
            .with("sourceWar", self.source_war.replace('#', "_"));

        Ok(Pipeline::new()
            .then(CLEAN_WEBAPP_DIRECTORY.resolve(&subs, env))
            .then(CLEAN_WEBAPP_ARCHIVE.resolve(&subs, env))
            .then(CLEAN_WORK_DIRECTORY.resolve(&work_subs, env))
            .then(COPY_ARCHIVE.resolve(&subs, env))
            .then(EXTRACT_ARCHIVE.resolve(&subs, env)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::SpyExecutor;
    use crate::steps::BuildContext;

    fn step() -> DeployTomcat {
        DeployTomcat {
            source_war: "portal#admin".to_string(),
            source_directory: "${WORKSPACE}\\target".to_string(),
            tomcat_root_directory: "D:\\tomcat".to_string(),
        }
    }

    #[test]
    fn plans_five_steps_in_order() {
        let env = Environment::new().with("WORKSPACE", "C:\\ws");
        let pipeline = step().plan(&env, &Defaults::default()).unwrap();
        let commands: Vec<&str> = pipeline.steps().map(|s| s.command()).collect();

        assert_eq!(
            commands,
            vec![
                "rmdir /s /q \"D:\\tomcat\\webapps\\portal#admin\"",
                "del \"D:\\tomcat\\webapps\\portal#admin.war\"",
                "rmdir /s /q \"D:\\tomcat\\work\\Catalina\\localhost\\portal_admin\"",
                "copy \"C:\\ws\\target\\portal#admin.war\" \"D:\\tomcat\\webapps\\portal#admin.war\"",
                "unzip \"D:\\tomcat\\webapps\\portal#admin.war\" -d\"D:\\tomcat\\webapps\\portal#admin\"",
            ]
        );
    }

    #[test]
    fn failed_copy_stops_before_extract() {
        let spy = SpyExecutor::failing(&["copy-archive"]);
        let ctx = BuildContext::new(Environment::new(), &spy);

        let run = step().execute(&ctx).unwrap();

        assert_eq!(run.failed_step(), Some(4));
        assert_eq!(spy.commands().len(), 4);
    }

    #[test]
    fn blank_war_is_rejected() {
        let mut step = step();
        step.source_war = " ".to_string();
        assert!(step.plan(&Environment::new(), &Defaults::default()).is_err());
    }
}
