use serde::Deserialize;

use super::{
    escape_properties_value, path_string, require_field, workspace_dir,
    BuildStep, Resource, StepKind,
};
use crate::defaults::Defaults;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::template::{CommandTemplate, Substitutions};

const ANT_BUILD_FILE: &str = "ant-replace-password.xml";
const ANT_PROPERTIES_FILE: &str = "ant-replace-password.properties";
const ANT_BUILD: &str = include_str!("resources/ant-replace-password.xml");

const COPY_CONFIGURATION: CommandTemplate = CommandTemplate::new(
    "copy-configuration",
    "xcopy \"{configFilePath}\" \"{tomcatRootDirectory}\" /S /Y /F /E",
);

const REPLACE_PASSWORDS: CommandTemplate = CommandTemplate::new(
    "replace-passwords",
    "ant -f \"{buildFile}\" -propertyfile \"{propertyFile}\" replace-passwords",
);

/// Copy a Tomcat configuration tree into place and/or substitute passwords into it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureTomcat {
    pub tomcat_root_directory: String,
    #[serde(default)]
    pub config_file_path: String,
    #[serde(default)]
    pub password_file_path: String,
    #[serde(default)]
    pub deploy_configuration: bool,
    #[serde(default)]
    pub replace_passwords: bool,
}

impl ConfigureTomcat {
    fn properties(&self, env: &Environment) -> String {
        let password_file = env.expand(&self.password_file_path);
        let tomcat_root = env.expand(&self.tomcat_root_directory);
        format!(
            "password.properties={}\nserver.configuration.path={}\\\\conf\n",
            escape_properties_value(&password_file),
            escape_properties_value(&tomcat_root)
        )
    }
}

impl BuildStep for ConfigureTomcat {
    fn kind(&self) -> StepKind {
        StepKind::ConfigureTomcat
    }

    fn plan(&self, env: &Environment, _defaults: &Defaults) -> Result<Pipeline> {
        require_field(&self.tomcat_root_directory, "tomcatRootDirectory")?;
        if !self.deploy_configuration && !self.replace_passwords {
            return Err(Error::validation_invalid_argument(
                "deployConfiguration",
                "Nothing to do: enable deployConfiguration and/or replacePasswords",
                None,
                None,
            ));
        }

        let mut pipeline = Pipeline::new();

        if self.deploy_configuration {
            require_field(&self.config_file_path, "configFilePath")?;
            let subs = Substitutions::new()
                .with("configFilePath", &self.config_file_path)
                .with("tomcatRootDirectory", &self.tomcat_root_directory);
            pipeline.push(COPY_CONFIGURATION.resolve(&subs, env));
        }

        if self.replace_passwords {
            require_field(&self.password_file_path, "passwordFilePath")?;
            let workspace = workspace_dir(env)?;
            let subs = Substitutions::new()
                .with("buildFile", path_string(&workspace.join(ANT_BUILD_FILE)))
                .with("propertyFile", path_string(&workspace.join(ANT_PROPERTIES_FILE)));
            pipeline.push(REPLACE_PASSWORDS.resolve(&subs, env));
        }

        Ok(pipeline)
    }

    fn resources(&self, env: &Environment) -> Result<Vec<Resource>> {
        if !self.replace_passwords {
            return Ok(Vec::new());
        }

        let workspace = workspace_dir(env)?;
        Ok(vec![
            Resource::new(workspace.join(ANT_BUILD_FILE), ANT_BUILD.as_bytes()),
            Resource::new(
                workspace.join(ANT_PROPERTIES_FILE),
                self.properties(env).into_bytes(),
            ),
        ])
    }
}
