use clap::{Args, Subcommand};
use serde::Serialize;

use buildstep::defaults::{self, BuildstepConfig, Defaults};

use super::CmdResult;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display configuration (merged defaults + file)
    Show {
        /// Show only built-in defaults (ignore buildstep.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Write built-in defaults to buildstep.json for editing
    Init {
        /// Overwrite an existing buildstep.json
        #[arg(long)]
        force: bool,
    },
    /// Reset configuration to built-in defaults (deletes buildstep.json)
    Reset,
    /// Show the path to buildstep.json
    Path,
}

#[derive(Debug, Default, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<BuildstepConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    defaults: Option<Defaults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<bool>,
}

pub fn run(args: ConfigArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin } => show(builtin),
        ConfigCommand::Init { force } => init(force),
        ConfigCommand::Reset => reset(),
        ConfigCommand::Path => path(),
    }
}

fn show(builtin: bool) -> CmdResult<ConfigOutput> {
    let output = if builtin {
        ConfigOutput {
            command: "config.show".to_string(),
            defaults: Some(defaults::builtin_defaults()),
            ..Default::default()
        }
    } else {
        ConfigOutput {
            command: "config.show".to_string(),
            config: Some(defaults::load_config()),
            ..Default::default()
        }
    };
    Ok((output, 0))
}

fn init(force: bool) -> CmdResult<ConfigOutput> {
    let path = defaults::config_path()?;
    if defaults::config_exists() && !force {
        return Err(buildstep::Error::validation_invalid_argument(
            "force",
            "buildstep.json already exists",
            Some(path),
            None,
        )
        .with_hint("Pass --force to overwrite it with built-in defaults"));
    }

    let config = BuildstepConfig {
        defaults: defaults::builtin_defaults(),
    };
    defaults::save_config(&config)?;

    Ok((
        ConfigOutput {
            command: "config.init".to_string(),
            config: Some(config),
            path: Some(path),
            exists: Some(true),
            ..Default::default()
        },
        0,
    ))
}

fn reset() -> CmdResult<ConfigOutput> {
    let deleted = defaults::reset_config()?;
    Ok((
        ConfigOutput {
            command: "config.reset".to_string(),
            deleted: Some(deleted),
            defaults: Some(defaults::builtin_defaults()),
            ..Default::default()
        },
        0,
    ))
}

fn path() -> CmdResult<ConfigOutput> {
    Ok((
        ConfigOutput {
            command: "config.path".to_string(),
            path: Some(defaults::config_path()?),
            exists: Some(defaults::config_exists()),
            ..Default::default()
        },
        0,
    ))
}
