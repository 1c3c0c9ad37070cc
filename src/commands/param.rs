use clap::{Args, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;

use buildstep::candidates::{HttpIndexFetcher, SvnLister};
use buildstep::defaults::{self, CandidatesConfig};
use buildstep::parameter::{
    ArtifactVersionSpec, BranchSpec, ParameterDefinition, ParameterKind, ParameterValue,
    StagingDirectorySpec,
};
use buildstep::version_tag::VersionTag;

use super::{json_spec, CmdResult};

#[derive(Args)]
pub struct ParamArgs {
    #[command(subcommand)]
    command: ParamCommand,
}

#[derive(Subcommand)]
enum ParamCommand {
    /// Query the parameter's source and list its candidates
    Refresh {
        #[arg(value_enum)]
        kind: ParamKindArg,
        /// Parameter definition (JSON, @file, or - for stdin)
        #[arg(long, value_name = "JSON")]
        json: String,
    },
    /// Refresh, then check a submitted value against the candidates
    Validate {
        #[arg(value_enum)]
        kind: ParamKindArg,
        /// Parameter definition (JSON, @file, or - for stdin)
        #[arg(long, value_name = "JSON")]
        json: String,
        /// Submitted value (defaults to the parameter's preselected value)
        value: Option<String>,
    },
    /// Split a version string into its build variables
    Version {
        value: String,
        /// Reject values without a numeric major.minor.incremental core
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ParamKindArg {
    ArtifactVersion,
    Branch,
    StagingDirectory,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ParameterKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<VersionTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    env: Option<Vec<(String, String)>>,
}

impl ParamOutput {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            name: None,
            kind: None,
            candidates: None,
            value: None,
            version: None,
            env: None,
        }
    }
}

pub fn run(args: ParamArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ParamOutput> {
    match args.command {
        ParamCommand::Refresh { kind, json } => refresh(kind, &json),
        ParamCommand::Validate { kind, json, value } => validate(kind, &json, value),
        ParamCommand::Version { value, strict } => version(&value, strict),
    }
}

fn parse_spec<T: DeserializeOwned>(raw: &str, kind: &str) -> buildstep::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        buildstep::Error::validation_invalid_json(e, Some(format!("parse {} parameter", kind)))
    })
}

fn definition(kind: ParamKindArg, json: &str) -> buildstep::Result<ParameterDefinition> {
    let raw = json_spec(json)?;
    let config: CandidatesConfig = defaults::load_defaults().candidates;

    match kind {
        ParamKindArg::ArtifactVersion => {
            let spec: ArtifactVersionSpec = parse_spec(&raw, "artifact-version")?;
            let fetcher = HttpIndexFetcher::new(None)?;
            ParameterDefinition::artifact_version(spec, &config, Box::new(fetcher))
        }
        ParamKindArg::Branch => {
            let spec: BranchSpec = parse_spec(&raw, "branch")?;
            let lister =
                SvnLister::new().with_credentials(spec.username.clone(), spec.password.clone());
            ParameterDefinition::branch(spec, &config, Box::new(lister))
        }
        ParamKindArg::StagingDirectory => {
            let spec: StagingDirectorySpec = parse_spec(&raw, "staging-directory")?;
            ParameterDefinition::staging_directory(spec)
        }
    }
}

fn refresh(kind: ParamKindArg, json: &str) -> CmdResult<ParamOutput> {
    let definition = definition(kind, json)?;

    let mut output = ParamOutput::new("param.refresh");
    output.name = Some(definition.name().to_string());
    output.kind = Some(definition.kind());
    output.candidates = Some(definition.candidates().as_slice().to_vec());
    Ok((output, 0))
}

fn validate(kind: ParamKindArg, json: &str, value: Option<String>) -> CmdResult<ParamOutput> {
    let definition = definition(kind, json)?;

    let selected = match value {
        Some(value) => definition.create_value(value)?,
        None => buildstep::utils::validation::require(definition.default_value()?, "value")?,
    };

    let mut output = ParamOutput::new("param.validate");
    output.name = Some(definition.name().to_string());
    output.kind = Some(definition.kind());
    output.env = Some(selected.env_vars());
    output.value = Some(selected);
    Ok((output, 0))
}

fn version(value: &str, strict: bool) -> CmdResult<ParamOutput> {
    let tag = if strict {
        VersionTag::parse_strict(value)?
    } else {
        VersionTag::parse(value)
    };

    let mut output = ParamOutput::new("param.version");
    output.env = Some(tag.env_vars());
    output.version = Some(tag);
    Ok((output, 0))
}
