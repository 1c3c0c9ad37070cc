use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use buildstep::defaults;
use buildstep::executor::ShellExecutor;
use buildstep::pipeline::{Pipeline, PipelineRun};
use buildstep::steps::{self, BuildContext, Resource, StepKind};

use super::{build_environment, json_spec, CmdResult};

#[derive(Args)]
pub struct StepArgs {
    #[command(subcommand)]
    command: StepCommand,
}

#[derive(Subcommand)]
enum StepCommand {
    /// Resolve a step's command pipeline without running anything
    Plan {
        #[arg(value_enum)]
        kind: StepKindArg,
        #[command(flatten)]
        input: StepInput,
    },
    /// Write the step's files and run its command pipeline
    Run {
        #[arg(value_enum)]
        kind: StepKindArg,
        #[command(flatten)]
        input: StepInput,
        /// Working directory for commands (defaults to ${WORKSPACE})
        #[arg(long, value_name = "DIR")]
        workdir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct StepInput {
    /// Step configuration (JSON, @file, or - for stdin)
    #[arg(long, value_name = "JSON")]
    json: String,
    /// Build variable, repeatable (NAME=value)
    #[arg(long = "env", value_name = "NAME=VALUE")]
    env: Vec<String>,
    /// JSON object file of build variables
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StepKindArg {
    ConfigureTomcat,
    DeployTomcat,
    DeployNexus,
    PromoteNexus,
    GetNexusArtifact,
    ServiceControl,
    LoadBalance,
}

impl From<StepKindArg> for StepKind {
    fn from(arg: StepKindArg) -> Self {
        match arg {
            StepKindArg::ConfigureTomcat => StepKind::ConfigureTomcat,
            StepKindArg::DeployTomcat => StepKind::DeployTomcat,
            StepKindArg::DeployNexus => StepKind::DeployNexus,
            StepKindArg::PromoteNexus => StepKind::PromoteNexus,
            StepKindArg::GetNexusArtifact => StepKind::GetNexusArtifact,
            StepKindArg::ServiceControl => StepKind::ServiceControl,
            StepKindArg::LoadBalance => StepKind::LoadBalance,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    command: String,
    kind: StepKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline: Option<Pipeline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<Vec<Resource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<PipelineRun>,
}

pub fn run(args: StepArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<StepOutput> {
    match args.command {
        StepCommand::Plan { kind, input } => plan(kind.into(), input),
        StepCommand::Run {
            kind,
            input,
            workdir,
        } => execute(kind.into(), input, workdir),
    }
}

fn plan(kind: StepKind, input: StepInput) -> CmdResult<StepOutput> {
    let step = steps::from_json(kind, &json_spec(&input.json)?)?;
    let env = build_environment(input.env_file.as_deref(), &input.env)?;
    let defaults = defaults::load_defaults();

    let pipeline = step.plan(&env, &defaults)?;
    let resources = step.resources(&env)?;

    Ok((
        StepOutput {
            command: "step.plan".to_string(),
            kind,
            pipeline: Some(pipeline),
            resources: Some(resources),
            run: None,
        },
        0,
    ))
}

fn execute(kind: StepKind, input: StepInput, workdir: Option<PathBuf>) -> CmdResult<StepOutput> {
    let step = steps::from_json(kind, &json_spec(&input.json)?)?;
    let env = build_environment(input.env_file.as_deref(), &input.env)?;

    let mut executor = ShellExecutor::new().with_env(&env);
    if let Some(dir) = workdir.or_else(|| env.workspace().map(PathBuf::from)) {
        executor = executor.in_dir(dir);
    }

    let ctx = BuildContext::new(env, &executor).with_defaults(defaults::load_defaults());
    let run = step.execute(&ctx)?.into_result()?;

    Ok((
        StepOutput {
            command: "step.run".to_string(),
            kind,
            pipeline: None,
            resources: None,
            run: Some(run),
        },
        0,
    ))
}
