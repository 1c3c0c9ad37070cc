//! Build-step variants.
//!
//! Each variant owns a constant table of command templates, resolves them
//! against its own configuration and the build environment, and hands the
//! resulting pipeline to the runner. Files a variant needs in place before
//! its commands run are declared as [`Resource`]s.

pub mod configure_tomcat;
pub mod deploy_nexus;
pub mod deploy_tomcat;
pub mod get_nexus_artifact;
pub mod load_balance;
pub mod promote_nexus;
pub mod service_control;

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::defaults::{builtin_defaults, Defaults};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::executor::StepExecutor;
use crate::pipeline::{CancellationToken, Pipeline, PipelineRun, PipelineRunner, Sleeper, ThreadSleeper};
use crate::utils::{io, validation};

pub use configure_tomcat::ConfigureTomcat;
pub use deploy_nexus::DeployNexus;
pub use deploy_tomcat::DeployTomcat;
pub use get_nexus_artifact::GetNexusArtifact;
pub use load_balance::LoadBalance;
pub use promote_nexus::PromoteNexus;
pub use service_control::ServiceControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    ConfigureTomcat,
    DeployTomcat,
    DeployNexus,
    PromoteNexus,
    GetNexusArtifact,
    ServiceControl,
    LoadBalance,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::ConfigureTomcat => "configure-tomcat",
            StepKind::DeployTomcat => "deploy-tomcat",
            StepKind::DeployNexus => "deploy-nexus",
            StepKind::PromoteNexus => "promote-nexus",
            StepKind::GetNexusArtifact => "get-nexus-artifact",
            StepKind::ServiceControl => "service-control",
            StepKind::LoadBalance => "load-balance",
        }
    }
}

/// Deserialize a step configuration of the given kind.
pub fn from_json(kind: StepKind, json: &str) -> Result<Box<dyn BuildStep>> {
    fn parse<T: DeserializeOwned + BuildStep + 'static>(
        kind: StepKind,
        json: &str,
    ) -> Result<Box<dyn BuildStep>> {
        let step: T = serde_json::from_str(json).map_err(|e| {
            Error::validation_invalid_json(e, Some(format!("parse {} step", kind.as_str())))
        })?;
        Ok(Box::new(step))
    }

    match kind {
        StepKind::ConfigureTomcat => parse::<ConfigureTomcat>(kind, json),
        StepKind::DeployTomcat => parse::<DeployTomcat>(kind, json),
        StepKind::DeployNexus => parse::<DeployNexus>(kind, json),
        StepKind::PromoteNexus => parse::<PromoteNexus>(kind, json),
        StepKind::GetNexusArtifact => parse::<GetNexusArtifact>(kind, json),
        StepKind::ServiceControl => parse::<ServiceControl>(kind, json),
        StepKind::LoadBalance => parse::<LoadBalance>(kind, json),
    }
}

/// A file written before a step's commands run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub path: PathBuf,
    #[serde(skip)]
    pub contents: Cow<'static, [u8]>,
}

impl Resource {
    pub fn new(path: PathBuf, contents: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            path,
            contents: contents.into(),
        }
    }

    pub fn write(&self) -> Result<()> {
        io::write_bytes(
            &self.path,
            &self.contents,
            &format!("write {}", self.path.display()),
        )?;
        log_status!("step", "Wrote {}", self.path.display());
        Ok(())
    }
}

/// Everything one build-step invocation runs against.
pub struct BuildContext<'a> {
    pub env: Environment,
    pub defaults: Defaults,
    executor: &'a dyn StepExecutor,
    sleeper: &'a dyn Sleeper,
    cancel: CancellationToken,
}

impl<'a> BuildContext<'a> {
    pub fn new(env: Environment, executor: &'a dyn StepExecutor) -> Self {
        Self {
            env,
            defaults: builtin_defaults(),
            executor,
            sleeper: &ThreadSleeper,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn runner(&self) -> PipelineRunner<'a> {
        PipelineRunner::new(self.executor)
            .with_sleeper(self.sleeper)
            .with_cancellation(self.cancel.clone())
    }

    /// Standalone wait outside any pipeline step.
    pub fn pause(&self, duration: Duration, reason: &str) -> Result<()> {
        log_status!("step", "Pausing {}s: {}", duration.as_secs(), reason);
        self.sleeper.sleep(duration);
        if self.cancel.is_cancelled() {
            return Err(Error::step_cancelled(0, reason));
        }
        Ok(())
    }
}

/// Build workspace directory from `${WORKSPACE}`.
pub fn workspace_dir(env: &Environment) -> Result<PathBuf> {
    env.workspace()
        .map(PathBuf::from)
        .ok_or_else(|| Error::environment_unavailable("WORKSPACE is not set"))
}

/// Expand environment references in a configured path.
pub fn expanded_path(env: &Environment, raw: &str) -> PathBuf {
    PathBuf::from(env.expand(raw))
}

pub(crate) fn require_field<'s>(value: &'s str, field: &str) -> Result<&'s str> {
    validation::require_non_empty(value, field, &format!("{} is required", field))
}

/// One build-step variant.
pub trait BuildStep {
    fn kind(&self) -> StepKind;

    /// Resolve the command pipeline. Performs no I/O.
    fn plan(&self, env: &Environment, defaults: &Defaults) -> Result<Pipeline>;

    /// Files to write before the pipeline runs.
    fn resources(&self, _env: &Environment) -> Result<Vec<Resource>> {
        Ok(Vec::new())
    }

    /// In-place edits performed after resources are written and before the pipeline runs.
    fn prepare(&self, _env: &Environment) -> Result<()> {
        Ok(())
    }

    fn execute(&self, ctx: &BuildContext<'_>) -> Result<PipelineRun> {
        run_planned(self, ctx)
    }
}

/// Plan, write resources, prepare, then run the pipeline.
///
/// Configuration errors surface before anything touches disk.
pub fn run_planned<S: BuildStep + ?Sized>(step: &S, ctx: &BuildContext<'_>) -> Result<PipelineRun> {
    let pipeline = step.plan(&ctx.env, &ctx.defaults)?;
    let resources = step.resources(&ctx.env)?;

    log_status!(
        "step",
        "{}: {} commands, {} files",
        step.kind().as_str(),
        pipeline.len(),
        resources.len()
    );

    for resource in &resources {
        resource.write()?;
    }
    step.prepare(&ctx.env)?;

    Ok(ctx.runner().run(&pipeline))
}

/// Double every backslash, as a Java properties file expects.
pub(crate) fn escape_properties_value(value: &str) -> String {
    value.replace('\\', "\\\\")
}

pub(crate) fn path_string(path: &Path) -> String {
    path.display().to_string()
}
