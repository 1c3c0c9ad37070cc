//! Ordered, fail-fast execution of resolved command steps.
//!
//! A [`Pipeline`] runs its steps strictly in insertion order and stops at the
//! first step whose process reports failure. Side effects of earlier steps
//! are not rolled back.
//!
//! A step may carry a [`Settle`] rule applied after it succeeds: a fixed
//! pause, or a poll that re-runs a read-only query step at a fixed interval
//! until the query succeeds. Polls have no timeout unless one is configured,
//! so an external system that never converges blocks the build until the
//! host interrupts it through the [`CancellationToken`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result, StepFailedDetails};
use crate::executor::{CommandOutput, StepExecutor};

/// A fully resolved, ready-to-run command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandStep {
    label: String,
    command: String,
}

impl CommandStep {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// What to wait for after a step succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Settle {
    /// Sleep for a fixed time (e.g. letting a load balancer notice a change).
    Pause {
        #[serde(with = "duration_secs")]
        duration: Duration,
    },
    /// Re-run `query` every `interval` until it succeeds.
    Poll {
        query: CommandStep,
        #[serde(with = "duration_secs")]
        interval: Duration,
        #[serde(with = "option_duration_secs")]
        timeout: Option<Duration>,
    },
}

impl Settle {
    pub fn pause(duration: Duration) -> Self {
        Settle::Pause { duration }
    }

    /// Unbounded poll.
    pub fn poll(query: CommandStep, interval: Duration) -> Self {
        Settle::Poll {
            query,
            interval,
            timeout: None,
        }
    }

    /// Give a poll an upper bound. No effect on pauses.
    pub fn with_timeout(self, limit: Option<Duration>) -> Self {
        match self {
            Settle::Poll {
                query, interval, ..
            } => Settle::Poll {
                query,
                interval,
                timeout: limit,
            },
            pause => pause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineEntry {
    pub step: CommandStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle: Option<Settle>,
}

/// Ordered sequence of command steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Pipeline {
    entries: Vec<PipelineEntry>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: CommandStep) {
        self.entries.push(PipelineEntry { step, settle: None });
    }

    pub fn push_settled(&mut self, step: CommandStep, settle: Settle) {
        self.entries.push(PipelineEntry {
            step,
            settle: Some(settle),
        });
    }

    pub fn then(mut self, step: CommandStep) -> Self {
        self.push(step);
        self
    }

    pub fn then_settled(mut self, step: CommandStep, settle: Settle) -> Self {
        self.push_settled(step, settle);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PipelineEntry] {
        &self.entries
    }

    pub fn steps(&self) -> impl Iterator<Item = &CommandStep> {
        self.entries.iter().map(|e| &e.step)
    }
}

impl FromIterator<CommandStep> for Pipeline {
    fn from_iter<I: IntoIterator<Item = CommandStep>>(iter: I) -> Self {
        let mut pipeline = Pipeline::new();
        for step in iter {
            pipeline.push(step);
        }
        pipeline
    }
}

/// Blocking wait used between poll attempts and for pauses.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Host-side interruption flag, shared between the build thread and whoever aborts it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run lifecycle. Step indexes are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "step")]
pub enum RunState {
    Pending,
    Running(usize),
    Succeeded,
    Failed(usize),
    Cancelled(usize),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed(_) | RunState::Cancelled(_)
        )
    }
}

/// Record of one executed step, including its settle phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub index: usize,
    pub label: String,
    pub command: String,
    pub output: CommandOutput,
    #[serde(skip_serializing_if = "is_zero")]
    pub poll_attempts: u32,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub waited_secs: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub state: RunState,
    pub total_steps: usize,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    /// A run with nothing to execute.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Succeeded,
            total_steps: 0,
            steps: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// Index of the step that stopped the run, if any.
    pub fn failed_step(&self) -> Option<usize> {
        match self.state {
            RunState::Failed(i) | RunState::Cancelled(i) => Some(i),
            _ => None,
        }
    }

    /// Convert a failed or cancelled run into the matching error.
    ///
    /// The error's details carry the full run under `run`, so callers that
    /// only see the error still get every step's captured output.
    pub fn into_result(self) -> Result<PipelineRun> {
        let err = match self.state {
            RunState::Failed(index) => {
                let record = self.steps.iter().find(|r| r.index == index);
                Error::step_failed(StepFailedDetails {
                    step: index,
                    command: record.map(|r| r.command.clone()).unwrap_or_default(),
                    exit_code: record.map(|r| r.output.exit_code).unwrap_or(-1),
                    stdout: record.map(|r| r.output.stdout.clone()).unwrap_or_default(),
                    stderr: record.map(|r| r.output.stderr.clone()).unwrap_or_default(),
                })
            }
            RunState::Cancelled(index) => {
                let command = self
                    .steps
                    .iter()
                    .find(|r| r.index == index)
                    .map(|r| r.command.clone())
                    .unwrap_or_default();
                Error::step_cancelled(index, command)
            }
            _ => return Ok(self),
        };
        Err(self.attach_to(err))
    }

    fn attach_to(&self, mut err: Error) -> Error {
        if let (Some(details), Ok(run)) = (err.details.as_object_mut(), serde_json::to_value(self)) {
            details.insert("run".to_string(), run);
        }
        err
    }
}

/// Runs pipelines against an executor, a sleeper and a cancellation token.
pub struct PipelineRunner<'a> {
    executor: &'a dyn StepExecutor,
    sleeper: &'a dyn Sleeper,
    cancel: CancellationToken,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(executor: &'a dyn StepExecutor) -> Self {
        Self {
            executor,
            sleeper: &ThreadSleeper,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&self, pipeline: &Pipeline) -> PipelineRun {
        let started_at = Utc::now();
        let total = pipeline.len();
        let mut records = Vec::with_capacity(total);
        let mut state = RunState::Pending;

        for (offset, entry) in pipeline.entries().iter().enumerate() {
            let index = offset + 1;

            if self.cancel.is_cancelled() {
                state = RunState::Cancelled(index);
                break;
            }

            state = RunState::Running(index);
            log_status!("pipeline", "[{}/{}] {}", index, total, entry.step.label());

            let output = self.executor.execute(&entry.step);
            let mut record = StepRecord {
                index,
                label: entry.step.label().to_string(),
                command: entry.step.command().to_string(),
                output,
                poll_attempts: 0,
                waited_secs: 0,
                timed_out: false,
            };

            if !record.output.success {
                log_status!(
                    "pipeline",
                    "Step {} failed: {}",
                    index,
                    record.output.error_text()
                );
                records.push(record);
                state = RunState::Failed(index);
                break;
            }

            if let Some(settle) = &entry.settle {
                if let Some(stopped) = self.settle(settle, index, &mut record) {
                    records.push(record);
                    state = stopped;
                    break;
                }
            }

            records.push(record);
        }

        if !state.is_terminal() {
            state = RunState::Succeeded;
        }

        PipelineRun {
            run_id: Uuid::new_v4(),
            state,
            total_steps: total,
            steps: records,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Returns the terminal state if settling stopped the run.
    fn settle(&self, settle: &Settle, index: usize, record: &mut StepRecord) -> Option<RunState> {
        match settle {
            Settle::Pause { duration } => {
                log_status!("pipeline", "Pausing {}s", duration.as_secs());
                self.sleeper.sleep(*duration);
                record.waited_secs += duration.as_secs();
                if self.cancel.is_cancelled() {
                    return Some(RunState::Cancelled(index));
                }
                None
            }
            Settle::Poll {
                query,
                interval,
                timeout,
            } => {
                let mut waited = Duration::ZERO;
                loop {
                    record.poll_attempts += 1;
                    if self.executor.execute(query).success {
                        return None;
                    }

                    if let Some(limit) = timeout {
                        if waited + *interval > *limit {
                            record.timed_out = true;
                            return Some(RunState::Failed(index));
                        }
                    }

                    self.sleeper.sleep(*interval);
                    waited += *interval;
                    record.waited_secs = waited.as_secs();

                    if self.cancel.is_cancelled() {
                        return Some(RunState::Cancelled(index));
                    }
                    log_status!("pipeline", "Still waiting for '{}' to complete...", query.label());
                }
            }
        }
    }
}

/// Run `pipeline` with real sleeping and no external cancellation.
pub fn run(pipeline: &Pipeline, executor: &dyn StepExecutor) -> PipelineRun {
    PipelineRunner::new(executor).run(pipeline)
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

mod option_duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Executor that records every command and fails the ones it is told to.
    #[derive(Default)]
    pub struct SpyExecutor {
        pub calls: RefCell<Vec<String>>,
        fail_labels: Vec<String>,
        /// Query label -> number of failing attempts before success.
        converge_after: RefCell<Vec<(String, u32)>>,
    }

    impl SpyExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(labels: &[&str]) -> Self {
            Self {
                fail_labels: labels.iter().map(|l| l.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn converging(mut self, label: &str, failures: u32) -> Self {
            self.converge_after
                .get_mut()
                .push((label.to_string(), failures));
            self
        }

        pub fn commands(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl StepExecutor for SpyExecutor {
        fn execute(&self, step: &CommandStep) -> CommandOutput {
            self.calls.borrow_mut().push(step.command().to_string());

            if self.fail_labels.iter().any(|l| l == step.label()) {
                return CommandOutput::failed(1, format!("{} failed", step.label()));
            }

            let mut pending = self.converge_after.borrow_mut();
            if let Some((_, remaining)) = pending.iter_mut().find(|(l, _)| l == step.label()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return CommandOutput::failed(1, "");
                }
            }

            CommandOutput::succeeded()
        }
    }

    /// Sleeper that only records requested durations.
    #[derive(Default)]
    pub struct RecordingSleeper {
        pub slept: RefCell<Vec<Duration>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl RecordingSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fire `token` once `sleeps` sleeps have happened.
        pub fn cancelling_after(sleeps: usize, token: CancellationToken) -> Self {
            Self {
                slept: RefCell::new(Vec::new()),
                cancel_after: Some((sleeps, token)),
            }
        }

        pub fn total(&self) -> Duration {
            self.slept.borrow().iter().sum()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
            if let Some((after, token)) = &self.cancel_after {
                if self.slept.borrow().len() >= *after {
                    token.cancel();
                }
            }
        }
    }
}
