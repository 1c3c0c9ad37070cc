use serde::Deserialize;

use super::{require_field, BuildStep, StepKind};
use crate::defaults::Defaults;
use crate::environment::Environment;
use crate::error::Result;
use crate::pipeline::{Pipeline, Settle};
use crate::template::{CommandTemplate, Substitutions};

const CONTROL_SERVICE: CommandTemplate =
    CommandTemplate::new("control-service", "sc {server} {action} {service}");

const QUERY_SERVICE: CommandTemplate = CommandTemplate::new(
    "query-service",
    "sc {server} query {service} | FIND \"STATE\" | FIND \"{state}\"",
);

const ACTION_START: &str = "start";
const STATE_RUNNING: &str = "RUNNING";
const STATE_STOPPED: &str = "STOPPED";

/// Start or stop a Windows service on a remote host and wait for it to settle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceControl {
    pub server: String,
    pub service_name: String,
    pub action: String,
}

impl ServiceControl {
    /// State the query waits for: RUNNING after `start`, STOPPED after anything else.
    pub fn target_state(&self) -> &'static str {
        if self.action == ACTION_START {
            STATE_RUNNING
        } else {
            STATE_STOPPED
        }
    }
}

impl BuildStep for ServiceControl {
    fn kind(&self) -> StepKind {
        StepKind::ServiceControl
    }

    fn plan(&self, env: &Environment, defaults: &Defaults) -> Result<Pipeline> {
        require_field(&self.server, "server")?;
        require_field(&self.service_name, "serviceName")?;
        require_field(&self.action, "action")?;

        let subs = Substitutions::new()
            .with("server", format!("\\\\{}", self.server))
            .with("action", &self.action)
            .with("service", &self.service_name)
            .with("state", self.target_state());

        let settle = Settle::poll(
            QUERY_SERVICE.resolve(&subs, env),
            defaults.poll.service_interval(),
        )
        .with_timeout(defaults.poll.timeout());

        Ok(Pipeline::new().then_settled(CONTROL_SERVICE.resolve(&subs, env), settle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{RecordingSleeper, SpyExecutor};
    use crate::pipeline::RunState;
    use crate::steps::BuildContext;
    use std::time::Duration;

    fn step(action: &str) -> ServiceControl {
        ServiceControl {
            server: "web01".to_string(),
            service_name: "Tomcat6".to_string(),
            action: action.to_string(),
        }
    }

    #[test]
    fn start_waits_for_running() {
        let pipeline = step("start")
            .plan(&Environment::new(), &Defaults::default())
            .unwrap();
        let entry = &pipeline.entries()[0];

        assert_eq!(entry.step.command(), "sc \\\\web01 start Tomcat6");
        match entry.settle.as_ref().unwrap() {
            Settle::Poll {
                query,
                interval,
                timeout,
            } => {
                assert_eq!(
                    query.command(),
                    "sc \\\\web01 query Tomcat6 | FIND \"STATE\" | FIND \"RUNNING\""
                );
                assert_eq!(*interval, Duration::from_secs(15));
                assert_eq!(*timeout, None);
            }
            other => panic!("unexpected settle rule: {:?}", other),
        }
    }

    #[test]
    fn any_other_action_waits_for_stopped() {
        assert_eq!(step("stop").target_state(), "STOPPED");
        assert_eq!(step("pause").target_state(), "STOPPED");
    }

    #[test]
    fn polls_until_service_reports_state() {
        let spy = SpyExecutor::new().converging("query-service", 2);
        let sleeper = RecordingSleeper::new();
        let ctx = BuildContext::new(Environment::new(), &spy).with_sleeper(&sleeper);

        let run = step("stop").execute(&ctx).unwrap();

        assert!(run.succeeded());
        assert_eq!(spy.commands().len(), 4);
        assert_eq!(sleeper.total(), Duration::from_secs(30));
    }

    #[test]
    fn configured_timeout_bounds_the_wait() {
        let spy = SpyExecutor::new().converging("query-service", u32::MAX);
        let sleeper = RecordingSleeper::new();
        let mut defaults = Defaults::default();
        defaults.poll.timeout_secs = Some(60);
        let ctx = BuildContext::new(Environment::new(), &spy)
            .with_sleeper(&sleeper)
            .with_defaults(defaults);

        let run = step("start").execute(&ctx).unwrap();

        assert_eq!(run.state, RunState::Failed(1));
        assert!(run.steps[0].timed_out);
    }
}
