use serde::Deserialize;

use super::{expanded_path, require_field, run_planned, BuildContext, BuildStep, Resource, StepKind};
use crate::defaults::Defaults;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, PipelineRun, Settle};
use crate::template::{CommandTemplate, Substitutions};

const HEARTBEAT_FILE: &str = "heartbeat.gif";
const HEARTBEAT_TYPE: &str = "HEARTBEAT";
const ADD_ACTION: &str = "ADD";
const REMOVE_ACTION: &str = "REMOVE";

const REMOVE_HEARTBEAT: CommandTemplate = CommandTemplate::new(
    "remove-heartbeat",
    "del \"{webAppRootDirectory}\\heartbeat.gif\"",
);

/// 1x1 transparent GIF served as the load balancer's health check.
const HEARTBEAT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Put a web node into, or take it out of, a heartbeat-checked load balancer pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalance {
    pub action: String,
    #[serde(rename = "type")]
    pub balancing_type: String,
    pub web_app_root_directory: String,
}

impl LoadBalance {
    fn validate(&self) -> Result<()> {
        require_field(&self.web_app_root_directory, "webAppRootDirectory")?;

        if self.balancing_type != HEARTBEAT_TYPE {
            return Err(Error::config_invalid_value(
                "type",
                Some(self.balancing_type.clone()),
                "Unsupported Load Balancing Type.",
            ));
        }

        if self.action != ADD_ACTION && self.action != REMOVE_ACTION {
            return Err(Error::validation_invalid_argument(
                "action",
                format!("Expected {} or {}", ADD_ACTION, REMOVE_ACTION),
                Some(self.action.clone()),
                None,
            ));
        }

        Ok(())
    }

    fn is_add(&self) -> bool {
        self.action == ADD_ACTION
    }
}

impl BuildStep for LoadBalance {
    fn kind(&self) -> StepKind {
        StepKind::LoadBalance
    }

    fn plan(&self, env: &Environment, defaults: &Defaults) -> Result<Pipeline> {
        self.validate()?;

        if self.is_add() {
            return Ok(Pipeline::new());
        }

        let subs = Substitutions::new().with("webAppRootDirectory", &self.web_app_root_directory);
        Ok(Pipeline::new().then_settled(
            REMOVE_HEARTBEAT.resolve(&subs, env),
            Settle::pause(defaults.poll.load_balancer_pause()),
        ))
    }

    fn resources(&self, env: &Environment) -> Result<Vec<Resource>> {
        if !self.is_add() {
            return Ok(Vec::new());
        }

        let path = expanded_path(env, &self.web_app_root_directory).join(HEARTBEAT_FILE);
        Ok(vec![Resource::new(path, HEARTBEAT_GIF)])
    }

    /// Adding has no command to settle after, so the pause follows the file write directly.
    fn execute(&self, ctx: &BuildContext<'_>) -> Result<PipelineRun> {
        let run = run_planned(self, ctx)?;

        if self.is_add() {
            ctx.pause(ctx.defaults.poll.load_balancer_pause(), "load balancer pickup")?;
        }

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{RecordingSleeper, SpyExecutor};
    use std::time::Duration;

    fn step(action: &str, kind: &str, root: &str) -> LoadBalance {
        LoadBalance {
            action: action.to_string(),
            balancing_type: kind.to_string(),
            web_app_root_directory: root.to_string(),
        }
    }

    #[test]
    fn add_writes_heartbeat_then_pauses() {
        let root = tempfile::tempdir().unwrap();
        let env = Environment::new().with("WEB_ROOT", root.path().display().to_string());
        let spy = SpyExecutor::new();
        let sleeper = RecordingSleeper::new();
        let ctx = BuildContext::new(env, &spy).with_sleeper(&sleeper);

        let run = step("ADD", "HEARTBEAT", "${WEB_ROOT}").execute(&ctx).unwrap();

        assert!(run.succeeded());
        let written = std::fs::read(root.path().join("heartbeat.gif")).unwrap();
        assert!(written.starts_with(b"GIF89a"));
        assert!(spy.commands().is_empty());
        assert_eq!(*sleeper.slept.borrow(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn remove_deletes_then_pauses() {
        let spy = SpyExecutor::new();
        let sleeper = RecordingSleeper::new();
        let ctx = BuildContext::new(Environment::new(), &spy).with_sleeper(&sleeper);

        let run = step("REMOVE", "HEARTBEAT", "D:\\www\\portal")
            .execute(&ctx)
            .unwrap();

        assert!(run.succeeded());
        assert_eq!(spy.commands(), vec!["del \"D:\\www\\portal\\heartbeat.gif\""]);
        assert_eq!(sleeper.total(), Duration::from_secs(30));
    }

    #[test]
    fn failed_remove_does_not_pause() {
        let spy = SpyExecutor::failing(&["remove-heartbeat"]);
        let sleeper = RecordingSleeper::new();
        let ctx = BuildContext::new(Environment::new(), &spy).with_sleeper(&sleeper);

        let run = step("REMOVE", "HEARTBEAT", "D:\\www\\portal")
            .execute(&ctx)
            .unwrap();

        assert_eq!(run.failed_step(), Some(1));
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[test]
    fn unsupported_type_is_a_config_error() {
        let err = step("ADD", "COOKIE", "/www")
            .plan(&Environment::new(), &Defaults::default())
            .unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
        assert_eq!(err.details["problem"], "Unsupported Load Balancing Type.");
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(step("TOGGLE", "HEARTBEAT", "/www")
            .plan(&Environment::new(), &Defaults::default())
            .is_err());
    }
}
