use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidValue,
    ConfigInvalidJson,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,

    EnvironmentUnavailable,

    StepFailed,
    StepCancelled,

    SourceUnreachable,
    SourceMalformed,

    SelectionInvalid,

    ArtifactMalformed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::EnvironmentUnavailable => "environment.unavailable",

            ErrorCode::StepFailed => "step.failed",
            ErrorCode::StepCancelled => "step.cancelled",

            ErrorCode::SourceUnreachable => "source.unreachable",
            ErrorCode::SourceMalformed => "source.malformed",

            ErrorCode::SelectionInvalid => "selection.invalid",

            ErrorCode::ArtifactMalformed => "artifact.malformed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailedDetails {
    /// 1-based position of the failing step in its pipeline.
    pub step: usize,
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetails {
    pub source: String,
    pub location: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInvalidDetails {
    pub parameter: String,
    pub value: String,
    pub allowed: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let details = to_details(ConfigMissingKeyDetails {
            key: key.into(),
            path,
        });

        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = serde_json::json!({
            "path": path.into(),
            "error": err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn environment_unavailable(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::EnvironmentUnavailable,
            "Unable to gather build environment variables",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn step_failed(details: StepFailedDetails) -> Self {
        let message = format!("Step {} failed: {}", details.step, details.command);
        Self::new(ErrorCode::StepFailed, message, to_details(details))
    }

    pub fn step_cancelled(step: usize, command: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::StepCancelled,
            "Build interrupted",
            serde_json::json!({ "step": step, "command": command.into() }),
        )
    }

    pub fn source_unreachable(
        source: impl Into<String>,
        location: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let message = format!("Unable to reach {} source", source);
        let details = to_details(SourceDetails {
            source,
            location: location.into(),
            error: error.into(),
        });

        Self::new(ErrorCode::SourceUnreachable, message, details).with_retryable(true)
    }

    pub fn source_malformed(
        source: impl Into<String>,
        location: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let message = format!("Unable to parse {} listing", source);
        let details = to_details(SourceDetails {
            source,
            location: location.into(),
            error: error.into(),
        });

        Self::new(ErrorCode::SourceMalformed, message, details)
    }

    pub fn selection_invalid(
        parameter: impl Into<String>,
        value: impl Into<String>,
        allowed: Vec<String>,
    ) -> Self {
        let value = value.into();
        let message = format!("Illegal choice: {}", value);
        let details = to_details(SelectionInvalidDetails {
            parameter: parameter.into(),
            value,
            allowed,
        });

        Self::new(ErrorCode::SelectionInvalid, message, details)
            .with_hint("Run 'buildstep param refresh' to see the current choices")
    }

    pub fn artifact_malformed(path: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ArtifactMalformed,
            "Artifact's POM.xml file is malformed.  Aborting deployment...",
            serde_json::json!({ "path": path.into(), "problem": problem.into() }),
        )
        .with_hint("Check the POM to ensure the correct tag is being used: [svnRevision]")
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}
