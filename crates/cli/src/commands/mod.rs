pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Machine-readable outcome printed by the mutating commands. `details`
/// carries command-specific structure (migration versions, seed counts) so
/// scripts do not have to parse the human message.
#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        Self::from_outcome(
            CommandOutcome {
                command,
                status: "ok",
                error_class: None,
                message: message.into(),
                details: None,
            },
            0,
        )
    }

    pub fn success_with_details(
        command: &'static str,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::from_outcome(
            CommandOutcome {
                command,
                status: "ok",
                error_class: None,
                message: message.into(),
                details: Some(details),
            },
            0,
        )
    }

    pub fn failure(
        command: &'static str,
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::from_outcome(
            CommandOutcome {
                command,
                status: "error",
                error_class: Some(error_class),
                message: message.into(),
                details: None,
            },
            exit_code,
        )
    }

    fn from_outcome(outcome: CommandOutcome, exit_code: u8) -> Self {
        let output = serde_json::to_string(&outcome).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        Self { exit_code, output }
    }
}
