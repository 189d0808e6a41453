//! Structured error payload shared by every command's JSON output

use serde::Serialize;

use crate::gateway::{CommandFailure, CommandOutput};

/// What went wrong, with the failing command and its output verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Set when a partial change had to be undone: whether undoing worked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolled_back: Option<bool>,
}

impl ErrorReport {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            ..Default::default()
        }
    }

    pub fn with_failure(mut self, failure: &CommandFailure) -> Self {
        self.cmd = Some(failure.command.clone());
        self.rc = Some(failure.exit_code);
        self.stdout = Some(failure.stdout.clone());
        self.stderr = Some(failure.stderr.clone());
        self
    }

    pub fn with_output(mut self, command: &str, output: &CommandOutput) -> Self {
        self.cmd = Some(command.to_string());
        self.rc = Some(output.exit_code);
        self.stdout = Some(output.stdout.clone());
        self.stderr = Some(output.stderr.clone());
        self
    }

    pub fn with_rollback(mut self, succeeded: bool) -> Self {
        self.rolled_back = Some(succeeded);
        self
    }
}
