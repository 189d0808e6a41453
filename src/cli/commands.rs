//! Command implementations for the CLI
//!
//! SBIO pattern: commands take a ready gateway and return a serializable
//! outcome; printing and exit codes are handled by the caller.

use serde::Serialize;

use crate::config::Settings;
use crate::gateway::{CommandRunner, Gateway};
use crate::report::ErrorReport;
use crate::resource::{ConvergenceResult, Reconciler};
use crate::wait::{Clock, Poller, WaitReport};

use super::{ResourceArgs, WaitForArgs};

/// Result of `wait-for`: the observations, plus the error when it failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WaitOutcome {
    #[serde(flatten)]
    pub report: WaitReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl WaitOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

pub fn resource_command<R: CommandRunner>(
    gateway: &Gateway<R>,
    settings: &Settings,
    args: &ResourceArgs,
    check_mode: bool,
) -> ConvergenceResult {
    Reconciler::new(gateway)
        .with_check_mode(check_mode)
        .with_primitive_push_scope(settings.primitive_push_scope)
        .reconcile(&args.to_spec())
}

/// Waiting only reads cluster state, so check mode changes nothing here.
pub fn wait_for_command<R: CommandRunner, C: Clock>(
    gateway: &Gateway<R>,
    clock: C,
    settings: &Settings,
    args: &WaitForArgs,
) -> WaitOutcome {
    let spec = args.to_spec(&settings.wait);
    match Poller::new(gateway).with_clock(clock).wait(&spec) {
        Ok(report) => WaitOutcome {
            report,
            error: None,
        },
        Err(err) => WaitOutcome {
            report: err.last_report().cloned().unwrap_or_default(),
            error: Some(err.report()),
        },
    }
}
