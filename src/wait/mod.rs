//! Waiting for a resource to reach a state
//!
//! Polls `crm_mon` until the resource is in the requested state on the
//! requested nodes or the timeout runs out. Never changes the cluster.

pub mod status;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::WaitDefaults;
use crate::gateway::{CommandRunner, Gateway, GatewayError};
use crate::report::ErrorReport;

pub use status::{evaluate, ClusterStatus, Evaluation, ResourceStatus, WaitState};

/// What to wait for, and for how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    pub resource: String,
    pub state: WaitState,
    /// Required nodes; empty means the per-state default
    pub nodes: BTreeSet<String>,
    pub delay: Duration,
    pub timeout: Duration,
    pub sleep: Duration,
}

impl WaitSpec {
    pub fn new(resource: impl Into<String>, state: WaitState) -> Self {
        Self::with_defaults(resource, state, &WaitDefaults::default())
    }

    pub fn with_defaults(resource: impl Into<String>, state: WaitState, defaults: &WaitDefaults) -> Self {
        Self {
            resource: resource.into(),
            state,
            nodes: BTreeSet::new(),
            delay: Duration::from_secs(defaults.delay),
            timeout: Duration::from_secs(defaults.timeout),
            sleep: Duration::from_secs(defaults.sleep),
        }
    }

    pub fn on_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes.extend(nodes.into_iter().map(Into::into));
        self
    }
}

/// What was observed, returned on success and attached to failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WaitReport {
    /// Waiting never changes anything
    pub changed: bool,
    /// Whole seconds since the first check
    pub elapsed: u64,
    pub cluster_nodes: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsc_active_node_set: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsc_inactive_node_set: Option<BTreeSet<String>>,
    /// Set for `present`/`absent` once reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WaitState>,
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("timeout")]
    Timeout { report: WaitReport },

    #[error("node_list contains a node that is not present in cluster.")]
    UnknownNode {
        nodes: BTreeSet<String>,
        report: WaitReport,
    },

    #[error("Failed to get current cluster state from crm_mon: {0}")]
    Status(#[from] GatewayError),
}

impl WaitError {
    pub fn report(&self) -> ErrorReport {
        let report = ErrorReport::new(self.to_string());
        match self {
            Self::Status(err) => match err.failure() {
                Some(failure) => report.with_failure(failure),
                None => report,
            },
            _ => report,
        }
    }

    /// Last observation before the failure, if any was made
    pub fn last_report(&self) -> Option<&WaitReport> {
        match self {
            Self::Timeout { report } | Self::UnknownNode { report, .. } => Some(report),
            Self::Status(_) => None,
        }
    }
}

/// Time source for the poll loop
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct Poller<'a, R, C = SystemClock> {
    gateway: &'a Gateway<R>,
    clock: C,
}

impl<'a, R: CommandRunner> Poller<'a, R> {
    pub fn new(gateway: &'a Gateway<R>) -> Self {
        Self {
            gateway,
            clock: SystemClock,
        }
    }
}

impl<'a, R: CommandRunner, C: Clock> Poller<'a, R, C> {
    pub fn with_clock<D: Clock>(self, clock: D) -> Poller<'a, R, D> {
        Poller {
            gateway: self.gateway,
            clock,
        }
    }

    fn status(&self) -> Result<ClusterStatus, WaitError> {
        Ok(ClusterStatus::from_document(&self.gateway.cluster_status()?))
    }

    /// Wait for the condition in `spec`.
    ///
    /// Cluster membership is read once, after the initial delay. The timeout
    /// counts from that point.
    pub fn wait(&self, spec: &WaitSpec) -> Result<WaitReport, WaitError> {
        if !spec.delay.is_zero() {
            debug!("Delaying first check by {:?}", spec.delay);
            self.clock.sleep(spec.delay);
        }

        let mut report = WaitReport {
            cluster_nodes: self.status()?.nodes,
            ..Default::default()
        };
        if !spec.nodes.is_subset(&report.cluster_nodes) {
            return Err(WaitError::UnknownNode {
                nodes: spec.nodes.clone(),
                report,
            });
        }

        let start = self.clock.now();
        // A timeout past what Instant can represent means no deadline
        let end = start.checked_add(spec.timeout);
        while end.map_or(true, |end| self.clock.now() < end) {
            let status = self.status()?;
            report.elapsed = self.clock.now().duration_since(start).as_secs();

            let eval = evaluate(
                &status,
                &spec.resource,
                spec.state,
                &spec.nodes,
                &report.cluster_nodes,
            );
            report.rsc_active_node_set = Some(eval.active_nodes);
            report.rsc_inactive_node_set = eval.inactive_nodes;

            if eval.satisfied {
                if matches!(spec.state, WaitState::Present | WaitState::Absent) {
                    report.state = Some(spec.state);
                }
                info!(
                    "Resource '{}' reached {} after {}s",
                    spec.resource, spec.state, report.elapsed
                );
                return Ok(report);
            }

            debug!("Resource '{}' not {} yet", spec.resource, spec.state);
            self.clock.sleep(spec.sleep);
        }

        Err(WaitError::Timeout { report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolPaths;
    use crate::gateway::mock::MockRunner;
    use crate::gateway::CommandOutput;
    use std::cell::{Cell, RefCell};

    /// Clock that only moves when slept on
    struct FakeClock {
        now: Cell<Instant>,
        slept: RefCell<Vec<Duration>>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
                slept: RefCell::new(Vec::new()),
            }
        }
    }

    impl Clock for &FakeClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
            self.now.set(self.now.get() + duration);
        }
    }

    fn crm_mon(resources: &str) -> CommandOutput {
        CommandOutput::success(format!(
            r#"<crm_mon><nodes><node name="node-a"/><node name="node-b"/></nodes><resources>{}</resources></crm_mon>"#,
            resources
        ))
    }

    const STARTED_ON_A: &str = r#"<resource id="vip" role="Started"><node name="node-a"/></resource>"#;
    const STOPPED: &str = r#"<resource id="vip" role="Stopped"/>"#;

    #[test]
    fn test_started_after_two_polls() {
        let gw = Gateway::new(
            MockRunner::new()
                .reply(crm_mon(STOPPED))
                .reply(crm_mon(STOPPED))
                .reply(crm_mon(STARTED_ON_A)),
            ToolPaths::default(),
        );
        let clock = FakeClock::new();
        let spec = WaitSpec::new("vip", WaitState::Started);
        let report = Poller::new(&gw).with_clock(&clock).wait(&spec).unwrap();

        assert_eq!(report.elapsed, 2);
        assert_eq!(report.rsc_active_node_set, Some(["node-a".to_string()].into()));
        assert_eq!(report.state, None);
        assert_eq!(*clock.slept.borrow(), vec![Duration::from_secs(2)]);
        assert_eq!(gw.runner().executed_commands()[0], vec!["crm_mon", "-1r", "--as-xml"]);
    }

    #[test]
    fn test_timeout_carries_last_report() {
        let mut runner = MockRunner::new();
        for _ in 0..10 {
            runner = runner.reply(crm_mon(STOPPED));
        }
        let gw = Gateway::new(runner, ToolPaths::default());
        let clock = FakeClock::new();
        let mut spec = WaitSpec::new("vip", WaitState::Started);
        spec.timeout = Duration::from_secs(5);
        spec.delay = Duration::from_secs(3);

        let err = Poller::new(&gw).with_clock(&clock).wait(&spec).unwrap_err();
        assert_eq!(err.to_string(), "timeout");
        let report = err.last_report().unwrap();
        assert_eq!(report.elapsed, 4);
        assert_eq!(report.cluster_nodes.len(), 2);
        // delay, then polls at 0, 2 and 4 seconds
        assert_eq!(clock.slept.borrow()[0], Duration::from_secs(3));
        assert_eq!(gw.runner().executed_commands().len(), 4);
    }

    #[test]
    fn test_unbounded_timeout_waits_until_satisfied() {
        let gw = Gateway::new(
            MockRunner::new()
                .reply(crm_mon(STOPPED))
                .reply(crm_mon(STOPPED))
                .reply(crm_mon(STARTED_ON_A)),
            ToolPaths::default(),
        );
        let clock = FakeClock::new();
        let mut spec = WaitSpec::new("vip", WaitState::Started);
        spec.timeout = Duration::from_secs(u64::MAX);

        let report = Poller::new(&gw).with_clock(&clock).wait(&spec).unwrap();
        assert_eq!(report.elapsed, 2);
        assert_eq!(gw.runner().executed_commands().len(), 3);
    }

    #[test]
    fn test_unknown_node_fails_immediately() {
        let gw = Gateway::new(MockRunner::new().reply(crm_mon(STARTED_ON_A)), ToolPaths::default());
        let clock = FakeClock::new();
        let spec = WaitSpec::new("vip", WaitState::Started).on_nodes(["node-z"]);
        let err = Poller::new(&gw).with_clock(&clock).wait(&spec).unwrap_err();
        assert!(matches!(err, WaitError::UnknownNode { .. }));
        assert!(clock.slept.borrow().is_empty());
        assert_eq!(gw.runner().executed_commands().len(), 1);
    }

    #[test]
    fn test_absent_reports_state() {
        let gw = Gateway::new(
            MockRunner::new().reply(crm_mon("")).reply(crm_mon("")),
            ToolPaths::default(),
        );
        let spec = WaitSpec::new("vip", WaitState::Absent);
        let report = Poller::new(&gw).with_clock(&FakeClock::new()).wait(&spec).unwrap();
        assert_eq!(report.state, Some(WaitState::Absent));
        assert!(!report.changed);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "absent");
    }

    #[test]
    fn test_crm_mon_failure() {
        let gw = Gateway::new(
            MockRunner::new().reply(CommandOutput::failure(102, "crm_mon: Connection refused")),
            ToolPaths::default(),
        );
        let err = Poller::new(&gw)
            .with_clock(&FakeClock::new())
            .wait(&WaitSpec::new("vip", WaitState::Present))
            .unwrap_err();
        let report = err.report();
        assert_eq!(report.rc, Some(102));
        assert_eq!(report.cmd.as_deref(), Some("crm_mon -1r --as-xml"));
    }
}
