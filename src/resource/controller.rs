//! Convergence controller
//!
//! One pass: read the CIB, find the resource, decide what has to happen and
//! do it. Decisions are made in [`Reconciler::inspect`]; everything that
//! changes the cluster happens afterwards and is skipped in check mode.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::commands::{create_args, delete_args, rollback_args};
use super::naming::{naming_for, MultistateNaming, PcsVersion};
use super::normalize::{compare, normalize, ResourceDiff};
use super::simulate::{SimulationError, Simulator};
use super::spec::{DesiredState, ResourceSpec, ValidationError};
use crate::cib::{locate_mut, locate_path, CibError, ConfigDocument, ConfigElement, ElementPath};
use crate::gateway::{CommandFailure, CommandOutput, CommandRunner, Gateway, GatewayError, PushScope};
use crate::report::ErrorReport;

/// stderr of a create that lost a race with a CIB update (seen on EL6);
/// such a create is retried once
pub const CIB_TIMER_EXPIRED_SIGNATURE: &str = "Call cib_replace failed (-62): Timer expired";

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Cib(#[from] CibError),

    #[error("Unrecognized 'pcs --version' output '{0}'")]
    UnknownToolVersion(String),

    #[error("Failed to create resource, {0}")]
    Create(CommandFailure),

    #[error("Failed to delete resource, {0}")]
    Delete(CommandFailure),

    #[error("Failed to detect multistate resource '{wrapper_id}' after creating it with '{command}'")]
    WrapperMissing {
        wrapper_id: String,
        command: String,
        output: CommandOutput,
    },

    #[error("Resource '{0}' disappeared from the CIB while it was being updated")]
    ResourceVanished(String),

    #[error("Failed to push updated configuration to cluster: {0}")]
    Push(GatewayError),

    #[error(
        "Failed to push updated configuration for multistate resource: {push}. \
         Creation of multistate resource was rolled back. \
         You can retry with force_resource_update=true to see if that helps."
    )]
    PushRolledBack { push: GatewayError },

    #[error(
        "Failed to push updated configuration for multistate resource: {push}. \
         Rolling back the creation failed as well: {rollback}"
    )]
    RollbackFailed {
        push: GatewayError,
        rollback: GatewayError,
    },
}

impl ReconcileError {
    /// Flatten into the reported error, keeping the failing command and its
    /// output.
    pub fn report(&self) -> ErrorReport {
        let report = ErrorReport::new(self.to_string());
        match self {
            Self::Create(failure) | Self::Delete(failure) => report.with_failure(failure),
            Self::Gateway(err) | Self::Push(err) => with_gateway_failure(report, err),
            Self::Simulation(SimulationError::CommandFailed(failure)) => report.with_failure(failure),
            Self::Simulation(SimulationError::Gateway(err)) => with_gateway_failure(report, err),
            Self::Simulation(SimulationError::WrapperMissing { command, output, .. })
            | Self::WrapperMissing { command, output, .. } => report.with_output(command, output),
            Self::PushRolledBack { push } => with_gateway_failure(report, push).with_rollback(true),
            Self::RollbackFailed { rollback, .. } => {
                with_gateway_failure(report, rollback).with_rollback(false)
            }
            _ => report,
        }
    }
}

fn with_gateway_failure(report: ErrorReport, err: &GatewayError) -> ErrorReport {
    match err.failure() {
        Some(failure) => report.with_failure(failure),
        None => report,
    }
}

/// Outcome of one reconciliation pass, as reported to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvergenceResult {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<ResourceDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl ConvergenceResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn changed(diff: Option<ResourceDiff>) -> Self {
        Self {
            changed: true,
            diff,
            error: None,
        }
    }

    pub fn failed(error: ErrorReport) -> Self {
        Self {
            changed: false,
            diff: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// What a pass decided to do
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    CreateNeeded,
    UpdateNeeded {
        /// Position of the live resource below `configuration/resources`
        path: ElementPath,
        /// Normalized simulated resource that replaces it
        target: ConfigElement,
        diff: ResourceDiff,
    },
    DeleteNeeded,
    NoOpPresent,
    NoOpAbsent,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateNeeded => "create",
            Self::UpdateNeeded { .. } => "update",
            Self::DeleteNeeded => "delete",
            Self::NoOpPresent => "none (present)",
            Self::NoOpAbsent => "none (absent)",
        }
    }
}

pub struct Reconciler<'a, R> {
    gateway: &'a Gateway<R>,
    check_mode: bool,
    primitive_push_scope: PushScope,
}

impl<'a, R: CommandRunner> Reconciler<'a, R> {
    pub fn new(gateway: &'a Gateway<R>) -> Self {
        Self {
            gateway,
            check_mode: false,
            primitive_push_scope: PushScope::All,
        }
    }

    /// Decide and report, but change nothing
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Push scope for non-multistate resources without an explicit choice
    pub fn with_primitive_push_scope(mut self, scope: PushScope) -> Self {
        self.primitive_push_scope = scope;
        self
    }

    /// Run one pass and fold any error into the result.
    pub fn reconcile(&self, spec: &ResourceSpec) -> ConvergenceResult {
        match self.converge(spec) {
            Ok(result) => result,
            Err(err) => {
                error!("Reconciling '{}' failed: {}", spec.name, err);
                ConvergenceResult::failed(err.report())
            }
        }
    }

    pub fn converge(&self, spec: &ResourceSpec) -> Result<ConvergenceResult, ReconcileError> {
        spec.validate()?;

        let naming = if spec.class.is_multistate() && spec.state == DesiredState::Present {
            Some(self.detect_naming()?)
        } else {
            None
        };

        let mut doc = self.gateway.fetch(&spec.target)?;
        let transition = self.inspect(spec, &doc, naming)?;
        info!(
            "Resource '{}': {}{}",
            spec.name,
            transition.name(),
            if self.check_mode { " (check mode)" } else { "" }
        );

        match transition {
            Transition::NoOpPresent | Transition::NoOpAbsent => Ok(ConvergenceResult::unchanged()),
            Transition::CreateNeeded => {
                if !self.check_mode {
                    self.create(spec, naming)?;
                }
                Ok(ConvergenceResult::changed(None))
            }
            Transition::DeleteNeeded => {
                if !self.check_mode {
                    self.delete(spec)?;
                }
                Ok(ConvergenceResult::changed(None))
            }
            Transition::UpdateNeeded { path, target, diff } => {
                if !self.check_mode {
                    self.update(spec, &mut doc, &path, target)?;
                }
                Ok(ConvergenceResult::changed(Some(diff)))
            }
        }
    }

    fn detect_naming(&self) -> Result<&'static dyn MultistateNaming, ReconcileError> {
        let raw = self.gateway.pcs_version()?;
        let version =
            PcsVersion::parse(&raw).ok_or_else(|| ReconcileError::UnknownToolVersion(raw.trim().to_string()))?;
        info!("Detected pcs {}.{}", version.major, version.minor);
        Ok(naming_for(version))
    }

    /// Work out which transition `doc` needs for `spec`. For a resource that
    /// should exist and does, this simulates the declared resource and diffs
    /// it against the live one.
    pub fn inspect(
        &self,
        spec: &ResourceSpec,
        doc: &ConfigDocument,
        naming: Option<&dyn MultistateNaming>,
    ) -> Result<Transition, ReconcileError> {
        let resources = doc.resources()?;
        let existing = locate_path(resources, &spec.name)
            .and_then(|path| resources.element_at(&path).map(|elem| (path, elem)));

        let transition = match (spec.state, existing) {
            (DesiredState::Present, None) => Transition::CreateNeeded,
            (DesiredState::Absent, Some(_)) => Transition::DeleteNeeded,
            (DesiredState::Absent, None) => Transition::NoOpAbsent,
            (DesiredState::Present, Some((path, live))) => {
                let mut target = Simulator::new(self.gateway).simulate(spec, naming)?;
                let mut live = live.clone();
                normalize(&mut live, &spec.ignored_meta_attributes);
                normalize(&mut target, &spec.ignored_meta_attributes);

                match compare(&live, &target).diff {
                    None => Transition::NoOpPresent,
                    Some(diff) => Transition::UpdateNeeded { path, target, diff },
                }
            }
        };
        Ok(transition)
    }

    fn create(
        &self,
        spec: &ResourceSpec,
        naming: Option<&dyn MultistateNaming>,
    ) -> Result<(), ReconcileError> {
        let args = create_args(spec, spec.target.file())?;
        let (mut command, mut output) = self.gateway.pcs(args.clone())?;
        if !output.is_success() && output.stderr.contains(CIB_TIMER_EXPIRED_SIGNATURE) {
            warn!("CIB timer expired while creating '{}', retrying once", spec.name);
            (command, output) = self.gateway.pcs(args)?;
        }
        if !output.is_success() {
            return Err(ReconcileError::Create(CommandFailure::new(command, output)));
        }
        info!("Created resource '{}'", spec.name);

        match naming {
            Some(naming) if spec.class.is_multistate() => {
                self.finish_multistate_create(spec, naming, command, output)
            }
            _ => Ok(()),
        }
    }

    /// pcs created the resource as `<child>` inside a generated wrapper;
    /// rename the wrapper to the resource name and store the result. If the
    /// store fails, the half-made resource is deleted again.
    fn finish_multistate_create(
        &self,
        spec: &ResourceSpec,
        naming: &dyn MultistateNaming,
        command: String,
        output: CommandOutput,
    ) -> Result<(), ReconcileError> {
        let mut doc = self.gateway.fetch(&spec.target)?;
        let wrapper_id = naming.wrapper_id(&spec.child_name);
        let wrapper = locate_mut(doc.resources_mut()?, &wrapper_id).ok_or_else(|| {
            ReconcileError::WrapperMissing {
                wrapper_id: wrapper_id.clone(),
                command,
                output,
            }
        })?;
        naming.rename(wrapper, &spec.name, &spec.child_name);
        info!("Renaming multistate wrapper '{}' to '{}'", wrapper_id, spec.name);

        let scope = spec.push_scope(self.primitive_push_scope);
        let Err(push) = self.gateway.apply(&doc, &spec.target, scope) else {
            return Ok(());
        };

        warn!(
            "Storing renamed multistate resource '{}' failed, deleting '{}'",
            spec.name, spec.child_name
        );
        match self
            .gateway
            .pcs_checked(rollback_args(spec, spec.target.file()))
        {
            Ok(_) => Err(ReconcileError::PushRolledBack { push }),
            Err(rollback) => Err(ReconcileError::RollbackFailed { push, rollback }),
        }
    }

    fn update(
        &self,
        spec: &ResourceSpec,
        doc: &mut ConfigDocument,
        path: &ElementPath,
        target: ConfigElement,
    ) -> Result<(), ReconcileError> {
        doc.resources_mut()?
            .element_at_mut(path)
            .ok_or_else(|| ReconcileError::ResourceVanished(spec.name.clone()))?
            .replace_subtree(target);

        let scope = spec.push_scope(self.primitive_push_scope);
        self.gateway
            .apply(doc, &spec.target, scope)
            .map_err(ReconcileError::Push)?;
        info!("Updated resource '{}'", spec.name);
        Ok(())
    }

    fn delete(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        let (command, output) = self
            .gateway
            .pcs(delete_args(spec, spec.target.file()))?;
        if !output.is_success() {
            return Err(ReconcileError::Delete(CommandFailure::new(command, output)));
        }
        info!("Deleted resource '{}'", spec.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolPaths;
    use crate::gateway::mock::MockRunner;
    use crate::gateway::CibTarget;
    use crate::resource::spec::ResourceClass;

    const CIB: &str = r#"<cib><configuration><resources>
  <primitive id="vip" class="ocf" provider="heartbeat" type="IPaddr2"/>
</resources></configuration></cib>"#;

    fn doc() -> ConfigDocument {
        ConfigDocument::parse(CIB).unwrap()
    }

    #[test]
    fn test_inspect_without_simulation() {
        let gw = Gateway::new(MockRunner::new(), ToolPaths::default());
        let reconciler = Reconciler::new(&gw);

        let create = ResourceSpec::new("web").with_type("ocf:heartbeat:apache");
        assert_eq!(reconciler.inspect(&create, &doc(), None).unwrap(), Transition::CreateNeeded);

        let delete = ResourceSpec::new("vip").with_state(DesiredState::Absent);
        assert_eq!(reconciler.inspect(&delete, &doc(), None).unwrap(), Transition::DeleteNeeded);

        let gone = ResourceSpec::new("web").with_state(DesiredState::Absent);
        assert_eq!(reconciler.inspect(&gone, &doc(), None).unwrap(), Transition::NoOpAbsent);

        assert!(gw.runner().executed_commands().is_empty());
    }

    #[test]
    fn test_check_mode_skips_delete() {
        let gw = Gateway::new(
            MockRunner::new().reply(CommandOutput::success(CIB)),
            ToolPaths::default(),
        );
        let spec = ResourceSpec::new("vip").with_state(DesiredState::Absent);
        let result = Reconciler::new(&gw).with_check_mode(true).reconcile(&spec);
        assert!(result.changed);
        assert_eq!(gw.runner().executed_commands().len(), 1);
    }

    #[test]
    fn test_validation_error_runs_nothing() {
        let gw = Gateway::new(MockRunner::new(), ToolPaths::default());
        let result = Reconciler::new(&gw).reconcile(&ResourceSpec::new("x"));
        assert!(result.is_failure());
        assert!(!result.changed);
        assert_eq!(
            result.error.unwrap().msg,
            "When creating cluster resource you must specify the resource_type"
        );
        assert!(gw.runner().executed_commands().is_empty());
    }

    #[test]
    fn test_unknown_pcs_version() {
        let gw = Gateway::new(
            MockRunner::new().reply(CommandOutput::success("unknown\n")),
            ToolPaths::default(),
        );
        let spec = ResourceSpec::new("db")
            .with_class(ResourceClass::Promotable)
            .with_type("ocf:pacemaker:Stateful")
            .with_options("promotable");
        let err = Reconciler::new(&gw).converge(&spec).unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownToolVersion(ref raw) if raw == "unknown"));
    }

    #[test]
    fn test_missing_cib_file_is_reported() {
        let gw = Gateway::new(MockRunner::new(), ToolPaths::default());
        let spec = ResourceSpec::new("vip")
            .with_state(DesiredState::Absent)
            .with_cib_file("/nonexistent/cib.xml");
        assert_eq!(spec.target, CibTarget::File("/nonexistent/cib.xml".into()));
        let result = Reconciler::new(&gw).reconcile(&spec);
        assert!(result.error.unwrap().msg.contains("/nonexistent/cib.xml"));
    }

    #[test]
    fn test_report_for_rollback_failure() {
        let push = GatewayError::CommandFailed(CommandFailure::new(
            "pcs cluster cib-push /tmp/x.xml scope=resources",
            CommandOutput::failure(1, "push failed"),
        ));
        let rollback = GatewayError::CommandFailed(CommandFailure::new(
            "pcs resource delete db-child",
            CommandOutput::failure(1, "delete failed"),
        ));
        let report = ReconcileError::RollbackFailed { push, rollback }.report();
        assert_eq!(report.rolled_back, Some(false));
        assert_eq!(report.cmd.as_deref(), Some("pcs resource delete db-child"));
        assert!(report.msg.contains("push failed"));
        assert!(report.msg.contains("Rolling back the creation failed"));
    }
}
