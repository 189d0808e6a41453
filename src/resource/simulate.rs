//! Dry-run materialization of a resource declaration
//!
//! The declared resource is created with `pcs -f` against a scratch CIB file
//! that starts out absent, so pcs itself decides what the resource looks like
//! (default operations, generated ids, wrappers). The result is what the live
//! resource is compared against.

use thiserror::Error;
use tracing::debug;

use super::commands::create_args;
use super::naming::MultistateNaming;
use super::spec::{ResourceSpec, ValidationError};
use crate::cib::{locate, locate_mut, CibError, ConfigElement};
use crate::gateway::{CommandFailure, CommandOutput, CommandRunner, Gateway, GatewayError};

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Unable to simulate resource with given definition, {0}")]
    CommandFailed(CommandFailure),

    #[error("Failed to detect intermediate multistate resource '{wrapper_id}' after creating it with '{command}'")]
    WrapperMissing {
        wrapper_id: String,
        command: String,
        output: CommandOutput,
    },

    #[error("Unable to find simulated resource '{name}' after running '{command}'")]
    ResourceMissing { name: String, command: String },

    #[error("Failed to prepare scratch CIB: {0}")]
    Scratch(#[source] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Cib(#[from] CibError),
}

pub struct Simulator<'a, R> {
    gateway: &'a Gateway<R>,
}

impl<'a, R: CommandRunner> Simulator<'a, R> {
    pub fn new(gateway: &'a Gateway<R>) -> Self {
        Self { gateway }
    }

    /// Build the resource `spec` describes in an isolated CIB and return it.
    ///
    /// `naming` must be given for multistate classes; the generated wrapper is
    /// renamed to `spec.name` the same way a real create would be.
    pub fn simulate(
        &self,
        spec: &ResourceSpec,
        naming: Option<&dyn MultistateNaming>,
    ) -> Result<ConfigElement, SimulationError> {
        // The file must not exist beforehand so pcs starts from an empty CIB.
        // The directory and everything in it go away on every return path.
        let scratch_dir = tempfile::Builder::new()
            .prefix("pcsctl-sim-")
            .tempdir()
            .map_err(SimulationError::Scratch)?;
        let scratch = scratch_dir.path().join("cib.xml");

        let (command, output) = self.gateway.pcs(create_args(spec, Some(&scratch))?)?;
        if !output.is_success() {
            return Err(SimulationError::CommandFailed(CommandFailure::new(command, output)));
        }

        let mut doc = self.gateway.fetch_file_config(&scratch)?;
        let resources = doc.resources_mut()?;

        if let (true, Some(naming)) = (spec.class.is_multistate(), naming) {
            let wrapper_id = naming.wrapper_id(&spec.child_name);
            let wrapper = locate_mut(resources, &wrapper_id).ok_or_else(|| {
                SimulationError::WrapperMissing {
                    wrapper_id: wrapper_id.clone(),
                    command: command.clone(),
                    output: output.clone(),
                }
            })?;
            naming.rename(wrapper, &spec.name, &spec.child_name);
            debug!("Renamed simulated wrapper '{}' to '{}'", wrapper_id, spec.name);
        }

        locate(resources, &spec.name)
            .cloned()
            .ok_or_else(|| SimulationError::ResourceMissing {
                name: spec.name.clone(),
                command,
            })
    }
}
