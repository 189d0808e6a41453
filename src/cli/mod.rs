//! CLI module for pcsctl
//!
//! Subcommands:
//! - `pcsctl resource` - Converge one cluster resource to the declared state
//! - `pcsctl wait-for` - Wait for a resource to reach a state

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

use crate::config::WaitDefaults;
use crate::resource::{DesiredState, ResourceClass, ResourceSpec};
use crate::wait::{WaitSpec, WaitState};

#[derive(Parser, Debug)]
#[command(name = "pcsctl")]
#[command(about = "Converge pacemaker cluster resources through pcs")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.pcsctl/config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Report what would change without changing anything
    #[arg(long, global = true)]
    pub check: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, update or delete a cluster resource
    Resource(ResourceArgs),

    /// Wait for a resource to reach a state
    WaitFor(WaitForArgs),
}

/// Arguments for the resource command
#[derive(Parser, Debug)]
pub struct ResourceArgs {
    /// Resource id in the cluster
    #[arg(long)]
    pub name: String,

    #[arg(long, value_enum, default_value_t = DesiredState::Present)]
    pub state: DesiredState,

    #[arg(long = "class", value_enum, default_value_t = ResourceClass::Ocf)]
    pub resource_class: ResourceClass,

    /// Resource agent, e.g. ocf:pacemaker:Dummy (required unless absent)
    #[arg(long = "type", value_name = "TYPE")]
    pub resource_type: Option<String>,

    /// Extra arguments for `pcs resource create`, e.g. "ip=10.0.0.5 op monitor interval=10"
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub options: String,

    /// Push only the resources section (default: true for master/promotable)
    #[arg(long, value_name = "BOOL")]
    pub force_resource_update: Option<bool>,

    /// Work on a CIB file instead of the live cluster
    #[arg(long, value_name = "FILE")]
    pub cib_file: Option<PathBuf>,

    /// Name of the primitive inside a master/promotable resource (default: <name>-child)
    #[arg(long)]
    pub child_name: Option<String>,

    /// Meta attribute to leave out of the comparison (repeatable)
    #[arg(long = "ignored-meta-attribute", value_name = "NAME")]
    pub ignored_meta_attributes: Vec<String>,
}

impl ResourceArgs {
    pub fn to_spec(&self) -> ResourceSpec {
        let mut spec = ResourceSpec::new(&self.name)
            .with_state(self.state)
            .with_class(self.resource_class)
            .with_options(&self.options)
            .with_force_update(self.force_resource_update)
            .ignoring(self.ignored_meta_attributes.iter().cloned());
        if let Some(ref resource_type) = self.resource_type {
            spec = spec.with_type(resource_type);
        }
        if let Some(ref child_name) = self.child_name {
            spec = spec.with_child_name(child_name);
        }
        if let Some(ref path) = self.cib_file {
            spec = spec.with_cib_file(path);
        }
        spec
    }
}

/// Arguments for the wait-for command
#[derive(Parser, Debug)]
pub struct WaitForArgs {
    /// Resource id; for clones use the primitive's id
    #[arg(long)]
    pub resource: String,

    #[arg(long, value_enum, default_value_t = WaitState::Present)]
    pub state: WaitState,

    /// Seconds to wait before the first check
    #[arg(long)]
    pub delay: Option<u64>,

    /// Seconds to keep checking after the delay
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between checks
    #[arg(long)]
    pub sleep: Option<u64>,

    /// Node the state must hold on (repeatable)
    #[arg(long = "node", value_name = "NODE")]
    pub nodes: Vec<String>,
}

impl WaitForArgs {
    /// Build the wait spec, taking unset timings from `defaults`
    pub fn to_spec(&self, defaults: &WaitDefaults) -> WaitSpec {
        let defaults = WaitDefaults {
            delay: self.delay.unwrap_or(defaults.delay),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            sleep: self.sleep.unwrap_or(defaults.sleep),
        };
        WaitSpec::with_defaults(&self.resource, self.state, &defaults).on_nodes(self.nodes.iter().cloned())
    }
}
