//! Resource convergence
//!
//! A [`ResourceSpec`] describes one resource the way the operator wants it.
//! The [`Reconciler`] compares that against the CIB and creates, updates or
//! deletes the resource with `pcs` until they agree.

pub mod commands;
pub mod controller;
pub mod naming;
pub mod normalize;
pub mod simulate;
pub mod spec;

pub use controller::{ConvergenceResult, ReconcileError, Reconciler, Transition};
pub use naming::{naming_for, MultistateNaming, PcsVersion};
pub use normalize::{compare, normalize, ResourceDiff};
pub use simulate::{SimulationError, Simulator};
pub use spec::{DesiredState, ResourceClass, ResourceSpec, ValidationError};
