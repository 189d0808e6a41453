//! pcsctl - converge Pacemaker cluster resources through `pcs`
//!
//! The `resource` module reconciles one declared resource against the CIB;
//! `wait` polls `crm_mon` until a resource reaches a state.

pub mod cib;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod report;
pub mod resource;
pub mod wait;
