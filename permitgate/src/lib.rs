//! PermitGate CLI wrapper around the gate pipeline.
//!
//! Implements: REQ-CLI-001

pub mod cli;
pub mod run;
