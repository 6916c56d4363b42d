//! Worker process of the AZP provisioner.
//!
//! Exposes the configuration and the message loop so the binary stays a thin
//! command-line wrapper.

pub mod config;
pub mod errors;
pub mod worker;
