use std::io;

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur in the provisioning worker.
///
/// Failures of individual messages never surface here: the provisioner
/// dead-letters them. These errors stop the worker itself.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error occurred while loading or validating configuration.
    ///
    /// This error is returned when the configuration file cannot be read or
    /// parsed, or when a required setting such as the organization or the
    /// personal access token is missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to parse a TOML configuration file.
    #[error("Failed to parse TOML configuration file: {0}")]
    ParseTomlFile(#[from] toml::de::Error),

    /// Reading a message source failed.
    #[error("Failed to read input: {0}")]
    Io(#[from] io::Error),

    /// The Azure DevOps client could not be built.
    #[error("Failed to create the Azure DevOps client: {0}")]
    Client(#[from] devops_client::Error),

    /// A provisioning step needed at startup failed, such as seeding the
    /// project identifier allocator.
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] provisioner_core::ProvisioningError),
}
