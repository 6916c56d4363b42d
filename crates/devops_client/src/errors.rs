//! Error types for Azure DevOps client operations.
//!
//! This module defines the error types that can occur when interacting with the
//! Azure DevOps REST API through the devops_client crate. Each variant carries
//! enough context for the orchestrator to decide whether a failure is terminal
//! or can be tolerated (for example an already existing ref).

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur during Azure DevOps client operations.
///
/// ## Examples
///
/// ```rust,ignore
/// use devops_client::Error;
///
/// match client.get_project_by_name("AZP-001_Contoso").await {
///     Ok(Some(project)) => println!("Project id: {}", project.id),
///     Ok(None) => println!("Project does not exist yet"),
///     Err(Error::AuthError(msg)) => eprintln!("Authentication failed: {}", msg),
///     Err(err) => eprintln!("Other error: {}", err),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The platform answered with a non-success status code.
    ///
    /// The message is the (possibly truncated) response body returned by the
    /// platform, which usually contains a `message` field explaining the failure.
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// The personal access token was rejected (401/403).
    #[error("Failed to authenticate with Azure DevOps: {0}")]
    AuthError(String),

    /// The target resource already exists or was modified concurrently (409).
    #[error("Resource conflict: {0}")]
    Conflict(String),

    /// Error deserializing the response from Azure DevOps.
    ///
    /// This usually indicates an API version mismatch between the configured
    /// `api-version` and the typed models in this crate.
    #[error("Failed to deserialize Azure DevOps response: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The request could not be sent or the response could not be read.
    #[error("HTTP transport failure: {0}")]
    Http(String),

    /// The platform returned a response in an unexpected format.
    #[error("Invalid response format")]
    InvalidResponse,

    /// The requested resource was not found (404).
    #[error("Resource not found")]
    NotFound,

    /// A request URL could not be built from the configured base URLs.
    #[error("Invalid URL: {0}")]
    Url(String),
}

impl Error {
    /// Returns true if the error signals that the resource already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Http(value.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Error::Url(value.to_string())
    }
}
