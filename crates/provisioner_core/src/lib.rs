//! # Provisioner Core
//!
//! This crate provides the orchestration logic of the AZP provisioner, which
//! creates Azure DevOps projects and repositories from approved tickets.
//!
//! ## Overview
//!
//! A ticket arrives as a queue message. The [`Provisioner`] handles it end to end:
//! 1. Decode the message into a [`ProvisioningRequest`]
//! 2. Validate the request against the existing projects
//! 3. For a project: allocate an identifier, create the project, wait for the
//!    creation operation and build the project's security groups
//! 4. For a repository: create the repository in its parent project with the
//!    standard branches, permissions and policies
//! 5. Write the outcome back to the ticket
//!
//! Failed messages are forwarded verbatim to a [`DeadLetterSink`] and the ticket
//! is marked as errored.
//!
//! ## Architecture
//!
//! The crate depends on the platform only through the
//! [`devops_client::DevOpsClient`] trait, so every component can be tested
//! against an in-memory client:
//! - [`IdAllocator`] hands out project identifiers
//! - [`validation`] checks requests before any remote change
//! - [`permissions`] computes permission masks and security tokens
//! - [`policy`] assembles create-or-update policy payloads
//! - [`project`] drives the asynchronous project creation
//! - [`groups`] creates the per-project security groups
//! - [`compliance`] builds the repository layout
//! - [`reporter`] updates tickets
//! - [`checkpoint`] records progress so a re-submitted ticket resumes
//!
//! ## Examples
//!
//! ```no_run
//! use devops_client::{AzureDevOpsClient, ClientSettings};
//! use provisioner_core::checkpoint::FileCheckpointStore;
//! use provisioner_core::dead_letter::FileDeadLetterSink;
//! use provisioner_core::project::PollSettings;
//! use provisioner_core::{IdAllocator, Provisioner, ProvisionerSettings};
//! use secrecy::SecretString;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ClientSettings::new(
//!     "contoso",
//!     SecretString::from("pat".to_string()),
//!     "Management",
//! )?;
//! let client = Arc::new(AzureDevOpsClient::new(settings)?);
//!
//! let provisioner = Provisioner::new(
//!     client,
//!     Arc::new(IdAllocator::new()),
//!     Arc::new(FileCheckpointStore::new("checkpoints")),
//!     Arc::new(FileDeadLetterSink::new("dead-letter")),
//!     ProvisionerSettings {
//!         process_template_id: "6b724908-ef14-45cf-84f8-768b5384da45".to_string(),
//!         poll: PollSettings::default(),
//!     },
//! );
//! provisioner.seed_allocator().await?;
//!
//! let outcome = provisioner
//!     .handle_message(br#"{"createType":"Project","workItemId":100,"projectName":"Contoso","costCenterManager":"a@b.com"}"#)
//!     .await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

mod errors;

// Re-export error types for public API
pub use errors::{ErrorCategory, ProvisioningError, ProvisioningResult, ValidationError};

pub mod checkpoint;
pub mod compliance;
pub mod dead_letter;
pub mod groups;
pub mod id_allocator;
pub mod names;
pub mod orchestrator;
pub mod permissions;
pub mod policy;
pub mod project;
pub mod reporter;
pub mod request;
pub mod validation;

// Re-export commonly used types
pub use dead_letter::DeadLetterSink;
pub use id_allocator::IdAllocator;
pub use names::AzpId;
pub use orchestrator::{ProcessOutcome, Provisioner, ProvisionerSettings};
pub use request::{ProjectRequest, ProvisioningRequest, RepositoryRequest, RequestKind};

#[cfg(test)]
mod test_support;
