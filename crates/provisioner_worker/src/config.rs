//! Configuration of the provisioning worker.
//!
//! Settings are read from a TOML file and may be overridden by environment
//! variables, which is how the personal access token is usually supplied.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! organization = "contoso"
//! management_project = "Management"
//!
//! [polling]
//! interval_secs = 5
//! max_wait_secs = 600
//!
//! [worker]
//! concurrency = 4
//! dead_letter_path = "dead-letter"
//! checkpoint_dir = "checkpoints"
//! log_format = "json"
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use devops_client::ClientSettings;
use provisioner_core::project::PollSettings;
use provisioner_core::ProvisionerSettings;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::errors::Error;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "azp-provisioner.toml";

pub const ENV_ORGANIZATION: &str = "AZP_ORGANIZATION";
pub const ENV_PAT: &str = "AZP_PAT";
pub const ENV_MANAGEMENT_PROJECT: &str = "AZP_MANAGEMENT_PROJECT";

const DEFAULT_API_VERSION: &str = "7.1";
const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
const DEFAULT_IDENTITY_URL: &str = "https://vssps.dev.azure.com";
const DEFAULT_RELEASE_URL: &str = "https://vsrm.dev.azure.com";
const DEFAULT_PROCESS_TEMPLATE_ID: &str = "08707d34-379e-45bd-9824-8e7d6b111536";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Project creation polling, in seconds. A `max_wait_secs` of 0 waits forever.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_wait_secs: 600,
        }
    }
}

/// Runtime options of the worker loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerOptions {
    /// Maximum number of messages processed at the same time.
    pub concurrency: usize,
    /// Directory receiving dead-lettered messages.
    pub dead_letter_path: PathBuf,
    /// Directory holding per-ticket checkpoints.
    pub checkpoint_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            dead_letter_path: PathBuf::from("dead-letter"),
            checkpoint_dir: PathBuf::from("checkpoints"),
            log_format: LogFormat::default(),
        }
    }
}

/// Shape of the configuration file. Every field is optional.
#[derive(Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    organization: Option<String>,
    pat: Option<String>,
    api_version: Option<String>,
    management_project: Option<String>,
    process_template_id: Option<String>,
    base_url: Option<String>,
    identity_url: Option<String>,
    release_url: Option<String>,
    polling: PollingConfig,
    worker: WorkerOptions,
}

/// Resolved configuration of the worker.
#[derive(Debug)]
pub struct WorkerConfig {
    pub organization: String,
    pub pat: SecretString,
    pub api_version: String,
    /// Project holding the request tickets.
    pub management_project: String,
    pub process_template_id: String,
    pub base_url: Url,
    pub identity_url: Url,
    pub release_url: Url,
    pub polling: PollingConfig,
    pub worker: WorkerOptions,
}

impl WorkerConfig {
    /// Loads the configuration, applying overrides from the process environment.
    ///
    /// When `path` is `None` the default file is read if it exists; otherwise the
    /// configuration comes from the environment alone. An explicit path that
    /// does not exist is an error.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the file cannot be read or a required setting is missing
    /// - `Error::ParseTomlFile` if the file is not valid TOML
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let content = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Configuration file not found: {:?}",
                        path
                    )));
                }
                Some(read_file(path)?)
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    Some(read_file(default_path)?)
                } else {
                    debug!("No configuration file, using the environment only");
                    None
                }
            }
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Builds the configuration from TOML `content` and an environment lookup.
    ///
    /// Environment values win over the file.
    pub fn from_sources<F>(content: Option<&str>, env: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: ConfigFile = match content {
            Some(content) => toml::from_str(content)?,
            None => ConfigFile::default(),
        };

        let override_with = |key: &str, value: Option<String>| {
            env(key).filter(|v| !v.trim().is_empty()).or(value)
        };

        let organization = required(
            override_with(ENV_ORGANIZATION, file.organization),
            "organization",
            ENV_ORGANIZATION,
        )?;
        let pat = required(override_with(ENV_PAT, file.pat), "pat", ENV_PAT)?;
        let management_project = required(
            override_with(ENV_MANAGEMENT_PROJECT, file.management_project),
            "management_project",
            ENV_MANAGEMENT_PROJECT,
        )?;

        if file.worker.concurrency == 0 {
            return Err(Error::Config(
                "worker.concurrency must be at least 1".to_string(),
            ));
        }
        if file.polling.interval_secs == 0 {
            return Err(Error::Config(
                "polling.interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            organization,
            pat: SecretString::from(pat),
            api_version: file
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            management_project,
            process_template_id: file
                .process_template_id
                .unwrap_or_else(|| DEFAULT_PROCESS_TEMPLATE_ID.to_string()),
            base_url: parse_url("base_url", file.base_url, DEFAULT_BASE_URL)?,
            identity_url: parse_url("identity_url", file.identity_url, DEFAULT_IDENTITY_URL)?,
            release_url: parse_url("release_url", file.release_url, DEFAULT_RELEASE_URL)?,
            polling: file.polling,
            worker: file.worker,
        })
    }

    /// Connection settings for the Azure DevOps client.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            organization: self.organization.clone(),
            pat: SecretString::from(self.pat.expose_secret().to_string()),
            api_version: self.api_version.clone(),
            management_project: self.management_project.clone(),
            base_url: self.base_url.clone(),
            identity_url: self.identity_url.clone(),
            release_url: self.release_url.clone(),
        }
    }

    pub fn provisioner_settings(&self) -> ProvisionerSettings {
        ProvisionerSettings {
            process_template_id: self.process_template_id.clone(),
            poll: PollSettings::from_secs(self.polling.interval_secs, self.polling.max_wait_secs),
        }
    }
}

fn read_file(path: &Path) -> Result<String, Error> {
    debug!("Loading configuration from {:?}", path);
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read configuration file: {}", e)))
}

fn required(value: Option<String>, field: &str, env_key: &str) -> Result<String, Error> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "'{}' is not set; add it to the configuration file or set {}",
                field, env_key
            ))
        })
}

fn parse_url(field: &str, value: Option<String>, default: &str) -> Result<Url, Error> {
    let raw = value.unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| Error::Config(format!("Invalid {} '{}': {}", field, raw, e)))
}
