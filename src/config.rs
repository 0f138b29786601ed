use std::fmt;
use std::path::PathBuf;

use reqwest::Url;
use tracing::{debug, error, info};

use crate::cli::Cli;
use crate::error::ConfigError;

pub const DEFAULT_INSTANCE: &str = "https://login.salesforce.com";
pub const DEFAULT_OUTPUT: &str = "coverage/lcov.info";

/// Login credentials for one org. Never persisted; `Debug` hides the username
/// and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login host, e.g. `https://login.salesforce.com`, without trailing slash.
    pub instance_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("instance_url", &self.instance_url)
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fully resolved settings for a single run.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Directory containing the `classes/` and `triggers/` source folders.
    pub project_dir: PathBuf,
    /// Where the LCOV tracefile is written.
    pub output_path: PathBuf,
}

impl Config {
    /// Validates parsed flags (already merged with environment and defaults by clap)
    /// into a `Config`. Checks run in a fixed order: username, password, instance.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let username = non_empty(cli.username.as_deref()).ok_or_else(|| {
            error!("No username supplied");
            ConfigError::MissingUsername
        })?;
        let password = non_empty(cli.password.as_deref()).ok_or_else(|| {
            error!("No password supplied");
            ConfigError::MissingPassword
        })?;
        let instance_url = validate_instance(&cli.instance)?;

        let project_dir = match &cli.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| {
                error!(error = ?e, "Failed to read current directory");
                ConfigError::WorkingDirectory(e.to_string())
            })?,
        };

        let config = Config {
            credentials: Credentials {
                instance_url,
                username: username.to_string(),
                password: password.to_string(),
            },
            project_dir,
            output_path: cli.output.clone(),
        };
        config.trace_loaded();
        Ok(config)
    }

    pub fn trace_loaded(&self) {
        info!(
            instance = %self.credentials.instance_url,
            project_dir = %self.project_dir.display(),
            output = %self.output_path.display(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn validate_instance(raw: &str) -> Result<String, ConfigError> {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => Ok(raw.trim_end_matches('/').to_string()),
        Ok(_) => {
            error!(instance = %raw, "Instance URL has no host");
            Err(ConfigError::InvalidInstanceUrl(raw.to_string()))
        }
        Err(e) => {
            error!(error = ?e, instance = %raw, "Instance URL could not be parsed");
            Err(ConfigError::InvalidInstanceUrl(raw.to_string()))
        }
    }
}
