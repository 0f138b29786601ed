//! Error types for each stage of a coverage run.
//!
//! Every stage has its own enum so callers (and tests) can match on the exact
//! failure. [`Error`] wraps them for the orchestrator; the CLI boundary turns it
//! into an `anyhow::Error` and prints the `Display` text as a single line.

use thiserror::Error;

/// Invalid or missing command-line input, detected before any network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("You must provide a username")]
    MissingUsername,
    #[error("You must provide a password")]
    MissingPassword,
    #[error("You must provide a valid instance URL")]
    InvalidInstanceUrl(String),
    #[error("Unable to determine the current directory: {0}")]
    WorkingDirectory(String),
}

/// Failure while exchanging credentials for a session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,
    /// SOAP fault returned by the login endpoint; displays the fault string.
    #[error("{message}")]
    Fault { code: String, message: String },
    #[error("Malformed login response: {0}")]
    MalformedResponse(String),
    #[error("Invalid server URL in login response: {0}")]
    InvalidServerUrl(String),
    #[error("Login request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Failure while querying the coverage aggregate.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Coverage query failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Malformed coverage payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Failure while writing the report to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure of a coverage run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
