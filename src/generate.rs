//! Coordinates login, coverage query, translation and persistence.

use std::path::PathBuf;

use reqwest::Client;
use tracing::{error, info};

use crate::config::Config;
use crate::coverage::fetch_coverage;
use crate::error::{Error, Result};
use crate::login::authenticate;
use crate::report::{persist_report, translate};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub records_fetched: usize,
    pub files_reported: usize,
    pub output_path: PathBuf,
}

/// Runs the whole pipeline with a default HTTP client.
pub async fn generate(config: &Config) -> Result<GenerateSummary> {
    let client = Client::builder().build().map_err(|e| {
        error!(error = ?e, "Failed to build HTTP client");
        Error::Client(e)
    })?;
    generate_with(&client, config).await
}

/// Runs the whole pipeline on `client`. The report is only written once every
/// earlier step has succeeded.
pub async fn generate_with(client: &Client, config: &Config) -> Result<GenerateSummary> {
    let session = authenticate(client, &config.credentials).await?;
    let records = fetch_coverage(client, &session).await?;

    let report = translate(&records, &config.project_dir);
    info!(
        records = records.len(),
        files = report.files,
        "Translated coverage into LCOV"
    );

    persist_report(&report.text, &config.output_path)?;

    Ok(GenerateSummary {
        records_fetched: records.len(),
        files_reported: report.files,
        output_path: config.output_path.clone(),
    })
}
