//! Command-line surface: flag definitions and the async entrypoint shared by
//! `main` and the integration tests.
//!
//! Every flag can also be set through an `APEXCOV_*` environment variable;
//! an explicit flag wins over the environment, which wins over the default.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::{Config, DEFAULT_INSTANCE, DEFAULT_OUTPUT};
use crate::generate::generate;

/// CLI for apexcov: a test coverage generator for Apex.
#[derive(Parser)]
#[clap(
    name = "apexcov",
    version,
    about = "a Test Coverage Generator for Apex"
)]
pub struct Cli {
    /// instance to use
    #[clap(short, long, env = "APEXCOV_INSTANCE", default_value = DEFAULT_INSTANCE)]
    pub instance: String,

    /// username of the Salesforce org
    #[clap(short, long, env = "APEXCOV_USERNAME")]
    pub username: Option<String>,

    /// password of the Salesforce org
    #[clap(short, long, env = "APEXCOV_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// project directory containing classes/ and triggers/ (defaults to the current directory)
    #[clap(short = 'd', long, env = "APEXCOV_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// path of the generated LCOV file
    #[clap(short, long, env = "APEXCOV_OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = Config::resolve(&cli)?;
    match generate(&config).await {
        Ok(summary) => {
            tracing::info!(?summary, "Coverage generation complete");
            println!(
                "Wrote coverage for {} files ({} records fetched) to {}",
                summary.files_reported,
                summary.records_fetched,
                summary.output_path.display()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Coverage generation failed");
            Err(anyhow::Error::new(e))
        }
    }
}
