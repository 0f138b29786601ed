//! Tooling API query for `ApexCodeCoverageAggregate`.

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::login::{Session, API_VERSION};

pub const COVERAGE_QUERY: &str = "SELECT ApexClassOrTriggerId, ApexClassorTrigger.Name, Coverage FROM ApexCodeCoverageAggregate WHERE NOT ApexClassorTrigger.Name = null";

/// Query response; only the first batch of records is ever read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverageResponse {
    #[serde(rename = "totalSize", default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub records: Vec<CoverageRecord>,
}

/// Aggregated coverage of one class or trigger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoverageRecord {
    #[serde(rename = "ApexClassOrTriggerId")]
    pub entity_id: String,
    #[serde(rename = "ApexClassOrTrigger")]
    pub entity: Entity,
    #[serde(rename = "Coverage", default, deserialize_with = "null_as_default")]
    pub coverage: LineCoverage,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entity {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LineCoverage {
    #[serde(rename = "coveredLines", default, deserialize_with = "null_as_default")]
    pub covered_lines: Vec<u32>,
    #[serde(rename = "uncoveredLines", default, deserialize_with = "null_as_default")]
    pub uncovered_lines: Vec<u32>,
}

/// Reads an explicit JSON `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl CoverageRecord {
    pub fn new(entity_id: &str, name: &str, covered: Vec<u32>, uncovered: Vec<u32>) -> Self {
        CoverageRecord {
            entity_id: entity_id.to_string(),
            entity: Entity {
                name: name.to_string(),
            },
            coverage: LineCoverage {
                covered_lines: covered,
                uncovered_lines: uncovered,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.entity.name
    }
}

pub fn query_endpoint(instance_url: &str) -> String {
    format!(
        "{}/services/data/v{}/tooling/query",
        instance_url.trim_end_matches('/'),
        API_VERSION
    )
}

/// Fetches the coverage aggregate for every named class and trigger in the org.
///
/// A non-2xx status is not an error by itself: the body is still decoded, and
/// an error payload surfaces as [`FetchError::MalformedPayload`].
pub async fn fetch_coverage(client: &Client, session: &Session) -> Result<Vec<CoverageRecord>, FetchError> {
    let endpoint = query_endpoint(&session.instance_url);
    info!(endpoint = %endpoint, "Querying ApexCodeCoverageAggregate");

    let response = client
        .get(&endpoint)
        .query(&[("q", COVERAGE_QUERY)])
        .bearer_auth(&session.session_id)
        .header(CONTENT_TYPE, "application/json")
        .header(USER_AGENT, "apexcov")
        .send()
        .await
        .map_err(|e| {
            error!(error = ?e, endpoint = %endpoint, "Coverage query request failed");
            FetchError::Transport(e)
        })?;

    let status = response.status();
    if !status.is_success() {
        warn!(status = %status, "Coverage query returned a non-success status");
    }

    let body = response.text().await.map_err(|e| {
        error!(error = ?e, "Failed to read coverage response body");
        FetchError::Transport(e)
    })?;

    let records = parse_coverage(&body)?;
    info!(records = records.len(), "Fetched coverage records");
    Ok(records)
}

pub fn parse_coverage(body: &str) -> Result<Vec<CoverageRecord>, FetchError> {
    let parsed: CoverageResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = ?e, "Coverage payload could not be decoded");
        FetchError::MalformedPayload(e)
    })?;
    debug!(total_size = ?parsed.total_size, done = ?parsed.done, "Decoded coverage payload");
    Ok(parsed.records)
}
