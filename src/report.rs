//! LCOV tracefile generation.
//!
//! Each coverage record becomes one `SF:` block, provided the class or trigger
//! source exists in the local project. Records for files that are not checked
//! out locally are dropped, otherwise downstream tools fail on the missing
//! source.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::coverage::CoverageRecord;
use crate::error::PersistError;

/// Entity ids starting with this key prefix are Apex classes.
pub const CLASS_ID_PREFIX: &str = "01p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Class,
    Trigger,
}

impl EntityKind {
    pub fn from_entity_id(entity_id: &str) -> Self {
        if entity_id.starts_with(CLASS_ID_PREFIX) {
            EntityKind::Class
        } else {
            EntityKind::Trigger
        }
    }

    /// Expected location of the source file below the project directory.
    pub fn source_path(self, project_dir: &Path, name: &str) -> PathBuf {
        match self {
            EntityKind::Class => project_dir.join("classes").join(format!("{name}.cls")),
            EntityKind::Trigger => project_dir.join("triggers").join(format!("{name}.trigger")),
        }
    }
}

/// Rendered tracefile together with the number of `SF:` blocks it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcovReport {
    pub text: String,
    pub files: usize,
}

/// Renders `records` as an LCOV tracefile, in the order given.
pub fn translate(records: &[CoverageRecord], project_dir: &Path) -> LcovReport {
    let mut report = LcovReport {
        text: String::from("TN:\n"),
        files: 0,
    };
    for record in records {
        let kind = EntityKind::from_entity_id(&record.entity_id);
        let path = kind.source_path(project_dir, record.name());
        if !path.is_file() {
            debug!(path = %path.display(), entity = %record.name(), "Skipping record without local source");
            continue;
        }
        push_record(&mut report.text, &path, record);
        report.files += 1;
    }
    report
}

fn push_record(out: &mut String, path: &Path, record: &CoverageRecord) {
    out.push_str(&format!("SF:{}\n", path.display()));
    for line in &record.coverage.covered_lines {
        out.push_str(&format!("DA:{line},1\n"));
    }
    for line in &record.coverage.uncovered_lines {
        out.push_str(&format!("DA:{line},0\n"));
    }
    out.push_str("end_of_record\n");
}

/// Writes the report, creating the parent directory when it does not exist.
pub fn persist_report(report: &str, output_path: &Path) -> Result<(), PersistError> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            fs::create_dir_all(parent).map_err(|e| {
                error!(error = ?e, path = %parent.display(), "Failed to create report directory");
                PersistError::CreateDir {
                    path: parent.display().to_string(),
                    source: e,
                }
            })?;
            debug!(path = %parent.display(), "Created report directory");
        }
    }

    fs::write(output_path, report).map_err(|e| {
        error!(error = ?e, path = %output_path.display(), "Failed to write report");
        PersistError::Write {
            path: output_path.display().to_string(),
            source: e,
        }
    })?;
    info!(path = %output_path.display(), bytes = report.len(), "Wrote LCOV report");
    Ok(())
}
