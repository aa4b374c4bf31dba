use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub const SAMPLE_XLSX: &str = "sample.xlsx";
pub const SAMPLE_PRIOR_EXPORT: &str = "prior_export.xml";

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read fixture {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid fixture {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// What converting the sample working folder is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SampleExpectation {
    pub resources: usize,
    pub lookup_fields: usize,
    pub lookup_values: usize,
    /// Page titles that must appear in the output, in document order.
    pub titles_in_order: Vec<String>,
}

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

pub fn fixtures_root() -> PathBuf {
    workspace_root().join("fixtures")
}

/// Working folder with `config.ini`, the form config and a `files/` folder.
pub fn sample_dir() -> PathBuf {
    fixtures_root().join("sample")
}

pub fn sample_data_dir() -> PathBuf {
    sample_dir().join("files")
}

pub fn sample_expectation() -> Result<SampleExpectation, FixtureError> {
    let path = sample_dir().join("expected.json");
    let display = path.display().to_string();
    let text = fs::read_to_string(&path).map_err(|source| FixtureError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| FixtureError::Json {
        path: display,
        source,
    })
}
