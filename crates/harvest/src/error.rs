//! Error types for test-case harvesting

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Cannot acquire a browser session: {0}")]
    Connection(String),

    #[error("No test cases found on {url} (page title: {title})")]
    EnumerationEmpty { url: String, title: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Timeout during {step} after {after_ms} ms")]
    Timeout { step: String, after_ms: u64 },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Cannot write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid key pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl HarvestError {
    /// Fatal errors abort the whole run; everything else is absorbed per item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::Connection(_)
                | HarvestError::EnumerationEmpty { .. }
                | HarvestError::InvalidConfig(_)
                | HarvestError::InvalidState(_)
        )
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
