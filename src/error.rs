use serde::Serialize;

use crate::models::MediaKind;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("TMDB returned HTTP {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response shape from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl CatalogError {
    /// Transport errors, timeouts and non-success statuses.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            CatalogError::Network { .. } | CatalogError::Timeout { .. } | CatalogError::Status { .. }
        )
    }

    pub fn is_invalid_filter(&self) -> bool {
        matches!(self, CatalogError::InvalidFilter(_))
    }

    pub(crate) fn from_transport(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            CatalogError::Timeout {
                url: url.to_string(),
            }
        } else {
            CatalogError::Network {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// A secondary call that failed and left its item on documented defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentWarning {
    pub item_id: u64,
    pub kind: MediaKind,
    pub reason: String,
}

impl EnrichmentWarning {
    pub fn new(item_id: u64, kind: MediaKind, err: &CatalogError) -> Self {
        Self {
            item_id,
            kind,
            reason: err.to_string(),
        }
    }
}
