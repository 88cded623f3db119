use std::time::Duration;

use thiserror::Error;

/// Any failure reaching the content provider or reading its response.
///
/// Callers of `content::load_records` never see these: they are logged and
/// turned into an empty record list.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{0}' is not a Notion page id")]
    InvalidPageId(String),
    #[error("snapshot fetch timed out after {0:?}")]
    Timeout(Duration),
}
