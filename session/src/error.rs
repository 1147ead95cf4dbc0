//! Session error type.

use mapview::grid::GridError;
use mapview::map::MapError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Transport failure: connect, timeout, or body read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed navigation command: {0}")]
    Codec(#[from] wire::CodecError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

impl SessionError {
    /// Whether the next natural cycle may succeed where this one failed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
