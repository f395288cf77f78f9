// Error types for the library half of the crate. The binary wraps these in
// `anyhow` with extra context; the library keeps them typed so callers can
// tell a bad selection from a failed write.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid call type: {0}")]
    UnknownCall(String),

    #[error("Invalid selection {selection}: choose a number between 1 and {max}")]
    InvalidSelection { selection: usize, max: usize },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Empty response - no data returned from API for {call}")]
    EmptyResult { call: String },

    #[error(
        "Pagination for {call} stopped early after {fetched} page(s): {reason}; partial results saved to {}",
        .path.display()
    )]
    Truncated {
        call: String,
        fetched: usize,
        reason: String,
        path: PathBuf,
    },

    #[error("Failed to read or write profiles file {}: {message}", .path.display())]
    Profiles { path: PathBuf, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
