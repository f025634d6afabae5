//! Error types for bili-mcp

use thiserror::Error;

/// Main error type for bili-mcp
#[derive(Error, Debug)]
pub enum BiliError {
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream returned a non-zero application code.
    #[error("Bilibili API error (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("Failed to parse Bilibili response: {0}")]
    Parse(String),

    #[error("Invalid search_type: {0}")]
    InvalidSearchType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BiliError>;
