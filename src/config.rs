//! Environment-sourced configuration
//!
//! The session credential is read once at startup; a missing value is a
//! fatal configuration error, checked before any tool is registered.

use crate::error::{BiliError, Result};
use std::env;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bilibili session cookie (SESSDATA), pre-obtained by the user
    pub sessdata: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Fails when `SESSDATA` is unset or blank.
    pub fn from_env() -> Result<Self> {
        let sessdata = env::var("SESSDATA")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                BiliError::InvalidConfig("SESSDATA environment variable is required".into())
            })?;

        Ok(Self { sessdata })
    }
}
