//! bili-mcp library
//!
//! Core functionality for the bili-mcp stdio server.

pub mod config;
pub mod core;
pub mod error;
pub mod server;
pub mod types;
