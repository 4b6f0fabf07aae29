//! Error types and result aliases for the runscope library.
//!
//! This module defines the core error type [`RunscopeError`] and the [`Result`] type alias
//! used throughout the library. Callback handlers return `Result<()>` from every lifecycle
//! method; a handler error is isolated by the dispatch fan-out and never reaches the
//! operation being observed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunscopeError {
    #[error("Callback handler error: {0}")]
    HandlerError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RunscopeError>;
