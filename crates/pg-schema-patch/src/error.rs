//! Error types for the patching library.

use thiserror::Error;

/// Main error type for patch-generation operations.
#[derive(Error, Debug)]
pub enum PatchError {
    /// Configuration error (invalid YAML/JSON, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No metadata entry exists for a table requested by the seed engine.
    #[error("No metadata entry for table {0}")]
    MissingMetadata(String),

    /// Database query or protocol error.
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// Connection setup error with context.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Transaction begin/commit/rollback failure; fatal for the whole run.
    #[error("Transaction {phase} failed: {message}")]
    Transaction { phase: String, message: String },

    /// Processing failed for a single table or view.
    #[error("Processing failed for {name}: {message}")]
    Table { name: String, message: String },

    /// IO error (metadata/ordering file reads).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PatchError {
    /// Create a Connection error with context about where it occurred.
    pub fn connection(message: impl Into<String>, context: impl Into<String>) -> Self {
        PatchError::Connection {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Transaction error for a given phase (begin/commit/rollback).
    pub fn transaction(phase: impl Into<String>, message: impl Into<String>) -> Self {
        PatchError::Transaction {
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Create a per-table processing error.
    pub fn table(name: impl Into<String>, message: impl Into<String>) -> Self {
        PatchError::Table {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for patch operations.
pub type Result<T> = std::result::Result<T, PatchError>;
