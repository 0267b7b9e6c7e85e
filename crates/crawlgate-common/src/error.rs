//! Error types for crawlgate

use thiserror::Error;

/// Result type alias for crawlgate operations
pub type Result<T> = std::result::Result<T, CrawlgateError>;

/// Main error type for crawlgate
#[derive(Error, Debug)]
pub enum CrawlgateError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Shared store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A gated work closure failed; its phase marker was not written
    #[error("Phase work failed: {0:#}")]
    Work(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CrawlgateError {
    /// Wrap a backend error from the shared key-value store
    pub fn store(err: impl std::fmt::Display) -> Self {
        CrawlgateError::Store(err.to_string())
    }

    /// Wrap a backend error from the relational store
    pub fn database(err: impl std::fmt::Display) -> Self {
        CrawlgateError::Database(err.to_string())
    }
}

/// Fatal errors raised while deriving an entity schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("'{field}' on '{entity}' is a reserved column name (cdate and __id are maintained by the pipeline)")]
    ReservedFieldName { entity: String, field: String },

    #[error("Only text fields can set a length: '{field}' on '{entity}' resolves to {data_type}")]
    LengthOnNonText {
        entity: String,
        field: String,
        data_type: String,
    },

    #[error("Malformed type descriptor: {0}")]
    Malformed(String),
}
