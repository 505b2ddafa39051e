//! Error types for the schema collector.

use thiserror::Error;

/// Main error type for collection operations.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Configuration error (invalid YAML, missing fields, bad patterns, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or driver error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A catalog query failed or returned something unusable
    #[error("Catalog query {query} failed: {message}")]
    Query { query: String, message: String },

    /// A result row did not line up with its column list
    #[error("Row has {actual} values but the result set declares {expected} columns")]
    RowShape { expected: usize, actual: usize },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollectorError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        CollectorError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Query error
    pub fn query(query: impl Into<String>, message: impl Into<String>) -> Self {
        CollectorError::Query {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            CollectorError::Config(_) | CollectorError::Yaml(_) => 2,
            CollectorError::Source(_) | CollectorError::Pool { .. } => 3,
            CollectorError::Query { .. } | CollectorError::RowShape { .. } => 4,
            CollectorError::Io(_) | CollectorError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
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

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectorError>;
