use std::time::Duration;

use thiserror::Error;

/// Extraction failed: the document is unusable for this run.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document could not be decoded: {0}")]
    Unreadable(String),

    #[error("Document is empty")]
    Empty,

    #[error("No identifiable candidate name in document")]
    MissingName,

    #[error("Text completion failed: {source}")]
    Completion {
        #[source]
        source: anyhow::Error,
    },

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),
}

/// Storage failed. The write transaction was rolled back.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Graph transaction failed: {source}")]
    Transaction {
        #[source]
        source: anyhow::Error,
    },

    #[error("Storage timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    pub fn transaction(err: impl Into<anyhow::Error>) -> Self {
        Self::Transaction { source: err.into() }
    }
}

/// Query execution failed. Distinct from an empty result, which is not an error.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Graph query failed: {source}")]
    Execution {
        #[source]
        source: anyhow::Error,
    },

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    pub fn execution(err: impl Into<anyhow::Error>) -> Self {
        Self::Execution { source: err.into() }
    }
}

/// Render an error with its full `source()` chain, e.g. for user-facing detail strings.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        current = cause.source();
    }
    out
}
