//! Error types for the resumegraph-pipeline crate.

use thiserror::Error;

use resumegraph_core::{ExtractionError, QueryError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to load document {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Graph error: {0}")]
    Graph(#[from] resumegraph_graph::GraphError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
