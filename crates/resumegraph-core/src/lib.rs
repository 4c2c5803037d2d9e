//! resumegraph-core: Shared types, configuration, and error handling for resumegraph.
//!
//! This crate provides the foundational types used across all resumegraph components:
//! - Candidate and Skill node types for the resume graph
//! - The HAS_SKILL relationship type
//! - Extracted candidate facts and the deterministic identity key
//! - Query plans and result rows
//! - Configuration management
//! - The stage error taxonomy (extraction, storage, query)

pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use error::{ExtractionError, QueryError, StorageError};
pub use types::{
    CandidateFacts, CandidateId, Document, DocumentFormat, NodeLabel, QueryPlan, ResultRow,
};
