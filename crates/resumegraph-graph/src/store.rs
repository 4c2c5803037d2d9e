//! The graph store seam.
//!
//! A [`GraphStore`] opens transactions; a [`StoreTxn`] runs typed
//! [`Statement`]s and commits or rolls back. Statements are a closed set:
//! the Neo4j backend compiles each one to a parameterized Cypher query, the
//! in-memory backend interprets it directly.

use async_trait::async_trait;

use resumegraph_core::{CandidateId, NodeLabel, ResultRow};

use crate::client::GraphError;

/// Whether a transaction may mutate the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// A single graph operation with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Upsert a Candidate keyed by `id`.
    MergeCandidate {
        id: CandidateId,
        name: String,
        contact: String,
    },
    /// Upsert a Skill keyed by its normalized label.
    MergeSkill { label: String },
    /// Upsert the HAS_SKILL edge between an existing candidate and skill.
    MergeHasSkill {
        candidate_id: CandidateId,
        skill: String,
        source: String,
        confidence: Option<f64>,
    },
    /// Candidates with a HAS_SKILL edge to `skill`, ordered by id.
    CandidatesBySkill { skill: String },
    /// Candidates whose normalized name contains `name_key`, ordered by id.
    CandidatesByName { name_key: String },
    /// All candidates ordered by id, at most `limit`.
    ListCandidates { limit: u32 },
    CountNodes { label: NodeLabel },
    /// Every Skill label, sorted.
    SkillLabels,
    /// HAS_SKILL edges, optionally only those pointing at one skill.
    CountHasSkill { skill: Option<String> },
}

/// Discriminant of a [`Statement`], used for logging and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    MergeCandidate,
    MergeSkill,
    MergeHasSkill,
    CandidatesBySkill,
    CandidatesByName,
    ListCandidates,
    CountNodes,
    SkillLabels,
    CountHasSkill,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::MergeCandidate { .. } => StatementKind::MergeCandidate,
            Self::MergeSkill { .. } => StatementKind::MergeSkill,
            Self::MergeHasSkill { .. } => StatementKind::MergeHasSkill,
            Self::CandidatesBySkill { .. } => StatementKind::CandidatesBySkill,
            Self::CandidatesByName { .. } => StatementKind::CandidatesByName,
            Self::ListCandidates { .. } => StatementKind::ListCandidates,
            Self::CountNodes { .. } => StatementKind::CountNodes,
            Self::SkillLabels => StatementKind::SkillLabels,
            Self::CountHasSkill { .. } => StatementKind::CountHasSkill,
        }
    }

    /// True for statements that mutate the graph.
    pub fn is_write(&self) -> bool {
        matches!(
            self.kind(),
            StatementKind::MergeCandidate | StatementKind::MergeSkill | StatementKind::MergeHasSkill
        )
    }
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutput {
    Empty,
    Rows(Vec<ResultRow>),
    Labels(Vec<String>),
    Count(i64),
}

impl StatementOutput {
    pub fn into_rows(self) -> Result<Vec<ResultRow>, GraphError> {
        match self {
            Self::Rows(rows) => Ok(rows),
            other => Err(GraphError::Serialization(format!(
                "expected result rows, got {other:?}"
            ))),
        }
    }

    pub fn into_labels(self) -> Result<Vec<String>, GraphError> {
        match self {
            Self::Labels(labels) => Ok(labels),
            other => Err(GraphError::Serialization(format!(
                "expected labels, got {other:?}"
            ))),
        }
    }

    pub fn into_count(self) -> Result<i64, GraphError> {
        match self {
            Self::Count(n) => Ok(n),
            other => Err(GraphError::Serialization(format!(
                "expected a count, got {other:?}"
            ))),
        }
    }
}

/// A graph backend with a connection pool.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Open a transaction.
    async fn begin(&self, mode: AccessMode) -> Result<Box<dyn StoreTxn>, GraphError>;

    /// Release the connection pool.
    async fn close(&self) -> Result<(), GraphError>;
}

/// An open transaction on a [`GraphStore`].
#[async_trait]
pub trait StoreTxn: Send {
    async fn run(&mut self, statement: &Statement) -> Result<StatementOutput, GraphError>;

    async fn commit(self: Box<Self>) -> Result<(), GraphError>;

    async fn rollback(self: Box<Self>) -> Result<(), GraphError>;
}
