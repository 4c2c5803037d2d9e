//! Write operations for the resume graph.
//!
//! All mutations use MERGE (upsert) semantics so that re-extracting the same
//! candidate converges instead of duplicating. Candidates are identified by
//! `id`, skills by their normalized `name`.

use chrono::Utc;
use neo4rs::{query, Query};

use resumegraph_core::{CandidateFacts, CandidateId, StorageError};

use crate::session::GraphSession;
use crate::store::{AccessMode, Statement};

/// Extractor name recorded on HAS_SKILL edges when none is given.
pub const DEFAULT_EDGE_SOURCE: &str = "extraction";

/// The sole writer of Candidate and Skill nodes.
#[derive(Clone)]
pub struct GraphWriter {
    session: GraphSession,
    source: String,
}

impl GraphWriter {
    pub fn new(session: GraphSession) -> Self {
        Self {
            session,
            source: DEFAULT_EDGE_SOURCE.to_string(),
        }
    }

    /// Record `source` on every HAS_SKILL edge this writer asserts.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Upsert a candidate, its skills, and the edges between them in one
    /// transaction. Returns the candidate's identity key.
    pub async fn store(&self, facts: &CandidateFacts) -> Result<CandidateId, StorageError> {
        let candidate_id = facts.identity();
        let statements = self.plan(&candidate_id, facts);

        let mut txn = self
            .session
            .acquire(AccessMode::Write)
            .await
            .map_err(StorageError::transaction)?;

        for statement in &statements {
            if let Err(e) = txn.run(statement).await {
                tracing::warn!(
                    candidate_id = %candidate_id,
                    statement = ?statement.kind(),
                    error = %e,
                    "Candidate write failed, rolling back"
                );
                if let Err(rb) = txn.rollback().await {
                    tracing::error!(candidate_id = %candidate_id, error = %rb, "Rollback failed");
                }
                return Err(StorageError::transaction(e));
            }
        }

        txn.commit().await.map_err(StorageError::transaction)?;

        tracing::info!(
            candidate_id = %candidate_id,
            skill_count = facts.skills().len(),
            "Candidate stored"
        );
        Ok(candidate_id)
    }

    /// The statement sequence for one candidate: the candidate first, then
    /// each skill immediately followed by its edge.
    fn plan(&self, candidate_id: &CandidateId, facts: &CandidateFacts) -> Vec<Statement> {
        let mut statements = Vec::with_capacity(1 + 2 * facts.skills().len());
        statements.push(Statement::MergeCandidate {
            id: candidate_id.clone(),
            name: facts.name().to_string(),
            contact: facts.contact().to_string(),
        });
        for skill in facts.skills() {
            statements.push(Statement::MergeSkill {
                label: skill.clone(),
            });
            statements.push(Statement::MergeHasSkill {
                candidate_id: candidate_id.clone(),
                skill: skill.clone(),
                source: self.source.clone(),
                confidence: None,
            });
        }
        statements
    }
}

// ── Cypher ───────────────────────────────────────────────────────

pub(crate) fn merge_candidate_query(id: &CandidateId, name: &str, contact: &str) -> Query {
    query(
        "MERGE (c:Candidate {id: $id})
         ON CREATE SET
           c.name = $name, c.contact = $contact, c.name_key = $name_key,
           c.first_seen = $now, c.last_seen = $now
         ON MATCH SET
           c.name = $name, c.contact = $contact, c.name_key = $name_key,
           c.last_seen = $now",
    )
    .param("id", id.0.clone())
    .param("name", name.to_string())
    .param("contact", contact.to_string())
    .param("name_key", resumegraph_core::types::name_key(name))
    .param("now", Utc::now().to_rfc3339())
}

pub(crate) fn merge_skill_query(label: &str) -> Query {
    query(
        "MERGE (s:Skill {name: $name})
         ON CREATE SET s.first_seen = $now",
    )
    .param("name", label.to_string())
    .param("now", Utc::now().to_rfc3339())
}

pub(crate) fn merge_has_skill_query(
    candidate_id: &CandidateId,
    skill: &str,
    source: &str,
    confidence: Option<f64>,
) -> Query {
    query(
        "MATCH (c:Candidate {id: $candidate_id})
         MATCH (s:Skill {name: $skill})
         MERGE (c)-[r:HAS_SKILL]->(s)
         ON CREATE SET
           r.source = $source, r.confidence = $confidence,
           r.first_seen = $now, r.last_seen = $now
         ON MATCH SET
           r.source = $source, r.confidence = $confidence,
           r.last_seen = $now",
    )
    .param("candidate_id", candidate_id.0.clone())
    .param("skill", skill.to_string())
    .param("source", source.to_string())
    .param("confidence", confidence.unwrap_or(1.0))
    .param("now", Utc::now().to_rfc3339())
}
