//! Read operations and Cypher query builders for the resume graph.
//!
//! Every helper here opens a read-only transaction; none can mutate.

use neo4rs::{query, Query};

use resumegraph_core::types::{name_key, normalize_skill};
use resumegraph_core::{NodeLabel, ResultRow};

use crate::client::GraphError;
use crate::session::GraphSession;
use crate::store::{AccessMode, Statement, StatementOutput};

impl GraphSession {
    /// Candidates holding a skill, ordered by identity key.
    pub async fn candidates_by_skill(&self, skill: &str) -> Result<Vec<ResultRow>, GraphError> {
        self.read(Statement::CandidatesBySkill {
            skill: normalize_skill(skill),
        })
        .await?
        .into_rows()
    }

    /// Candidates whose name contains `name` (case-insensitive), ordered by identity key.
    pub async fn candidates_by_name(&self, name: &str) -> Result<Vec<ResultRow>, GraphError> {
        self.read(Statement::CandidatesByName {
            name_key: name_key(name),
        })
        .await?
        .into_rows()
    }

    /// All candidates, ordered by identity key.
    pub async fn list_candidates(&self, limit: u32) -> Result<Vec<ResultRow>, GraphError> {
        self.read(Statement::ListCandidates { limit })
            .await?
            .into_rows()
    }

    /// Every stored skill label, sorted.
    pub async fn skill_labels(&self) -> Result<Vec<String>, GraphError> {
        self.read(Statement::SkillLabels).await?.into_labels()
    }

    pub async fn count_nodes(&self, label: NodeLabel) -> Result<i64, GraphError> {
        self.read(Statement::CountNodes { label })
            .await?
            .into_count()
    }

    /// Count HAS_SKILL edges, all of them or those into one skill.
    pub async fn count_has_skill(&self, skill: Option<&str>) -> Result<i64, GraphError> {
        self.read(Statement::CountHasSkill {
            skill: skill.map(normalize_skill),
        })
        .await?
        .into_count()
    }

    async fn read(&self, statement: Statement) -> Result<StatementOutput, GraphError> {
        let mut txn = self.acquire(AccessMode::Read).await?;
        let output = txn.run(&statement).await?;
        txn.commit().await?;
        Ok(output)
    }
}

// ── Cypher ───────────────────────────────────────────────────────

pub(crate) fn candidates_by_skill_query(skill: &str) -> Query {
    query(
        "MATCH (c:Candidate)-[:HAS_SKILL]->(:Skill {name: $skill})
         MATCH (c)-[:HAS_SKILL]->(s:Skill)
         RETURN c.id AS id, c.name AS name, c.contact AS contact,
                collect(s.name) AS skills
         ORDER BY id",
    )
    .param("skill", skill.to_string())
}

pub(crate) fn candidates_by_name_query(name_key: &str) -> Query {
    query(
        "MATCH (c:Candidate)
         WHERE c.name_key CONTAINS $name_key
         OPTIONAL MATCH (c)-[:HAS_SKILL]->(s:Skill)
         RETURN c.id AS id, c.name AS name, c.contact AS contact,
                collect(s.name) AS skills
         ORDER BY id",
    )
    .param("name_key", name_key.to_string())
}

pub(crate) fn list_candidates_query(limit: u32) -> Query {
    query(
        "MATCH (c:Candidate)
         WITH c ORDER BY c.id LIMIT $limit
         OPTIONAL MATCH (c)-[:HAS_SKILL]->(s:Skill)
         RETURN c.id AS id, c.name AS name, c.contact AS contact,
                collect(s.name) AS skills
         ORDER BY id",
    )
    .param("limit", limit as i64)
}

pub(crate) fn skill_labels_query() -> Query {
    query("MATCH (s:Skill) RETURN s.name AS name ORDER BY name")
}

pub(crate) fn count_nodes_query(label: NodeLabel) -> Query {
    let label = label.as_str();
    query(&format!("MATCH (n:{label}) RETURN count(n) AS cnt"))
}

pub(crate) fn count_has_skill_query(skill: Option<&str>) -> Query {
    match skill {
        Some(skill) => query(
            "MATCH (:Candidate)-[r:HAS_SKILL]->(:Skill {name: $skill})
             RETURN count(r) AS cnt",
        )
        .param("skill", skill.to_string()),
        None => query("MATCH (:Candidate)-[r:HAS_SKILL]->(:Skill) RETURN count(r) AS cnt"),
    }
}
