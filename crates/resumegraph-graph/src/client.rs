//! Neo4j connection management and the Bolt-backed graph store.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query, Row, Txn};

use resumegraph_core::config::Neo4jSettings;
use resumegraph_core::{CandidateId, ResultRow};

use crate::store::{AccessMode, GraphStore, Statement, StatementOutput, StoreTxn};
use crate::{mutations, queries};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Node not found: {label} with id {id}")]
    NotFound { label: String, id: String },

    #[error("Write statement {0} rejected in a read-only transaction")]
    ReadOnly(String),

    #[error("Graph session is closed")]
    Closed,

    #[error("Injected failure on {0}")]
    Injected(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Neo4jSettings::default().into()
    }
}

impl From<Neo4jSettings> for GraphConfig {
    fn from(s: Neo4jSettings) -> Self {
        Self {
            uri: s.uri,
            user: s.user,
            password: s.password,
            max_connections: s.max_connections,
            fetch_size: s.fetch_size,
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Clone is cheap (inner Arc). All clones share one pool; [`GraphStore::close`]
/// on any clone releases it for all of them.
#[derive(Clone)]
pub struct GraphClient {
    graph: Arc<RwLock<Option<Graph>>>,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self {
            graph: Arc::new(RwLock::new(Some(graph))),
        })
    }

    /// A handle to the pooled graph, or `Closed` once the pool was released.
    fn graph(&self) -> Result<Graph, GraphError> {
        let guard = self
            .graph
            .read()
            .map_err(|_| GraphError::Connection("graph handle lock poisoned".to_string()))?;
        guard.clone().ok_or(GraphError::Closed)
    }

    /// Create the uniqueness constraints that back MERGE-by-key.
    pub async fn ensure_schema(&self) -> Result<(), GraphError> {
        let graph = self.graph()?;
        for cypher in [
            "CREATE CONSTRAINT candidate_id IF NOT EXISTS
             FOR (c:Candidate) REQUIRE c.id IS UNIQUE",
            "CREATE CONSTRAINT skill_name IF NOT EXISTS
             FOR (s:Skill) REQUIRE s.name IS UNIQUE",
        ] {
            graph.run(query(cypher)).await?;
        }
        tracing::debug!("Graph constraints ensured");
        Ok(())
    }

    /// Execute a query outside any scoped transaction (maintenance only).
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph()?.run(query).await?;
        Ok(())
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn begin(&self, mode: AccessMode) -> Result<Box<dyn StoreTxn>, GraphError> {
        let graph = self.graph()?;
        let txn = match mode {
            AccessMode::Write => Neo4jTxn::Write(graph.start_txn().await?),
            AccessMode::Read => Neo4jTxn::Read(graph),
        };
        Ok(Box::new(txn))
    }

    async fn close(&self) -> Result<(), GraphError> {
        let taken = self
            .graph
            .write()
            .map_err(|_| GraphError::Connection("graph handle lock poisoned".to_string()))?
            .take();
        if taken.is_some() {
            tracing::info!("Neo4j connection pool released");
        }
        Ok(())
    }
}

/// A Neo4j transaction.
///
/// Reads run as auto-commit queries on the pool, so a read transaction
/// never holds a write lock on the server.
enum Neo4jTxn {
    Write(Txn),
    Read(Graph),
}

#[async_trait]
impl StoreTxn for Neo4jTxn {
    async fn run(&mut self, statement: &Statement) -> Result<StatementOutput, GraphError> {
        let q = compile(statement);

        let rows = match self {
            Neo4jTxn::Write(txn) => {
                if statement.is_write() {
                    txn.run(q).await?;
                    return Ok(StatementOutput::Empty);
                }
                let mut stream = txn.execute(q).await?;
                let mut rows = Vec::new();
                while let Some(row) = stream.next(txn.handle()).await? {
                    rows.push(row);
                }
                rows
            }
            Neo4jTxn::Read(graph) => {
                let mut stream = graph.execute(q).await?;
                let mut rows = Vec::new();
                while let Some(row) = stream.next().await? {
                    rows.push(row);
                }
                rows
            }
        };

        decode(statement, rows)
    }

    async fn commit(self: Box<Self>) -> Result<(), GraphError> {
        if let Neo4jTxn::Write(txn) = *self {
            txn.commit().await?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), GraphError> {
        if let Neo4jTxn::Write(txn) = *self {
            txn.rollback().await?;
        }
        Ok(())
    }
}

/// Compile a statement to parameterized Cypher.
fn compile(statement: &Statement) -> Query {
    match statement {
        Statement::MergeCandidate { id, name, contact } => {
            mutations::merge_candidate_query(id, name, contact)
        }
        Statement::MergeSkill { label } => mutations::merge_skill_query(label),
        Statement::MergeHasSkill {
            candidate_id,
            skill,
            source,
            confidence,
        } => mutations::merge_has_skill_query(candidate_id, skill, source, *confidence),
        Statement::CandidatesBySkill { skill } => queries::candidates_by_skill_query(skill),
        Statement::CandidatesByName { name_key } => queries::candidates_by_name_query(name_key),
        Statement::ListCandidates { limit } => queries::list_candidates_query(*limit),
        Statement::CountNodes { label } => queries::count_nodes_query(*label),
        Statement::SkillLabels => queries::skill_labels_query(),
        Statement::CountHasSkill { skill } => queries::count_has_skill_query(skill.as_deref()),
    }
}

/// Decode the rows of a read statement.
fn decode(statement: &Statement, rows: Vec<Row>) -> Result<StatementOutput, GraphError> {
    match statement {
        Statement::CountNodes { .. } | Statement::CountHasSkill { .. } => {
            let count = match rows.first() {
                Some(row) => field(row, "cnt")?,
                None => 0,
            };
            Ok(StatementOutput::Count(count))
        }
        Statement::SkillLabels => rows
            .iter()
            .map(|row| field(row, "name"))
            .collect::<Result<Vec<String>, _>>()
            .map(StatementOutput::Labels),
        Statement::CandidatesBySkill { .. }
        | Statement::CandidatesByName { .. }
        | Statement::ListCandidates { .. } => rows
            .iter()
            .map(row_to_result)
            .collect::<Result<Vec<_>, _>>()
            .map(StatementOutput::Rows),
        _ => Ok(StatementOutput::Empty),
    }
}

/// Convert a `id, name, contact, skills` row to a [`ResultRow`].
fn row_to_result(row: &Row) -> Result<ResultRow, GraphError> {
    let id: String = field(row, "id")?;
    let mut skills: Vec<String> = field(row, "skills")?;
    skills.sort();

    Ok(ResultRow {
        candidate_id: CandidateId(id),
        name: field(row, "name")?,
        contact: field(row, "contact")?,
        skills,
    })
}

/// Read one column, reporting decode failures with the column name.
fn field<T>(row: &Row, key: &str) -> Result<T, GraphError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    row.get(key)
        .map_err(|e| GraphError::Serialization(format!("Failed to read {key}: {e}")))
}
