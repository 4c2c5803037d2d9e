//! In-process graph store.
//!
//! Interprets [`Statement`]s with the same MERGE semantics as the Cypher the
//! Neo4j backend runs. Write transactions work on a private copy of the
//! graph and publish their statement log atomically on commit; dropping or
//! rolling back a transaction discards the copy.
//!
//! Used by tests and by the CLI's `--in-memory` mode. Supports one-shot
//! fault injection per statement kind.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use resumegraph_core::types::{name_key, Candidate, HasSkill, Skill};
use resumegraph_core::{CandidateId, NodeLabel, ResultRow};

use crate::client::GraphError;
use crate::store::{AccessMode, GraphStore, Statement, StatementKind, StatementOutput, StoreTxn};

/// Shared in-memory graph. Clone is cheap (inner Arc).
#[derive(Clone, Default)]
pub struct MemoryGraph {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: AsyncMutex<GraphState>,
    fail_on: Mutex<Option<StatementKind>>,
    write_txns: AtomicUsize,
    read_txns: AtomicUsize,
    close_calls: AtomicUsize,
    closed: AtomicBool,
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    candidates: BTreeMap<CandidateId, Candidate>,
    skills: BTreeMap<String, Skill>,
    edges: BTreeMap<(CandidateId, String), HasSkill>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next statement of `kind`, in whichever transaction runs it.
    pub fn fail_on(&self, kind: StatementKind) {
        *self.fault_slot() = Some(kind);
    }

    pub async fn node_count(&self, label: NodeLabel) -> usize {
        let state = self.inner.state.lock().await;
        match label {
            NodeLabel::Candidate => state.candidates.len(),
            NodeLabel::Skill => state.skills.len(),
        }
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.state.lock().await.edges.len()
    }

    pub async fn candidate(&self, id: &CandidateId) -> Option<Candidate> {
        self.inner.state.lock().await.candidates.get(id).cloned()
    }

    pub async fn edge(&self, id: &CandidateId, skill: &str) -> Option<HasSkill> {
        let state = self.inner.state.lock().await;
        state.edges.get(&(id.clone(), skill.to_string())).cloned()
    }

    /// Write transactions opened so far.
    pub fn write_transactions(&self) -> usize {
        self.inner.write_txns.load(Ordering::SeqCst)
    }

    /// Read transactions opened so far.
    pub fn read_transactions(&self) -> usize {
        self.inner.read_txns.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    fn fault_slot(&self) -> std::sync::MutexGuard<'_, Option<StatementKind>> {
        self.inner
            .fail_on
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_fault(&self, kind: StatementKind) -> Option<GraphError> {
        let mut slot = self.fault_slot();
        if *slot == Some(kind) {
            *slot = None;
            return Some(GraphError::Injected(format!("{kind:?}")));
        }
        None
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn begin(&self, mode: AccessMode) -> Result<Box<dyn StoreTxn>, GraphError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(GraphError::Closed);
        }
        let working = match mode {
            AccessMode::Write => {
                self.inner.write_txns.fetch_add(1, Ordering::SeqCst);
                Some(self.inner.state.lock().await.clone())
            }
            AccessMode::Read => {
                self.inner.read_txns.fetch_add(1, Ordering::SeqCst);
                None
            }
        };
        Ok(Box::new(MemoryTxn {
            graph: self.clone(),
            working,
            log: Vec::new(),
        }))
    }

    async fn close(&self) -> Result<(), GraphError> {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A transaction on a [`MemoryGraph`]. `working` is present for writes only.
struct MemoryTxn {
    graph: MemoryGraph,
    working: Option<GraphState>,
    log: Vec<Statement>,
}

#[async_trait]
impl StoreTxn for MemoryTxn {
    async fn run(&mut self, statement: &Statement) -> Result<StatementOutput, GraphError> {
        if let Some(err) = self.graph.take_fault(statement.kind()) {
            return Err(err);
        }

        match self.working.as_mut() {
            Some(working) => {
                let output = working.apply(statement)?;
                if statement.is_write() {
                    self.log.push(statement.clone());
                }
                Ok(output)
            }
            None => {
                let mut state = self.graph.inner.state.lock().await;
                state.apply(statement)
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), GraphError> {
        if self.log.is_empty() {
            return Ok(());
        }
        let mut state = self.graph.inner.state.lock().await;
        // Replay onto the live graph so concurrent commits are merged, not overwritten.
        let mut next = state.clone();
        for statement in &self.log {
            next.apply(statement)?;
        }
        *state = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), GraphError> {
        Ok(())
    }
}

impl GraphState {
    fn apply(&mut self, statement: &Statement) -> Result<StatementOutput, GraphError> {
        let now = Utc::now();
        match statement {
            Statement::MergeCandidate { id, name, contact } => {
                self.candidates
                    .entry(id.clone())
                    .and_modify(|c| {
                        c.name = name.clone();
                        c.contact = contact.clone();
                        c.last_seen = now;
                    })
                    .or_insert_with(|| Candidate {
                        id: id.clone(),
                        name: name.clone(),
                        contact: contact.clone(),
                        first_seen: now,
                        last_seen: now,
                    });
                Ok(StatementOutput::Empty)
            }
            Statement::MergeSkill { label } => {
                self.skills.entry(label.clone()).or_insert_with(|| Skill {
                    name: label.clone(),
                    first_seen: now,
                });
                Ok(StatementOutput::Empty)
            }
            Statement::MergeHasSkill {
                candidate_id,
                skill,
                source,
                confidence,
            } => {
                if !self.candidates.contains_key(candidate_id) {
                    return Err(not_found("Candidate", &candidate_id.0));
                }
                if !self.skills.contains_key(skill) {
                    return Err(not_found("Skill", skill));
                }
                self.edges
                    .entry((candidate_id.clone(), skill.clone()))
                    .and_modify(|e| {
                        e.source = source.clone();
                        e.confidence = *confidence;
                        e.last_seen = now;
                    })
                    .or_insert_with(|| HasSkill {
                        candidate_id: candidate_id.clone(),
                        skill: skill.clone(),
                        source: source.clone(),
                        confidence: *confidence,
                        first_seen: now,
                        last_seen: now,
                    });
                Ok(StatementOutput::Empty)
            }
            Statement::CandidatesBySkill { skill } => {
                let rows = self
                    .edges
                    .keys()
                    .filter(|(_, s)| s == skill)
                    .filter_map(|(id, _)| self.candidates.get(id))
                    .map(|c| self.row(c))
                    .collect();
                Ok(StatementOutput::Rows(rows))
            }
            Statement::CandidatesByName { name_key: wanted } => {
                let rows = self
                    .candidates
                    .values()
                    .filter(|c| name_key(&c.name).contains(wanted.as_str()))
                    .map(|c| self.row(c))
                    .collect();
                Ok(StatementOutput::Rows(rows))
            }
            Statement::ListCandidates { limit } => {
                let rows = self
                    .candidates
                    .values()
                    .take(*limit as usize)
                    .map(|c| self.row(c))
                    .collect();
                Ok(StatementOutput::Rows(rows))
            }
            Statement::SkillLabels => Ok(StatementOutput::Labels(
                self.skills.keys().cloned().collect(),
            )),
            Statement::CountNodes { label } => {
                let n = match label {
                    NodeLabel::Candidate => self.candidates.len(),
                    NodeLabel::Skill => self.skills.len(),
                };
                Ok(StatementOutput::Count(n as i64))
            }
            Statement::CountHasSkill { skill } => {
                let n = match skill {
                    Some(skill) => self.edges.keys().filter(|(_, s)| s == skill).count(),
                    None => self.edges.len(),
                };
                Ok(StatementOutput::Count(n as i64))
            }
        }
    }

    fn row(&self, candidate: &Candidate) -> ResultRow {
        let skills = self
            .edges
            .keys()
            .filter(|(id, _)| id == &candidate.id)
            .map(|(_, skill)| skill.clone())
            .collect();
        ResultRow {
            candidate_id: candidate.id.clone(),
            name: candidate.name.clone(),
            contact: candidate.contact.clone(),
            skills,
        }
    }
}

fn not_found(label: &str, id: &str) -> GraphError {
    GraphError::NotFound {
        label: label.to_string(),
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> CandidateId {
        CandidateId(s.to_string())
    }

    async fn write(graph: &MemoryGraph, statements: &[Statement]) -> Result<(), GraphError> {
        let mut txn = graph.begin(AccessMode::Write).await?;
        for s in statements {
            txn.run(s).await?;
        }
        txn.commit().await
    }

    fn candidate(id: &str, name: &str) -> Statement {
        Statement::MergeCandidate {
            id: cid(id),
            name: name.to_string(),
            contact: String::new(),
        }
    }

    fn has_skill(id: &str, skill: &str) -> [Statement; 2] {
        [
            Statement::MergeSkill {
                label: skill.to_string(),
            },
            Statement::MergeHasSkill {
                candidate_id: cid(id),
                skill: skill.to_string(),
                source: "test".to_string(),
                confidence: None,
            },
        ]
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let graph = MemoryGraph::new();
        let mut txn = graph.begin(AccessMode::Write).await.unwrap();
        txn.run(&candidate("a", "Ann")).await.unwrap();

        assert_eq!(graph.node_count(NodeLabel::Candidate).await, 0);
        txn.commit().await.unwrap();
        assert_eq!(graph.node_count(NodeLabel::Candidate).await, 1);
    }

    #[tokio::test]
    async fn edge_requires_existing_endpoints() {
        let graph = MemoryGraph::new();
        let [_, edge] = has_skill("ghost", "rust");
        let err = write(
            &graph,
            &[
                Statement::MergeSkill {
                    label: "rust".to_string(),
                },
                edge,
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GraphError::NotFound { ref label, .. } if label == "Candidate"));
        assert_eq!(graph.node_count(NodeLabel::Skill).await, 0);
    }

    #[tokio::test]
    async fn merge_updates_display_fields() {
        let graph = MemoryGraph::new();
        write(&graph, &[candidate("a", "Ann")]).await.unwrap();
        let first = graph.candidate(&cid("a")).await.unwrap();

        write(&graph, &[candidate("a", "Ann Smith")]).await.unwrap();
        let second = graph.candidate(&cid("a")).await.unwrap();

        assert_eq!(second.name, "Ann Smith");
        assert_eq!(second.first_seen, first.first_seen);
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(graph.node_count(NodeLabel::Candidate).await, 1);
    }

    #[tokio::test]
    async fn concurrent_commits_are_merged() {
        let graph = MemoryGraph::new();
        let mut t1 = graph.begin(AccessMode::Write).await.unwrap();
        let mut t2 = graph.begin(AccessMode::Write).await.unwrap();

        t1.run(&candidate("a", "Ann")).await.unwrap();
        t2.run(&candidate("b", "Bob")).await.unwrap();
        t1.commit().await.unwrap();
        t2.commit().await.unwrap();

        assert_eq!(graph.node_count(NodeLabel::Candidate).await, 2);
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let graph = MemoryGraph::new();
        graph.fail_on(StatementKind::MergeSkill);

        let mut statements = vec![candidate("a", "Ann")];
        statements.extend(has_skill("a", "go"));

        let err = write(&graph, &statements).await.unwrap_err();
        assert!(matches!(err, GraphError::Injected(_)));
        write(&graph, &statements).await.unwrap();
        assert_eq!(graph.edge_count().await, 1);
    }

    #[tokio::test]
    async fn rows_list_sorted_skills() {
        let graph = MemoryGraph::new();
        let mut statements = vec![candidate("a", "Ann")];
        statements.extend(has_skill("a", "rust"));
        statements.extend(has_skill("a", "go"));
        write(&graph, &statements).await.unwrap();

        let mut txn = graph.begin(AccessMode::Read).await.unwrap();
        let rows = txn
            .run(&Statement::CandidatesBySkill {
                skill: "rust".to_string(),
            })
            .await
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].skills, vec!["go", "rust"]);
    }

    #[tokio::test]
    async fn closed_graph_refuses_transactions() {
        let graph = MemoryGraph::new();
        graph.close().await.unwrap();
        assert!(matches!(
            graph.begin(AccessMode::Read).await,
            Err(GraphError::Closed)
        ));
    }
}
