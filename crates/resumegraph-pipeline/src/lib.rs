//! resumegraph-pipeline: Extract, store, and query over the resume graph.
//!
//! A [`Pipeline`] takes one resume and one question through
//! `Idle → Extracting → Storing → Querying → Done`, stopping at the first
//! failing stage. Every run returns a [`PipelineOutcome`]; errors are
//! reported in the outcome rather than returned.

pub mod completion;
pub mod error;
pub mod extract;
pub mod loader;
pub mod state;
pub mod translate;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use resumegraph_core::config::PipelineSettings;
use resumegraph_core::error::error_chain;
use resumegraph_core::{Document, ExtractionError, QueryError, QueryPlan, ResultRow, StorageError};
use resumegraph_graph::{GraphSession, GraphWriter};

use crate::extract::{FactExtractor, RuleBasedExtractor};
use crate::state::{PipelineRun, PipelineState, Stage};
use crate::translate::QueryTranslator;

pub use crate::state::{PipelineOutcome, RunStatus};

/// Orchestrates extraction, storage, and querying for single runs.
///
/// Clone is cheap; clones share the graph session and the learned skill
/// vocabulary, so concurrent runs can each hold their own clone.
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn FactExtractor>,
    writer: GraphWriter,
    translator: Arc<QueryTranslator>,
    session: GraphSession,
    stage_timeout: Option<Duration>,
}

/// A stage failure, already rendered for the outcome.
struct StageFailure {
    stage: Stage,
    detail: String,
}

impl StageFailure {
    fn new(stage: Stage, err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            stage,
            detail: error_chain(err),
        }
    }
}

impl Pipeline {
    /// A pipeline with the rule-based extractor and the default vocabulary.
    pub fn new(session: GraphSession) -> Self {
        let extractor: Arc<dyn FactExtractor> = Arc::new(RuleBasedExtractor);
        let writer = GraphWriter::new(session.clone()).with_source(extractor.name());
        Self {
            extractor,
            writer,
            translator: Arc::new(QueryTranslator::new()),
            session,
            stage_timeout: None,
        }
    }

    /// Apply stage timeout, row limit, and extra vocabulary from settings.
    pub fn with_settings(self, settings: &PipelineSettings) -> Self {
        let translator = QueryTranslator::new()
            .with_row_limit(settings.row_limit)
            .with_skills(&settings.extra_skills);
        self.with_translator(translator)
            .with_stage_timeout(settings.stage_timeout())
    }

    pub fn with_extractor(mut self, extractor: impl FactExtractor + 'static) -> Self {
        self.writer = GraphWriter::new(self.session.clone()).with_source(extractor.name());
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_translator(mut self, translator: QueryTranslator) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    /// Cap every stage at `timeout`, in addition to the per-run timeout.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub fn session(&self) -> &GraphSession {
        &self.session
    }

    /// Add every skill already in the graph to the query vocabulary, so a
    /// fresh process recognizes skills stored by earlier runs.
    pub async fn learn_stored_skills(&self, timeout: Duration) -> Result<usize, QueryError> {
        let deadline = Instant::now() + timeout;
        let labels = self
            .within(deadline, self.session.skill_labels())
            .await
            .map_err(QueryError::Timeout)?
            .map_err(QueryError::execution)?;
        self.translator.learn(&labels);
        tracing::debug!(skill_count = labels.len(), "Vocabulary loaded from graph");
        Ok(labels.len())
    }

    /// Translate and execute a question alone, without storing anything.
    pub async fn ask(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<(QueryPlan, Vec<ResultRow>), QueryError> {
        let deadline = Instant::now() + timeout;
        let plan = self.translator.translate(query);
        let rows = self
            .within(deadline, self.translator.execute(&plan, &self.session))
            .await
            .map_err(QueryError::Timeout)??;
        Ok((plan, rows))
    }

    /// Take one document and one question through the full state machine.
    ///
    /// `timeout` bounds the whole run; each stage is additionally bounded by
    /// the configured stage timeout. Never fails: the outcome carries either
    /// results or the failing stage and its error chain.
    pub async fn run_pipeline(
        &self,
        document: &Document,
        query: &str,
        timeout: Duration,
    ) -> PipelineOutcome {
        let deadline = Instant::now() + timeout;
        let mut run = PipelineRun::start();
        tracing::info!(
            run_id = %run.run_id(),
            extractor = self.extractor.name(),
            source = document.source.as_deref().unwrap_or("-"),
            "Pipeline run started"
        );

        let outcome = match self.drive(&mut run, document, query, deadline).await {
            Ok(results) => run.finish(results),
            Err(failure) => {
                tracing::warn!(
                    run_id = %run.run_id(),
                    stage = failure.stage.as_str(),
                    error = %failure.detail,
                    "Pipeline run failed"
                );
                run.fail(failure.stage, failure.detail)
            }
        };

        tracing::info!(
            run_id = %outcome.run_id,
            status = ?outcome.status,
            elapsed_ms = outcome.elapsed_ms,
            "Pipeline run finished"
        );
        outcome
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        document: &Document,
        query: &str,
        deadline: Instant,
    ) -> Result<Vec<ResultRow>, StageFailure> {
        run.advance(PipelineState::Extracting);
        let facts = self
            .within(deadline, self.extractor.extract(document))
            .await
            .map_err(ExtractionError::Timeout)
            .and_then(|r| r)
            .map_err(|e| StageFailure::new(Stage::Extracting, &e))?;
        tracing::debug!(
            run_id = %run.run_id(),
            skill_count = facts.skills().len(),
            "Extraction complete"
        );

        run.advance(PipelineState::Storing);
        let candidate_id = self
            .within(deadline, self.writer.store(&facts))
            .await
            .map_err(StorageError::Timeout)
            .and_then(|r| r)
            .map_err(|e| StageFailure::new(Stage::Storing, &e))?;
        self.translator.learn(facts.skills());
        tracing::debug!(run_id = %run.run_id(), candidate_id = %candidate_id, "Storage complete");
        run.record_candidate(candidate_id);

        run.advance(PipelineState::Querying);
        let plan = self.translator.translate(query);
        run.record_plan(plan.clone());
        let rows = self
            .within(deadline, self.translator.execute(&plan, &self.session))
            .await
            .map_err(QueryError::Timeout)
            .and_then(|r| r)
            .map_err(|e| StageFailure::new(Stage::Querying, &e))?;
        tracing::debug!(run_id = %run.run_id(), ?plan, row_count = rows.len(), "Query complete");

        Ok(rows)
    }

    /// Await `fut` until the earlier of `deadline` and the stage timeout.
    /// On expiry, returns the budget the stage was given.
    async fn within<F: Future>(&self, deadline: Instant, fut: F) -> Result<F::Output, Duration> {
        let now = Instant::now();
        let stage_deadline = match self.stage_timeout {
            Some(limit) => deadline.min(now + limit),
            None => deadline,
        };
        tokio::time::timeout_at(stage_deadline, fut)
            .await
            .map_err(|_| stage_deadline.saturating_duration_since(now))
    }
}
