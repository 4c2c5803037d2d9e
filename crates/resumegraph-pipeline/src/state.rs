//! Pipeline run states and the outcome record.

use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use resumegraph_core::{CandidateId, QueryPlan, ResultRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Extracting,
    Storing,
    Querying,
    Done,
    Errored,
}

impl PipelineState {
    /// Legal edges of the run state machine. `Done` and `Errored` are terminal.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Extracting)
                | (Extracting, Storing)
                | (Storing, Querying)
                | (Querying, Done)
                | (Extracting | Storing | Querying, Errored)
        )
    }
}

/// The working states, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extracting,
    Storing,
    Querying,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::Storing => "storing",
            Self::Querying => "querying",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Errored,
}

/// What one pipeline run produced. Never carries an `Err`; failures are
/// reported through `error_stage`/`error_detail`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<CandidateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<QueryPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Every state the run visited, starting with `idle`.
    pub transitions: Vec<PipelineState>,
    pub elapsed_ms: u64,
}

impl PipelineOutcome {
    pub fn is_done(&self) -> bool {
        self.status == RunStatus::Done
    }
}

/// Tracks one run through the state machine and accumulates its outcome.
#[derive(Debug)]
pub(crate) struct PipelineRun {
    run_id: Uuid,
    started: Instant,
    state: PipelineState,
    transitions: Vec<PipelineState>,
    candidate_id: Option<CandidateId>,
    plan: Option<QueryPlan>,
}

impl PipelineRun {
    pub(crate) fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started: Instant::now(),
            state: PipelineState::Idle,
            transitions: vec![PipelineState::Idle],
            candidate_id: None,
            plan: None,
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Move to `next`. Illegal edges are refused and leave the state as is.
    pub(crate) fn advance(&mut self, next: PipelineState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                run_id = %self.run_id,
                from = ?self.state,
                to = ?next,
                "Illegal pipeline transition refused"
            );
            return false;
        }
        self.state = next;
        self.transitions.push(next);
        true
    }

    pub(crate) fn record_candidate(&mut self, id: CandidateId) {
        self.candidate_id = Some(id);
    }

    pub(crate) fn record_plan(&mut self, plan: QueryPlan) {
        self.plan = Some(plan);
    }

    pub(crate) fn finish(mut self, results: Vec<ResultRow>) -> PipelineOutcome {
        self.advance(PipelineState::Done);
        let status = match self.state {
            PipelineState::Done => RunStatus::Done,
            _ => RunStatus::Errored,
        };
        self.into_outcome(status, Some(results), None, None)
    }

    pub(crate) fn fail(mut self, stage: Stage, detail: String) -> PipelineOutcome {
        self.advance(PipelineState::Errored);
        self.into_outcome(RunStatus::Errored, None, Some(stage), Some(detail))
    }

    fn into_outcome(
        self,
        status: RunStatus,
        results: Option<Vec<ResultRow>>,
        error_stage: Option<Stage>,
        error_detail: Option<String>,
    ) -> PipelineOutcome {
        PipelineOutcome {
            run_id: self.run_id,
            status,
            candidate_id: self.candidate_id,
            plan: self.plan,
            results,
            error_stage,
            error_detail,
            transitions: self.transitions,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
