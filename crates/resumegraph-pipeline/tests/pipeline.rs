//! End-to-end pipeline behavior against the in-memory graph.

use std::time::Duration;

use async_trait::async_trait;

use resumegraph_core::{
    CandidateFacts, CandidateId, Document, DocumentFormat, ExtractionError, NodeLabel, QueryPlan,
};
use resumegraph_graph::{GraphSession, MemoryGraph, StatementKind};
use resumegraph_pipeline::extract::FactExtractor;
use resumegraph_pipeline::state::{PipelineState, Stage};
use resumegraph_pipeline::{Pipeline, RunStatus};

const TIMEOUT: Duration = Duration::from_secs(10);

const ALICE: &str = "Alice Smith\n\
                     alice@example.com\n\
                     \n\
                     Skills\n\
                     Python, Go\n";

const BOB: &str = "Name: Bob Jones\n\
                   Email: bob@example.com\n\
                   Skills: Go\n";

fn setup() -> (MemoryGraph, Pipeline) {
    let graph = MemoryGraph::new();
    let session = GraphSession::new(graph.clone(), 4);
    (graph, Pipeline::new(session))
}

fn id_of(name: &str, contact: &str) -> CandidateId {
    CandidateFacts::new(name, contact, Vec::<String>::new())
        .unwrap()
        .identity()
}

fn ids(outcome: &resumegraph_pipeline::PipelineOutcome) -> Vec<CandidateId> {
    outcome
        .results
        .as_ref()
        .expect("results present")
        .iter()
        .map(|row| row.candidate_id.clone())
        .collect()
}

#[tokio::test]
async fn skill_queries_return_matching_candidates_in_identity_order() {
    let (_graph, pipeline) = setup();
    let alice = id_of("Alice Smith", "alice@example.com");
    let bob = id_of("Bob Jones", "bob@example.com");

    let first = pipeline
        .run_pipeline(&Document::text(ALICE), "Find candidates with Python skills", TIMEOUT)
        .await;
    assert_eq!(first.status, RunStatus::Done);
    assert_eq!(first.candidate_id.as_ref(), Some(&alice));
    assert_eq!(ids(&first), vec![alice.clone()]);

    let second = pipeline
        .run_pipeline(&Document::text(BOB), "Find candidates with Go skills", TIMEOUT)
        .await;
    assert_eq!(second.status, RunStatus::Done);
    assert_eq!(
        second.plan,
        Some(QueryPlan::FindBySkill {
            skill: "go".to_string()
        })
    );

    let mut expected = vec![alice, bob];
    expected.sort();
    assert_eq!(ids(&second), expected);

    let rows = second.results.unwrap();
    let alice_row = rows.iter().find(|r| r.name == "Alice Smith").unwrap();
    assert_eq!(alice_row.skills, vec!["go", "python"]);
    assert_eq!(
        second.transitions,
        vec![
            PipelineState::Idle,
            PipelineState::Extracting,
            PipelineState::Storing,
            PipelineState::Querying,
            PipelineState::Done,
        ]
    );
}

#[tokio::test]
async fn unsupported_query_is_empty_not_an_error() {
    let (graph, pipeline) = setup();

    let outcome = pipeline
        .run_pipeline(&Document::text(ALICE), "What is the capital of France?", TIMEOUT)
        .await;

    assert_eq!(outcome.status, RunStatus::Done);
    assert_eq!(outcome.plan, Some(QueryPlan::Unsupported));
    assert_eq!(outcome.results, Some(Vec::new()));
    assert_eq!(graph.read_transactions(), 0);
    assert_eq!(graph.node_count(NodeLabel::Candidate).await, 1);
}

#[tokio::test]
async fn extraction_failure_never_touches_the_graph() {
    let (graph, pipeline) = setup();

    for document in [
        Document::text(""),
        Document::new(vec![0xff, 0xfe, 0xfd], DocumentFormat::PlainText),
    ] {
        let outcome = pipeline
            .run_pipeline(&document, "Find candidates with Python skills", TIMEOUT)
            .await;

        assert_eq!(outcome.status, RunStatus::Errored);
        assert_eq!(outcome.error_stage, Some(Stage::Extracting));
        assert!(outcome.error_detail.is_some());
        assert!(outcome.candidate_id.is_none());
        assert_eq!(
            outcome.transitions,
            vec![
                PipelineState::Idle,
                PipelineState::Extracting,
                PipelineState::Errored
            ]
        );
    }

    assert_eq!(graph.write_transactions(), 0);
    assert_eq!(graph.read_transactions(), 0);
    assert_eq!(graph.node_count(NodeLabel::Candidate).await, 0);
}

#[tokio::test]
async fn storage_failure_stops_before_query() {
    let (graph, pipeline) = setup();
    graph.fail_on(StatementKind::MergeHasSkill);

    let outcome = pipeline
        .run_pipeline(&Document::text(ALICE), "Find candidates with Python skills", TIMEOUT)
        .await;

    assert_eq!(outcome.status, RunStatus::Errored);
    assert_eq!(outcome.error_stage, Some(Stage::Storing));
    assert!(outcome
        .error_detail
        .as_deref()
        .unwrap()
        .contains("Injected failure"));
    assert!(outcome.plan.is_none());
    assert_eq!(graph.read_transactions(), 0);
    assert_eq!(graph.node_count(NodeLabel::Candidate).await, 0);
    assert_eq!(graph.edge_count().await, 0);
}

#[tokio::test]
async fn query_failure_keeps_stored_candidate() {
    let (graph, pipeline) = setup();
    graph.fail_on(StatementKind::CandidatesBySkill);

    let outcome = pipeline
        .run_pipeline(&Document::text(ALICE), "Find candidates with Python skills", TIMEOUT)
        .await;

    assert_eq!(outcome.status, RunStatus::Errored);
    assert_eq!(outcome.error_stage, Some(Stage::Querying));
    assert!(outcome.candidate_id.is_some());
    assert!(outcome.results.is_none());
    assert_eq!(graph.node_count(NodeLabel::Candidate).await, 1);
}

struct Stalled;

#[async_trait]
impl FactExtractor for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn extract(&self, _document: &Document) -> Result<CandidateFacts, ExtractionError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(ExtractionError::Empty)
    }
}

#[tokio::test]
async fn timeout_surfaces_as_stage_error() {
    let (graph, pipeline) = setup();
    let pipeline = pipeline.with_extractor(Stalled);

    let outcome = pipeline
        .run_pipeline(
            &Document::text(ALICE),
            "Find candidates with Python skills",
            Duration::from_millis(50),
        )
        .await;

    assert_eq!(outcome.status, RunStatus::Errored);
    assert_eq!(outcome.error_stage, Some(Stage::Extracting));
    assert!(outcome
        .error_detail
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert_eq!(graph.write_transactions(), 0);
}

#[tokio::test]
async fn stage_timeout_applies_within_a_long_run() {
    let (_graph, pipeline) = setup();
    let pipeline = pipeline
        .with_extractor(Stalled)
        .with_stage_timeout(Duration::from_millis(50));

    let outcome = pipeline
        .run_pipeline(&Document::text(ALICE), "List all candidates", TIMEOUT)
        .await;

    assert_eq!(outcome.error_stage, Some(Stage::Extracting));
    assert!(outcome.elapsed_ms < TIMEOUT.as_millis() as u64);
}

#[tokio::test]
async fn rerunning_a_document_converges() {
    let (graph, pipeline) = setup();

    for _ in 0..3 {
        let outcome = pipeline
            .run_pipeline(&Document::text(ALICE), "List all candidates", TIMEOUT)
            .await;
        assert!(outcome.is_done());
        assert_eq!(outcome.results.map(|r| r.len()), Some(1));
    }

    assert_eq!(graph.node_count(NodeLabel::Candidate).await, 1);
    assert_eq!(graph.node_count(NodeLabel::Skill).await, 2);
    assert_eq!(graph.edge_count().await, 2);
    // one fresh query per run
    assert_eq!(graph.read_transactions(), 3);
}

#[tokio::test]
async fn extracted_skills_become_queryable_terms() {
    let (_graph, pipeline) = setup();
    let resume = "Carol White\ncarol@example.com\nSkills: Elm, Haskell\n";

    let outcome = pipeline
        .run_pipeline(&Document::text(resume), "who writes elm", TIMEOUT)
        .await;

    assert_eq!(
        outcome.plan,
        Some(QueryPlan::FindBySkill {
            skill: "elm".to_string()
        })
    );
    assert_eq!(outcome.results.map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn fresh_pipeline_learns_skills_already_stored() {
    let (graph, pipeline) = setup();
    let resume = "Carol White\ncarol@example.com\nSkills: Elm, Haskell\n";
    pipeline
        .run_pipeline(&Document::text(resume), "List all candidates", TIMEOUT)
        .await;

    let restarted = Pipeline::new(GraphSession::new(graph.clone(), 4));
    let (plan, _) = restarted.ask("who writes elm", TIMEOUT).await.unwrap();
    assert_eq!(plan, QueryPlan::Unsupported);

    let learned = restarted.learn_stored_skills(TIMEOUT).await.unwrap();
    assert_eq!(learned, 2);

    let (plan, rows) = restarted.ask("who writes elm", TIMEOUT).await.unwrap();
    assert_eq!(
        plan,
        QueryPlan::FindBySkill {
            skill: "elm".to_string()
        }
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Carol White");
}

#[tokio::test]
async fn concurrent_runs_share_one_session() {
    let (graph, pipeline) = setup();

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = pipeline.clone();
        let resume = if i % 2 == 0 { ALICE } else { BOB };
        handles.push(tokio::spawn(async move {
            pipeline
                .run_pipeline(&Document::text(resume), "Find candidates with Go skills", TIMEOUT)
                .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.is_done(), "{:?}", outcome.error_detail);
        assert!(!outcome.results.unwrap().is_empty());
    }

    assert_eq!(graph.node_count(NodeLabel::Candidate).await, 2);
    assert_eq!(graph.node_count(NodeLabel::Skill).await, 2);
    assert_eq!(graph.edge_count().await, 3);
}

#[tokio::test]
async fn ask_reads_without_writing() {
    let (graph, pipeline) = setup();
    pipeline
        .run_pipeline(&Document::text(BOB), "List all candidates", TIMEOUT)
        .await;
    let writes = graph.write_transactions();

    let (plan, rows) = pipeline
        .ask("Find candidates named bob", TIMEOUT)
        .await
        .unwrap();

    assert_eq!(
        plan,
        QueryPlan::FindByName {
            name: "bob".to_string()
        }
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Bob Jones");
    assert_eq!(graph.write_transactions(), writes);
}
