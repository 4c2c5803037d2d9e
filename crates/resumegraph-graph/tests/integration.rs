//! Integration tests for resumegraph-graph against a live Neo4j instance.
//!
//! These tests require a Neo4j server at the default URI.
//! Run with: cargo test --package resumegraph-graph --test integration -- --ignored
//!
//! Skipped automatically if Neo4j is not available.

use chrono::Utc;
use resumegraph_core::CandidateFacts;
use resumegraph_graph::{GraphClient, GraphConfig, GraphError, GraphSession, GraphWriter};

async fn connect_or_skip() -> Option<(GraphClient, GraphSession)> {
    let config = GraphConfig::default();
    match GraphClient::connect(&config).await {
        Ok(client) => {
            if let Err(e) = client.ensure_schema().await {
                eprintln!("Skipping integration test (schema setup failed): {e}");
                return None;
            }
            let session = GraphSession::new(client.clone(), config.max_connections as usize);
            Some((client, session))
        }
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

/// A suffix that keeps concurrent test runs apart.
fn unique() -> String {
    Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .to_string()
}

async fn cleanup(client: &GraphClient, suffix: &str) {
    let q = neo4rs::query(
        "MATCH (n) WHERE (n:Candidate AND n.contact ENDS WITH $suffix)
                      OR (n:Skill AND n.name ENDS WITH $suffix)
         DETACH DELETE n",
    )
    .param("suffix", suffix.to_string());
    let _ = client.run(q).await;
}

fn facts(name: &str, suffix: &str, skills: &[&str]) -> CandidateFacts {
    let contact = format!("{}@example.com.{suffix}", name.to_lowercase().replace(' ', "."));
    let skills: Vec<String> = skills.iter().map(|s| format!("{s}-{suffix}")).collect();
    CandidateFacts::new(name, &contact, skills).unwrap()
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_store_is_idempotent() {
    let Some((client, session)) = connect_or_skip().await else {
        return;
    };
    let suffix = unique();
    let writer = GraphWriter::new(session.clone());
    let john = facts("John Doe", &suffix, &["python", "neo4j"]);

    writer.store(&john).await.unwrap();
    writer.store(&john).await.unwrap();

    let python = format!("python-{suffix}");
    let rows = session.candidates_by_skill(&python).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].candidate_id, john.identity());
    assert_eq!(rows[0].skills.len(), 2);
    assert_eq!(session.count_has_skill(Some(&python)).await.unwrap(), 1);

    cleanup(&client, &suffix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_skill_shared_and_ordered_by_id() {
    let Some((client, session)) = connect_or_skip().await else {
        return;
    };
    let suffix = unique();
    let writer = GraphWriter::new(session.clone());
    let a = facts("Alice Smith", &suffix, &["python", "go"]);
    let b = facts("Bob Jones", &suffix, &["go"]);

    writer.store(&a).await.unwrap();
    writer.store(&b).await.unwrap();

    let go = format!("go-{suffix}");
    let rows = session.candidates_by_skill(&go).await.unwrap();
    let mut expected = vec![a.identity(), b.identity()];
    expected.sort();
    let ids: Vec<_> = rows.into_iter().map(|r| r.candidate_id).collect();
    assert_eq!(ids, expected);

    let python = format!("python-{suffix}");
    let rows = session.candidates_by_skill(&python).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Alice Smith");

    cleanup(&client, &suffix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_find_by_name() {
    let Some((client, session)) = connect_or_skip().await else {
        return;
    };
    let suffix = unique();
    let writer = GraphWriter::new(session.clone());
    let name = format!("Lookup Person {suffix}");
    let person = facts(&name, &suffix, &["rust"]);
    writer.store(&person).await.unwrap();

    let found = session
        .candidates_by_name(&format!("person {suffix}"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].candidate_id, person.identity());

    let missing = session
        .candidates_by_name(&format!("nobody {suffix}"))
        .await
        .unwrap();
    assert!(missing.is_empty());

    cleanup(&client, &suffix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_close_releases_pool_once() {
    let Some((client, session)) = connect_or_skip().await else {
        return;
    };
    session.close().await.unwrap();
    session.close().await.unwrap();
    assert!(session.candidates_by_skill("rust").await.is_err());
    assert!(client.run(neo4rs::query("RETURN 1")).await.is_err());
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_malformed_column_is_a_serialization_error() {
    let Some((client, session)) = connect_or_skip().await else {
        return;
    };
    let suffix = unique();
    let name = format!("Malformed {suffix}");
    // contact must be a string; a list cannot decode into one
    let q = neo4rs::query(
        "CREATE (c:Candidate {id: $id, name: $name, name_key: toLower($name),
                              contact: [$suffix]})",
    )
    .param("id", format!("malformed-{suffix}"))
    .param("name", name.clone())
    .param("suffix", suffix.clone());
    client.run(q).await.unwrap();

    let err = session.candidates_by_name(&name).await.unwrap_err();
    assert!(matches!(err, GraphError::Serialization(_)), "{err}");

    let cleanup_q = neo4rs::query("MATCH (c:Candidate {id: $id}) DETACH DELETE c")
        .param("id", format!("malformed-{suffix}"));
    let _ = client.run(cleanup_q).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_skill_labels_include_stored_skills() {
    let Some((client, session)) = connect_or_skip().await else {
        return;
    };
    let suffix = unique();
    let writer = GraphWriter::new(session.clone());
    writer
        .store(&facts("Label Person", &suffix, &["elm"]))
        .await
        .unwrap();

    let labels = session.skill_labels().await.unwrap();
    assert!(labels.contains(&format!("elm-{suffix}")));

    cleanup(&client, &suffix).await;
}
