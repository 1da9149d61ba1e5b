//! End-to-end pipeline scenarios against the deterministic mock backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use qualcode::config::PipelineConfig;
use qualcode::error::PipelineError;
use qualcode::graph::{EdgeKind, GraphStore, InMemoryGraphStore};
use qualcode::llm::{LlmClient, MockLlmClient};
use qualcode::pipeline::ExtractionPipeline;
use qualcode::source::InterviewDocument;

fn documents(n: usize) -> Vec<InterviewDocument> {
    (1..=n)
        .map(|i| {
            InterviewDocument::new(
                format!("doc-{}", i),
                format!("Hello.\nSpeaker {} worries about AI displacing analysts.\nBye.", i),
            )
        })
        .collect()
}

/// Mock with working discovery responses for all three phases.
fn scripted_mock() -> MockLlmClient {
    MockLlmClient::new()
        .with_tool_response(
            "discover_codes",
            json!({"codes": [
                {"id": "AI_RISK", "name": "AI Risk", "description": "AI harm concerns"},
                {"id": "AI_RISK_JOBS", "name": "Job displacement", "parent_id": "AI_RISK"}
            ]}),
        )
        .with_tool_response(
            "discover_speaker_schema",
            json!({"properties": [
                {"key": "role", "type": "string", "required": false}
            ]}),
        )
        .with_tool_response(
            "discover_entity_schema",
            json!({
                "entity_types": [{"name": "Organization"}],
                "relationship_types": []
            }),
        )
        .with_tool_response(
            "apply_schemas",
            json!({
                "quotes": [{
                    "text": "worries about AI displacing analysts",
                    "code_ids": ["AI_RISK_JOBS"],
                    "speaker": {"name": "Ana", "confidence": 0.9},
                    "line_start": 2,
                    "line_end": 2
                }],
                "entities": [{"name": "Acme", "type": "Organization", "quote_indexes": [0]}]
            }),
        )
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        max_concurrency: 2,
        max_attempts: 1,
        backoff_ms: 1,
        call_timeout_secs: 5,
        document_timeout_secs: 30,
        ..PipelineConfig::default()
    }
}

/// Scenario C: zero codes from Phase 1 aborts before any Phase 4 call.
#[tokio::test]
async fn empty_taxonomy_aborts_before_application() {
    let mock = Arc::new(
        MockLlmClient::new().with_tool_response("discover_codes", json!({"codes": []})),
    );
    let client: Arc<dyn LlmClient> = mock.clone();
    let pipeline = ExtractionPipeline::new(client, fast_config());

    let err = pipeline
        .run(&documents(3), "How do people see AI risk?")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyTaxonomy));
    assert_eq!(mock.calls("apply_schemas"), 0);
    // Sequential by default: later discovery phases never ran either.
    assert_eq!(mock.calls("discover_speaker_schema"), 0);
}

/// Scenario D: bounded concurrency, order-independent totals, bulkhead
/// isolation of the one failing document.
#[tokio::test]
async fn bounded_pool_isolates_failures_and_sums_totals() {
    let mock = Arc::new(
        scripted_mock()
            .with_delay(Duration::from_millis(25))
            .fail_when_prompt_contains("## Document doc-3"),
    );
    let client: Arc<dyn LlmClient> = mock.clone();
    let pipeline = ExtractionPipeline::new(client, fast_config());

    let report = pipeline
        .run(&documents(5), "How do people see AI risk?")
        .await
        .unwrap();

    // At most 2 document jobs in flight at any moment (discovery calls run
    // one at a time before the pool starts).
    assert!(
        mock.max_in_flight() <= 2,
        "max in flight was {}",
        mock.max_in_flight()
    );
    assert_eq!(mock.calls("apply_schemas"), 5);

    assert_eq!(report.results.len(), 4);
    assert_eq!(report.quarantined.len(), 1);
    assert_eq!(report.quarantined[0].document_id, "doc-3");
    assert!(!report.is_clean());

    // Totals equal the sum of the four successful documents.
    assert_eq!(report.aggregate.total_quotes, 4);
    assert_eq!(report.aggregate.code_stats["AI_RISK_JOBS"].applications, 4);
    assert_eq!(report.aggregate.code_stats["AI_RISK_JOBS"].document_count, 4);
    assert_eq!(report.aggregate.documents_quarantined, 1);

    // Results are keyed by document id, not completion order.
    let ids: Vec<&str> = report
        .results
        .iter()
        .map(|r| r.document_id.as_str())
        .collect();
    assert_eq!(ids, vec!["doc-1", "doc-2", "doc-4", "doc-5"]);
}

/// Referential integrity: every persisted code id exists in the taxonomy.
#[tokio::test]
async fn all_persisted_code_ids_exist_in_taxonomy() {
    let mock = Arc::new(scripted_mock());
    let client: Arc<dyn LlmClient> = mock.clone();
    let pipeline = ExtractionPipeline::new(client, fast_config());

    let report = pipeline
        .run(&documents(3), "How do people see AI risk?")
        .await
        .unwrap();

    for result in &report.results {
        for quote in &result.quotes {
            assert!(!quote.code_ids.is_empty());
            for code_id in &quote.code_ids {
                assert!(
                    report.schemas.taxonomy.contains(code_id),
                    "code id {} missing from taxonomy",
                    code_id
                );
            }
        }
    }
}

/// A per-document timeout quarantines that document without aborting the
/// batch or the run.
#[tokio::test]
async fn document_timeout_quarantines_without_aborting() {
    let mock = Arc::new(scripted_mock().with_delay(Duration::from_millis(50)));
    let client: Arc<dyn LlmClient> = mock.clone();
    let mut config = fast_config();
    config.document_timeout_secs = 0;
    let pipeline = ExtractionPipeline::new(client, config);

    let report = pipeline
        .run(&documents(2), "How do people see AI risk?")
        .await
        .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.quarantined.len(), 2);
    assert!(report.quarantined[0].reason.contains("timed out"));
    assert_eq!(report.aggregate.total_quotes, 0);
}

/// Graph persistence through the pipeline is idempotent per document id.
#[tokio::test]
async fn graph_reimport_is_idempotent() {
    let store = Arc::new(InMemoryGraphStore::new());

    for _ in 0..2 {
        let mock = Arc::new(scripted_mock());
        let client: Arc<dyn LlmClient> = mock.clone();
        let pipeline = ExtractionPipeline::new(client, fast_config())
            .with_graph_store(store.clone() as Arc<dyn GraphStore>);
        pipeline
            .run(&documents(2), "How do people see AI risk?")
            .await
            .unwrap();
    }

    assert_eq!(store.node_count("Document"), 2);
    assert_eq!(store.node_count("Quote"), 2);
    assert_eq!(store.node_count("Code"), 2);
    assert_eq!(store.node_count("Speaker"), 1);
    assert_eq!(store.node_count("Entity"), 2);
    assert_eq!(store.edge_count(EdgeKind::HasCode), 2);
    assert_eq!(store.edge_count(EdgeKind::FromDocument), 2);
    assert_eq!(store.edge_count(EdgeKind::ChildOf), 1);
    assert_eq!(store.edge_count(EdgeKind::Mentions), 2);
}

/// Artifact layout: one file per schema artifact, one per document result,
/// plus aggregate and manifest.
#[tokio::test]
async fn artifacts_are_written_per_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(scripted_mock());
    let client: Arc<dyn LlmClient> = mock.clone();
    let mut config = fast_config();
    config.output_dir = Some(dir.path().to_path_buf());
    let pipeline = ExtractionPipeline::new(client, config);

    let report = pipeline
        .run(&documents(2), "How do people see AI risk?")
        .await
        .unwrap();

    for name in [
        "taxonomy.json",
        "speaker_schema.json",
        "entity_schema.json",
        "aggregate.json",
        "quarantine.json",
        "run.json",
    ] {
        assert!(dir.path().join(name).exists(), "{} missing", name);
    }
    for result in &report.results {
        assert!(dir
            .path()
            .join("results")
            .join(format!("{}.json", result.document_id))
            .exists());
    }

    let taxonomy: qualcode::CodeTaxonomy =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("taxonomy.json")).unwrap())
            .unwrap();
    assert_eq!(taxonomy.len(), 2);
}

/// An empty corpus is rejected up front.
#[tokio::test]
async fn empty_corpus_is_rejected() {
    let mock = Arc::new(scripted_mock());
    let client: Arc<dyn LlmClient> = mock.clone();
    let pipeline = ExtractionPipeline::new(client, fast_config());
    let err = pipeline.run(&[], "question").await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyCorpus));
}
