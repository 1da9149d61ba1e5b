//! Pipeline orchestration
//!
//! Runs the four phases end to end: one discovery call per schema phase
//! over the full corpus, then bounded-concurrency per-document application
//! with bulkhead isolation, then the aggregation barrier, then artifact and
//! graph persistence.
//!
//! Concurrency model: Phase 4 documents are unordered jobs consumed by a
//! semaphore-bounded pool; results flow back through the orchestrator's
//! single join loop, so no shared mutable accumulator is touched by more
//! than one writer. The aggregator runs only after every dispatched job has
//! reached a terminal state (success or quarantined failure).

pub mod artifacts;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::apply::DocumentApplicator;
use crate::config::PipelineConfig;
use crate::error::{PhaseError, PipelineError, PipelineResult};
use crate::graph::GraphStore;
use crate::llm::{LlmClient, StructuredExtractor};
use crate::models::{
    CorpusAggregate, DocumentResult, QuarantinedDocument, SchemaSet,
};
use crate::schema::SchemaDiscoverer;
use crate::source::{concatenate_corpus, InterviewDocument};

pub use artifacts::{write_artifacts, RunManifest};

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub question: String,
    pub corpus_sha256: String,
    pub schemas: SchemaSet,
    pub results: Vec<DocumentResult>,
    pub aggregate: CorpusAggregate,
    pub quarantined: Vec<QuarantinedDocument>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Recovered problems across all documents plus aggregation checks.
    pub fn warning_count(&self) -> usize {
        self.results.iter().map(|r| r.warnings.len()).sum::<usize>()
            + self.aggregate.warnings.len()
    }

    /// A run that finishes with quarantined documents or warnings completed
    /// successfully but with incomplete data; callers should surface this.
    pub fn is_clean(&self) -> bool {
        self.quarantined.is_empty() && self.warning_count() == 0
    }
}

/// The four-phase extraction pipeline.
pub struct ExtractionPipeline {
    client: Arc<dyn LlmClient>,
    config: PipelineConfig,
    graph: Option<Arc<dyn GraphStore>>,
}

impl ExtractionPipeline {
    pub fn new(client: Arc<dyn LlmClient>, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            graph: None,
        }
    }

    pub fn with_graph_store(mut self, store: Arc<dyn GraphStore>) -> Self {
        self.graph = Some(store);
        self
    }

    /// Run discovery, application, aggregation, and persistence.
    ///
    /// Fatal conditions (empty Phase 1 taxonomy, terminal phase failures)
    /// abort before any Phase 4 call is issued. Per-document failures are
    /// quarantined and never abort the batch.
    pub async fn run(
        &self,
        documents: &[InterviewDocument],
        question: &str,
    ) -> PipelineResult<PipelineReport> {
        if documents.is_empty() {
            return Err(PipelineError::EmptyCorpus);
        }
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let corpus = concatenate_corpus(documents);
        let corpus_sha256 = hex::encode(Sha256::digest(corpus.as_bytes()));
        info!(
            %run_id,
            documents = documents.len(),
            corpus_bytes = corpus.len(),
            "pipeline run starting"
        );

        let extractor = Arc::new(StructuredExtractor::with_config(
            self.client.clone(),
            self.config.extractor_config(),
        ));
        let schemas = self.discover(&extractor, &corpus, question).await?;
        let schemas = schemas.into_shared();

        let (results, quarantined) = self.apply_all(&extractor, &schemas, documents).await;
        for q in &quarantined {
            warn!(document_id = %q.document_id, reason = %q.reason, "document quarantined");
        }

        // Barrier reached: every dispatched job is terminal.
        let aggregate = aggregate(&results, quarantined.len());

        if let Some(store) = &self.graph {
            store.ensure_constraints().await?;
            store.persist_taxonomy(&schemas.taxonomy).await?;
            for result in &results {
                store.persist_document(result).await?;
            }
            info!(documents = results.len(), "graph persistence complete");
        }

        let report = PipelineReport {
            run_id,
            question: question.to_string(),
            corpus_sha256,
            schemas: (*schemas).clone(),
            results,
            aggregate,
            quarantined,
            started_at,
            finished_at: Utc::now(),
        };

        if let Some(dir) = &self.config.output_dir {
            write_artifacts(&report, dir)?;
        }

        info!(
            %run_id,
            processed = report.results.len(),
            quarantined = report.quarantined.len(),
            warnings = report.warning_count(),
            "pipeline run finished"
        );
        Ok(report)
    }

    /// Phases 1-3. Sequential by default; concurrent when configured (the
    /// phases have no cross-phase data dependency).
    async fn discover(
        &self,
        extractor: &StructuredExtractor,
        corpus: &str,
        question: &str,
    ) -> PipelineResult<SchemaSet> {
        let discoverer = SchemaDiscoverer::new(extractor, self.config.max_attempts);

        let code_seed = self.config.codes.resolve_seed().map_err(io_like)?;
        let speaker_seed = self.config.speakers.resolve_seed().map_err(io_like)?;
        let entity_seed = self.config.entities.resolve_seed().map_err(io_like)?;

        let (codes_result, speakers_result, entities_result) = if self.config.discover_concurrently
        {
            tokio::join!(
                discoverer.discover_codes(corpus, question, self.config.codes.mode, code_seed.as_deref()),
                discoverer.discover_speaker_schema(
                    corpus,
                    question,
                    self.config.speakers.mode,
                    speaker_seed.as_deref()
                ),
                discoverer.discover_entity_schema(
                    corpus,
                    question,
                    self.config.entities.mode,
                    entity_seed.as_deref()
                ),
            )
        } else {
            // The empty-taxonomy check runs before phases 2-3 are even
            // attempted: with zero codes there is nothing to apply.
            let codes = match discoverer
                .discover_codes(corpus, question, self.config.codes.mode, code_seed.as_deref())
                .await
            {
                Ok(taxonomy) => Ok(taxonomy),
                Err(err) => return Err(escalate_phase1(err)),
            };
            let speakers = discoverer
                .discover_speaker_schema(
                    corpus,
                    question,
                    self.config.speakers.mode,
                    speaker_seed.as_deref(),
                )
                .await;
            let entities = discoverer
                .discover_entity_schema(
                    corpus,
                    question,
                    self.config.entities.mode,
                    entity_seed.as_deref(),
                )
                .await;
            (codes, speakers, entities)
        };

        let taxonomy = codes_result.map_err(escalate_phase1)?;
        let speaker_schema = speakers_result?;
        let entity_schema = entities_result?;

        Ok(SchemaSet {
            taxonomy,
            speaker_schema,
            entity_schema,
        })
    }

    /// Phase 4: bounded worker pool over an unordered document queue.
    async fn apply_all(
        &self,
        extractor: &Arc<StructuredExtractor>,
        schemas: &Arc<SchemaSet>,
        documents: &[InterviewDocument],
    ) -> (Vec<DocumentResult>, Vec<QuarantinedDocument>) {
        let applicator = DocumentApplicator::new(
            extractor.clone(),
            schemas.clone(),
            self.config.invalid_code_strategy,
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let timeout = self.config.document_timeout();

        let mut join_set: JoinSet<(String, Result<DocumentResult, String>)> = JoinSet::new();
        for document in documents.iter().cloned() {
            let applicator = applicator.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (document.id, Err("scheduler shut down".to_string())),
                };
                match tokio::time::timeout(timeout, applicator.apply(&document)).await {
                    Ok(Ok(result)) => (document.id, Ok(result)),
                    Ok(Err(err)) => (document.id, Err(err.to_string())),
                    Err(_) => (
                        document.id,
                        Err(format!("timed out after {}s", timeout.as_secs())),
                    ),
                }
            });
        }

        // Single-writer collection: only this loop touches the accumulators.
        let mut results: Vec<DocumentResult> = Vec::new();
        let mut quarantined: Vec<QuarantinedDocument> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(result))) => results.push(result),
                Ok((document_id, Err(reason))) => {
                    quarantined.push(QuarantinedDocument {
                        document_id,
                        reason,
                    });
                }
                Err(join_err) => {
                    error!(error = %join_err, "document task aborted");
                    quarantined.push(QuarantinedDocument {
                        document_id: "<aborted task>".to_string(),
                        reason: join_err.to_string(),
                    });
                }
            }
        }

        // Completion order is unordered; sort for stable artifacts.
        results.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        quarantined.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        (results, quarantined)
    }
}

/// Phase 1 emptiness is the documented corpus-level cascading failure; it
/// gets its own fatal variant so callers see "empty taxonomy", not a
/// generic phase error.
fn escalate_phase1(err: PhaseError) -> PipelineError {
    match err {
        PhaseError::EmptyResult { .. } => PipelineError::EmptyTaxonomy,
        other => PipelineError::Phase(other),
    }
}

fn io_like(err: anyhow::Error) -> PipelineError {
    PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}
