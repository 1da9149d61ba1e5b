//! Run artifact persistence
//!
//! One taxonomy artifact, one speaker-schema artifact, one
//! entity/relationship-schema artifact, one result artifact per document
//! (keyed by document_id), one corpus aggregate, and a run manifest with
//! the corpus fingerprint.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::PipelineReport;
use crate::error::PipelineResult;

/// Top-level record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub question: String,
    pub corpus_sha256: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub documents_processed: usize,
    pub documents_quarantined: usize,
    pub warning_count: usize,
}

pub fn write_artifacts(report: &PipelineReport, dir: &Path) -> PipelineResult<()> {
    let results_dir = dir.join("results");
    std::fs::create_dir_all(&results_dir)?;

    write_json(&dir.join("taxonomy.json"), &report.schemas.taxonomy)?;
    write_json(&dir.join("speaker_schema.json"), &report.schemas.speaker_schema)?;
    write_json(&dir.join("entity_schema.json"), &report.schemas.entity_schema)?;

    for result in &report.results {
        write_json(
            &results_dir.join(format!("{}.json", result.document_id)),
            result,
        )?;
    }

    write_json(&dir.join("aggregate.json"), &report.aggregate)?;
    write_json(&dir.join("quarantine.json"), &report.quarantined)?;

    let manifest = RunManifest {
        run_id: report.run_id,
        question: report.question.clone(),
        corpus_sha256: report.corpus_sha256.clone(),
        started_at: report.started_at,
        finished_at: report.finished_at,
        documents_processed: report.results.len(),
        documents_quarantined: report.quarantined.len(),
        warning_count: report.warning_count(),
    };
    write_json(&dir.join("run.json"), &manifest)?;

    info!(dir = %dir.display(), "run artifacts written");
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    Ok(())
}
