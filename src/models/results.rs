//! Per-document and corpus-level result records
//!
//! A [`DocumentResult`] is created exactly once per document during Phase 4
//! and is append-only afterwards; corrections are new writes plus retraction
//! of stale edges, never in-place mutation. The [`CorpusAggregate`] is a
//! derived view recomputed from the per-document records — never itself a
//! source of truth.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::{ExtractedEntity, ExtractedRelationship};
use super::quote::EnhancedQuote;

/// Category of a recovered data-integrity problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Backend returned a code id absent from the taxonomy.
    UnknownCodeId,
    /// Code id recovered by fuzzy match instead of being dropped.
    FuzzyMatchedCodeId,
    /// Quote dropped because no valid code id survived.
    QuoteDropped,
    /// Entity instance type absent from the Phase 3 schema.
    UnknownEntityType,
    /// Relationship instance type absent from the Phase 3 schema.
    UnknownRelationshipType,
    /// Relationship endpoint does not resolve to an arena entity.
    DanglingRelationship,
    /// Speaker property key not declared by the Phase 2 schema.
    UnknownSpeakerProperty,
    /// Speaker property value does not match its declared type tag.
    PropertyTypeMismatch,
    /// Required speaker property missing.
    MissingRequiredProperty,
    /// A reported total does not match the length of its backing list.
    CountMismatch,
}

/// One recovered problem, kept alongside the data it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub document_id: String,
    pub kind: WarningKind,
    pub detail: String,
}

impl ValidationWarning {
    pub fn new(document_id: &str, kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            document_id: document_id.to_string(),
            kind,
            detail: detail.into(),
        }
    }
}

/// A quote->quote link representing cross-speaker idea flow: two nearby
/// quotes from different speakers sharing a taxonomy code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThematicLink {
    pub from_quote_id: String,
    pub to_quote_id: String,
    pub shared_code_id: String,
}

/// Everything Phase 4 produced for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_id: String,
    pub quotes: Vec<EnhancedQuote>,
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<ExtractedRelationship>,
    pub thematic_links: Vec<ThematicLink>,
    /// Applications per code id as counted at assembly time. The aggregator
    /// recomputes this from `quotes` and warns on mismatch.
    pub code_applications: BTreeMap<String, usize>,
    pub warnings: Vec<ValidationWarning>,
    pub elapsed_ms: u64,
}

/// A document excluded from results by bulkhead isolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedDocument {
    pub document_id: String,
    pub reason: String,
}

/// Corpus-level statistics for one code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeStats {
    pub code_id: String,
    /// Total applications across all documents.
    pub applications: usize,
    /// Distinct quotes carrying this code.
    pub quote_count: usize,
    /// Documents with at least one quote carrying this code.
    pub document_count: usize,
}

/// Corpus-level derived statistics. Recomputed from [`DocumentResult`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusAggregate {
    pub code_stats: BTreeMap<String, CodeStats>,
    /// Cross-document frequency per `"{type}:{name}"` entity key.
    pub entity_frequency: BTreeMap<String, usize>,
    pub speaker_quote_counts: BTreeMap<String, usize>,
    pub total_quotes: usize,
    pub documents_processed: usize,
    pub documents_quarantined: usize,
    /// Consistency problems observed during aggregation. Reported, never
    /// silently auto-corrected.
    pub warnings: Vec<ValidationWarning>,
}
