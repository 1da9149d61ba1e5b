//! Corpus aggregation
//!
//! Merges per-document results into corpus-level derived statistics. All
//! inputs are immutable: aggregation never rewrites source quotes or
//! entities, and its output is a derived view that can always be recomputed.
//! Consistency problems in the inputs (a reported total that does not match
//! the length of its backing list) are reported as warnings, never silently
//! auto-corrected.

use std::collections::BTreeMap;

use tracing::warn;

use crate::models::{
    CodeStats, CorpusAggregate, DocumentResult, ValidationWarning, WarningKind,
};

/// Build the corpus aggregate from every successfully processed document.
///
/// Called only after the Phase 4 barrier: every dispatched job has reached a
/// terminal state by the time this runs.
pub fn aggregate(results: &[DocumentResult], quarantined: usize) -> CorpusAggregate {
    let mut code_stats: BTreeMap<String, CodeStats> = BTreeMap::new();
    let mut entity_frequency: BTreeMap<String, usize> = BTreeMap::new();
    let mut speaker_quote_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut warnings: Vec<ValidationWarning> = Vec::new();
    let mut total_quotes = 0usize;

    for result in results {
        // Recompute applications from the quotes themselves, then check the
        // reported per-document totals against them.
        let mut recomputed: BTreeMap<&str, usize> = BTreeMap::new();
        for quote in &result.quotes {
            total_quotes += 1;
            *speaker_quote_counts
                .entry(quote.speaker.name.clone())
                .or_insert(0) += 1;
            for code_id in &quote.code_ids {
                *recomputed.entry(code_id.as_str()).or_insert(0) += 1;
            }
        }

        for (code_id, count) in &recomputed {
            let stats = code_stats
                .entry((*code_id).to_string())
                .or_insert_with(|| CodeStats {
                    code_id: (*code_id).to_string(),
                    applications: 0,
                    quote_count: 0,
                    document_count: 0,
                });
            stats.applications += count;
            stats.document_count += 1;
        }
        for quote in &result.quotes {
            for code_id in &quote.code_ids {
                if let Some(stats) = code_stats.get_mut(code_id) {
                    stats.quote_count += 1;
                }
            }
        }

        for (code_id, reported) in &result.code_applications {
            let actual = recomputed.get(code_id.as_str()).copied().unwrap_or(0);
            if actual != *reported {
                warn!(
                    document_id = %result.document_id,
                    code_id = %code_id,
                    reported,
                    actual,
                    "reported code application total does not match quote list"
                );
                warnings.push(ValidationWarning::new(
                    &result.document_id,
                    WarningKind::CountMismatch,
                    format!(
                        "code '{}' reports {} applications but quotes carry {}",
                        code_id, reported, actual
                    ),
                ));
            }
        }

        for entity in &result.entities {
            *entity_frequency
                .entry(format!("{}:{}", entity.entity_type, entity.name))
                .or_insert(0) += 1;
        }
    }

    CorpusAggregate {
        code_stats,
        entity_frequency,
        speaker_quote_counts,
        total_quotes,
        documents_processed: results.len(),
        documents_quarantined: quarantined,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EnhancedQuote, ExtractedEntity, InstanceScope, QuoteLocation, SpeakerInfo,
    };

    fn quote(doc: &str, seq: usize, speaker: &str, code_ids: &[&str]) -> EnhancedQuote {
        EnhancedQuote {
            id: EnhancedQuote::make_id(doc, seq),
            text: format!("quote {} of {}", seq, doc),
            context: String::new(),
            code_ids: code_ids.iter().map(|s| s.to_string()).collect(),
            speaker: SpeakerInfo::new(speaker, 0.9),
            interview_id: doc.to_string(),
            location: QuoteLocation {
                line_start: 1,
                line_end: 1,
            },
            entity_ids: vec![],
        }
    }

    fn result(doc: &str, quotes: Vec<EnhancedQuote>) -> DocumentResult {
        let mut code_applications = BTreeMap::new();
        for q in &quotes {
            for c in &q.code_ids {
                *code_applications.entry(c.clone()).or_insert(0) += 1;
            }
        }
        DocumentResult {
            document_id: doc.to_string(),
            quotes,
            entities: vec![],
            relationships: vec![],
            thematic_links: vec![],
            code_applications,
            warnings: vec![],
            elapsed_ms: 0,
        }
    }

    #[test]
    fn totals_sum_across_documents() {
        let results = vec![
            result(
                "doc-1",
                vec![
                    quote("doc-1", 0, "Ana", &["AI_RISK"]),
                    quote("doc-1", 1, "Ben", &["AI_RISK", "GOVERNANCE"]),
                ],
            ),
            result("doc-2", vec![quote("doc-2", 0, "Ana", &["AI_RISK"])]),
        ];

        let agg = aggregate(&results, 1);
        assert_eq!(agg.total_quotes, 3);
        assert_eq!(agg.documents_processed, 2);
        assert_eq!(agg.documents_quarantined, 1);

        let ai_risk = &agg.code_stats["AI_RISK"];
        assert_eq!(ai_risk.applications, 3);
        assert_eq!(ai_risk.quote_count, 3);
        assert_eq!(ai_risk.document_count, 2);
        assert_eq!(agg.code_stats["GOVERNANCE"].document_count, 1);

        assert_eq!(agg.speaker_quote_counts["Ana"], 2);
        assert!(agg.warnings.is_empty());
    }

    #[test]
    fn count_mismatch_is_warned_not_corrected() {
        let mut r = result("doc-1", vec![quote("doc-1", 0, "Ana", &["AI_RISK"])]);
        r.code_applications.insert("AI_RISK".to_string(), 5);

        let agg = aggregate(&[r], 0);
        // The recomputed value is used; the reported one is only warned about.
        assert_eq!(agg.code_stats["AI_RISK"].applications, 1);
        assert_eq!(agg.warnings.len(), 1);
        assert_eq!(agg.warnings[0].kind, WarningKind::CountMismatch);
    }

    #[test]
    fn entity_frequency_counts_documents() {
        let mut r1 = result("doc-1", vec![]);
        r1.entities.push(ExtractedEntity {
            id: "doc-1::e0".into(),
            entity_type: "Organization".into(),
            name: "Acme".into(),
            scope: InstanceScope::Document,
            confidence: 0.9,
            quote_ids: vec![],
        });
        let mut r2 = result("doc-2", vec![]);
        r2.entities.push(ExtractedEntity {
            id: "doc-2::e0".into(),
            entity_type: "Organization".into(),
            name: "Acme".into(),
            scope: InstanceScope::Document,
            confidence: 0.9,
            quote_ids: vec![],
        });

        let agg = aggregate(&[r1, r2], 0);
        assert_eq!(agg.entity_frequency["Organization:Acme"], 2);
    }
}
