//! Per-document applicator (Phase 4)
//!
//! Applies the immutable schema snapshot to one document: one structured
//! backend call, then local validation and deterministic assembly. A
//! candidate span becomes a quote only if it maps to at least one taxonomy
//! code; invalid code ids are recovered per the configured strategy; entity
//! and relationship instances must name schema types exactly. All recovered
//! problems are recorded as warnings on the document result, never silently
//! fixed up.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::payload::{RawApplyPayload, RawEntity, RawRelationship};
use super::prompts;
use super::validation::{
    resolve_code_id, validate_speaker_properties, CodeResolution, InvalidCodeStrategy,
};
use crate::error::{CallError, CallResult};
use crate::llm::StructuredExtractor;
use crate::models::{
    DocumentResult, EnhancedQuote, ExtractedEntity, ExtractedRelationship, InstanceScope,
    QuoteLocation, SchemaSet, SpeakerInfo, ThematicLink, ValidationWarning, WarningKind,
};
use crate::source::InterviewDocument;

/// Phase 4 worker. Cheap to clone; every clone shares the same read-only
/// schema snapshot.
#[derive(Clone)]
pub struct DocumentApplicator {
    extractor: Arc<StructuredExtractor>,
    schemas: Arc<SchemaSet>,
    strategy: InvalidCodeStrategy,
}

impl DocumentApplicator {
    pub fn new(
        extractor: Arc<StructuredExtractor>,
        schemas: Arc<SchemaSet>,
        strategy: InvalidCodeStrategy,
    ) -> Self {
        Self {
            extractor,
            schemas,
            strategy,
        }
    }

    pub fn schemas(&self) -> &Arc<SchemaSet> {
        &self.schemas
    }

    /// Apply all schemas to one document.
    ///
    /// One logical unit of work: a call failure here fails only this
    /// document (the orchestrator quarantines it), never the batch.
    pub async fn apply(&self, document: &InterviewDocument) -> CallResult<DocumentResult> {
        let started = Instant::now();
        let system_prompt = prompts::apply_system_prompt(&self.schemas);
        let user_prompt = prompts::apply_user_prompt(document);

        let payload = self
            .extractor
            .extract(&system_prompt, &user_prompt, &prompts::apply_tool())
            .await?;

        let raw: RawApplyPayload = serde_json::from_value(payload)
            .map_err(|e| CallError::Parse(format!("apply payload: {}", e)))?;

        let mut result = assemble(&document.id, raw, &self.schemas, self.strategy);
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            document_id = %document.id,
            quotes = result.quotes.len(),
            entities = result.entities.len(),
            warnings = result.warnings.len(),
            "document applied"
        );
        Ok(result)
    }
}

/// Validate a raw payload and assemble the document result.
///
/// Deterministic: the same payload for the same document id always produces
/// the same result, including ids (quote/entity/relationship ids come from
/// the document id plus sequence position, never from backend output).
fn assemble(
    document_id: &str,
    raw: RawApplyPayload,
    schemas: &SchemaSet,
    strategy: InvalidCodeStrategy,
) -> DocumentResult {
    let mut warnings: Vec<ValidationWarning> = Vec::new();

    // Quotes: enforce the id-consistency contract, then assign stable ids.
    let mut quotes: Vec<EnhancedQuote> = Vec::new();
    // Raw payload index -> kept quote id, for entity mentions.
    let mut kept_quote_ids: Vec<Option<String>> = Vec::with_capacity(raw.quotes.len());

    for raw_quote in raw.quotes {
        let mut code_ids: Vec<String> = Vec::new();
        for raw_id in &raw_quote.code_ids {
            match resolve_code_id(&schemas.taxonomy, raw_id, strategy) {
                CodeResolution::Valid => {
                    if !code_ids.contains(raw_id) {
                        code_ids.push(raw_id.clone());
                    }
                }
                CodeResolution::Corrected(id) => {
                    warn!(document_id, raw_id = %raw_id, corrected = %id, "fuzzy-matched code id");
                    warnings.push(ValidationWarning::new(
                        document_id,
                        WarningKind::FuzzyMatchedCodeId,
                        format!("code id '{}' matched to '{}'", raw_id, id),
                    ));
                    if !code_ids.contains(&id) {
                        code_ids.push(id);
                    }
                }
                CodeResolution::Dropped => {
                    warn!(document_id, raw_id = %raw_id, "dropped code id absent from taxonomy");
                    warnings.push(ValidationWarning::new(
                        document_id,
                        WarningKind::UnknownCodeId,
                        format!("code id '{}' not in taxonomy", raw_id),
                    ));
                }
            }
        }

        if code_ids.is_empty() {
            // Selective extraction: a quote with no valid code is not a
            // quote. Record the drop; do not persist it with an empty set.
            warnings.push(ValidationWarning::new(
                document_id,
                WarningKind::QuoteDropped,
                format!("no valid code id remained: \"{}\"", snippet(&raw_quote.text)),
            ));
            kept_quote_ids.push(None);
            continue;
        }

        let (properties, speaker_warnings) = validate_speaker_properties(
            &schemas.speaker_schema,
            raw_quote.speaker.properties,
            document_id,
            &raw_quote.speaker.name,
        );
        warnings.extend(speaker_warnings);

        let mut speaker = SpeakerInfo::new(&raw_quote.speaker.name, raw_quote.speaker.confidence);
        speaker.properties = properties;

        let id = EnhancedQuote::make_id(document_id, quotes.len());
        kept_quote_ids.push(Some(id.clone()));
        quotes.push(EnhancedQuote {
            id,
            text: raw_quote.text,
            context: raw_quote.context,
            code_ids,
            speaker,
            interview_id: document_id.to_string(),
            location: QuoteLocation {
                line_start: raw_quote.line_start,
                line_end: raw_quote.line_end.max(raw_quote.line_start),
            },
            entity_ids: Vec::new(),
        });
    }

    let (entities, entity_ids_by_name) = assemble_entities(
        document_id,
        raw.entities,
        schemas,
        &kept_quote_ids,
        &mut warnings,
    );

    let relationships = assemble_relationships(
        document_id,
        raw.relationships,
        schemas,
        &entity_ids_by_name,
        &mut warnings,
    );

    // Back-fill quote -> entity references from the mention lists.
    for entity in &entities {
        for quote_id in &entity.quote_ids {
            if let Some(quote) = quotes.iter_mut().find(|q| &q.id == quote_id) {
                quote.entity_ids.push(entity.id.clone());
            }
        }
    }

    let thematic_links = derive_thematic_links(&quotes);

    let mut code_applications: BTreeMap<String, usize> = BTreeMap::new();
    for quote in &quotes {
        for code_id in &quote.code_ids {
            *code_applications.entry(code_id.clone()).or_insert(0) += 1;
        }
    }

    DocumentResult {
        document_id: document_id.to_string(),
        quotes,
        entities,
        relationships,
        thematic_links,
        code_applications,
        warnings,
        elapsed_ms: 0,
    }
}

fn assemble_entities(
    document_id: &str,
    raw_entities: Vec<RawEntity>,
    schemas: &SchemaSet,
    kept_quote_ids: &[Option<String>],
    warnings: &mut Vec<ValidationWarning>,
) -> (Vec<ExtractedEntity>, BTreeMap<String, String>) {
    let mut entities: Vec<ExtractedEntity> = Vec::new();
    let mut ids_by_name: BTreeMap<String, String> = BTreeMap::new();

    for raw in raw_entities {
        if !schemas.entity_schema.contains_entity_type(&raw.entity_type) {
            warn!(document_id, entity_type = %raw.entity_type, "dropped entity of unknown type");
            warnings.push(ValidationWarning::new(
                document_id,
                WarningKind::UnknownEntityType,
                format!("entity '{}' has unknown type '{}'", raw.name, raw.entity_type),
            ));
            continue;
        }

        let quote_ids: Vec<String> = raw
            .quote_indexes
            .iter()
            .filter_map(|&i| kept_quote_ids.get(i).cloned().flatten())
            .collect();

        // Arena dedupe: one record per (type, name) pair per document.
        let arena_key = format!("{}:{}", raw.entity_type, raw.name);
        if let Some(id) = ids_by_name.get(&arena_key) {
            let existing = entities
                .iter_mut()
                .find(|e| &e.id == id)
                .expect("arena index out of sync");
            for quote_id in quote_ids {
                if !existing.quote_ids.contains(&quote_id) {
                    existing.quote_ids.push(quote_id);
                }
            }
            continue;
        }

        let id = format!("{}::e{}", document_id, entities.len());
        ids_by_name.insert(arena_key, id.clone());
        ids_by_name.entry(raw.name.clone()).or_insert_with(|| id.clone());
        entities.push(ExtractedEntity {
            id,
            entity_type: raw.entity_type,
            name: raw.name,
            scope: InstanceScope::parse_or_default(raw.scope.as_deref()),
            confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            quote_ids,
        });
    }

    (entities, ids_by_name)
}

fn assemble_relationships(
    document_id: &str,
    raw_relationships: Vec<RawRelationship>,
    schemas: &SchemaSet,
    entity_ids_by_name: &BTreeMap<String, String>,
    warnings: &mut Vec<ValidationWarning>,
) -> Vec<ExtractedRelationship> {
    let mut relationships: Vec<ExtractedRelationship> = Vec::new();

    for raw in raw_relationships {
        if !schemas
            .entity_schema
            .contains_relationship_type(&raw.relationship_type)
        {
            warn!(
                document_id,
                relationship_type = %raw.relationship_type,
                "dropped relationship of unknown type"
            );
            warnings.push(ValidationWarning::new(
                document_id,
                WarningKind::UnknownRelationshipType,
                format!("unknown relationship type '{}'", raw.relationship_type),
            ));
            continue;
        }

        let source_id = entity_ids_by_name.get(&raw.source);
        let target_id = entity_ids_by_name.get(&raw.target);
        let (source_id, target_id) = match (source_id, target_id) {
            (Some(s), Some(t)) => (s.clone(), t.clone()),
            _ => {
                warnings.push(ValidationWarning::new(
                    document_id,
                    WarningKind::DanglingRelationship,
                    format!(
                        "relationship {} '{}' -> '{}' references an unextracted entity",
                        raw.relationship_type, raw.source, raw.target
                    ),
                ));
                continue;
            }
        };

        relationships.push(ExtractedRelationship {
            id: format!("{}::r{}", document_id, relationships.len()),
            relationship_type: raw.relationship_type,
            source_id,
            target_id,
            scope: InstanceScope::parse_or_default(raw.scope.as_deref()),
            context: raw.context,
        });
    }

    relationships
}

/// Cross-speaker idea flow: link each quote to the next quote in sequence
/// when the speakers differ and at least one code is shared.
fn derive_thematic_links(quotes: &[EnhancedQuote]) -> Vec<ThematicLink> {
    quotes
        .windows(2)
        .filter_map(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            if a.speaker.name == b.speaker.name {
                return None;
            }
            a.code_ids
                .iter()
                .find(|code| b.code_ids.contains(*code))
                .map(|shared| ThematicLink {
                    from_quote_id: a.id.clone(),
                    to_quote_id: b.id.clone(),
                    shared_code_id: shared.clone(),
                })
        })
        .collect()
}

fn snippet(text: &str) -> String {
    const LIMIT: usize = 60;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ExtractorConfig, MockLlmClient, StructuredExtractor};
    use crate::models::{
        CodeTaxonomy, DiscoveredEntityType, DiscoveredRelationshipType, EntitySchema,
        HierarchicalCode, PropertyType, SpeakerProperty, SpeakerSchema,
    };
    use serde_json::json;
    use std::time::Duration;

    fn schemas() -> Arc<SchemaSet> {
        Arc::new(SchemaSet {
            taxonomy: CodeTaxonomy::new(vec![HierarchicalCode::root("AI_RISK", "AI Risk")])
                .unwrap(),
            speaker_schema: SpeakerSchema::new(vec![SpeakerProperty {
                key: "role".into(),
                property_type: PropertyType::String,
                required: false,
                description: String::new(),
            }]),
            entity_schema: EntitySchema {
                entity_types: vec![
                    DiscoveredEntityType {
                        name: "Organization".into(),
                        description: String::new(),
                        examples: vec![],
                    },
                    DiscoveredEntityType {
                        name: "Person".into(),
                        description: String::new(),
                        examples: vec![],
                    },
                ],
                relationship_types: vec![DiscoveredRelationshipType {
                    name: "WORKS_FOR".into(),
                    description: String::new(),
                    source_types: vec![],
                    target_types: vec![],
                }],
            },
        })
    }

    fn applicator(mock: Arc<MockLlmClient>) -> DocumentApplicator {
        let extractor = Arc::new(StructuredExtractor::with_config(
            mock,
            ExtractorConfig {
                max_attempts: 1,
                base_backoff: Duration::from_millis(1),
                call_timeout: Duration::from_secs(5),
            },
        ));
        DocumentApplicator::new(extractor, schemas(), InvalidCodeStrategy::Drop)
    }

    fn doc() -> InterviewDocument {
        InterviewDocument::new(
            "interview-01",
            "Hello there.\nI worry AI will displace analysts.\nThanks, bye.",
        )
    }

    /// Scenario A: one relevant sentence, two greetings -> exactly one quote.
    #[tokio::test]
    async fn relevant_span_only_becomes_a_quote() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "apply_schemas",
            json!({
                "quotes": [{
                    "text": "I worry AI will displace analysts.",
                    "code_ids": ["AI_RISK"],
                    "speaker": {"name": "Ana", "confidence": 0.9},
                    "line_start": 2,
                    "line_end": 2
                }]
            }),
        ));
        let result = applicator(mock).apply(&doc()).await.unwrap();
        assert_eq!(result.quotes.len(), 1);
        assert_eq!(result.quotes[0].code_ids, vec!["AI_RISK".to_string()]);
        assert_eq!(result.quotes[0].id, "interview-01::q0");
        assert!(result.warnings.is_empty());
    }

    /// Scenario B: unknown code id is dropped; quote kept if ids remain,
    /// dropped entirely otherwise; warnings recorded either way.
    #[tokio::test]
    async fn unknown_code_id_dropped_with_warning() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "apply_schemas",
            json!({
                "quotes": [
                    {
                        "text": "Span with one good id.",
                        "code_ids": ["MADE_UP", "AI_RISK"],
                        "speaker": {"name": "Ana", "confidence": 0.8}
                    },
                    {
                        "text": "Span with only bad ids.",
                        "code_ids": ["MADE_UP"],
                        "speaker": {"name": "Ben", "confidence": 0.8}
                    }
                ]
            }),
        ));
        let result = applicator(mock).apply(&doc()).await.unwrap();
        assert_eq!(result.quotes.len(), 1);
        assert_eq!(result.quotes[0].code_ids, vec!["AI_RISK".to_string()]);
        assert_eq!(
            result
                .warnings
                .iter()
                .filter(|w| w.kind == WarningKind::UnknownCodeId)
                .count(),
            2
        );
        assert_eq!(
            result
                .warnings
                .iter()
                .filter(|w| w.kind == WarningKind::QuoteDropped)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn entities_and_relationships_are_validated_and_linked() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "apply_schemas",
            json!({
                "quotes": [{
                    "text": "I worry AI will displace analysts.",
                    "code_ids": ["AI_RISK"],
                    "speaker": {"name": "Ana", "confidence": 0.9}
                }],
                "entities": [
                    {"name": "Ana", "type": "Person", "quote_indexes": [0]},
                    {"name": "Acme Labs", "type": "Organization", "scope": "document"},
                    {"name": "Mystery", "type": "Artifact"}
                ],
                "relationships": [
                    {"type": "WORKS_FOR", "source": "Ana", "target": "Acme Labs"},
                    {"type": "WORKS_FOR", "source": "Ana", "target": "Unknown Co"},
                    {"type": "FOUNDED", "source": "Ana", "target": "Acme Labs"}
                ]
            }),
        ));
        let result = applicator(mock).apply(&doc()).await.unwrap();

        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.entities[0].id, "interview-01::e0");
        assert_eq!(result.entities[0].quote_ids, vec!["interview-01::q0".to_string()]);
        assert_eq!(result.quotes[0].entity_ids, vec!["interview-01::e0".to_string()]);

        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].source_id, "interview-01::e0");
        assert_eq!(result.relationships[0].target_id, "interview-01::e1");

        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UnknownEntityType));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::DanglingRelationship));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UnknownRelationshipType));
    }

    #[tokio::test]
    async fn thematic_links_require_shared_code_across_speakers() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "apply_schemas",
            json!({
                "quotes": [
                    {
                        "text": "AI risk worries me.",
                        "code_ids": ["AI_RISK"],
                        "speaker": {"name": "Ana", "confidence": 1.0}
                    },
                    {
                        "text": "Same here, the risk is real.",
                        "code_ids": ["AI_RISK"],
                        "speaker": {"name": "Ben", "confidence": 1.0}
                    }
                ]
            }),
        ));
        let result = applicator(mock).apply(&doc()).await.unwrap();
        assert_eq!(result.thematic_links.len(), 1);
        let link = &result.thematic_links[0];
        assert_eq!(link.from_quote_id, "interview-01::q0");
        assert_eq!(link.to_quote_id, "interview-01::q1");
        assert_eq!(link.shared_code_id, "AI_RISK");
    }

    /// Determinism: same payload, same document -> identical output.
    #[tokio::test]
    async fn application_is_deterministic() {
        let payload = json!({
            "quotes": [{
                "text": "I worry AI will displace analysts.",
                "code_ids": ["AI_RISK"],
                "speaker": {"name": "Ana", "confidence": 0.9, "properties": {"role": "analyst"}}
            }],
            "entities": [{"name": "Acme Labs", "type": "Organization"}]
        });
        let mock = Arc::new(
            MockLlmClient::new().with_tool_response("apply_schemas", payload),
        );
        let app = applicator(mock);
        let mut first = app.apply(&doc()).await.unwrap();
        let mut second = app.apply(&doc()).await.unwrap();
        first.elapsed_ms = 0;
        second.elapsed_ms = 0;
        assert_eq!(first, second);
    }
}
