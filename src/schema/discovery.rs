//! Schema discovery (Phases 1-3)
//!
//! Each phase is one logical backend call over the full concatenated corpus
//! (no internal chunking at this layer) plus the analytic question. Three
//! interchangeable modes per phase: OPEN discovers entirely from data,
//! CLOSED uses the caller-supplied definition and skips the call, MIXED
//! seeds the prompt with the caller's definition and merges discovered
//! entries (seed wins on name/id conflict).
//!
//! Call-level failures are retried with bounded backoff by the extractor;
//! exhausting retries is a terminal failure for the phase. A Phase 1 result
//! with zero codes is escalated by the pipeline to a fatal corpus-level
//! abort before any Phase 4 work is dispatched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::parser;
use super::prompts;
use crate::error::{CallError, PhaseError, PhaseName, PhaseResult};
use crate::llm::StructuredExtractor;
use crate::models::{CodeTaxonomy, EntitySchema, HierarchicalCode, SpeakerSchema};

/// Discovery mode for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Discover entirely from data.
    #[default]
    Open,
    /// Use the caller-supplied schema; skip the discovery call entirely.
    Closed,
    /// Seed with the caller-supplied schema, discover additional entries.
    Mixed,
}

impl std::str::FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(DiscoveryMode::Open),
            "closed" => Ok(DiscoveryMode::Closed),
            "mixed" => Ok(DiscoveryMode::Mixed),
            other => Err(format!(
                "unknown discovery mode '{}', expected open, closed, or mixed",
                other
            )),
        }
    }
}

/// Runs the three discovery phases against a [`StructuredExtractor`].
pub struct SchemaDiscoverer<'a> {
    extractor: &'a StructuredExtractor,
    max_attempts: usize,
}

impl<'a> SchemaDiscoverer<'a> {
    pub fn new(extractor: &'a StructuredExtractor, max_attempts: usize) -> Self {
        Self {
            extractor,
            max_attempts,
        }
    }

    /// Phase 1: hierarchical code taxonomy.
    pub async fn discover_codes(
        &self,
        corpus: &str,
        question: &str,
        mode: DiscoveryMode,
        seed: Option<&str>,
    ) -> PhaseResult<CodeTaxonomy> {
        let phase = PhaseName::CodeDiscovery;
        let seed_taxonomy = parse_seed(phase, mode, seed, parser::parse_code_definitions)?;

        if mode == DiscoveryMode::Closed {
            let taxonomy = seed_taxonomy.expect("closed mode requires a seed");
            info!(codes = taxonomy.len(), "code discovery skipped (closed mode)");
            return Ok(taxonomy);
        }

        let seed_text = seed_taxonomy.as_ref().map(prompts::render_code_seed);
        let payload = self
            .call(
                phase,
                &prompts::code_discovery_system_prompt(),
                &prompts::discovery_user_prompt(corpus, question, "codes", seed_text.as_deref()),
                prompts::code_discovery_tool(),
            )
            .await?;

        let discovered: Vec<HierarchicalCode> =
            serde_json::from_value(payload["codes"].clone()).map_err(|e| {
                PhaseError::CallsExhausted {
                    phase,
                    attempts: self.max_attempts,
                    source: CallError::Parse(format!("codes payload: {}", e)),
                }
            })?;
        if discovered.is_empty() && seed_taxonomy.is_none() {
            return Err(PhaseError::EmptyResult { phase });
        }

        let discovered = normalize_levels(discovered);
        let taxonomy = match seed_taxonomy {
            Some(seed) => seed.merged_with(discovered),
            None => CodeTaxonomy::new(discovered),
        }
        .map_err(|source| PhaseError::InvalidResult { phase, source })?;

        info!(codes = taxonomy.len(), "code discovery complete");
        Ok(taxonomy)
    }

    /// Phase 2: speaker property schema.
    pub async fn discover_speaker_schema(
        &self,
        corpus: &str,
        question: &str,
        mode: DiscoveryMode,
        seed: Option<&str>,
    ) -> PhaseResult<SpeakerSchema> {
        let phase = PhaseName::SpeakerDiscovery;
        let seed_schema = parse_seed(phase, mode, seed, parser::parse_speaker_properties)?;

        if mode == DiscoveryMode::Closed {
            let schema = seed_schema.expect("closed mode requires a seed");
            info!(properties = schema.len(), "speaker discovery skipped (closed mode)");
            return Ok(schema);
        }

        let seed_text = seed_schema.as_ref().map(prompts::render_speaker_seed);
        let payload = self
            .call(
                phase,
                prompts::speaker_discovery_system_prompt(),
                &prompts::discovery_user_prompt(
                    corpus,
                    question,
                    "speaker properties",
                    seed_text.as_deref(),
                ),
                prompts::speaker_discovery_tool(),
            )
            .await?;

        let discovered: SpeakerSchema = serde_json::from_value(payload.clone()).map_err(|e| {
            PhaseError::CallsExhausted {
                phase,
                attempts: self.max_attempts,
                source: CallError::Parse(format!("speaker schema payload: {}", e)),
            }
        })?;

        let schema = match seed_schema {
            Some(seed) => seed.merged_with(discovered.properties),
            None => discovered,
        };
        if schema.is_empty() {
            return Err(PhaseError::EmptyResult { phase });
        }

        info!(properties = schema.len(), "speaker discovery complete");
        Ok(schema)
    }

    /// Phase 3: entity and relationship type schema.
    pub async fn discover_entity_schema(
        &self,
        corpus: &str,
        question: &str,
        mode: DiscoveryMode,
        seed: Option<&str>,
    ) -> PhaseResult<EntitySchema> {
        let phase = PhaseName::EntityDiscovery;
        let seed_schema = parse_seed(phase, mode, seed, parser::parse_entity_definitions)?;

        if mode == DiscoveryMode::Closed {
            let schema = seed_schema.expect("closed mode requires a seed");
            info!(
                entity_types = schema.entity_types.len(),
                relationship_types = schema.relationship_types.len(),
                "entity discovery skipped (closed mode)"
            );
            return Ok(schema);
        }

        let seed_text = seed_schema.as_ref().map(prompts::render_entity_seed);
        let payload = self
            .call(
                phase,
                prompts::entity_discovery_system_prompt(),
                &prompts::discovery_user_prompt(
                    corpus,
                    question,
                    "entity/relationship types",
                    seed_text.as_deref(),
                ),
                prompts::entity_discovery_tool(),
            )
            .await?;

        let discovered: EntitySchema = serde_json::from_value(payload).map_err(|e| {
            PhaseError::CallsExhausted {
                phase,
                attempts: self.max_attempts,
                source: CallError::Parse(format!("entity schema payload: {}", e)),
            }
        })?;

        let schema = match seed_schema {
            Some(seed) => seed.merged_with(discovered),
            None => discovered,
        };
        if schema.entity_types.is_empty() {
            return Err(PhaseError::EmptyResult { phase });
        }

        info!(
            entity_types = schema.entity_types.len(),
            relationship_types = schema.relationship_types.len(),
            "entity discovery complete"
        );
        Ok(schema)
    }

    async fn call(
        &self,
        phase: PhaseName,
        system_prompt: &str,
        user_prompt: &str,
        tool: crate::llm::ToolDefinition,
    ) -> PhaseResult<serde_json::Value> {
        self.extractor
            .extract(system_prompt, user_prompt, &tool)
            .await
            .map_err(|source| PhaseError::CallsExhausted {
                phase,
                attempts: self.max_attempts,
                source,
            })
    }
}

fn parse_seed<T>(
    phase: PhaseName,
    mode: DiscoveryMode,
    seed: Option<&str>,
    parse: impl Fn(&str) -> Result<T, crate::error::SchemaParseError>,
) -> PhaseResult<Option<T>> {
    match (mode, seed) {
        (DiscoveryMode::Open, _) => Ok(None),
        (_, Some(text)) => parse(text)
            .map(Some)
            .map_err(|source| PhaseError::InvalidSeed { phase, source }),
        (mode, None) => Err(PhaseError::MissingSeed {
            phase,
            mode: format!("{:?}", mode).to_lowercase(),
        }),
    }
}

/// Recompute levels from parent links so backends that omit `level` still
/// produce a consistent forest. Codes whose parent chain does not resolve
/// keep their reported level and fail taxonomy validation instead.
fn normalize_levels(codes: Vec<HierarchicalCode>) -> Vec<HierarchicalCode> {
    let parents: HashMap<String, Option<String>> = codes
        .iter()
        .map(|c| (c.id.clone(), c.parent_id.clone()))
        .collect();

    let depth_of = |id: &str| -> Option<u8> {
        let mut depth = 0u8;
        let mut current = id.to_string();
        let mut hops = 0usize;
        while let Some(Some(parent)) = parents.get(&current) {
            depth = depth.saturating_add(1);
            current = parent.clone();
            hops += 1;
            if hops > parents.len() {
                return None; // cycle; leave for taxonomy validation
            }
        }
        if parents.contains_key(&current) {
            Some(depth)
        } else {
            None // dangling parent; leave for taxonomy validation
        }
    };

    codes
        .into_iter()
        .map(|mut code| {
            if let Some(depth) = depth_of(&code.id) {
                code.level = depth;
            }
            code
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ExtractorConfig, MockLlmClient, StructuredExtractor};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn extractor(mock: Arc<MockLlmClient>) -> StructuredExtractor {
        StructuredExtractor::with_config(
            mock,
            ExtractorConfig {
                max_attempts: 2,
                base_backoff: Duration::from_millis(1),
                call_timeout: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test]
    async fn open_discovery_builds_taxonomy_and_derives_levels() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "discover_codes",
            json!({"codes": [
                {"id": "AI_RISK", "name": "AI Risk"},
                {"id": "AI_RISK_JOBS", "name": "Jobs", "parent_id": "AI_RISK"}
            ]}),
        ));
        let ext = extractor(mock);
        let discoverer = SchemaDiscoverer::new(&ext, 2);
        let taxonomy = discoverer
            .discover_codes("corpus", "question", DiscoveryMode::Open, None)
            .await
            .unwrap();
        assert_eq!(taxonomy.len(), 2);
        assert_eq!(taxonomy.get("AI_RISK_JOBS").unwrap().level, 1);
    }

    #[tokio::test]
    async fn empty_code_discovery_is_an_empty_result() {
        let mock = Arc::new(
            MockLlmClient::new().with_tool_response("discover_codes", json!({"codes": []})),
        );
        let ext = extractor(mock);
        let discoverer = SchemaDiscoverer::new(&ext, 2);
        let err = discoverer
            .discover_codes("corpus", "question", DiscoveryMode::Open, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PhaseError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn closed_mode_skips_the_backend_call() {
        let mock = Arc::new(MockLlmClient::new());
        let ext = extractor(mock.clone());
        let discoverer = SchemaDiscoverer::new(&ext, 2);
        let taxonomy = discoverer
            .discover_codes(
                "corpus",
                "question",
                DiscoveryMode::Closed,
                Some("AI_RISK: AI Risk - harms"),
            )
            .await
            .unwrap();
        assert_eq!(taxonomy.len(), 1);
        assert_eq!(mock.calls("discover_codes"), 0);
    }

    #[tokio::test]
    async fn closed_mode_without_seed_fails() {
        let mock = Arc::new(MockLlmClient::new());
        let ext = extractor(mock);
        let discoverer = SchemaDiscoverer::new(&ext, 2);
        let err = discoverer
            .discover_codes("corpus", "question", DiscoveryMode::Closed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PhaseError::MissingSeed { .. }));
    }

    #[tokio::test]
    async fn mixed_mode_merges_seed_first() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "discover_codes",
            json!({"codes": [
                {"id": "AI_RISK", "name": "Discovered duplicate"},
                {"id": "GOVERNANCE", "name": "Governance"}
            ]}),
        ));
        let ext = extractor(mock);
        let discoverer = SchemaDiscoverer::new(&ext, 2);
        let taxonomy = discoverer
            .discover_codes(
                "corpus",
                "question",
                DiscoveryMode::Mixed,
                Some("AI_RISK: AI Risk - seeded"),
            )
            .await
            .unwrap();
        assert_eq!(taxonomy.len(), 2);
        assert_eq!(taxonomy.get("AI_RISK").unwrap().name, "AI Risk");
    }

    #[tokio::test]
    async fn speaker_discovery_parses_schema() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "discover_speaker_schema",
            json!({"properties": [
                {"key": "role", "type": "string", "required": true}
            ]}),
        ));
        let ext = extractor(mock);
        let discoverer = SchemaDiscoverer::new(&ext, 2);
        let schema = discoverer
            .discover_speaker_schema("corpus", "q", DiscoveryMode::Open, None)
            .await
            .unwrap();
        assert_eq!(schema.len(), 1);
        assert!(schema.property("role").unwrap().required);
    }

    #[tokio::test]
    async fn entity_discovery_parses_schema() {
        let mock = Arc::new(MockLlmClient::new().with_tool_response(
            "discover_entity_schema",
            json!({
                "entity_types": [{"name": "Organization"}],
                "relationship_types": [{"name": "WORKS_FOR"}]
            }),
        ));
        let ext = extractor(mock);
        let discoverer = SchemaDiscoverer::new(&ext, 2);
        let schema = discoverer
            .discover_entity_schema("corpus", "q", DiscoveryMode::Open, None)
            .await
            .unwrap();
        assert!(schema.contains_entity_type("Organization"));
        assert!(schema.contains_relationship_type("WORKS_FOR"));
    }
}
