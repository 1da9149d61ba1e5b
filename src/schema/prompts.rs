//! Discovery prompt and tool builders
//!
//! One tool definition per discovery phase. The tool parameter schemas are
//! the structural contract: required fields per entry and bounded hierarchy
//! depth are enforced by JSON Schema validation at the extractor, so a
//! response that violates them is rejected (and retried) before it ever
//! reaches the taxonomy builder.

use serde_json::json;

use crate::llm::ToolDefinition;
use crate::models::{CodeTaxonomy, EntitySchema, SpeakerSchema};

/// Maximum code hierarchy level accepted from discovery (0 = root).
pub const MAX_CODE_LEVEL: u8 = CodeTaxonomy::DEFAULT_MAX_DEPTH;

pub fn code_discovery_tool() -> ToolDefinition {
    ToolDefinition {
        name: "discover_codes".to_string(),
        description: "Report the hierarchical thematic code taxonomy discovered in the corpus"
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "codes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "minLength": 1},
                            "name": {"type": "string", "minLength": 1},
                            "description": {"type": "string"},
                            "parent_id": {"type": ["string", "null"]},
                            "level": {"type": "integer", "minimum": 0, "maximum": MAX_CODE_LEVEL},
                            "examples": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["id", "name"]
                    }
                }
            },
            "required": ["codes"]
        }),
    }
}

pub fn speaker_discovery_tool() -> ToolDefinition {
    ToolDefinition {
        name: "discover_speaker_schema".to_string(),
        description: "Report the speaker property schema discovered in the corpus".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "properties": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "key": {"type": "string", "minLength": 1},
                            "type": {"type": "string", "enum": ["string", "number", "boolean", "list"]},
                            "required": {"type": "boolean"},
                            "description": {"type": "string"}
                        },
                        "required": ["key", "type"]
                    }
                }
            },
            "required": ["properties"]
        }),
    }
}

pub fn entity_discovery_tool() -> ToolDefinition {
    ToolDefinition {
        name: "discover_entity_schema".to_string(),
        description: "Report the entity types and relationship types discovered in the corpus"
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "entity_types": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "minLength": 1},
                            "description": {"type": "string"},
                            "examples": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["name"]
                    }
                },
                "relationship_types": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "minLength": 1},
                            "description": {"type": "string"},
                            "source_types": {"type": "array", "items": {"type": "string"}},
                            "target_types": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["name"]
                    }
                }
            },
            "required": ["entity_types", "relationship_types"]
        }),
    }
}

pub fn code_discovery_system_prompt() -> String {
    format!(
        "You are a qualitative research assistant performing thematic analysis of \
         interview transcripts.\n\n\
         Discover a hierarchical code taxonomy grounded in the corpus. Rules:\n\
         1. Every code needs a stable UPPER_SNAKE_CASE id and a short human name.\n\
         2. Nest codes at most {} levels deep (level 0 = root); a child's level is \
         its parent's level + 1 and its parent_id must reference another code's id.\n\
         3. Include 1-3 short example spans from the corpus per code where possible.\n\
         4. Report codes through the discover_codes tool only.",
        MAX_CODE_LEVEL + 1
    )
}

pub fn speaker_discovery_system_prompt() -> &'static str {
    "You are a qualitative research assistant. Discover the set of speaker properties \
     that can be consistently attributed across this interview corpus (e.g. role, \
     organization type, seniority). Declare each property once with a key, a value \
     type tag (string, number, boolean, or list), and whether it is reliably present \
     (required). Report through the discover_speaker_schema tool only."
}

pub fn entity_discovery_system_prompt() -> &'static str {
    "You are a qualitative research assistant. Discover the entity types (people, \
     organizations, technologies, ...) and relationship types between them that recur \
     in this interview corpus. Relationship type names are UPPER_SNAKE_CASE. Report \
     through the discover_entity_schema tool only."
}

fn seed_section(label: &str, seed: Option<&str>) -> String {
    match seed {
        Some(text) => format!(
            "\n\n## Caller-supplied {} (keep these entries as-is; discover additional ones)\n{}\n",
            label, text
        ),
        None => String::new(),
    }
}

pub fn discovery_user_prompt(
    corpus: &str,
    question: &str,
    seed_label: &str,
    seed: Option<&str>,
) -> String {
    format!(
        "## Analytic question\n{}\n{}\n## Full corpus\n{}",
        question,
        seed_section(seed_label, seed),
        corpus
    )
}

/// Render a seed schema into the MIXED-mode prompt section for speakers.
pub fn render_speaker_seed(schema: &SpeakerSchema) -> String {
    schema
        .properties
        .iter()
        .map(|p| {
            format!(
                "- {} ({}{}): {}",
                p.key,
                p.property_type.name(),
                if p.required { ", required" } else { "" },
                p.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a seed taxonomy into the MIXED-mode prompt section for codes.
pub fn render_code_seed(taxonomy: &CodeTaxonomy) -> String {
    taxonomy
        .codes()
        .iter()
        .map(|c| {
            format!(
                "{}{}: {} - {}",
                "  ".repeat(c.level as usize),
                c.id,
                c.name,
                c.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a seed entity schema into the MIXED-mode prompt section.
pub fn render_entity_seed(schema: &EntitySchema) -> String {
    let mut lines: Vec<String> = schema
        .entity_types
        .iter()
        .map(|t| format!("- entity {}: {}", t.name, t.description))
        .collect();
    lines.extend(schema.relationship_types.iter().map(|t| {
        format!(
            "- relationship {} ({} -> {}): {}",
            t.name,
            if t.source_types.is_empty() {
                "*".to_string()
            } else {
                t.source_types.join(", ")
            },
            if t.target_types.is_empty() {
                "*".to_string()
            } else {
                t.target_types.join(", ")
            },
            t.description
        )
    }));
    lines.join("\n")
}
