//! Application prompt and tool builders (Phase 4)
//!
//! The catalog section exposes each code's id alongside its name and
//! description so the backend returns ids directly — quotes reference codes
//! by id, never by a name the applicator would have to transform back.

use serde_json::json;

use crate::llm::ToolDefinition;
use crate::models::SchemaSet;
use crate::source::InterviewDocument;

pub fn apply_tool() -> ToolDefinition {
    ToolDefinition {
        name: "apply_schemas".to_string(),
        description:
            "Report the quotes, entities, and relationships extracted from one document"
                .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "quotes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": {"type": "string", "minLength": 1},
                            "context": {"type": "string"},
                            "code_ids": {
                                "type": "array",
                                "items": {"type": "string"},
                                "minItems": 1
                            },
                            "speaker": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string", "minLength": 1},
                                    "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                                    "properties": {"type": "object"}
                                },
                                "required": ["name", "confidence"]
                            },
                            "line_start": {"type": "integer", "minimum": 0},
                            "line_end": {"type": "integer", "minimum": 0}
                        },
                        "required": ["text", "code_ids", "speaker"]
                    }
                },
                "entities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "minLength": 1},
                            "type": {"type": "string", "minLength": 1},
                            "scope": {"type": "string", "enum": ["quote", "document", "corpus"]},
                            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                            "quote_indexes": {"type": "array", "items": {"type": "integer", "minimum": 0}}
                        },
                        "required": ["name", "type"]
                    }
                },
                "relationships": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {"type": "string", "minLength": 1},
                            "source": {"type": "string", "minLength": 1},
                            "target": {"type": "string", "minLength": 1},
                            "scope": {"type": "string", "enum": ["quote", "document", "corpus"]},
                            "context": {"type": "string"}
                        },
                        "required": ["type", "source", "target"]
                    }
                }
            },
            "required": ["quotes"]
        }),
    }
}

pub fn apply_system_prompt(schemas: &SchemaSet) -> String {
    let mut prompt = String::from(
        "You are a qualitative research assistant applying an established coding \
         scheme to one interview transcript.\n\n\
         ## Extraction policy\n\
         Extract a span as a quote ONLY if it maps to at least one code below. \
         Skip greetings, procedural chatter, and anything with no applicable code \
         entirely — do not report codeless spans. Precision over recall.\n\n\
         ## Code catalog (reference codes by ID, exactly as printed)\n",
    );

    for code in schemas.taxonomy.codes() {
        prompt.push_str(&format!(
            "{}[{}] {} - {}\n",
            "  ".repeat(code.level as usize),
            code.id,
            code.name,
            code.description
        ));
    }

    prompt.push_str(
        "\n## Speaker attribution\n\
         Attribute every quote to a speaker. Confidence is a fixed scale: 1.0 only \
         when the transcript explicitly names the speaker at the span; 0.0 only for \
         a total guess with no supporting evidence; grade in between by strength of \
         evidence.\n",
    );
    if !schemas.speaker_schema.is_empty() {
        prompt.push_str("Fill these speaker properties when evidenced (use the declared value type):\n");
        for p in &schemas.speaker_schema.properties {
            prompt.push_str(&format!(
                "- {} ({}{}): {}\n",
                p.key,
                p.property_type.name(),
                if p.required { ", required" } else { "" },
                p.description
            ));
        }
    }

    if !schemas.entity_schema.is_empty() {
        prompt.push_str(
            "\n## Entities and relationships\n\
             Extract instances of exactly these types (use type names verbatim). \
             Scope each instance: quote (tied to one span), document (about this \
             interview as a whole), or corpus (a general claim). Reference quote \
             membership with quote_indexes (0-based positions in your quotes array) \
             and relationship endpoints by entity name.\n",
        );
        for t in &schemas.entity_schema.entity_types {
            prompt.push_str(&format!("- entity {}: {}\n", t.name, t.description));
        }
        for t in &schemas.entity_schema.relationship_types {
            prompt.push_str(&format!("- relationship {}: {}\n", t.name, t.description));
        }
    }

    prompt.push_str(
        "\nReport exact verbatim text spans with their line numbers, through the \
         apply_schemas tool only.",
    );
    prompt
}

pub fn apply_user_prompt(document: &InterviewDocument) -> String {
    // Line numbers are printed so the backend can report stable locations.
    let numbered: String = document
        .text
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>4}  {}\n", i + 1, line))
        .collect();
    format!(
        "## Document {}\n{}\n{}",
        document.id,
        document
            .title
            .as_deref()
            .map(|t| format!("Title: {}\n", t))
            .unwrap_or_default(),
        numbered
    )
}
