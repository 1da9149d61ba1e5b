//! Free-text schema parser
//!
//! Converts user-supplied code/speaker/entity definitions into structured
//! schema objects for CLOSED and MIXED discovery modes. The formats are
//! line-oriented:
//!
//! Codes (2-space indentation nests a child under the previous level):
//!
//! ```text
//! AI_RISK: AI Risk - concerns about AI harms
//!   AI_RISK_JOBS: Job displacement - automation replacing work
//! GOVERNANCE: Governance
//! ```
//!
//! Speaker properties:
//!
//! ```text
//! role (string, required): professional role of the speaker
//! years_experience (number): years in the field
//! ```
//!
//! Entity types:
//!
//! ```text
//! Organization: a company, lab, or institution
//! ```
//!
//! Relationship types:
//!
//! ```text
//! WORKS_FOR (Person -> Organization): employment
//! ```
//!
//! Blank lines and `#` comments are skipped. Malformed lines fail with the
//! line number; an empty parse result is an error, not an empty schema.

use regex::Regex;

use crate::error::SchemaParseError;
use crate::models::{
    CodeTaxonomy, DiscoveredEntityType, DiscoveredRelationshipType, EntitySchema,
    HierarchicalCode, SpeakerProperty, SpeakerSchema,
};

const INDENT_WIDTH: usize = 2;

fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
}

/// Parse hierarchical code definitions into a validated taxonomy.
pub fn parse_code_definitions(text: &str) -> Result<CodeTaxonomy, SchemaParseError> {
    let line_re =
        Regex::new(r"^(?P<id>[A-Za-z][A-Za-z0-9_.-]*)\s*:\s*(?P<name>.+?)(?:\s+-\s+(?P<desc>.+))?$")
            .expect("static regex");

    let mut codes: Vec<HierarchicalCode> = Vec::new();
    // Stack of (level, id) for resolving parents by indentation.
    let mut stack: Vec<(u8, String)> = Vec::new();

    for (line_no, raw) in content_lines(text) {
        if raw.contains('\t') {
            return Err(SchemaParseError::Malformed {
                line: line_no,
                message: "tabs are not allowed; indent with spaces".to_string(),
            });
        }
        let indent = raw.len() - raw.trim_start().len();
        if indent % INDENT_WIDTH != 0 {
            return Err(SchemaParseError::Malformed {
                line: line_no,
                message: format!("indentation must be a multiple of {} spaces", INDENT_WIDTH),
            });
        }
        let level = (indent / INDENT_WIDTH) as u8;

        let caps = line_re.captures(raw.trim()).ok_or_else(|| {
            SchemaParseError::Malformed {
                line: line_no,
                message: "expected 'ID: Name - description'".to_string(),
            }
        })?;

        while let Some((top_level, _)) = stack.last() {
            if *top_level >= level {
                stack.pop();
            } else {
                break;
            }
        }

        let parent_id = if level == 0 {
            None
        } else {
            match stack.last() {
                Some((parent_level, parent_id)) if *parent_level == level - 1 => {
                    Some(parent_id.clone())
                }
                _ => {
                    return Err(SchemaParseError::Malformed {
                        line: line_no,
                        message: "indented code has no parent at the previous level".to_string(),
                    })
                }
            }
        };

        let id = caps["id"].to_string();
        stack.push((level, id.clone()));
        codes.push(HierarchicalCode {
            id,
            name: caps["name"].trim().to_string(),
            description: caps
                .name("desc")
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            parent_id,
            level,
            examples: Vec::new(),
        });
    }

    if codes.is_empty() {
        return Err(SchemaParseError::EmptyDefinition);
    }
    Ok(CodeTaxonomy::new(codes)?)
}

/// Parse speaker property declarations.
pub fn parse_speaker_properties(text: &str) -> Result<SpeakerSchema, SchemaParseError> {
    let line_re =
        Regex::new(r"^(?P<key>[A-Za-z][A-Za-z0-9_]*)\s*\((?P<spec>[^)]+)\)\s*:\s*(?P<desc>.*)$")
            .expect("static regex");

    let mut properties = Vec::new();
    for (line_no, raw) in content_lines(text) {
        let caps = line_re.captures(raw.trim()).ok_or_else(|| {
            SchemaParseError::Malformed {
                line: line_no,
                message: "expected 'key (type[, required]): description'".to_string(),
            }
        })?;

        let mut parts = caps["spec"].split(',').map(str::trim);
        let type_token = parts.next().unwrap_or_default();
        let property_type = type_token.parse().map_err(|found| {
            SchemaParseError::UnknownPropertyType {
                line: line_no,
                found,
            }
        })?;
        let required = parts.any(|p| p.eq_ignore_ascii_case("required"));

        properties.push(SpeakerProperty {
            key: caps["key"].to_string(),
            property_type,
            required,
            description: caps["desc"].trim().to_string(),
        });
    }

    if properties.is_empty() {
        return Err(SchemaParseError::EmptyDefinition);
    }
    Ok(SpeakerSchema::new(properties))
}

/// Parse entity type and relationship type declarations into one schema.
///
/// Lines with a parenthesized `Source -> Target` clause declare relationship
/// types; all other lines declare entity types.
pub fn parse_entity_definitions(text: &str) -> Result<EntitySchema, SchemaParseError> {
    let rel_re = Regex::new(
        r"^(?P<name>[A-Za-z][A-Za-z0-9_]*)\s*\((?P<src>[^)>]+)->(?P<dst>[^)]+)\)\s*:\s*(?P<desc>.*)$",
    )
    .expect("static regex");
    let ent_re = Regex::new(r"^(?P<name>[A-Za-z][A-Za-z0-9_ ]*?)\s*:\s*(?P<desc>.*)$")
        .expect("static regex");

    let split_types = |s: &str| -> Vec<String> {
        s.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && t != "*")
            .collect()
    };

    let mut schema = EntitySchema::default();
    for (line_no, raw) in content_lines(text) {
        let trimmed = raw.trim();
        if let Some(caps) = rel_re.captures(trimmed) {
            schema.relationship_types.push(DiscoveredRelationshipType {
                name: caps["name"].to_string(),
                description: caps["desc"].trim().to_string(),
                source_types: split_types(&caps["src"]),
                target_types: split_types(&caps["dst"]),
            });
        } else if let Some(caps) = ent_re.captures(trimmed) {
            schema.entity_types.push(DiscoveredEntityType {
                name: caps["name"].trim().to_string(),
                description: caps["desc"].trim().to_string(),
                examples: Vec::new(),
            });
        } else {
            return Err(SchemaParseError::Malformed {
                line: line_no,
                message: "expected 'Name: description' or 'NAME (Src -> Dst): description'"
                    .to_string(),
            });
        }
    }

    if schema.is_empty() {
        return Err(SchemaParseError::EmptyDefinition);
    }
    Ok(schema)
}
