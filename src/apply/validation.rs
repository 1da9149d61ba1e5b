//! Phase 4 validation
//!
//! Enforces the ID-consistency contract between discovery and application:
//! every code id returned by the backend is checked against the taxonomy,
//! and an id that is not present is recovered by the configured strategy —
//! dropped, or fuzzy-matched to the nearest valid taxonomy id. Ids are
//! never fabricated from returned free-text names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CodeTaxonomy, SpeakerSchema, ValidationWarning, WarningKind};

/// Policy for a returned code id that is absent from the taxonomy.
///
/// The source material never settled on one behavior, so it is a
/// configurable strategy rather than a baked-in choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum InvalidCodeStrategy {
    /// Drop the offending id (default).
    Drop,
    /// Replace with the most similar taxonomy id when similarity is at
    /// least `min_similarity` (Jaro-Winkler, 0.0-1.0); drop otherwise.
    FuzzyMatch { min_similarity: f64 },
}

impl Default for InvalidCodeStrategy {
    fn default() -> Self {
        InvalidCodeStrategy::Drop
    }
}

/// Outcome of resolving one returned code id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeResolution {
    /// Id exists in the taxonomy as returned.
    Valid,
    /// Id recovered to an existing taxonomy id by fuzzy match.
    Corrected(String),
    /// Id dropped.
    Dropped,
}

pub fn resolve_code_id(
    taxonomy: &CodeTaxonomy,
    raw_id: &str,
    strategy: InvalidCodeStrategy,
) -> CodeResolution {
    if taxonomy.contains(raw_id) {
        return CodeResolution::Valid;
    }
    match strategy {
        InvalidCodeStrategy::Drop => CodeResolution::Dropped,
        InvalidCodeStrategy::FuzzyMatch { min_similarity } => {
            let needle = raw_id.to_uppercase();
            let best = taxonomy
                .ids()
                .map(|id| (strsim::jaro_winkler(&needle, &id.to_uppercase()), id))
                .max_by(|a, b| a.0.total_cmp(&b.0));
            match best {
                Some((similarity, id)) if similarity >= min_similarity => {
                    CodeResolution::Corrected(id.to_string())
                }
                _ => CodeResolution::Dropped,
            }
        }
    }
}

/// Validate one speaker property map against the declared Phase 2 shape.
///
/// Unknown keys and type-tag mismatches are dropped with a warning; missing
/// required keys are warned but do not drop the speaker. Returns the cleaned
/// map plus the warnings recorded.
pub fn validate_speaker_properties(
    schema: &SpeakerSchema,
    raw: BTreeMap<String, serde_json::Value>,
    document_id: &str,
    speaker_name: &str,
) -> (BTreeMap<String, serde_json::Value>, Vec<ValidationWarning>) {
    let mut cleaned = BTreeMap::new();
    let mut warnings = Vec::new();

    for (key, value) in raw {
        match schema.property(&key) {
            None => warnings.push(ValidationWarning::new(
                document_id,
                WarningKind::UnknownSpeakerProperty,
                format!("speaker '{}': undeclared property '{}'", speaker_name, key),
            )),
            Some(decl) if !decl.property_type.matches(&value) => {
                warnings.push(ValidationWarning::new(
                    document_id,
                    WarningKind::PropertyTypeMismatch,
                    format!(
                        "speaker '{}': property '{}' is not a {}",
                        speaker_name,
                        key,
                        decl.property_type.name()
                    ),
                ));
            }
            Some(_) => {
                cleaned.insert(key, value);
            }
        }
    }

    for decl in &schema.properties {
        if decl.required && !cleaned.contains_key(&decl.key) {
            warnings.push(ValidationWarning::new(
                document_id,
                WarningKind::MissingRequiredProperty,
                format!(
                    "speaker '{}': required property '{}' missing",
                    speaker_name, decl.key
                ),
            ));
        }
    }

    (cleaned, warnings)
}
