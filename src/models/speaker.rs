//! Speaker schema and attribution
//!
//! Phase 2 discovers a property schema for speakers (role, organisation,
//! seniority, ...). The schema declares each key once with a type tag and a
//! required flag; Phase 4 validates every speaker's property map against
//! that declared shape instead of trusting per-document structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declared value type for a speaker property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    List,
}

impl PropertyType {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Number => value.is_number(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::List => value.is_array(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::List => "list",
        }
    }
}

impl std::str::FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" | "text" => Ok(PropertyType::String),
            "number" | "int" | "integer" | "float" => Ok(PropertyType::Number),
            "boolean" | "bool" => Ok(PropertyType::Boolean),
            "list" | "array" => Ok(PropertyType::List),
            other => Err(other.to_string()),
        }
    }
}

/// One declared speaker property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProperty {
    pub key: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// The Phase 2 artifact: the full set of declared speaker properties.
///
/// Immutable once discovered; Phase 4 workers share it read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSchema {
    #[serde(default)]
    pub properties: Vec<SpeakerProperty>,
}

impl SpeakerSchema {
    pub fn new(properties: Vec<SpeakerProperty>) -> Self {
        Self { properties }
    }

    pub fn property(&self, key: &str) -> Option<&SpeakerProperty> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Seed-first merge for MIXED discovery: caller-declared keys win.
    pub fn merged_with(&self, discovered: Vec<SpeakerProperty>) -> SpeakerSchema {
        let mut merged = self.properties.clone();
        for prop in discovered {
            if self.property(&prop.key).is_none() {
                merged.push(prop);
            }
        }
        SpeakerSchema::new(merged)
    }
}

/// Speaker attribution for one quote.
///
/// `confidence` is on a fixed scale: 1.0 is reserved for unambiguous,
/// explicit identification (the transcript names the speaker at the span);
/// 0.0 is reserved for a total guess with no supporting evidence. Values in
/// between grade the strength of contextual evidence. The scale is enforced
/// here by clamping, not left to backend convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerInfo {
    pub name: String,
    pub confidence: f32,
    /// Keys are declared by the Phase 2 schema; values match the declared
    /// type tag per key. Validated, not assumed.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl SpeakerInfo {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            properties: BTreeMap::new(),
        }
    }
}
