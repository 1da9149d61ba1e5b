//! Raw Phase 4 payload
//!
//! Serde mirror of the `apply_schemas` tool output, before validation. The
//! applicator turns this into a [`crate::models::DocumentResult`]; nothing
//! outside the apply module should touch these types.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawApplyPayload {
    #[serde(default)]
    pub quotes: Vec<RawQuote>,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
pub struct RawQuote {
    pub text: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub code_ids: Vec<String>,
    pub speaker: RawSpeaker,
    #[serde(default)]
    pub line_start: u32,
    #[serde(default)]
    pub line_end: u32,
}

#[derive(Debug, Deserialize)]
pub struct RawSpeaker {
    pub name: String,
    pub confidence: f32,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    /// 0-based positions into the payload's `quotes` array.
    #[serde(default)]
    pub quote_indexes: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RawRelationship {
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Entity name of the source end.
    pub source: String,
    /// Entity name of the target end.
    pub target: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub context: String,
}
