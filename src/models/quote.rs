//! Quote model
//!
//! The quote is the first-class record of the system: an exact text span
//! from one document, attributed to a speaker, linked many-to-many to
//! taxonomy codes by id.

use serde::{Deserialize, Serialize};

use super::speaker::SpeakerInfo;

/// Stable location of a quote within its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLocation {
    pub line_start: u32,
    pub line_end: u32,
}

/// An extracted, validated quote.
///
/// `id` is deterministic: `{document_id}::q{seq}`, assigned from the
/// document id and the quote's sequence position — never from backend
/// output. `code_ids` holds taxonomy ids returned by the backend and
/// validated against the taxonomy; post-validation it is non-empty (a quote
/// whose ids all fail validation is dropped, not persisted empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedQuote {
    pub id: String,
    /// Exact text span as it appears in the transcript.
    pub text: String,
    /// Short summary of the surrounding discussion.
    #[serde(default)]
    pub context: String,
    /// Ordered set of taxonomy code ids supporting this quote.
    pub code_ids: Vec<String>,
    pub speaker: SpeakerInfo,
    /// The owning document.
    pub interview_id: String,
    pub location: QuoteLocation,
    /// Arena ids of entities mentioned in this quote.
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

impl EnhancedQuote {
    /// Deterministic quote identity from document id + sequence position.
    pub fn make_id(document_id: &str, seq: usize) -> String {
        format!("{}::q{}", document_id, seq)
    }
}
