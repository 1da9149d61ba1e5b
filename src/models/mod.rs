//! Data model for the qualitative coding pipeline
//!
//! Schema-level artifacts (taxonomy, speaker schema, entity schema) are
//! produced once per corpus run and are immutable inputs to Phase 4.
//! Instance-level records (quotes, entities, relationships) are created once
//! per document and are append-only afterwards.

pub mod code;
pub mod entity;
pub mod quote;
pub mod results;
pub mod speaker;

pub use code::{CodeTaxonomy, HierarchicalCode};
pub use entity::{
    DiscoveredEntityType, DiscoveredRelationshipType, EntitySchema, ExtractedEntity,
    ExtractedRelationship, InstanceScope,
};
pub use quote::{EnhancedQuote, QuoteLocation};
pub use results::{
    CodeStats, CorpusAggregate, DocumentResult, QuarantinedDocument, ThematicLink,
    ValidationWarning, WarningKind,
};
pub use speaker::{PropertyType, SpeakerInfo, SpeakerProperty, SpeakerSchema};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The immutable snapshot of all three discovered schemas, shared read-only
/// across Phase 4 workers. Cloning the `Arc` is the only sharing mechanism;
/// no worker holds a mutable reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSet {
    pub taxonomy: CodeTaxonomy,
    pub speaker_schema: SpeakerSchema,
    pub entity_schema: EntitySchema,
}

impl SchemaSet {
    pub fn into_shared(self) -> Arc<SchemaSet> {
        Arc::new(self)
    }
}
