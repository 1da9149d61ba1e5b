//! qualcode: LLM-powered qualitative coding of interview transcripts
//!
//! Four-phase extraction pipeline over a corpus of transcripts:
//!
//! 1. **Code discovery** - one pass over the full corpus produces a
//!    hierarchical thematic code taxonomy.
//! 2. **Speaker discovery** - one pass produces a speaker property schema.
//! 3. **Entity discovery** - one pass produces entity/relationship types.
//! 4. **Application** - each document is processed by a bounded worker pool
//!    that applies the (now immutable) schemas to extract speaker-attributed
//!    quotes linked to codes by id, plus entity/relationship instances.
//!
//! Per-document results are aggregated into corpus statistics and persisted
//! into a quote-centric graph with idempotent, append-only writes.

pub mod aggregate;
pub mod apply;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod source;

pub use aggregate::aggregate;
pub use apply::{DocumentApplicator, InvalidCodeStrategy};
pub use config::{PhaseConfig, PipelineConfig};
pub use error::{CallError, PhaseError, PipelineError, TaxonomyError};
pub use graph::{GraphStore, InMemoryGraphStore, Neo4jGraphStore};
pub use llm::{
    create_llm_client, AgentBackend, LlmClient, MockLlmClient, StructuredExtractor,
};
pub use models::{
    CodeTaxonomy, CorpusAggregate, DocumentResult, EnhancedQuote, EntitySchema,
    HierarchicalCode, SchemaSet, SpeakerInfo, SpeakerSchema,
};
pub use pipeline::{ExtractionPipeline, PipelineReport};
pub use schema::{DiscoveryMode, SchemaDiscoverer};
pub use source::{DocumentSource, InterviewDocument, TextDirSource};
