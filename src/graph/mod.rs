//! Quote-centric graph persistence
//!
//! Flattening of pipeline artifacts into nodes/edges, the [`GraphStore`]
//! write contract, and the Neo4j and in-memory implementations.

pub mod model;
pub mod neo4j;
pub mod store;

pub use model::{document_subgraph, taxonomy_subgraph, EdgeKind, GraphEdge, GraphNode, NodeLabel};
pub use neo4j::{Neo4jConfig, Neo4jGraphStore};
pub use store::{GraphStore, InMemoryGraphStore};
