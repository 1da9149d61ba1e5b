//! Graph store contract and in-memory implementation
//!
//! Writes are append/idempotent: persisting the same document id twice
//! leaves the graph in the same state as persisting it once. Node and edge
//! properties are set on first write only; corrections are new edges plus
//! explicit retraction of superseded ones, never an in-place overwrite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::model::{document_subgraph, taxonomy_subgraph, EdgeKind, GraphEdge, GraphNode};
use crate::error::GraphError;
use crate::models::{CodeTaxonomy, DocumentResult};

/// Write contract of the graph database.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Install unique-key constraints backing idempotent MERGE writes.
    async fn ensure_constraints(&self) -> Result<(), GraphError>;

    /// Persist Code nodes and hierarchy edges for the taxonomy.
    async fn persist_taxonomy(&self, taxonomy: &CodeTaxonomy) -> Result<(), GraphError>;

    /// Persist one document's quotes, speakers, entities, and edges.
    async fn persist_document(&self, result: &DocumentResult) -> Result<(), GraphError>;

    /// Mark one edge retracted. The edge stays in the graph as a record of
    /// the superseded assertion.
    async fn retract_edge(&self, kind: EdgeKind, from: &str, to: &str)
        -> Result<(), GraphError>;
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    properties: Map<String, Value>,
    retracted: bool,
}

#[derive(Debug, Default)]
struct InMemoryState {
    /// (label, key) -> properties as first written.
    nodes: BTreeMap<(String, String), Map<String, Value>>,
    /// edge key -> record.
    edges: BTreeMap<String, EdgeRecord>,
}

/// In-process [`GraphStore`] used by tests and dry runs; mirrors the
/// merge-on-key semantics of the Neo4j store.
#[derive(Default)]
pub struct InMemoryGraphStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge(&self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) {
        let mut state = self.state.lock().expect("graph state poisoned");
        for node in nodes {
            state
                .nodes
                .entry((node.label.as_str().to_string(), node.key))
                .or_insert(node.properties);
        }
        for edge in edges {
            state.edges.entry(edge.key()).or_insert(EdgeRecord {
                properties: edge.properties,
                retracted: false,
            });
        }
    }

    pub fn node_count(&self, label: &str) -> usize {
        self.state
            .lock()
            .expect("graph state poisoned")
            .nodes
            .keys()
            .filter(|(l, _)| l == label)
            .count()
    }

    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        let prefix = format!("{}|", kind.as_type());
        self.state
            .lock()
            .expect("graph state poisoned")
            .edges
            .iter()
            .filter(|(key, record)| key.starts_with(&prefix) && !record.retracted)
            .count()
    }

    pub fn is_retracted(&self, kind: EdgeKind, from: &str, to: &str) -> bool {
        let key = format!("{}|{}|{}", kind.as_type(), from, to);
        self.state
            .lock()
            .expect("graph state poisoned")
            .edges
            .get(&key)
            .map(|r| r.retracted)
            .unwrap_or(false)
    }

    pub fn edge_property(&self, kind: EdgeKind, from: &str, to: &str, name: &str) -> Option<Value> {
        let key = format!("{}|{}|{}", kind.as_type(), from, to);
        self.state
            .lock()
            .expect("graph state poisoned")
            .edges
            .get(&key)
            .and_then(|r| r.properties.get(name).cloned())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn ensure_constraints(&self) -> Result<(), GraphError> {
        // Keys are the map keys; uniqueness is structural here.
        Ok(())
    }

    async fn persist_taxonomy(&self, taxonomy: &CodeTaxonomy) -> Result<(), GraphError> {
        let (nodes, edges) = taxonomy_subgraph(taxonomy);
        self.merge(nodes, edges);
        Ok(())
    }

    async fn persist_document(&self, result: &DocumentResult) -> Result<(), GraphError> {
        let (nodes, edges) = document_subgraph(result);
        self.merge(nodes, edges);
        Ok(())
    }

    async fn retract_edge(
        &self,
        kind: EdgeKind,
        from: &str,
        to: &str,
    ) -> Result<(), GraphError> {
        let key = format!("{}|{}|{}", kind.as_type(), from, to);
        let mut state = self.state.lock().expect("graph state poisoned");
        match state.edges.get_mut(&key) {
            Some(record) => {
                record.retracted = true;
                Ok(())
            }
            None => Err(GraphError::UnknownEdge {
                kind: kind.as_type().to_string(),
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EnhancedQuote, HierarchicalCode, QuoteLocation, SpeakerInfo,
    };
    use std::collections::BTreeMap as StdBTreeMap;

    fn sample_result() -> DocumentResult {
        DocumentResult {
            document_id: "doc-1".into(),
            quotes: vec![
                EnhancedQuote {
                    id: "doc-1::q0".into(),
                    text: "first".into(),
                    context: String::new(),
                    code_ids: vec!["AI_RISK".into()],
                    speaker: SpeakerInfo::new("Ana", 0.9),
                    interview_id: "doc-1".into(),
                    location: QuoteLocation {
                        line_start: 1,
                        line_end: 1,
                    },
                    entity_ids: vec![],
                },
                EnhancedQuote {
                    id: "doc-1::q1".into(),
                    text: "second".into(),
                    context: String::new(),
                    code_ids: vec!["AI_RISK".into()],
                    speaker: SpeakerInfo::new("Ben", 0.8),
                    interview_id: "doc-1".into(),
                    location: QuoteLocation {
                        line_start: 2,
                        line_end: 2,
                    },
                    entity_ids: vec![],
                },
            ],
            entities: vec![],
            relationships: vec![],
            thematic_links: vec![],
            code_applications: StdBTreeMap::new(),
            warnings: vec![],
            elapsed_ms: 0,
        }
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let store = InMemoryGraphStore::new();
        let result = sample_result();

        store.persist_document(&result).await.unwrap();
        let quotes_once = store.node_count("Quote");
        let edges_once = store.edge_count(EdgeKind::HasCode);

        store.persist_document(&result).await.unwrap();
        assert_eq!(store.node_count("Quote"), quotes_once);
        assert_eq!(store.edge_count(EdgeKind::HasCode), edges_once);
        assert_eq!(store.node_count("Document"), 1);
        assert_eq!(store.node_count("Speaker"), 2);
    }

    #[tokio::test]
    async fn reimport_does_not_overwrite_edge_properties() {
        let store = InMemoryGraphStore::new();
        let mut result = sample_result();
        store.persist_document(&result).await.unwrap();

        // A later import with different confidence must not mutate the
        // existing attribution edge in place.
        result.quotes[0].speaker.confidence = 0.1;
        store.persist_document(&result).await.unwrap();

        let confidence = store
            .edge_property(EdgeKind::SpokenBy, "doc-1::q0", "Ana", "confidence")
            .unwrap();
        assert!((confidence.as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn retraction_marks_edge_without_deleting() {
        let store = InMemoryGraphStore::new();
        store.persist_document(&sample_result()).await.unwrap();

        assert_eq!(store.edge_count(EdgeKind::HasCode), 2);
        store
            .retract_edge(EdgeKind::HasCode, "doc-1::q0", "AI_RISK")
            .await
            .unwrap();
        assert_eq!(store.edge_count(EdgeKind::HasCode), 1);
        assert!(store.is_retracted(EdgeKind::HasCode, "doc-1::q0", "AI_RISK"));
    }

    #[tokio::test]
    async fn retracting_unknown_edge_errors() {
        let store = InMemoryGraphStore::new();
        let err = store
            .retract_edge(EdgeKind::HasCode, "nope", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownEdge { .. }));
    }

    #[tokio::test]
    async fn taxonomy_persists_hierarchy() {
        let store = InMemoryGraphStore::new();
        let taxonomy = CodeTaxonomy::new(vec![
            HierarchicalCode::root("AI_RISK", "AI Risk"),
            HierarchicalCode::child("AI_RISK_JOBS", "Jobs", "AI_RISK", 1),
        ])
        .unwrap();
        store.persist_taxonomy(&taxonomy).await.unwrap();
        store.persist_taxonomy(&taxonomy).await.unwrap();
        assert_eq!(store.node_count("Code"), 2);
        assert_eq!(store.edge_count(EdgeKind::ChildOf), 1);
    }
}
