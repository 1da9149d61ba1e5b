//! Quote-centric graph model
//!
//! The quote is a first-class node with a stable, deterministic key derived
//! from document id + sequence position — not a property nested inside a
//! speaker or document record. This module flattens pipeline artifacts into
//! node and edge lists; the stores in this package decide how to write them.

use serde_json::{json, Map, Value};

use crate::models::{CodeTaxonomy, DocumentResult};

/// Node labels of the graph schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Document,
    Quote,
    Code,
    Speaker,
    Entity,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Document => "Document",
            NodeLabel::Quote => "Quote",
            NodeLabel::Code => "Code",
            NodeLabel::Speaker => "Speaker",
            NodeLabel::Entity => "Entity",
        }
    }
}

/// Relationship types of the graph schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Code support: quote -> code.
    HasCode,
    /// Speaker attribution: quote -> speaker.
    SpokenBy,
    /// Provenance: quote -> document.
    FromDocument,
    /// Cross-speaker idea flow: quote -> quote.
    ThematicLink,
    /// Code hierarchy: code -> parent code.
    ChildOf,
    /// Entity mention: quote -> entity.
    Mentions,
}

impl EdgeKind {
    pub fn as_type(&self) -> &'static str {
        match self {
            EdgeKind::HasCode => "HAS_CODE",
            EdgeKind::SpokenBy => "SPOKEN_BY",
            EdgeKind::FromDocument => "FROM_DOCUMENT",
            EdgeKind::ThematicLink => "THEMATIC_LINK",
            EdgeKind::ChildOf => "CHILD_OF",
            EdgeKind::Mentions => "MENTIONS",
        }
    }

    pub fn endpoints(&self) -> (NodeLabel, NodeLabel) {
        match self {
            EdgeKind::HasCode => (NodeLabel::Quote, NodeLabel::Code),
            EdgeKind::SpokenBy => (NodeLabel::Quote, NodeLabel::Speaker),
            EdgeKind::FromDocument => (NodeLabel::Quote, NodeLabel::Document),
            EdgeKind::ThematicLink => (NodeLabel::Quote, NodeLabel::Quote),
            EdgeKind::ChildOf => (NodeLabel::Code, NodeLabel::Code),
            EdgeKind::Mentions => (NodeLabel::Quote, NodeLabel::Entity),
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_type())
    }
}

/// A node with its unique key and create-time properties.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub label: NodeLabel,
    pub key: String,
    pub properties: Map<String, Value>,
}

impl GraphNode {
    fn new(label: NodeLabel, key: impl Into<String>, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            label,
            key: key.into(),
            properties,
        }
    }
}

/// An edge with its create-time properties.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub from: String,
    pub to: String,
    pub properties: Map<String, Value>,
}

impl GraphEdge {
    fn new(kind: EdgeKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            to: to.into(),
            properties: Map::new(),
        }
    }

    fn with_properties(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.properties = map;
        }
        self
    }

    /// Deterministic dedup key for idempotent writes.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.kind.as_type(), self.from, self.to)
    }
}

/// Flatten the taxonomy into Code nodes plus hierarchy edges.
pub fn taxonomy_subgraph(taxonomy: &CodeTaxonomy) -> (Vec<GraphNode>, Vec<GraphEdge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for code in taxonomy.codes() {
        nodes.push(GraphNode::new(
            NodeLabel::Code,
            &code.id,
            json!({
                "name": code.name,
                "description": code.description,
                "level": code.level,
            }),
        ));
        if let Some(parent_id) = &code.parent_id {
            edges.push(GraphEdge::new(EdgeKind::ChildOf, &code.id, parent_id));
        }
    }
    (nodes, edges)
}

/// Flatten one document result into its nodes and edges.
///
/// Speaker nodes are keyed by name (corpus-global); everything else keys on
/// the deterministic per-document ids assigned at assembly.
pub fn document_subgraph(result: &DocumentResult) -> (Vec<GraphNode>, Vec<GraphEdge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    nodes.push(GraphNode::new(
        NodeLabel::Document,
        &result.document_id,
        json!({}),
    ));

    for quote in &result.quotes {
        nodes.push(GraphNode::new(
            NodeLabel::Quote,
            &quote.id,
            json!({
                "text": quote.text,
                "context": quote.context,
                "interview_id": quote.interview_id,
                "line_start": quote.location.line_start,
                "line_end": quote.location.line_end,
            }),
        ));
        edges.push(GraphEdge::new(
            EdgeKind::FromDocument,
            &quote.id,
            &result.document_id,
        ));

        for code_id in &quote.code_ids {
            edges.push(GraphEdge::new(EdgeKind::HasCode, &quote.id, code_id));
        }

        nodes.push(GraphNode::new(
            NodeLabel::Speaker,
            &quote.speaker.name,
            Value::Object(quote.speaker.properties.clone().into_iter().collect()),
        ));
        edges.push(
            GraphEdge::new(EdgeKind::SpokenBy, &quote.id, &quote.speaker.name)
                .with_properties(json!({"confidence": quote.speaker.confidence})),
        );
    }

    for entity in &result.entities {
        nodes.push(GraphNode::new(
            NodeLabel::Entity,
            &entity.id,
            json!({
                "name": entity.name,
                "type": entity.entity_type,
                "confidence": entity.confidence,
            }),
        ));
        for quote_id in &entity.quote_ids {
            edges.push(GraphEdge::new(EdgeKind::Mentions, quote_id, &entity.id));
        }
    }

    for link in &result.thematic_links {
        edges.push(
            GraphEdge::new(EdgeKind::ThematicLink, &link.from_quote_id, &link.to_quote_id)
                .with_properties(json!({"shared_code_id": link.shared_code_id})),
        );
    }

    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EnhancedQuote, HierarchicalCode, QuoteLocation, SpeakerInfo, ThematicLink,
    };
    use std::collections::BTreeMap;

    fn sample_result() -> DocumentResult {
        DocumentResult {
            document_id: "doc-1".into(),
            quotes: vec![EnhancedQuote {
                id: "doc-1::q0".into(),
                text: "quote text".into(),
                context: String::new(),
                code_ids: vec!["AI_RISK".into()],
                speaker: SpeakerInfo::new("Ana", 0.9),
                interview_id: "doc-1".into(),
                location: QuoteLocation {
                    line_start: 3,
                    line_end: 4,
                },
                entity_ids: vec![],
            }],
            entities: vec![],
            relationships: vec![],
            thematic_links: vec![ThematicLink {
                from_quote_id: "doc-1::q0".into(),
                to_quote_id: "doc-1::q1".into(),
                shared_code_id: "AI_RISK".into(),
            }],
            code_applications: BTreeMap::new(),
            warnings: vec![],
            elapsed_ms: 0,
        }
    }

    #[test]
    fn taxonomy_subgraph_has_hierarchy_edges() {
        let taxonomy = CodeTaxonomy::new(vec![
            HierarchicalCode::root("AI_RISK", "AI Risk"),
            HierarchicalCode::child("AI_RISK_JOBS", "Jobs", "AI_RISK", 1),
        ])
        .unwrap();
        let (nodes, edges) = taxonomy_subgraph(&taxonomy);
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::ChildOf);
        assert_eq!(edges[0].from, "AI_RISK_JOBS");
    }

    #[test]
    fn document_subgraph_centers_on_quotes() {
        let (nodes, edges) = document_subgraph(&sample_result());
        assert!(nodes
            .iter()
            .any(|n| n.label == NodeLabel::Quote && n.key == "doc-1::q0"));
        assert!(edges
            .iter()
            .any(|e| e.kind == EdgeKind::FromDocument && e.to == "doc-1"));
        assert!(edges
            .iter()
            .any(|e| e.kind == EdgeKind::HasCode && e.to == "AI_RISK"));
        assert!(edges
            .iter()
            .any(|e| e.kind == EdgeKind::SpokenBy && e.to == "Ana"));
        assert!(edges.iter().any(|e| e.kind == EdgeKind::ThematicLink));
    }

    #[test]
    fn edge_keys_are_deterministic() {
        let edge = GraphEdge::new(EdgeKind::HasCode, "doc-1::q0", "AI_RISK");
        assert_eq!(edge.key(), "HAS_CODE|doc-1::q0|AI_RISK");
    }
}
