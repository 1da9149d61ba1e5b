//! Entity and relationship model
//!
//! Two layers: schema-level types discovered in Phase 3
//! ([`DiscoveredEntityType`], [`DiscoveredRelationshipType`]) and
//! instance-level records produced in Phase 4 ([`ExtractedEntity`],
//! [`ExtractedRelationship`]). Instance `type` fields must exactly match a
//! schema type name; that consistency is enforced at validation time, not
//! left to convention.
//!
//! Instances form an arena: entities are records indexed by id, and
//! relationships are a separate edge list referencing entity ids. No
//! language-level object references, so cyclic entity graphs are
//! representable and construction is safe under concurrency.

use serde::{Deserialize, Serialize};

/// Schema-level entity type from Phase 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredEntityType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Schema-level relationship type from Phase 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredRelationshipType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Entity type names allowed as the source end. Empty means any.
    #[serde(default)]
    pub source_types: Vec<String>,
    /// Entity type names allowed as the target end. Empty means any.
    #[serde(default)]
    pub target_types: Vec<String>,
}

/// The Phase 3 artifact: entity types plus relationship types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    #[serde(default)]
    pub entity_types: Vec<DiscoveredEntityType>,
    #[serde(default)]
    pub relationship_types: Vec<DiscoveredRelationshipType>,
}

impl EntitySchema {
    pub fn contains_entity_type(&self, name: &str) -> bool {
        self.entity_types.iter().any(|t| t.name == name)
    }

    pub fn contains_relationship_type(&self, name: &str) -> bool {
        self.relationship_types.iter().any(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty() && self.relationship_types.is_empty()
    }

    /// Seed-first merge for MIXED discovery.
    pub fn merged_with(&self, discovered: EntitySchema) -> EntitySchema {
        let mut entity_types = self.entity_types.clone();
        for t in discovered.entity_types {
            if !self.contains_entity_type(&t.name) {
                entity_types.push(t);
            }
        }
        let mut relationship_types = self.relationship_types.clone();
        for t in discovered.relationship_types {
            if !self.contains_relationship_type(&t.name) {
                relationship_types.push(t);
            }
        }
        EntitySchema {
            entity_types,
            relationship_types,
        }
    }
}

/// Scope at which an instance was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceScope {
    Quote,
    Document,
    Corpus,
}

impl InstanceScope {
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()) {
            Some(s) if s == "quote" => InstanceScope::Quote,
            Some(s) if s == "corpus" => InstanceScope::Corpus,
            _ => InstanceScope::Document,
        }
    }
}

/// Instance-level entity record.
///
/// `id` is deterministic (`{document_id}::e{seq}`) and unique within the
/// owning document's arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub id: String,
    /// Must exactly match a [`DiscoveredEntityType::name`] from the schema.
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    pub scope: InstanceScope,
    pub confidence: f32,
    /// Quote ids mentioning this entity (mention edges in the graph).
    #[serde(default)]
    pub quote_ids: Vec<String>,
}

/// Instance-level relationship record: an edge between two arena entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    pub id: String,
    /// Must exactly match a [`DiscoveredRelationshipType::name`].
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Arena id of the source entity.
    pub source_id: String,
    /// Arena id of the target entity.
    pub target_id: String,
    pub scope: InstanceScope,
    #[serde(default)]
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> EntitySchema {
        EntitySchema {
            entity_types: vec![DiscoveredEntityType {
                name: "Organization".into(),
                description: String::new(),
                examples: vec![],
            }],
            relationship_types: vec![DiscoveredRelationshipType {
                name: "WORKS_FOR".into(),
                description: String::new(),
                source_types: vec!["Person".into()],
                target_types: vec!["Organization".into()],
            }],
        }
    }

    #[test]
    fn type_lookup_is_exact() {
        let s = schema();
        assert!(s.contains_entity_type("Organization"));
        assert!(!s.contains_entity_type("organization"));
        assert!(s.contains_relationship_type("WORKS_FOR"));
    }

    #[test]
    fn scope_parsing_defaults_to_document() {
        assert_eq!(
            InstanceScope::parse_or_default(Some("quote")),
            InstanceScope::Quote
        );
        assert_eq!(
            InstanceScope::parse_or_default(Some("CORPUS")),
            InstanceScope::Corpus
        );
        assert_eq!(
            InstanceScope::parse_or_default(Some("unknown")),
            InstanceScope::Document
        );
        assert_eq!(InstanceScope::parse_or_default(None), InstanceScope::Document);
    }

    #[test]
    fn merge_appends_new_types_only() {
        let seed = schema();
        let merged = seed.merged_with(EntitySchema {
            entity_types: vec![
                DiscoveredEntityType {
                    name: "Organization".into(),
                    description: "discovered duplicate".into(),
                    examples: vec![],
                },
                DiscoveredEntityType {
                    name: "Person".into(),
                    description: String::new(),
                    examples: vec![],
                },
            ],
            relationship_types: vec![],
        });
        assert_eq!(merged.entity_types.len(), 2);
        assert_eq!(merged.entity_types[0].description, "");
    }
}
