//! Neo4j-backed graph store
//!
//! Parameterized Cypher MERGE writes keyed by the deterministic ids the
//! pipeline generates; unique-key constraints make re-import a no-op.
//! Properties are set with ON CREATE only, so re-running persistence never
//! rewrites an existing node or edge in place.

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::model::EdgeKind;
use super::store::GraphStore;
use crate::error::GraphError;
use crate::models::{CodeTaxonomy, DocumentResult};

fn default_database() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> usize {
    8
}

/// Connection settings for the Neo4j store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Bound on the driver's connection pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// [`GraphStore`] writing to a Neo4j instance over bolt.
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, GraphError> {
        let driver_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .build()?;
        let graph = Graph::connect(driver_config).await?;
        info!(uri = %config.uri, database = %config.database, "connected to Neo4j");
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn ensure_constraints(&self) -> Result<(), GraphError> {
        for (name, label) in [
            ("document_key", "Document"),
            ("quote_key", "Quote"),
            ("code_key", "Code"),
            ("speaker_key", "Speaker"),
            ("entity_key", "Entity"),
        ] {
            self.graph
                .run(query(&format!(
                    "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.key IS UNIQUE",
                    name, label
                )))
                .await?;
        }
        Ok(())
    }

    async fn persist_taxonomy(&self, taxonomy: &CodeTaxonomy) -> Result<(), GraphError> {
        for code in taxonomy.codes() {
            self.graph
                .run(
                    query(
                        "MERGE (c:Code {key: $key})
                         ON CREATE SET c.name = $name,
                                       c.description = $description,
                                       c.level = $level",
                    )
                    .param("key", code.id.as_str())
                    .param("name", code.name.as_str())
                    .param("description", code.description.as_str())
                    .param("level", code.level as i64),
                )
                .await?;

            if let Some(parent_id) = &code.parent_id {
                self.graph
                    .run(
                        query(
                            "MATCH (c:Code {key: $child}), (p:Code {key: $parent})
                             MERGE (c)-[:CHILD_OF]->(p)",
                        )
                        .param("child", code.id.as_str())
                        .param("parent", parent_id.as_str()),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn persist_document(&self, result: &DocumentResult) -> Result<(), GraphError> {
        self.graph
            .run(
                query("MERGE (d:Document {key: $key})")
                    .param("key", result.document_id.as_str()),
            )
            .await?;

        for quote in &result.quotes {
            self.graph
                .run(
                    query(
                        "MERGE (q:Quote {key: $key})
                         ON CREATE SET q.text = $text,
                                       q.context = $context,
                                       q.interview_id = $interview_id,
                                       q.line_start = $line_start,
                                       q.line_end = $line_end",
                    )
                    .param("key", quote.id.as_str())
                    .param("text", quote.text.as_str())
                    .param("context", quote.context.as_str())
                    .param("interview_id", quote.interview_id.as_str())
                    .param("line_start", quote.location.line_start as i64)
                    .param("line_end", quote.location.line_end as i64),
                )
                .await?;

            self.graph
                .run(
                    query(
                        "MATCH (q:Quote {key: $quote}), (d:Document {key: $document})
                         MERGE (q)-[:FROM_DOCUMENT]->(d)",
                    )
                    .param("quote", quote.id.as_str())
                    .param("document", result.document_id.as_str()),
                )
                .await?;

            for code_id in &quote.code_ids {
                // The code node normally exists from persist_taxonomy; the
                // MERGE keeps the edge write safe on a cold graph.
                self.graph
                    .run(
                        query(
                            "MATCH (q:Quote {key: $quote})
                             MERGE (c:Code {key: $code})
                             MERGE (q)-[:HAS_CODE]->(c)",
                        )
                        .param("quote", quote.id.as_str())
                        .param("code", code_id.as_str()),
                    )
                    .await?;
            }

            let speaker_props = serde_json::to_string(&quote.speaker.properties)
                .unwrap_or_else(|_| "{}".to_string());
            self.graph
                .run(
                    query(
                        "MATCH (q:Quote {key: $quote})
                         MERGE (s:Speaker {key: $speaker})
                         ON CREATE SET s.name = $speaker, s.properties_json = $props
                         MERGE (q)-[r:SPOKEN_BY]->(s)
                         ON CREATE SET r.confidence = $confidence",
                    )
                    .param("quote", quote.id.as_str())
                    .param("speaker", quote.speaker.name.as_str())
                    .param("props", speaker_props)
                    .param("confidence", quote.speaker.confidence as f64),
                )
                .await?;
        }

        for entity in &result.entities {
            self.graph
                .run(
                    query(
                        "MERGE (e:Entity {key: $key})
                         ON CREATE SET e.name = $name,
                                       e.type = $type,
                                       e.confidence = $confidence",
                    )
                    .param("key", entity.id.as_str())
                    .param("name", entity.name.as_str())
                    .param("type", entity.entity_type.as_str())
                    .param("confidence", entity.confidence as f64),
                )
                .await?;

            for quote_id in &entity.quote_ids {
                self.graph
                    .run(
                        query(
                            "MATCH (q:Quote {key: $quote}), (e:Entity {key: $entity})
                             MERGE (q)-[:MENTIONS]->(e)",
                        )
                        .param("quote", quote_id.as_str())
                        .param("entity", entity.id.as_str()),
                    )
                    .await?;
            }
        }

        for link in &result.thematic_links {
            self.graph
                .run(
                    query(
                        "MATCH (a:Quote {key: $from}), (b:Quote {key: $to})
                         MERGE (a)-[r:THEMATIC_LINK]->(b)
                         ON CREATE SET r.shared_code_id = $code",
                    )
                    .param("from", link.from_quote_id.as_str())
                    .param("to", link.to_quote_id.as_str())
                    .param("code", link.shared_code_id.as_str()),
                )
                .await?;
        }

        Ok(())
    }

    async fn retract_edge(
        &self,
        kind: EdgeKind,
        from: &str,
        to: &str,
    ) -> Result<(), GraphError> {
        let (from_label, to_label) = kind.endpoints();
        // Relationship types cannot be parameterized in Cypher; the type
        // string comes from the static EdgeKind enum.
        let cypher = format!(
            "MATCH (a:{} {{key: $from}})-[r:{}]->(b:{} {{key: $to}})
             SET r.retracted = true, r.retracted_at = datetime()
             RETURN count(r) AS retracted",
            from_label.as_str(),
            kind.as_type(),
            to_label.as_str()
        );
        let mut stream = self
            .graph
            .execute(query(&cypher).param("from", from).param("to", to))
            .await?;

        let mut retracted: i64 = 0;
        while let Some(row) = stream.next().await? {
            retracted = row.get("retracted").unwrap_or(0);
        }
        if retracted == 0 {
            return Err(GraphError::UnknownEdge {
                kind: kind.as_type().to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
