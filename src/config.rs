//! Pipeline configuration
//!
//! Serde-deserializable settings, loadable from a YAML file and overridable
//! per-field from the CLI. Defaults live here so a config file only needs
//! the fields it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::apply::InvalidCodeStrategy;
use crate::graph::Neo4jConfig;
use crate::llm::ExtractorConfig;
use crate::schema::DiscoveryMode;

/// Per-phase discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub mode: DiscoveryMode,
    /// Free-text definition file for CLOSED/MIXED modes.
    pub seed_file: Option<PathBuf>,
}

impl PhaseConfig {
    /// Read the seed definition text, if any.
    pub fn resolve_seed(&self) -> Result<Option<String>> {
        match &self.seed_file {
            None => Ok(None),
            Some(path) => std::fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("reading seed file {}", path.display())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound on concurrently processed documents in Phase 4.
    pub max_concurrency: usize,
    /// Attempts per backend call (first try included).
    pub max_attempts: usize,
    /// Base backoff between retries; doubles per retry.
    pub backoff_ms: u64,
    /// Wall-clock budget per backend call.
    pub call_timeout_secs: u64,
    /// Wall-clock budget for one document's Phase 4 unit of work.
    pub document_timeout_secs: u64,
    /// Run the three discovery phases concurrently. They are logically
    /// independent; the default stays sequential to be gentle on backend
    /// rate limits.
    pub discover_concurrently: bool,
    pub codes: PhaseConfig,
    pub speakers: PhaseConfig,
    pub entities: PhaseConfig,
    pub invalid_code_strategy: InvalidCodeStrategy,
    /// Where run artifacts are written; skipped when unset.
    pub output_dir: Option<PathBuf>,
    /// Graph database connection; graph persistence is skipped when unset.
    pub neo4j: Option<Neo4jConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            max_attempts: 3,
            backoff_ms: 500,
            call_timeout_secs: 120,
            document_timeout_secs: 300,
            discover_concurrently: false,
            codes: PhaseConfig::default(),
            speakers: PhaseConfig::default(),
            entities: PhaseConfig::default(),
            invalid_code_strategy: InvalidCodeStrategy::default(),
            output_dir: None,
            neo4j: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.backoff_ms),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.max_attempts, 3);
        assert!(!config.discover_concurrently);
        assert!(config.neo4j.is_none());
    }

    #[test]
    fn partial_yaml_overrides_defaults() {
        let config: PipelineConfig = serde_yaml::from_str(
            "max_concurrency: 5\n\
             codes:\n\
             \x20\x20mode: mixed\n\
             invalid_code_strategy:\n\
             \x20\x20strategy: fuzzy_match\n\
             \x20\x20min_similarity: 0.85\n",
        )
        .unwrap();
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.codes.mode, DiscoveryMode::Mixed);
        assert_eq!(
            config.invalid_code_strategy,
            InvalidCodeStrategy::FuzzyMatch {
                min_similarity: 0.85
            }
        );
        // untouched fields keep their defaults
        assert_eq!(config.max_attempts, 3);
    }
}
