//! Hierarchical code taxonomy
//!
//! A taxonomy is the Phase 1 artifact: a forest of thematic codes. Once
//! discovered it is an immutable, read-only input to Phase 4 — no worker
//! mutates it, so it is shared across tasks as an `Arc` snapshot without
//! locking.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::TaxonomyError;

/// A single thematic code.
///
/// `id` is a stable, human-meaningful token (e.g. `AI_RISK`). Codes are
/// referenced everywhere by id, never by name: ids are what the extraction
/// backend returns and what quotes link to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalCode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Parent code id; `None` for a root (level 0) code.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Depth in the forest. Invariant: level(child) = level(parent) + 1.
    #[serde(default)]
    pub level: u8,
    /// Example spans illustrating the code.
    #[serde(default)]
    pub examples: Vec<String>,
}

impl HierarchicalCode {
    pub fn root(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            parent_id: None,
            level: 0,
            examples: Vec::new(),
        }
    }

    pub fn child(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: impl Into<String>,
        level: u8,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            parent_id: Some(parent_id.into()),
            level,
            examples: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Validated code forest with an id index.
///
/// Construction enforces the hierarchy invariant: unique ids, parent links
/// resolve, levels are consistent, and parent edges contain no cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<HierarchicalCode>", into = "Vec<HierarchicalCode>")]
pub struct CodeTaxonomy {
    codes: Vec<HierarchicalCode>,
}

impl CodeTaxonomy {
    /// Maximum depth accepted from discovery (levels 0..=2).
    pub const DEFAULT_MAX_DEPTH: u8 = 2;

    pub fn new(codes: Vec<HierarchicalCode>) -> Result<Self, TaxonomyError> {
        Self::with_max_depth(codes, Self::DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(
        codes: Vec<HierarchicalCode>,
        max_depth: u8,
    ) -> Result<Self, TaxonomyError> {
        if codes.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let mut by_id: HashMap<&str, &HierarchicalCode> = HashMap::new();
        for code in &codes {
            if by_id.insert(code.id.as_str(), code).is_some() {
                return Err(TaxonomyError::DuplicateId(code.id.clone()));
            }
        }

        for code in &codes {
            match &code.parent_id {
                None => {
                    if code.level != 0 {
                        return Err(TaxonomyError::RootLevel {
                            code: code.id.clone(),
                            found: code.level,
                        });
                    }
                }
                Some(parent_id) => {
                    let parent =
                        by_id
                            .get(parent_id.as_str())
                            .ok_or_else(|| TaxonomyError::UnknownParent {
                                code: code.id.clone(),
                                parent: parent_id.clone(),
                            })?;
                    let expected = parent.level + 1;
                    if code.level != expected {
                        return Err(TaxonomyError::LevelMismatch {
                            code: code.id.clone(),
                            expected,
                            found: code.level,
                        });
                    }
                }
            }
            if code.level > max_depth {
                return Err(TaxonomyError::TooDeep {
                    found: code.level,
                    max: max_depth,
                });
            }
        }

        // Levels strictly decrease along parent links, so a cycle implies a
        // level inconsistency already rejected above. Walk anyway so the
        // invariant does not silently depend on the level check.
        for code in &codes {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut chain = vec![code.id.as_str()];
            seen.insert(code.id.as_str());
            let mut current = code;
            while let Some(parent_id) = &current.parent_id {
                if !seen.insert(parent_id.as_str()) {
                    chain.push(parent_id.as_str());
                    return Err(TaxonomyError::Cycle {
                        chain: chain.join(" -> "),
                    });
                }
                chain.push(parent_id.as_str());
                match by_id.get(parent_id.as_str()) {
                    Some(parent) => current = *parent,
                    None => break,
                }
            }
        }

        Ok(Self { codes })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.codes.iter().any(|c| c.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&HierarchicalCode> {
        self.codes.iter().find(|c| c.id == id)
    }

    pub fn codes(&self) -> &[HierarchicalCode] {
        &self.codes
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(|c| c.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Child codes of `parent_id`, in declaration order.
    pub fn children_of(&self, parent_id: &str) -> Vec<&HierarchicalCode> {
        self.codes
            .iter()
            .filter(|c| c.parent_id.as_deref() == Some(parent_id))
            .collect()
    }

    /// Seed-first merge used by MIXED discovery: caller-supplied codes win
    /// on id conflict, discovered codes are appended. The merged forest is
    /// re-validated so a discovered child cannot orphan itself.
    pub fn merged_with(
        &self,
        discovered: Vec<HierarchicalCode>,
    ) -> Result<CodeTaxonomy, TaxonomyError> {
        let mut merged = self.codes.clone();
        let existing: HashSet<String> = merged.iter().map(|c| c.id.clone()).collect();
        for code in discovered {
            if !existing.contains(&code.id) {
                merged.push(code);
            }
        }
        CodeTaxonomy::new(merged)
    }
}

impl TryFrom<Vec<HierarchicalCode>> for CodeTaxonomy {
    type Error = TaxonomyError;

    fn try_from(codes: Vec<HierarchicalCode>) -> Result<Self, Self::Error> {
        CodeTaxonomy::new(codes)
    }
}

impl From<CodeTaxonomy> for Vec<HierarchicalCode> {
    fn from(taxonomy: CodeTaxonomy) -> Self {
        taxonomy.codes
    }
}
