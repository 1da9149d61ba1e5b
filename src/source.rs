//! Document source contract
//!
//! Parsing/ingestion of rich formats lives outside this crate; the pipeline
//! only needs raw text per document with a stable id and enough positional
//! information (lines) for quote location tracking.

use std::path::Path;

use anyhow::{Context, Result};

/// One interview transcript, identified by a stable document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewDocument {
    pub id: String,
    pub title: Option<String>,
    pub text: String,
}

impl InterviewDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            text: text.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Anything that can yield the corpus.
pub trait DocumentSource {
    fn load(&self) -> Result<Vec<InterviewDocument>>;
}

/// Loads every `.txt` file in a directory; the file stem is the document id.
pub struct TextDirSource {
    dir: std::path::PathBuf,
}

impl TextDirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl DocumentSource for TextDirSource {
    fn load(&self) -> Result<Vec<InterviewDocument>> {
        let mut documents = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("reading corpus directory {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document")
                .to_string();
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            documents.push(InterviewDocument::new(id, text));
        }
        // Stable order regardless of directory iteration order.
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }
}

/// Concatenate the corpus for the discovery phases, with a header per
/// document so the backend can tell interviews apart.
pub fn concatenate_corpus(documents: &[InterviewDocument]) -> String {
    documents
        .iter()
        .map(|d| format!("=== Document: {} ===\n{}\n", d.id, d.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn text_dir_source_loads_sorted_txt_files() {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in [("b.txt", "second"), ("a.txt", "first"), ("c.md", "skip")] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            write!(f, "{}", content).unwrap();
        }
        let docs = TextDirSource::new(dir.path()).load().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[1].id, "b");
    }

    #[test]
    fn corpus_concatenation_includes_headers() {
        let docs = vec![
            InterviewDocument::new("one", "alpha"),
            InterviewDocument::new("two", "beta"),
        ];
        let corpus = concatenate_corpus(&docs);
        assert!(corpus.contains("=== Document: one ==="));
        assert!(corpus.contains("beta"));
    }
}
