pub mod ingest;
pub mod types;

use std::path::Path;

use tracing::debug;

use crate::error::{GistError, Result};
use types::{DocId, DocumentSnapshot, DocumentState, Page};

/// Append-only list of pages built while a document is processed.
#[derive(Debug, Default)]
pub struct PageStore {
    pages: Vec<Page>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the page covering `paragraphs[start..end]`. Pages must be
    /// pushed in order; the new page starts where the last one ended.
    pub fn push(&mut self, start: usize, end: usize, paragraphs: &[String], summary: String) {
        debug_assert_eq!(start, self.pages.last().map_or(0, |p| p.end));
        debug_assert!(end > start);
        self.pages.push(Page {
            index: self.pages.len(),
            start,
            end,
            paragraphs: paragraphs[start..end].to_vec(),
            summary,
        });
    }

    pub fn last(&self) -> Option<&Page> {
        self.pages.last()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}

/// blake3 over the paragraph text. Same paragraphs = same ID.
pub fn document_id(paragraphs: &[String]) -> DocId {
    let mut hasher = blake3::Hasher::new();
    for p in paragraphs {
        hasher.update(p.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Check that pages partition `[0, end)` with no gaps or overlaps.
pub fn validate_pages(pages: &[Page]) -> std::result::Result<(), String> {
    let mut cursor = 0;
    for (i, page) in pages.iter().enumerate() {
        if page.index != i {
            return Err(format!("page {} carries index {}", i, page.index));
        }
        if page.start != cursor {
            return Err(format!(
                "page {} starts at {}, expected {}",
                i, page.start, cursor
            ));
        }
        if page.end <= page.start {
            return Err(format!("page {} is empty ({}..{})", i, page.start, page.end));
        }
        if page.paragraphs.len() != page.end - page.start {
            return Err(format!(
                "page {} holds {} paragraphs for range {}..{}",
                i,
                page.paragraphs.len(),
                page.start,
                page.end
            ));
        }
        cursor = page.end;
    }
    Ok(())
}

impl DocumentSnapshot {
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| GistError::Snapshot(format!("serialize snapshot: {}", e)))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| GistError::Snapshot(format!("write {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), pages = self.document.pages.len(), "snapshot saved");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GistError::Snapshot(format!("read {}: {}", path.display(), e)))?;
        let snapshot: Self = serde_json::from_slice(&bytes)
            .map_err(|e| GistError::Snapshot(format!("parse {}: {}", path.display(), e)))?;
        snapshot.document.validate()?;
        Ok(snapshot)
    }
}

impl DocumentState {
    pub fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(GistError::Snapshot("document has no pages".to_string()));
        }
        validate_pages(&self.pages).map_err(GistError::Snapshot)
    }

    pub fn paragraph_count(&self) -> usize {
        self.pages.last().map_or(0, |p| p.end)
    }
}
