use serde::{Deserialize, Serialize};

use crate::metrics::LlmMetrics;

/// Content-addressed document ID (blake3 hex hash of the paragraphs).
pub type DocId = String;

/// What a text source hands to the agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDocument {
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
}

/// A contiguous run of paragraphs `[start, end)` and its gist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub paragraphs: Vec<String>,
    pub summary: String,
}

impl Page {
    /// Verbatim page text, paragraphs separated by newlines.
    pub fn full_text(&self) -> String {
        self.paragraphs.join("\n")
    }
}

/// A fully processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub id: DocId,
    pub title: String,
    pub locator: String,
    /// Unix timestamp (seconds) at which processing finished.
    pub processed_at: i64,
    pub pages: Vec<Page>,
}

/// On-disk form of a processed document plus the metrics spent on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    #[serde(flatten)]
    pub document: DocumentState,
    #[serde(default)]
    pub metrics: LlmMetrics,
}
