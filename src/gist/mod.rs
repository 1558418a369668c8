pub mod paginate;
pub mod parse;
pub mod prompts;
pub mod recall;
pub mod summarize;

use std::sync::Arc;

use tracing::info;

use crate::config::GistConfig;
use crate::docs::ingest::TextSource;
use crate::docs::types::{DocumentSnapshot, DocumentState};
use crate::docs::{document_id, PageStore};
use crate::error::{GistError, Result};
use crate::llm::ChatModel;
use crate::metrics::{LlmMetrics, MeteredModel};

use paginate::Paginator;
use recall::{RecallAnswer, RecallController};
use summarize::Summarizer;

/// Reads a document into gist memory and answers questions about it.
pub struct GistAgent {
    llm: Arc<MeteredModel>,
    paginator: Paginator,
    summarizer: Summarizer,
    recall: RecallController,
    document: Option<DocumentState>,
}

impl GistAgent {
    pub fn new(model: Arc<dyn ChatModel>, config: GistConfig) -> Self {
        Self::with_llm(Arc::new(MeteredModel::new(model)), config)
    }

    /// Resume from a saved snapshot, metrics included.
    pub fn from_snapshot(
        model: Arc<dyn ChatModel>,
        config: GistConfig,
        snapshot: DocumentSnapshot,
    ) -> Result<Self> {
        snapshot.document.validate()?;
        let llm = Arc::new(MeteredModel::with_metrics(model, snapshot.metrics));
        let mut agent = Self::with_llm(llm, config);
        agent.document = Some(snapshot.document);
        Ok(agent)
    }

    fn with_llm(llm: Arc<MeteredModel>, config: GistConfig) -> Self {
        Self {
            paginator: Paginator::new(llm.clone(), config.clone()),
            summarizer: Summarizer::new(llm.clone()),
            recall: RecallController::new(llm.clone(), config),
            llm,
            document: None,
        }
    }

    pub fn document(&self) -> Option<&DocumentState> {
        self.document.as_ref()
    }

    pub async fn metrics(&self) -> LlmMetrics {
        self.llm.metrics().await
    }

    /// Load `locator` from `source`, then paginate and summarize it.
    pub async fn process_document(
        &mut self,
        source: &dyn TextSource,
        locator: &str,
    ) -> Result<&DocumentState> {
        let doc = source
            .load(locator)
            .await
            .map_err(|e| GistError::SourceUnavailable {
                locator: locator.to_string(),
                reason: format!("{:#}", e),
            })?;

        let Some(title) = doc.title else {
            return Err(GistError::SourceUnavailable {
                locator: locator.to_string(),
                reason: "could not find a document title".to_string(),
            });
        };

        self.process_paragraphs(title, locator, doc.paragraphs).await
    }

    /// Paginate and summarize already-extracted paragraphs. The previous
    /// document is replaced only once every page is done.
    pub async fn process_paragraphs(
        &mut self,
        title: String,
        locator: &str,
        paragraphs: Vec<String>,
    ) -> Result<&DocumentState> {
        if paragraphs.is_empty() {
            return Err(GistError::SourceUnavailable {
                locator: locator.to_string(),
                reason: "document has no paragraphs".to_string(),
            });
        }

        let total = paragraphs.len();
        info!(title = %title, locator, paragraphs = total, "processing document");

        let mut store = PageStore::new();
        let mut cursor = 0;
        while cursor < total {
            let preceding = store.last().map(|p| p.paragraphs.as_slice());
            let end = self.paginator.next_break(&paragraphs, cursor, preceding).await;
            debug_assert!(end > cursor && end <= total);

            let summary = self.summarizer.summarize(&paragraphs[cursor..end]).await;
            store.push(cursor, end, &paragraphs, summary);
            info!(
                page = store.len(),
                start = cursor,
                end,
                total,
                "page complete"
            );
            cursor = end;
        }

        info!(pages = store.len(), "document processing complete");
        self.document = Some(DocumentState {
            id: document_id(&paragraphs),
            title,
            locator: locator.to_string(),
            processed_at: chrono::Utc::now().timestamp(),
            pages: store.into_pages(),
        });
        self.document.as_ref().ok_or(GistError::NotProcessed)
    }

    pub async fn answer(&self, question: &str) -> Result<RecallAnswer> {
        let document = self.document.as_ref().ok_or(GistError::NotProcessed)?;
        info!(question, pages = document.pages.len(), "answering");
        self.recall.answer(question, &document.pages).await
    }

    pub async fn snapshot(&self) -> Result<DocumentSnapshot> {
        let document = self.document.clone().ok_or(GistError::NotProcessed)?;
        Ok(DocumentSnapshot {
            document,
            metrics: self.metrics().await,
        })
    }
}
