use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::parse::parse_page_selection;
use super::prompts;
use crate::config::GistConfig;
use crate::docs::types::Page;
use crate::error::{GistError, Result};
use crate::metrics::MeteredModel;

#[derive(Debug, Clone, PartialEq)]
pub struct RecallAnswer {
    pub answer: String,
    /// Pages whose full text replaced their gist.
    pub pages_read: BTreeSet<usize>,
    /// The model's lookup reply, if the lookup call succeeded.
    pub rationale: Option<String>,
}

/// Every gist, labeled with its page index.
pub fn gist_listing(pages: &[Page]) -> String {
    pages
        .iter()
        .map(|p| format!("\nPage {}:\n{}", p.index, p.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Gists in page order, with selected pages swapped for their full text.
pub fn expand_context(pages: &[Page], selection: &BTreeSet<usize>) -> Vec<String> {
    pages
        .iter()
        .map(|p| {
            if selection.contains(&p.index) {
                p.full_text()
            } else {
                p.summary.clone()
            }
        })
        .collect()
}

/// Answers questions from gists, re-reading pages the model asks for.
pub struct RecallController {
    llm: Arc<MeteredModel>,
    config: GistConfig,
}

impl RecallController {
    pub fn new(llm: Arc<MeteredModel>, config: GistConfig) -> Self {
        Self { llm, config }
    }

    /// Pages the model wants to re-read. Any failure means "none".
    pub async fn lookup(
        &self,
        question: &str,
        pages: &[Page],
    ) -> (BTreeSet<usize>, Option<String>) {
        let prompt = prompts::lookup(&gist_listing(pages), question, self.config.max_lookup_pages);
        match self.llm.run("lookup", prompt).await {
            Ok(response) => {
                let response = response.trim().to_string();
                debug!(rationale = %response, "lookup rationale");
                let selection =
                    parse_page_selection(&response, pages.len(), self.config.max_lookup_pages);
                (selection, Some(response))
            }
            Err(e) => {
                warn!(error = %e, "lookup failed, answering from gists only");
                (BTreeSet::new(), None)
            }
        }
    }

    pub async fn answer(&self, question: &str, pages: &[Page]) -> Result<RecallAnswer> {
        if pages.is_empty() {
            return Err(GistError::NotProcessed);
        }

        let (pages_read, rationale) = self.lookup(question, pages).await;
        info!(pages_read = ?pages_read, "re-reading pages");

        let article = expand_context(pages, &pages_read).join("\n");
        let answer = self
            .llm
            .run("answer", prompts::answer(&article, question))
            .await?
            .trim()
            .to_string();

        Ok(RecallAnswer {
            answer,
            pages_read,
            rationale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use crate::testing::ScriptedModel;

    fn pages(summaries: &[&str], full: &[&str]) -> Vec<Page> {
        summaries
            .iter()
            .zip(full)
            .enumerate()
            .map(|(i, (s, f))| Page {
                index: i,
                start: i,
                end: i + 1,
                paragraphs: vec![f.to_string()],
                summary: s.to_string(),
            })
            .collect()
    }

    fn controller(model: Arc<ScriptedModel>) -> RecallController {
        RecallController::new(Arc::new(MeteredModel::new(model)), GistConfig::default())
    }

    #[test]
    fn test_expand_context_substitutes_selected() {
        let pages = pages(&["S0", "S1", "S2"], &["P0 full", "P1 full", "P2 full"]);
        let sel = BTreeSet::from([1]);
        assert_eq!(expand_context(&pages, &sel), vec!["S0", "P1 full", "S2"]);
    }

    #[test]
    fn test_gist_listing_format() {
        let pages = pages(&["S0", "S1"], &["P0", "P1"]);
        assert_eq!(gist_listing(&pages), "\nPage 0:\nS0\n\nPage 1:\nS1");
    }

    #[tokio::test]
    async fn test_answer_requires_pages() {
        let c = controller(Arc::new(ScriptedModel::failing()));
        assert!(matches!(
            c.answer("q", &[]).await,
            Err(GistError::NotProcessed)
        ));
    }

    #[tokio::test]
    async fn test_answer_expands_selected_pages() {
        let model = Arc::new(ScriptedModel::new(|prompt| {
            if prompt.contains("Which page(s)") {
                Ok(Completion::text("I want to look up Page [2, 7] to check."))
            } else {
                Ok(Completion::text("  Forty-two.\n"))
            }
        }));
        let c = controller(model.clone());
        let pages = pages(&["S0", "S1", "S2"], &["P0 full", "P1 full", "P2 full"]);

        let result = c.answer("What is it?", &pages).await.unwrap();
        assert_eq!(result.answer, "Forty-two.");
        assert_eq!(result.pages_read, BTreeSet::from([2]));
        assert!(result.rationale.unwrap().contains("Page [2, 7]"));

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("S0\nS1\nP2 full"));
        assert!(prompts[1].contains("What is it?"));
    }

    #[tokio::test]
    async fn test_lookup_failure_uses_gists_only() {
        let model = Arc::new(ScriptedModel::new(|prompt| {
            if prompt.contains("Which page(s)") {
                Err(anyhow::anyhow!("timeout"))
            } else {
                Ok(Completion::text("From memory."))
            }
        }));
        let c = controller(model.clone());
        let pages = pages(&["S0", "S1"], &["P0 full", "P1 full"]);

        let result = c.answer("q", &pages).await.unwrap();
        assert_eq!(result.answer, "From memory.");
        assert!(result.pages_read.is_empty());
        assert!(result.rationale.is_none());
        assert!(model.prompts()[1].contains("S0\nS1"));
    }

    #[tokio::test]
    async fn test_answer_failure_surfaces() {
        let model = Arc::new(ScriptedModel::new(|prompt| {
            if prompt.contains("Which page(s)") {
                Ok(Completion::text("Page [0]"))
            } else {
                Err(anyhow::anyhow!("503"))
            }
        }));
        let c = controller(model);
        let pages = pages(&["S0"], &["P0 full"]);
        assert!(matches!(
            c.answer("q", &pages).await,
            Err(GistError::Inference { stage: "answer", .. })
        ));
    }
}
