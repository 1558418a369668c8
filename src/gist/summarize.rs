use std::sync::Arc;

use tracing::warn;

use super::parse::strip_summary_preamble;
use super::prompts;
use crate::metrics::MeteredModel;

/// Gist stored for a page whose summary could not be generated.
pub const SUMMARY_FAILED: &str = "Failed to generate summary.";

/// Produces the gist of a page.
pub struct Summarizer {
    llm: Arc<MeteredModel>,
}

impl Summarizer {
    pub fn new(llm: Arc<MeteredModel>) -> Self {
        Self { llm }
    }

    /// Condensed version of `page`, or [`SUMMARY_FAILED`] if the endpoint
    /// gives nothing back.
    pub async fn summarize(&self, page: &[String]) -> String {
        let prompt = prompts::shorten(&page.join("\n"));
        match self.llm.run("summary", prompt).await {
            Ok(response) => strip_summary_preamble(&response),
            Err(e) => {
                warn!(paragraphs = page.len(), error = %e, "summary failed");
                SUMMARY_FAILED.to_string()
            }
        }
    }
}
