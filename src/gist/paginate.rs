use std::sync::Arc;

use tracing::{debug, warn};

use super::parse::parse_break_point;
use super::prompts;
use crate::config::GistConfig;
use crate::metrics::MeteredModel;

/// The labeled passage offered to the model for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Paragraphs from the window start with `<j>` labels interleaved.
    pub passage: String,
    /// Exclusive end of the window; also the last label offered.
    pub end: usize,
    pub words: usize,
    /// Opening of the paragraph right after the window, or empty at EOF.
    pub following: String,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Accumulate paragraphs from `start` until `word_limit` is reached,
/// labeling every position past `start_threshold` as a candidate break.
pub fn build_window(paragraphs: &[String], start: usize, config: &GistConfig) -> Window {
    let mut passage = vec![paragraphs[start].clone()];
    let mut words = word_count(&paragraphs[start]);
    let mut j = start + 1;

    while words < config.word_limit && j < paragraphs.len() {
        words += word_count(&paragraphs[j]);
        if words >= config.start_threshold {
            passage.push(format!("<{}>", j));
        }
        passage.push(paragraphs[j].clone());
        j += 1;
    }
    passage.push(format!("<{}>", j));

    let following = if j == paragraphs.len() {
        String::new()
    } else {
        format!("{}\n...", paragraphs[j])
    };

    Window {
        passage: passage.join("\n"),
        end: j,
        words,
        following,
    }
}

/// Accept `candidate` only inside `(start, end]`.
pub fn accept_break(candidate: Option<usize>, start: usize, end: usize) -> usize {
    match candidate {
        Some(c) if c > start && c <= end => c,
        _ => end,
    }
}

/// Chooses page boundaries, asking the model where a natural break falls.
pub struct Paginator {
    llm: Arc<MeteredModel>,
    config: GistConfig,
}

impl Paginator {
    pub fn new(llm: Arc<MeteredModel>, config: GistConfig) -> Self {
        Self { llm, config }
    }

    /// End (exclusive) of the page starting at `start`. Always in
    /// `(start, paragraphs.len()]`.
    ///
    /// `preceding` is the previous page's paragraphs, shown to the model as
    /// context.
    pub async fn next_break(
        &self,
        paragraphs: &[String],
        start: usize,
        preceding: Option<&[String]>,
    ) -> usize {
        if start >= paragraphs.len() {
            return paragraphs.len();
        }

        let window = build_window(paragraphs, start, &self.config);
        if window.words < self.config.min_page_words {
            debug!(
                start,
                words = window.words,
                "remaining text below minimum page size, taking it all"
            );
            return paragraphs.len();
        }

        let preceding = match preceding {
            Some(prev) if start > 0 => format!("...\n{}", prev.join("\n")),
            _ => String::new(),
        };
        let prompt = prompts::pagination(&preceding, &window.passage, &window.following);

        let candidate = match self.llm.run("pagination", prompt).await {
            Ok(response) => parse_break_point(&response),
            Err(e) => {
                warn!(start, window_end = window.end, error = %e, "falling back to window end");
                return window.end;
            }
        };

        let end = accept_break(candidate, start, window.end);
        if Some(end) != candidate {
            debug!(
                start,
                candidate = ?candidate,
                window_end = window.end,
                "break point rejected, using window end"
            );
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use crate::testing::{paragraphs, ScriptedModel};

    fn paginator(model: ScriptedModel) -> Paginator {
        Paginator::new(
            Arc::new(MeteredModel::new(Arc::new(model))),
            GistConfig::default(),
        )
    }

    #[test]
    fn test_window_labels_after_threshold() {
        // 100 words per paragraph: threshold crossed at paragraph 2,
        // limit reached after paragraph 5.
        let paras = paragraphs(10, 100);
        let w = build_window(&paras, 0, &GistConfig::default());
        assert_eq!(w.end, 6);
        assert_eq!(w.words, 600);
        assert!(!w.passage.contains("<1>"));
        assert!(w.passage.contains("<2>\np2"));
        assert!(w.passage.ends_with("<6>"));
        assert_eq!(w.following, format!("{}\n...", paras[6]));
    }

    #[test]
    fn test_window_at_document_end() {
        let paras = paragraphs(3, 50);
        let w = build_window(&paras, 1, &GistConfig::default());
        assert_eq!(w.end, 3);
        assert_eq!(w.words, 100);
        assert_eq!(w.following, "");
    }

    #[test]
    fn test_accept_break_bounds() {
        assert_eq!(accept_break(Some(4), 2, 6), 4);
        assert_eq!(accept_break(Some(6), 2, 6), 6);
        assert_eq!(accept_break(Some(2), 2, 6), 6);
        assert_eq!(accept_break(Some(7), 2, 6), 6);
        assert_eq!(accept_break(None, 2, 6), 6);
    }

    #[tokio::test]
    async fn test_short_tail_skips_model() {
        let model = Arc::new(ScriptedModel::new(|_| Ok(Completion::text("<1>"))));
        let p = Paginator::new(
            Arc::new(MeteredModel::new(model.clone())),
            GistConfig::default(),
        );
        let paras = paragraphs(20, 100);
        // 3 paragraphs * 100 words = 300 < 350
        assert_eq!(p.next_break(&paras, 17, None).await, 20);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_model_break_accepted() {
        let p = paginator(ScriptedModel::new(|_| {
            Ok(Completion::text("Break point: <4>\n Because the argument ends."))
        }));
        let paras = paragraphs(20, 100);
        assert_eq!(p.next_break(&paras, 0, None).await, 4);
    }

    #[tokio::test]
    async fn test_out_of_window_break_falls_back() {
        let p = paginator(ScriptedModel::new(|_| Ok(Completion::text("Break point: <15>"))));
        let paras = paragraphs(20, 100);
        assert_eq!(p.next_break(&paras, 0, None).await, 6);
    }

    #[tokio::test]
    async fn test_failed_call_falls_back() {
        let p = paginator(ScriptedModel::failing());
        let paras = paragraphs(20, 100);
        assert_eq!(p.next_break(&paras, 6, Some(&paras[0..6])).await, 12);
    }

    #[tokio::test]
    async fn test_preceding_page_in_prompt() {
        let model = Arc::new(ScriptedModel::new(|_| Ok(Completion::text("<8>"))));
        let p = Paginator::new(
            Arc::new(MeteredModel::new(model.clone())),
            GistConfig::default(),
        );
        let paras = paragraphs(20, 100);
        assert_eq!(p.next_break(&paras, 6, Some(&paras[0..6])).await, 8);

        let prompt = &model.prompts()[0];
        assert!(prompt.contains(&format!("...\n{}\n{}", paras[0], paras[1])));
        assert!(prompt.contains(&format!("{}\n...", paras[12])));
    }
}
