//! Parsers for the inline markers the model is asked to emit.
//!
//! All of these are total: a missing or garbled marker yields "no signal"
//! and the caller falls back.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

static BREAK_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([0-9]+)>").unwrap());

static PAGE_LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([0-9,\s]+)\]").unwrap());

static SUMMARY_PREAMBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^here[a-z'’ ]+ shortened.*?:").unwrap());

/// First `<N>` label in a pagination response.
pub fn parse_break_point(text: &str) -> Option<usize> {
    BREAK_LABEL
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Page indices from the first `[a, b, ...]` list in a lookup response.
///
/// Indices outside `0..page_count` and unparseable tokens are dropped,
/// duplicates collapse, and at most `max_pages` distinct pages are kept in
/// order of first mention.
pub fn parse_page_selection(text: &str, page_count: usize, max_pages: usize) -> BTreeSet<usize> {
    let mut selected = BTreeSet::new();
    let Some(list) = PAGE_LIST.captures(text).and_then(|c| c.get(1)) else {
        debug!("no page list in lookup response");
        return selected;
    };

    let mut seen = HashSet::new();
    for token in list.as_str().split(',') {
        let token = token.trim();
        let Ok(page) = token.parse::<usize>() else {
            if !token.is_empty() {
                warn!(token, "unparseable page index in lookup response");
            }
            continue;
        };
        if page >= page_count {
            warn!(page, page_count, "model requested an invalid page index");
            continue;
        }
        if !seen.insert(page) {
            continue;
        }
        if selected.len() == max_pages {
            warn!(page, max_pages, "lookup selection over limit, page dropped");
            continue;
        }
        selected.insert(page);
    }
    selected
}

/// Drop a conversational lead-in such as "Here's a shortened version:".
pub fn strip_summary_preamble(text: &str) -> String {
    let text = text.trim();
    match SUMMARY_PREAMBLE.find(text) {
        Some(m) => text[m.end()..].trim().to_string(),
        None => text.to_string(),
    }
}
