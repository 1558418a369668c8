use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables for pagination and recall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GistConfig {
    /// Words accumulated per window before the model is asked for a break.
    pub word_limit: usize,
    /// Running word count after which break labels are inserted.
    pub start_threshold: usize,
    /// Windows smaller than this become the final page without a model call.
    pub min_page_words: usize,
    /// Upper bound on pages re-read in full during recall.
    pub max_lookup_pages: usize,
}

impl Default for GistConfig {
    fn default() -> Self {
        Self {
            word_limit: 600,
            start_threshold: 280,
            min_page_words: 350,
            max_lookup_pages: 6,
        }
    }
}

impl GistConfig {
    /// Defaults overridden by `GIST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_usize("GIST_WORD_LIMIT")? {
            config.word_limit = v;
        }
        if let Some(v) = env_usize("GIST_START_THRESHOLD")? {
            config.start_threshold = v;
        }
        if let Some(v) = env_usize("GIST_MIN_PAGE_WORDS")? {
            config.min_page_words = v;
        }
        if let Some(v) = env_usize("GIST_MAX_LOOKUP_PAGES")? {
            config.max_lookup_pages = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.word_limit == 0 {
            bail!("word_limit must be positive");
        }
        if self.start_threshold > self.word_limit {
            bail!(
                "start_threshold ({}) must not exceed word_limit ({})",
                self.start_threshold,
                self.word_limit
            );
        }
        if self.min_page_words > self.word_limit {
            bail!(
                "min_page_words ({}) must not exceed word_limit ({})",
                self.min_page_words,
                self.word_limit
            );
        }
        if self.max_lookup_pages == 0 {
            bail!("max_lookup_pages must be positive");
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match dotenv::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw)),
        _ => Ok(None),
    }
}
