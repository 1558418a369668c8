use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::types::SourceDocument;

/// Supplies the title and ordered paragraphs of a document.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn load(&self, locator: &str) -> Result<SourceDocument>;
}

/// Local `.txt`/`.md` files, or `.html`/`.htm` rendered to text.
#[derive(Debug, Default)]
pub struct FileSource;

#[async_trait]
impl TextSource for FileSource {
    async fn load(&self, locator: &str) -> Result<SourceDocument> {
        let path = Path::new(locator);
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_html = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
        let text = if is_html {
            html_to_text(&body)
        } else {
            String::from_utf8_lossy(&body).to_string()
        };

        let doc = split_document(&text);
        info!(
            locator,
            paragraphs = doc.paragraphs.len(),
            html = is_html,
            "file loaded"
        );
        Ok(doc)
    }
}

/// Web pages fetched over HTTP(S).
pub struct UrlSource {
    client: reqwest::Client,
}

impl UrlSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TextSource for UrlSource {
    async fn load(&self, locator: &str) -> Result<SourceDocument> {
        let resp = self
            .client
            .get(locator)
            .send()
            .await
            .context("Failed to fetch URL")?
            .error_for_status()
            .context("URL returned an error status")?;

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = resp.bytes().await.context("Failed to read response body")?;

        let text = if content_type.contains("html") {
            html_to_text(&body)
        } else {
            String::from_utf8_lossy(&body).to_string()
        };

        let doc = split_document(&text);
        info!(locator, paragraphs = doc.paragraphs.len(), "URL loaded");
        Ok(doc)
    }
}

/// Dispatches on the locator: `http(s)://` goes to [`UrlSource`], anything
/// else is read from disk.
pub struct AnySource {
    file: FileSource,
    url: UrlSource,
}

impl AnySource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            file: FileSource,
            url: UrlSource::new()?,
        })
    }
}

#[async_trait]
impl TextSource for AnySource {
    async fn load(&self, locator: &str) -> Result<SourceDocument> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            self.url.load(locator).await
        } else {
            self.file.load(locator).await
        }
    }
}

fn html_to_text(body: &[u8]) -> String {
    // Wide enough that html2text never wraps a paragraph.
    html2text::from_read(body, 10_000)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).to_string())
}

/// Split plain text into blocks on blank lines. The first block is the
/// title, the rest are paragraphs. Lines inside a block are joined with
/// single spaces.
pub fn split_document(text: &str) -> SourceDocument {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(join_block(&current));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(join_block(&current));
    }

    let mut blocks = blocks.into_iter().filter(|b| !b.is_empty());
    let title = blocks
        .next()
        .map(|t| t.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty());

    SourceDocument {
        title,
        paragraphs: blocks.collect(),
    }
}

fn join_block(lines: &[&str]) -> String {
    lines
        .iter()
        .flat_map(|l| l.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
