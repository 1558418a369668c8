use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Server-side timing block (Cerebras reports it as `time_info`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeInfo {
    /// Seconds spent generating the completion.
    #[serde(default)]
    pub completion_time: Option<f64>,
}

/// Generated text plus whatever usage and timing the endpoint chose to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<Usage>,
    pub time_info: Option<TimeInfo>,
}

#[cfg(test)]
impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// A chat-completion capability. The paginator, summarizer and recall
/// controller only ever see this trait.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<Completion>;
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<ChoiceRaw>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    time_info: Option<TimeInfo>,
}

#[derive(Debug, Deserialize)]
struct ChoiceRaw {
    #[serde(default)]
    message: Option<ContentRaw>,
    #[serde(default)]
    delta: Option<ContentRaw>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentRaw {
    // Null content is legal in both full messages and deltas.
    #[serde(default)]
    content: Option<String>,
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    stream: bool,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.cerebras.ai/v1".to_string());
        let model = dotenv::var("LLM_MODEL").unwrap_or_else(|_| "llama-3.3-70b".to_string());
        let api_key = dotenv::var("LLM_API_KEY")
            .or_else(|_| dotenv::var("CEREBRAS_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());
        let stream = dotenv::var("LLM_STREAM")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let temperature = parse_opt::<f32>("LLM_TEMPERATURE")?;
        let max_tokens = parse_opt::<u32>("LLM_MAX_TOKENS")?;
        let timeout = parse_opt::<u64>("LLM_TIMEOUT_SECS")?.unwrap_or(120);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
            stream,
            temperature,
            max_tokens,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        resolve_endpoint(&self.base_url)
    }

    fn request_body(&self, messages: &[Message], stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(m);
        }
        body
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(messages, stream));
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("LLM endpoint returned {}: {}", status, body);
        }
        Ok(resp)
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message]) -> Result<Completion> {
        let resp = self.send(messages, false).await?;
        let text = resp.text().await.context("Failed to read LLM response")?;
        parse_completion(&text)
    }

    /// Streaming chat completion; returns once the terminal chunk arrives.
    pub async fn chat_streamed(&self, messages: &[Message]) -> Result<Completion> {
        let resp = self.send(messages, true).await?;
        let mut stream = resp.bytes_stream();
        let mut acc = StreamAccumulator::default();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.context("Failed to read LLM stream")?;
            acc.push(&bytes)?;
            if acc.is_done() {
                break;
            }
        }

        acc.finish()
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<Completion> {
        debug!(model = %self.model, stream = self.stream, "LLM call");
        if self.stream {
            self.chat_streamed(messages).await
        } else {
            self.chat(messages).await
        }
    }
}

fn parse_opt<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match dotenv::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => bail!("{} has an invalid value: {:?}", key, raw),
        },
        _ => Ok(None),
    }
}

fn resolve_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

/// Parse a non-streaming response body.
fn parse_completion(body: &str) -> Result<Completion> {
    let raw: ChatResponseRaw = serde_json::from_str(body).context("Failed to parse LLM JSON")?;
    let content = raw
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default();

    Ok(Completion {
        content,
        usage: raw.usage,
        time_info: raw.time_info,
    })
}

/// Folds server-sent event bytes into a single [`Completion`].
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pending: Vec<u8>,
    content: String,
    usage: Option<Usage>,
    time_info: Option<TimeInfo>,
    finished: bool,
    done: bool,
}

impl StreamAccumulator {
    /// Feed raw bytes; complete lines are consumed, partial ones buffered.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.line(line.trim())?;
        }
        Ok(())
    }

    /// True once `[DONE]` was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() || line.starts_with(':') {
            return Ok(());
        }
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let chunk: ChatResponseRaw =
            serde_json::from_str(data).context("Failed to parse LLM stream chunk")?;
        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(text) = choice.delta.and_then(|d| d.content) {
                self.content.push_str(&text);
            }
            if choice.finish_reason.is_some() {
                self.finished = true;
            }
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        if chunk.time_info.is_some() {
            self.time_info = chunk.time_info;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Completion> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let rest = String::from_utf8_lossy(&rest).to_string();
            self.line(rest.trim())?;
        }
        if !self.finished && !self.done {
            debug!("LLM stream ended without a terminal chunk");
        }
        Ok(Completion {
            content: self.content,
            usage: self.usage,
            time_info: self.time_info,
        })
    }
}
