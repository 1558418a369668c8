use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{GistError, Result};
use crate::llm::{ChatModel, Completion, Message};

/// Cumulative inference counters for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmMetrics {
    pub llm_calls: u64,
    /// Seconds, server-reported where available, wall clock otherwise.
    pub completion_time: f64,
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    pub total_tokens: u64,
    pub avg_tokens_per_second: f64,
}

impl LlmMetrics {
    pub fn record(&mut self, completion: &Completion, elapsed: Duration) {
        let time_taken = completion
            .time_info
            .and_then(|t| t.completion_time)
            .unwrap_or_else(|| elapsed.as_secs_f64());

        self.llm_calls += 1;
        self.completion_time += time_taken;

        if let Some(usage) = completion.usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.response_tokens += usage.completion_tokens;
            self.total_tokens += usage.total_tokens;
        }

        if self.completion_time > 0.0 && self.response_tokens > 0 {
            self.avg_tokens_per_second = self.response_tokens as f64 / self.completion_time;
        }
    }
}

impl fmt::Display for LlmMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- LLM Performance Metrics ---")?;
        writeln!(f, "{:<25}: {}", "Llm Calls", self.llm_calls)?;
        writeln!(f, "{:<25}: {:.2}", "Completion Time", self.completion_time)?;
        writeln!(f, "{:<25}: {}", "Prompt Tokens", self.prompt_tokens)?;
        writeln!(f, "{:<25}: {}", "Response Tokens", self.response_tokens)?;
        writeln!(f, "{:<25}: {}", "Total Tokens", self.total_tokens)?;
        writeln!(
            f,
            "{:<25}: {:.2}",
            "Avg Tokens Per Second", self.avg_tokens_per_second
        )?;
        write!(f, "-------------------------------")
    }
}

/// Wraps a [`ChatModel`] so every successful call lands in the metrics.
pub struct MeteredModel {
    inner: Arc<dyn ChatModel>,
    metrics: Mutex<LlmMetrics>,
}

impl MeteredModel {
    pub fn new(inner: Arc<dyn ChatModel>) -> Self {
        Self::with_metrics(inner, LlmMetrics::default())
    }

    /// Continue counting from previously saved metrics.
    pub fn with_metrics(inner: Arc<dyn ChatModel>, metrics: LlmMetrics) -> Self {
        Self {
            inner,
            metrics: Mutex::new(metrics),
        }
    }

    /// Send a single user prompt. Blank completions count as failures.
    pub async fn run(&self, stage: &'static str, prompt: String) -> Result<String> {
        let messages = [Message::user(prompt)];
        let start = Instant::now();

        let completion = match self.inner.complete(&messages).await {
            Ok(c) => c,
            Err(e) => {
                warn!(stage, error = %e, "LLM call failed");
                return Err(GistError::Inference {
                    stage,
                    source: e.into(),
                });
            }
        };
        let elapsed = start.elapsed();

        self.metrics.lock().await.record(&completion, elapsed);
        debug!(
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            response_len = completion.content.len(),
            "LLM call complete"
        );

        if completion.content.trim().is_empty() {
            warn!(stage, "LLM returned an empty completion");
            return Err(GistError::EmptyCompletion { stage });
        }
        Ok(completion.content)
    }

    pub async fn metrics(&self) -> LlmMetrics {
        self.metrics.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{TimeInfo, Usage};
    use crate::testing::ScriptedModel;

    fn completion(prompt: u64, response: u64, secs: Option<f64>) -> Completion {
        Completion {
            content: "ok".to_string(),
            usage: Some(Usage {
                prompt_tokens: prompt,
                completion_tokens: response,
                total_tokens: prompt + response,
            }),
            time_info: secs.map(|s| TimeInfo {
                completion_time: Some(s),
            }),
        }
    }

    #[test]
    fn test_record_accumulates_tokens() {
        let mut m = LlmMetrics::default();
        m.record(&completion(10, 5, Some(1.0)), Duration::from_secs(9));
        m.record(&completion(20, 15, Some(3.0)), Duration::from_secs(9));

        assert_eq!(m.llm_calls, 2);
        assert_eq!(m.prompt_tokens, 30);
        assert_eq!(m.response_tokens, 20);
        assert_eq!(m.total_tokens, 50);
        // Server timing wins over the wall clock.
        assert!((m.completion_time - 4.0).abs() < 1e-9);
        assert!((m.avg_tokens_per_second - 20.0 / m.completion_time).abs() < 1e-9);
    }

    #[test]
    fn test_record_falls_back_to_wall_clock() {
        let mut m = LlmMetrics::default();
        m.record(&completion(1, 4, None), Duration::from_millis(500));
        assert!((m.completion_time - 0.5).abs() < 1e-9);
        assert!((m.avg_tokens_per_second - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_without_usage_leaves_tokens() {
        let mut m = LlmMetrics::default();
        m.record(&Completion::text("hi"), Duration::from_millis(200));
        assert_eq!(m.llm_calls, 1);
        assert_eq!(m.prompt_tokens, 0);
        assert_eq!(m.response_tokens, 0);
        assert_eq!(m.avg_tokens_per_second, 0.0);
    }

    #[test]
    fn test_display_table() {
        let m = LlmMetrics {
            llm_calls: 3,
            completion_time: 1.5,
            ..Default::default()
        };
        let out = m.to_string();
        assert!(out.contains("Llm Calls                : 3"));
        assert!(out.contains("Completion Time          : 1.50"));
    }

    #[tokio::test]
    async fn test_metered_model_counts_only_successes() {
        let model = ScriptedModel::new(|prompt| {
            if prompt.contains("fail") {
                Err(anyhow::anyhow!("boom"))
            } else {
                Ok(Completion::text("fine"))
            }
        });
        let metered = MeteredModel::new(Arc::new(model));

        assert_eq!(metered.run("test", "hello".into()).await.unwrap(), "fine");
        assert!(matches!(
            metered.run("test", "please fail".into()).await,
            Err(GistError::Inference { stage: "test", .. })
        ));
        assert_eq!(metered.metrics().await.llm_calls, 1);
    }

    #[tokio::test]
    async fn test_metered_model_rejects_blank_completion() {
        let metered = MeteredModel::new(Arc::new(ScriptedModel::new(|_| {
            Ok(Completion::text("   \n"))
        })));
        assert!(matches!(
            metered.run("summary", "x".into()).await,
            Err(GistError::EmptyCompletion { stage: "summary" })
        ));
    }
}
