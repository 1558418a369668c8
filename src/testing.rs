//! Scripted inference doubles for unit tests.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::docs::ingest::TextSource;
use crate::docs::types::SourceDocument;
use crate::llm::{ChatModel, Completion, Message};

type Script = Box<dyn Fn(&str) -> Result<Completion> + Send + Sync>;

/// A [`ChatModel`] that answers every prompt through a closure and records
/// the prompts it was given.
pub struct ScriptedModel {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str) -> Result<Completion> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails, as an unreachable endpoint would.
    pub fn failing() -> Self {
        Self::new(|_| Err(anyhow::anyhow!("endpoint unavailable")))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Message]) -> Result<Completion> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());
        (self.script)(&prompt)
    }
}

/// `n` paragraphs of `words` words each, tagged with their index.
pub fn paragraphs(n: usize, words: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let mut p = format!("p{}", i);
            for _ in 1..words {
                p.push_str(" word");
            }
            p
        })
        .collect()
}

/// A [`TextSource`] that hands back a fixed document for any locator.
pub struct StaticSource(pub SourceDocument);

#[async_trait]
impl TextSource for StaticSource {
    async fn load(&self, _locator: &str) -> Result<SourceDocument> {
        Ok(self.0.clone())
    }
}
