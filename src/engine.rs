//! Seam to the conversational engine ("the Cat").
//!
//! The gateway never looks inside a reply: whatever the engine returns is
//! forwarded to the client as-is. `RemoteEngine` is the default
//! implementation, a thin client for an Ollama-style chat endpoint; anything
//! else plugs in through the `ConversationEngine` trait.

use crate::config::*;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("engine returned a malformed reply: {0}")]
    MalformedReply(String),
}

/// One user message in, one structured reply out. The reply shape is owned
/// by the engine and opaque to the gateway.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    async fn message(&self, text: &str) -> Result<Value, EngineError>;

    /// Hook used by the ingestion pipeline to feed extracted text into the
    /// engine's long-term memory.
    async fn memorize(&self, chunk: &str) -> Result<(), EngineError>;
}

/// Client for a remote chat-completion endpoint, carrying the running
/// conversation history and the memorized context chunks.
pub struct RemoteEngine {
    client: reqwest::Client,
    url: String,
    model: String,
    history: Mutex<Vec<Value>>,
    memory: Mutex<Vec<String>>,
}

// How many memorized chunks get prepended as context per request
const CONTEXT_CHUNKS: usize = 5;

impl RemoteEngine {
    pub fn new(url: &str, model: &str) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent("catgate/0.1")
            .timeout(Duration::from_secs(ENGINE_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            model: model.to_string(),
            history: Mutex::new(Vec::new()),
            memory: Mutex::new(Vec::new()),
        })
    }
}

/// Assemble the message list for one request: memorized context as a system
/// message (most recent chunks first), then the conversation so far.
fn build_messages(history: &[Value], memory: &[String]) -> Vec<Value> {
    let mut messages = Vec::with_capacity(history.len() + 1);

    if !memory.is_empty() {
        let context: Vec<&str> = memory
            .iter()
            .rev()
            .take(CONTEXT_CHUNKS)
            .map(String::as_str)
            .collect();
        messages.push(json!({
            "role": "system",
            "content": format!(
                "Use the following documents as context:\n{}",
                context.join("\n---\n")
            ),
        }));
    }

    messages.extend_from_slice(history);
    messages
}

#[async_trait]
impl ConversationEngine for RemoteEngine {
    async fn message(&self, text: &str) -> Result<Value, EngineError> {
        let user_turn = json!({"role": "user", "content": text});

        // Snapshot under the locks, then release them for the network call
        let messages = {
            let history = self.history.lock().await;
            let memory = self.memory.lock().await;
            let mut turns = history.clone();
            turns.push(user_turn.clone());
            build_messages(&turns, &memory)
        };

        let body: Value = self
            .client
            .post(&self.url)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = body
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::MalformedReply(body.to_string()))?
            .to_string();

        // Both turns land only after a successful reply; a failed call
        // leaves no trace in the history
        let mut history = self.history.lock().await;
        history.push(user_turn);
        history.push(json!({"role": "assistant", "content": content}));

        Ok(json!({"content": content}))
    }

    async fn memorize(&self, chunk: &str) -> Result<(), EngineError> {
        let mut memory = self.memory.lock().await;
        memory.push(chunk.to_string());
        debug!("Memorized chunk ({} chars, {} total)", chunk.len(), memory.len());
        Ok(())
    }
}
