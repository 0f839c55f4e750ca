//! Provider-neutral contract for one streamed chat completion.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ChatPayload;

/// Errors surfaced by a chat provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider initialization failed: {0}")]
    Init(String),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("model API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model API reported an error mid-stream: {0}")]
    Stream(String),

    #[error("failed to decode stream line: {0}")]
    Decode(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// One incremental fragment of a streamed response.
///
/// Consumers must tolerate arbitrary interleaving of the two channels,
/// possibly-empty fragments, and either channel being entirely absent. Only
/// answer fragments belong in the persisted assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Answer(String),
    Thinking(String),
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub payload: ChatPayload,
    pub temperature: f32,
    /// Ask the model for its reasoning channel, when supported.
    pub think: bool,
    pub stop: Vec<String>,
    /// Response token cap; 0 means unlimited.
    pub max_tokens: u32,
}

/// Interface to an external model-serving endpoint.
///
/// `stream_chat` invokes `on_event` once per fragment, in arrival order, and
/// returns after the stream terminates. Events are delivered serially from
/// the caller's perspective.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (e.g. "ollama").
    fn name(&self) -> &str;

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        on_event: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<(), ProviderError>;
}
