//! Context-window selection and the two request-payload renderers.
//!
//! The window is a trailing slice of the message history, counted in
//! messages. Older messages are dropped outright, never summarized.

use serde::Serialize;

use crate::message::{Message, Role};

/// First index of the trailing window: `max(0, total - limit)`.
///
/// A zero limit yields `total`, i.e. an empty window. That is a deliberate
/// boundary case, not an "unlimited" sentinel.
pub fn window_start(total: usize, limit: usize) -> usize {
    total.saturating_sub(limit)
}

/// Which renderer a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Structured `{role, content}` list, sent to `/api/chat`.
    MessageList,
    /// Single flattened prompt string, sent to `/api/generate`.
    FlatPrompt,
}

/// A history item as it goes over the wire. Timestamps are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// The payload handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPayload {
    Prompt(String),
    Messages(Vec<WireMessage>),
}

/// Strategy for turning a message history into a request payload.
///
/// Both implementations guarantee the rendered context holds at most `limit`
/// prior messages plus the current one, and always includes the newest
/// message (unless the limit itself excludes everything).
pub trait ContextRenderer: Send + Sync {
    fn render(&self, history: &[Message]) -> ChatPayload;
}

/// Renders the windowed history as an ordered `{role, content}` list, with a
/// system message first when a system prompt is configured. Roles pass
/// through as-is.
pub struct MessageListRenderer {
    pub system_prompt: Option<String>,
    pub limit: usize,
}

impl ContextRenderer for MessageListRenderer {
    fn render(&self, history: &[Message]) -> ChatPayload {
        let mut messages = Vec::new();

        if let Some(system_prompt) = &self.system_prompt {
            messages.push(WireMessage::new("system", system_prompt.clone()));
        }

        let start = window_start(history.len(), self.limit);
        for msg in &history[start..] {
            messages.push(WireMessage::new(msg.role.as_str(), msg.content.clone()));
        }

        ChatPayload::Messages(messages)
    }
}

const HISTORY_HEADER: &str = "Conversation so far:";
const CURRENT_LABEL: &str = "Current question:";

/// Flattens the windowed history (excluding the current message) into one
/// narrative prompt, labels each prior turn by role, and appends the current
/// message under its own label. When a prefill phrase is set, an explicit
/// instruction directs the model to begin its reply with it.
pub struct FlatPromptRenderer {
    pub prefill: Option<String>,
    pub limit: usize,
}

impl ContextRenderer for FlatPromptRenderer {
    fn render(&self, history: &[Message]) -> ChatPayload {
        let mut prompt = String::new();

        if let Some((current, prior)) = history.split_last() {
            let start = window_start(prior.len(), self.limit);
            let window = &prior[start..];

            if !window.is_empty() {
                prompt.push_str(HISTORY_HEADER);
                prompt.push('\n');
                for msg in window {
                    let label = match msg.role {
                        Role::User => "User",
                        Role::Assistant => "Assistant",
                    };
                    prompt.push_str(&format!("{label}: {}\n", msg.content));
                }
                prompt.push('\n');
            }

            prompt.push_str(&format!("{CURRENT_LABEL} {}", current.content));

            if let Some(prefill) = &self.prefill {
                prompt.push_str(&format!("\n\nBegin your reply with: \"{prefill}\""));
            }
        }

        ChatPayload::Prompt(prompt)
    }
}
