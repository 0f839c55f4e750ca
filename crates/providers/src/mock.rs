//! A scripted provider for tests and offline runs.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use ollachat_core::{ChatProvider, ChatRequest, ProviderError, StreamEvent};

/// Replays a fixed event script, optionally failing at the end, and records
/// every request it receives.
pub struct MockProvider {
    events: Vec<StreamEvent>,
    failure: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            failure: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_events(mut self, events: Vec<StreamEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_answer_chunks(self, chunks: &[&str]) -> Self {
        let events = chunks
            .iter()
            .map(|chunk| StreamEvent::Answer((*chunk).to_string()))
            .collect();
        self.with_events(events)
    }

    /// Fail after replaying the scripted events.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before replying, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        on_event: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<(), ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        for event in &self.events {
            on_event(event.clone());
        }

        match &self.failure {
            Some(message) => Err(ProviderError::Stream(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ollachat_core::ChatPayload;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "mock".to_string(),
            payload: ChatPayload::Prompt("hi".to_string()),
            temperature: 0.0,
            think: false,
            stop: Vec::new(),
            max_tokens: 0,
        }
    }

    #[tokio::test]
    async fn replays_events_in_order() {
        let provider = MockProvider::new().with_answer_chunks(&["a", "b"]);
        let mut seen = Vec::new();

        provider
            .stream_chat(&request(), &mut |event| seen.push(event))
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![
                StreamEvent::Answer("a".to_string()),
                StreamEvent::Answer("b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn scripted_failure_is_returned_after_events() {
        let provider = MockProvider::new()
            .with_answer_chunks(&["partial"])
            .with_failure("boom");
        let mut seen = Vec::new();

        let error = provider
            .stream_chat(&request(), &mut |event| seen.push(event))
            .await
            .unwrap_err();

        assert_eq!(seen.len(), 1);
        assert!(matches!(error, ProviderError::Stream(message) if message == "boom"));
    }

    #[tokio::test]
    async fn records_requests() {
        let provider = MockProvider::new();
        provider
            .stream_chat(&request(), &mut |_event| {})
            .await
            .unwrap();

        let recorded = provider.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].model, "mock");
    }
}
