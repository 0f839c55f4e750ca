//! The interactive chat orchestrator.
//!
//! One turn: append the user message, render the trailing context window,
//! stream the provider's response under a timeout while forwarding each
//! fragment to the caller, then persist the accumulated answer. Strictly
//! sequential; one request in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use ollachat_core::{
    ChatPayload, ChatProvider, ChatRequest, ContextMode, ContextRenderer, FlatPromptRenderer,
    Message, MessageListRenderer, ProviderError, StreamEvent,
};
use ollachat_session::{Session, SessionStore};

use crate::error::ChatError;

/// Per-process chat settings, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub think: bool,
    pub context_limit: usize,
    pub context_mode: ContextMode,
    pub system_prompt: String,
    pub prefill: String,
    pub use_prefill: bool,
    pub stop_sequences: Vec<String>,
    pub max_response_tokens: u32,
    pub request_timeout: Duration,
}

/// What a completed turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The persisted assistant answer (thinking fragments excluded).
    pub answer: String,
    /// Whether this turn hit an auto-save point and the save succeeded.
    pub autosaved: bool,
}

/// Auto-save fires after the 2nd message and every 4th thereafter
/// (2, 4, 8, 12, ...), bounding crash loss to a few unsaved turns.
pub fn autosave_due(message_count: usize) -> bool {
    message_count == 2 || (message_count > 0 && message_count % 4 == 0)
}

pub struct ChatRunner {
    provider: Arc<dyn ChatProvider>,
    store: SessionStore,
    session: Session,
    settings: ChatSettings,
    renderer: Box<dyn ContextRenderer>,
}

impl ChatRunner {
    /// Loads or creates the session for `user_name` and wires up the
    /// configured renderer. An empty user name is a fatal precondition
    /// failure.
    pub fn new(
        user_name: &str,
        settings: ChatSettings,
        provider: Arc<dyn ChatProvider>,
        store: SessionStore,
    ) -> Result<Self, ChatError> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(ChatError::EmptyUserName);
        }

        let session = store.load_or_create(user_name)?;
        let renderer = build_renderer(&settings);

        Ok(Self {
            provider,
            store,
            session,
            settings,
            renderer,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn messages(&self) -> &[Message] {
        &self.session.messages
    }

    /// A trimmed `"exit"`, `"quit"`, or empty line ends the session.
    /// Case-sensitive; no other forms are recognized.
    pub fn is_exit_command(input: &str) -> bool {
        matches!(input, "exit" | "quit" | "")
    }

    /// Runs one turn. Stream fragments are forwarded to `on_event` as they
    /// arrive; only answer fragments end up in the persisted assistant
    /// message. On any send error the user message stays in history and no
    /// assistant message is appended.
    pub async fn process_turn(
        &mut self,
        input: &str,
        on_event: &mut (dyn FnMut(&StreamEvent) + Send),
    ) -> Result<TurnOutcome, ChatError> {
        let user_message = Message::user(input.trim()).map_err(|_| ChatError::EmptyInput)?;
        self.session.push(user_message);

        let request = self.build_request()?;

        let mut answer = String::new();
        let mut forward = |event: StreamEvent| {
            if let StreamEvent::Answer(text) = &event {
                answer.push_str(text);
            }
            on_event(&event);
        };

        let outcome = timeout(
            self.settings.request_timeout,
            self.provider.stream_chat(&request, &mut forward),
        )
        .await;

        match outcome {
            Err(_elapsed) => Err(ChatError::Provider(ProviderError::Timeout {
                secs: self.settings.request_timeout.as_secs(),
            })),
            Ok(Err(error)) => Err(ChatError::Provider(error)),
            Ok(Ok(())) => {
                if answer.is_empty() {
                    // Both channels empty is legal on the wire, but an empty
                    // message must not enter the history.
                    warn!("model produced an empty answer; nothing persisted");
                    return Ok(TurnOutcome {
                        answer,
                        autosaved: false,
                    });
                }

                let assistant_message =
                    Message::assistant(answer.clone()).map_err(|_| ChatError::EmptyInput)?;
                self.session.push(assistant_message);
                let autosaved = self.maybe_autosave();

                Ok(TurnOutcome { answer, autosaved })
            }
        }
    }

    fn build_request(&self) -> Result<ChatRequest, ChatError> {
        if self.session.messages.is_empty() {
            return Err(ChatError::NoMessages);
        }

        let payload: ChatPayload = self.renderer.render(&self.session.messages);
        Ok(ChatRequest {
            model: self.settings.model.clone(),
            payload,
            temperature: self.settings.temperature,
            think: self.settings.think,
            stop: self.settings.stop_sequences.clone(),
            max_tokens: self.settings.max_response_tokens,
        })
    }

    /// Saves at auto-save points; a save failure is reported and non-fatal,
    /// the next auto-save point retries.
    fn maybe_autosave(&mut self) -> bool {
        let count = self.session.messages.len();
        if !autosave_due(count) {
            return false;
        }

        match self.store.save(&self.session) {
            Ok(()) => {
                debug!(messages = count, "auto-saved session");
                true
            }
            Err(error) => {
                warn!(%error, "auto-save failed; continuing");
                false
            }
        }
    }
}

fn build_renderer(settings: &ChatSettings) -> Box<dyn ContextRenderer> {
    match settings.context_mode {
        ContextMode::MessageList => Box::new(MessageListRenderer {
            system_prompt: (!settings.system_prompt.is_empty())
                .then(|| settings.system_prompt.clone()),
            limit: settings.context_limit,
        }),
        ContextMode::FlatPrompt => Box::new(FlatPromptRenderer {
            prefill: (settings.use_prefill && !settings.prefill.is_empty())
                .then(|| settings.prefill.clone()),
            limit: settings.context_limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ollachat_providers::MockProvider;
    use tempfile::TempDir;

    fn settings() -> ChatSettings {
        ChatSettings {
            model: "test-model".to_string(),
            temperature: 0.1,
            think: false,
            context_limit: 10_000,
            context_mode: ContextMode::MessageList,
            system_prompt: String::new(),
            prefill: String::new(),
            use_prefill: false,
            stop_sequences: Vec::new(),
            max_response_tokens: 0,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn runner_with(
        dir: &TempDir,
        settings: ChatSettings,
        provider: Arc<MockProvider>,
    ) -> ChatRunner {
        let store = SessionStore::new(dir.path(), ".json");
        ChatRunner::new("alice", settings, provider, store).unwrap()
    }

    #[test]
    fn exit_commands_are_exact() {
        assert!(ChatRunner::is_exit_command("exit"));
        assert!(ChatRunner::is_exit_command("quit"));
        assert!(ChatRunner::is_exit_command(""));
        assert!(!ChatRunner::is_exit_command("EXIT"));
        assert!(!ChatRunner::is_exit_command(" exit"));
        assert!(!ChatRunner::is_exit_command("quit now"));
    }

    #[test]
    fn autosave_fires_exactly_at_two_and_multiples_of_four() {
        let due: Vec<usize> = (0..=16).filter(|count| autosave_due(*count)).collect();
        assert_eq!(due, vec![2, 4, 8, 12, 16]);
    }

    #[test]
    fn empty_user_name_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path(), ".json");
        let result = ChatRunner::new("   ", settings(), Arc::new(MockProvider::new()), store);
        assert!(matches!(result, Err(ChatError::EmptyUserName)));
    }

    #[tokio::test]
    async fn chunks_accumulate_into_one_assistant_message() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new().with_answer_chunks(&["Hello, ", "world!"]));
        let mut runner = runner_with(&dir, settings(), provider);

        let outcome = runner.process_turn("hi", &mut |_event| {}).await.unwrap();

        assert_eq!(outcome.answer, "Hello, world!");
        assert_eq!(runner.messages().len(), 2);
        assert!(runner.messages()[0].is_user());
        assert_eq!(runner.messages()[1].content, "Hello, world!");
    }

    #[tokio::test]
    async fn thinking_fragments_are_shown_but_not_persisted() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new().with_events(vec![
            StreamEvent::Thinking("Let me think...".to_string()),
            StreamEvent::Answer("Final.".to_string()),
        ]));
        let mut runner = runner_with(&dir, settings(), provider);

        let mut thinking_seen = 0;
        let outcome = runner
            .process_turn("hi", &mut |event| {
                if matches!(event, StreamEvent::Thinking(_)) {
                    thinking_seen += 1;
                }
            })
            .await
            .unwrap();

        assert_eq!(thinking_seen, 1);
        assert_eq!(outcome.answer, "Final.");
        assert_eq!(runner.messages()[1].content, "Final.");
    }

    #[tokio::test]
    async fn stream_failure_keeps_the_user_message_only() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            MockProvider::new()
                .with_answer_chunks(&["partial"])
                .with_failure("connection reset"),
        );
        let mut runner = runner_with(&dir, settings(), provider);

        let error = runner.process_turn("hi", &mut |_event| {}).await.unwrap_err();

        assert!(matches!(error, ChatError::Provider(_)));
        assert_eq!(runner.messages().len(), 1);
        assert!(runner.messages()[0].is_user());
    }

    #[tokio::test]
    async fn empty_response_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        let mut runner = runner_with(&dir, settings(), provider);

        let outcome = runner.process_turn("hi", &mut |_event| {}).await.unwrap();

        assert!(outcome.answer.is_empty());
        assert_eq!(runner.messages().len(), 1);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            MockProvider::new()
                .with_answer_chunks(&["late"])
                .with_delay(Duration::from_millis(100)),
        );
        let mut config = settings();
        config.request_timeout = Duration::from_millis(10);
        let mut runner = runner_with(&dir, config, provider);

        let error = runner.process_turn("hi", &mut |_event| {}).await.unwrap_err();

        assert!(matches!(
            error,
            ChatError::Provider(ProviderError::Timeout { .. })
        ));
        assert_eq!(runner.messages().len(), 1);
    }

    #[tokio::test]
    async fn autosave_persists_at_the_documented_counts() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path(), ".json");
        let provider = Arc::new(MockProvider::new().with_answer_chunks(&["ok"]));
        let mut runner = runner_with(&dir, settings(), provider);

        // Turn 1 -> 2 messages: saved.
        let outcome = runner.process_turn("one", &mut |_e| {}).await.unwrap();
        assert!(outcome.autosaved);
        assert_eq!(store.load_or_create("alice").unwrap().messages.len(), 2);

        // Turn 2 -> 4 messages: saved.
        let outcome = runner.process_turn("two", &mut |_e| {}).await.unwrap();
        assert!(outcome.autosaved);
        assert_eq!(store.load_or_create("alice").unwrap().messages.len(), 4);

        // Turn 3 -> 6 messages: not saved, file still holds 4.
        let outcome = runner.process_turn("three", &mut |_e| {}).await.unwrap();
        assert!(!outcome.autosaved);
        assert_eq!(store.load_or_create("alice").unwrap().messages.len(), 4);

        // Turn 4 -> 8 messages: saved.
        let outcome = runner.process_turn("four", &mut |_e| {}).await.unwrap();
        assert!(outcome.autosaved);
        assert_eq!(store.load_or_create("alice").unwrap().messages.len(), 8);
    }

    #[tokio::test]
    async fn context_limit_bounds_the_request_payload() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new().with_answer_chunks(&["ok"]));
        let mut config = settings();
        config.context_limit = 2;
        let mut runner = runner_with(&dir, config, provider.clone());

        runner.process_turn("one", &mut |_e| {}).await.unwrap();
        runner.process_turn("two", &mut |_e| {}).await.unwrap();
        runner.process_turn("three", &mut |_e| {}).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        let ChatPayload::Messages(messages) = &requests[2].payload else {
            panic!("expected message list");
        };
        // 5 messages of history, windowed down to the trailing 2.
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.last().unwrap().content, "three");
    }

    #[tokio::test]
    async fn resumed_sessions_keep_prior_history() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path(), ".json");

        {
            let provider = Arc::new(MockProvider::new().with_answer_chunks(&["first answer"]));
            let mut runner = runner_with(&dir, settings(), provider);
            runner.process_turn("one", &mut |_e| {}).await.unwrap();
        }

        let provider = Arc::new(MockProvider::new().with_answer_chunks(&["second answer"]));
        let mut runner =
            ChatRunner::new("alice", settings(), provider, store).unwrap();
        assert_eq!(runner.messages().len(), 2);

        runner.process_turn("two", &mut |_e| {}).await.unwrap();
        assert_eq!(runner.messages().len(), 4);
        assert_eq!(runner.messages()[0].content, "one");
        assert_eq!(runner.messages()[3].content, "second answer");
    }
}
