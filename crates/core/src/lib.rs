pub mod context;
pub mod message;
pub mod provider;

pub use context::{
    window_start, ChatPayload, ContextMode, ContextRenderer, FlatPromptRenderer,
    MessageListRenderer, WireMessage,
};
pub use message::{Message, MessageError, Role};
pub use provider::{ChatProvider, ChatRequest, ProviderError, StreamEvent};
