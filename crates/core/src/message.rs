use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message content cannot be empty")]
    EmptyContent,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation turn. Immutable once created; a session keeps messages in
/// insertion order and never reorders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a message, rejecting empty content.
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self, MessageError> {
        let content = content.into();
        if content.is_empty() {
            return Err(MessageError::EmptyContent);
        }

        Ok(Self {
            role,
            content,
            timestamp: Utc::now(),
        })
    }

    pub fn user(content: impl Into<String>) -> Result<Self, MessageError> {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self, MessageError> {
        Self::new(Role::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_content() {
        assert_eq!(Message::user(""), Err(MessageError::EmptyContent));
        assert_eq!(Message::assistant(""), Err(MessageError::EmptyContent));
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn message_roundtrips_through_json() {
        let msg = Message::user("hello").unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn constructors_set_role() {
        assert!(Message::user("hi").unwrap().is_user());
        assert!(!Message::assistant("hi").unwrap().is_user());
    }
}
