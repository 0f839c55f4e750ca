//! Environment-driven configuration with built-in fallbacks.
//!
//! Every field has a default; malformed values warn and fall back rather
//! than aborting. Loaded once at startup, read-only afterwards.

use std::str::FromStr;
use std::time::Duration;

use ollachat_agent::ChatSettings;
use ollachat_core::ContextMode;

use crate::terminal_output::note_warn;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant supporting the user with their tasks.";
const DEFAULT_PREFILL: &str = "Okay, let's work through your question. ";

#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub temperature: f32,
    pub think: bool,
    pub ctx_dir: String,
    pub ctx_limit: usize,
    pub ctx_ext: String,
    pub context_mode: ContextMode,
    pub system_prompt: String,
    pub prefill: String,
    pub use_prefill: bool,
    pub stop_sequences: Vec<String>,
    pub max_response: u32,
    pub timeout_secs: u64,
    pub ollama_url: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "deepseek-r1:8b".to_string(),
            temperature: 0.1,
            think: false,
            ctx_dir: "chats".to_string(),
            ctx_limit: 10_000,
            ctx_ext: ".json".to_string(),
            context_mode: ContextMode::MessageList,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prefill: DEFAULT_PREFILL.to_string(),
            use_prefill: true,
            stop_sequences: vec!["Human:".to_string(), "User:".to_string()],
            max_response: 0,
            timeout_secs: 300,
            ollama_url: "http://localhost:11434".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with per-field
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            model: env_string("OLLACHAT_MODEL", defaults.model),
            temperature: env_parse("OLLACHAT_TEMPERATURE", defaults.temperature),
            think: env_parse("OLLACHAT_THINK", defaults.think),
            ctx_dir: env_string("OLLACHAT_CTX_DIR", defaults.ctx_dir),
            ctx_limit: env_parse("OLLACHAT_CTX_LIMIT", defaults.ctx_limit),
            ctx_ext: env_string("OLLACHAT_CTX_EXT", defaults.ctx_ext),
            context_mode: parse_context_mode(
                std::env::var("OLLACHAT_CONTEXT_MODE").ok().as_deref(),
                defaults.context_mode,
            ),
            system_prompt: env_string("OLLACHAT_SYSTEM_PROMPT", defaults.system_prompt),
            prefill: env_string("OLLACHAT_PREFILL", defaults.prefill),
            use_prefill: env_parse("OLLACHAT_USE_PREFILL", defaults.use_prefill),
            stop_sequences: parse_stop_sequences(
                std::env::var("OLLACHAT_STOP_SEQUENCES").ok().as_deref(),
                defaults.stop_sequences,
            ),
            max_response: env_parse("OLLACHAT_MAX_RESPONSE", defaults.max_response),
            timeout_secs: env_parse("OLLACHAT_TIMEOUT_SECS", defaults.timeout_secs),
            ollama_url: env_string("OLLAMA_URL", defaults.ollama_url),
            log_level: env_string("RUST_LOG", defaults.log_level),
        }
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            think: self.think,
            context_limit: self.ctx_limit,
            context_mode: self.context_mode,
            system_prompt: self.system_prompt.clone(),
            prefill: self.prefill.clone(),
            use_prefill: self.use_prefill,
            stop_sequences: self.stop_sequences.clone(),
            max_response_tokens: self.max_response,
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Prints the effective settings, one per line.
    pub fn display(&self) {
        println!("Current settings:");
        println!("  model:            {}", self.model);
        println!("  temperature:      {:.1}", self.temperature);
        println!("  think mode:       {}", self.think);
        println!("  context dir:      {}", self.ctx_dir);
        println!("  context limit:    {} messages", self.ctx_limit);
        println!("  file extension:   {}", self.ctx_ext);
        println!(
            "  context mode:     {}",
            match self.context_mode {
                ContextMode::MessageList => "chat (message list)",
                ContextMode::FlatPrompt => "generate (flattened prompt)",
            }
        );
        if self.max_response > 0 {
            println!("  response cap:     {} tokens", self.max_response);
        } else {
            println!("  response cap:     unlimited");
        }
        println!("  use prefill:      {}", self.use_prefill);
        if self.use_prefill {
            println!("  prefill:          {}", self.prefill);
        }
        println!("  stop sequences:   {:?}", self.stop_sequences);
        println!("  request timeout:  {}s", self.timeout_secs);
        println!("  ollama url:       {}", self.ollama_url);
        println!();
    }
}

fn env_string(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default,
    }
}

fn env_parse<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            note_warn(&format!(
                "{key} has an invalid value {raw:?}; using default {default}"
            ));
            default
        }
    }
}

/// Stop sequences come as a JSON array (optionally wrapped in quotes by the
/// shell); anything unparseable falls back to the default list.
fn parse_stop_sequences(raw: Option<&str>, default: Vec<String>) -> Vec<String> {
    let Some(raw) = raw else {
        return default;
    };
    let trimmed = raw.trim().trim_matches('"');
    match serde_json::from_str::<Vec<String>>(trimmed) {
        Ok(sequences) => sequences,
        Err(_) => {
            note_warn("OLLACHAT_STOP_SEQUENCES is not a JSON string array; using default");
            default
        }
    }
}

fn parse_context_mode(raw: Option<&str>, default: ContextMode) -> ContextMode {
    match raw {
        None => default,
        Some("chat") => ContextMode::MessageList,
        Some("generate") => ContextMode::FlatPrompt,
        Some(other) => {
            note_warn(&format!(
                "OLLACHAT_CONTEXT_MODE has an unknown value {other:?}; using default"
            ));
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_sequences_accept_a_json_array() {
        assert_eq!(
            parse_stop_sequences(Some(r#"["A:", "B:"]"#), vec!["X".to_string()]),
            vec!["A:", "B:"]
        );
    }

    #[test]
    fn stop_sequences_tolerate_shell_quoting() {
        assert_eq!(
            parse_stop_sequences(Some(r#""["A:"]""#), vec![]),
            vec!["A:"]
        );
    }

    #[test]
    fn invalid_stop_sequences_fall_back() {
        let default = vec!["Human:".to_string()];
        assert_eq!(
            parse_stop_sequences(Some("not json"), default.clone()),
            default
        );
        assert_eq!(parse_stop_sequences(None, default.clone()), default);
    }

    #[test]
    fn context_mode_parses_both_variants() {
        assert_eq!(
            parse_context_mode(Some("chat"), ContextMode::FlatPrompt),
            ContextMode::MessageList
        );
        assert_eq!(
            parse_context_mode(Some("generate"), ContextMode::MessageList),
            ContextMode::FlatPrompt
        );
        assert_eq!(
            parse_context_mode(Some("bogus"), ContextMode::MessageList),
            ContextMode::MessageList
        );
        assert_eq!(
            parse_context_mode(None, ContextMode::FlatPrompt),
            ContextMode::FlatPrompt
        );
    }

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.ctx_ext, ".json");
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.max_response, 0);
        assert!(config.use_prefill);
    }
}
