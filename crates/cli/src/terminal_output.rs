//! ANSI formatting and display helpers.

use std::io::Write;

use ollachat_core::{Message, StreamEvent};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}i{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        eprintln!("{YELLOW}{BOLD}!{RESET} {msg}");
    } else {
        eprintln!("WARN: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}x{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

/// Truncates to `max_chars` characters, appending `...` only when something
/// was cut. Counts characters, so a multi-byte character is never split.
pub fn truncate_for_display(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Prints one streamed fragment without buffering. Thinking fragments are
/// dimmed; answer fragments are plain.
pub fn print_stream_event(event: &StreamEvent) {
    match event {
        StreamEvent::Answer(text) => print!("{text}"),
        StreamEvent::Thinking(text) => {
            if supports_color() {
                print!("{DIM}{text}{RESET}");
            } else {
                print!("{text}");
            }
        }
    }
    let _ = std::io::stdout().flush();
}

/// Prints one stored message for history replay; long assistant replies are
/// truncated for readability.
pub fn print_history_message(message: &Message) {
    if message.is_user() {
        println!("  You: {}", message.content);
    } else {
        println!("  AI:  {}", truncate_for_display(&message.content, 1000));
    }
}
