//! The interactive chat loop.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use ollachat_agent::ChatRunner;
use ollachat_providers::OllamaProvider;
use ollachat_session::SessionStore;

use crate::config::Config;
use crate::terminal_output::{note_error, note_info, print_history_message, print_stream_event};

const RECENT_REPLAY_COUNT: usize = 4;

pub async fn run(user: Option<String>, config: &Config) -> Result<()> {
    config.display();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let user_name = match user.map(|name| name.trim().to_string()) {
        Some(name) if !name.is_empty() => name,
        _ => prompt_user_name(&mut lines).await?,
    };

    let provider = Arc::new(OllamaProvider::new().with_base_url(&config.ollama_url));
    let store = SessionStore::new(&config.ctx_dir, &config.ctx_ext);
    let mut runner = ChatRunner::new(&user_name, config.chat_settings(), provider, store)
        .context("failed to start chat session")?;
    debug!(user = %user_name, model = %config.model, "chat session ready");

    println!("Welcome, {user_name}!");
    if runner.messages().is_empty() {
        note_info("Starting a new chat");
    } else {
        note_info(&format!(
            "Resuming existing chat ({} messages in history)",
            runner.messages().len()
        ));
        println!("\nRecent messages:");
        replay_recent(&runner);
    }
    println!("Type 'exit' or 'quit' (or an empty line) to leave.");
    println!("----------------------------------");

    loop {
        prompt("You: ")?;
        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let input = line.trim().to_string();

        if ChatRunner::is_exit_command(&input) {
            println!("Goodbye!");
            break;
        }

        prompt("AI: ")?;
        match runner
            .process_turn(&input, &mut |event| print_stream_event(event))
            .await
        {
            Ok(_outcome) => println!(),
            Err(error) => {
                println!();
                note_error(&error.to_string());
            }
        }
        println!();
    }

    Ok(())
}

async fn prompt_user_name(lines: &mut Lines<BufReader<Stdin>>) -> Result<String> {
    prompt("Enter your name: ")?;
    loop {
        let Some(line) = lines.next_line().await? else {
            bail!("no user name provided");
        };
        let name = line.trim().to_string();
        if !name.is_empty() {
            return Ok(name);
        }
        prompt("Name cannot be empty. Try again: ")?;
    }
}

fn replay_recent(runner: &ChatRunner) {
    let messages = runner.messages();
    let start = messages.len().saturating_sub(RECENT_REPLAY_COUNT);
    for message in &messages[start..] {
        print_history_message(message);
    }
    println!();
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}
