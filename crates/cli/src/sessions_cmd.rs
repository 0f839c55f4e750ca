//! Subcommands for inspecting saved sessions.

use anyhow::Result;
use clap::Subcommand;

use ollachat_session::SessionStore;

use crate::config::Config;
use crate::terminal_output::{note_info, note_warn, print_history_message};

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List saved sessions
    List,
    /// Show the stored history for one session
    Show {
        #[arg(short, long)]
        user: String,
    },
}

pub fn run(cmd: SessionCommands, config: &Config) -> Result<()> {
    let store = SessionStore::new(&config.ctx_dir, &config.ctx_ext);

    match cmd {
        SessionCommands::List => {
            let names = store.list()?;
            if names.is_empty() {
                note_info(&format!("No saved sessions under '{}'", config.ctx_dir));
                return Ok(());
            }

            println!("Saved sessions:");
            for name in names {
                match store.load_or_create(&name) {
                    Ok(session) => println!(
                        "  {name}  ({} messages, updated {})",
                        session.messages.len(),
                        session.updated.format("%Y-%m-%d %H:%M:%S UTC")
                    ),
                    Err(error) => note_warn(&format!("  {name}  (unreadable: {error})")),
                }
            }
        }
        SessionCommands::Show { user } => {
            if !store.resolve_path(&user).exists() {
                note_warn(&format!("No saved session for '{user}'"));
                return Ok(());
            }

            let session = store.load_or_create(&user)?;
            println!(
                "Session '{}': {} messages, created {}, updated {}",
                session.username,
                session.messages.len(),
                session.created.format("%Y-%m-%d %H:%M:%S UTC"),
                session.updated.format("%Y-%m-%d %H:%M:%S UTC")
            );
            for message in &session.messages {
                print_history_message(message);
            }
        }
    }

    Ok(())
}
