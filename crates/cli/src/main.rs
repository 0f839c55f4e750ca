mod chat_cmd;
mod config;
mod sessions_cmd;
mod terminal_output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::Config;

#[derive(Parser)]
#[command(name = "ollachat")]
#[command(about = "Interactive Ollama chat with persisted per-user sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (the default)
    Chat {
        /// User name; prompted for when omitted
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Inspect saved sessions
    Sessions {
        #[command(subcommand)]
        command: sessions_cmd::SessionCommands,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Logs go to stderr; stdout belongs to the chat stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Chat { user: None }) {
        Commands::Chat { user } => chat_cmd::run(user, &config).await,
        Commands::Sessions { command } => sessions_cmd::run(command, &config),
        Commands::Config => {
            config.display();
            Ok(())
        }
    }
}
