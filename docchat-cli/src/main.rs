//! CLI entry point for docchat

mod chat;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input};
use docchat_core::config::{Config, ConfigLoader};
use docchat_core::logging::init_logging;
use docchat_core::session::SessionManager;
use docchat_providers::GroqClient;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "Chat with your documents against a hosted LLM API")]
#[command(version = "0.2.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize docchat configuration
    Onboard,
    /// Launch an interactive chat session
    Chat {
        /// Document to load as context (.txt, .pdf, .docx)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Model to use
        #[arg(short, long)]
        model: Option<String>,
        /// Session key for conversation continuity
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Send a single message and print the response
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Document to load as context (.txt, .pdf, .docx)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Model to use
        #[arg(long)]
        model: Option<String>,
    },
    /// Show status information
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Onboard => {
            run_onboard(&config_loader)?;
        }
        Commands::Chat {
            file,
            model,
            session,
        } => {
            let (config, _guard) = load_config(&config_loader)?;
            info!("Starting interactive chat");
            chat::run_chat(&config, file, model, session).await?;
        }
        Commands::Ask {
            message,
            file,
            model,
        } => {
            let (config, _guard) = load_config(&config_loader)?;
            info!("Processing one-shot message");
            chat::run_ask(&config, &message, file, model).await?;
        }
        Commands::Status => {
            run_status(&config_loader)?;
        }
    }

    Ok(())
}

/// Load config and bring up logging with the configured sink
fn load_config(
    loader: &ConfigLoader,
) -> Result<(Config, tracing_appender::non_blocking::WorkerGuard)> {
    let mut config = loader.load()?;
    config.logging.dir = expand_tilde(&config.logging.dir)
        .to_string_lossy()
        .to_string();
    let guard = init_logging(&config.logging);
    Ok((config, guard))
}

/// Expand tilde in path
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Build the provider client; a missing credential is fatal
fn build_provider(config: &Config) -> Result<GroqClient> {
    let api_key = config.provider.api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!(
            "API key not found. Set GROQ_API_KEY or run `docchat onboard`."
        );
    }

    Ok(GroqClient::new(
        Some(api_key.to_string()),
        config.provider.api_base.clone(),
        config.chat.model.clone(),
        config.provider.extra_headers.clone(),
    ))
}

/// Run the onboard wizard
fn run_onboard(loader: &ConfigLoader) -> Result<()> {
    println!("{}", style("Welcome to docchat!").bold().cyan());
    println!("Let's set up your configuration.\n");

    let config_path = loader.config_dir().join("config.json");
    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    let api_key: String = Input::new()
        .with_prompt("Enter your Groq API key")
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Enter the model to use")
        .default("llama-3.3-70b-versatile".to_string())
        .interact_text()?;

    let workspace: String = Input::new()
        .with_prompt("Enter workspace directory")
        .default("~/.docchat/workspace".to_string())
        .interact_text()?;

    let mut config = Config::default();
    config.provider.api_key = api_key;
    config.chat.model = model;
    config.chat.workspace = workspace;

    loader.save(&config)?;

    let workspace_path = expand_tilde(&config.chat.workspace);
    std::fs::create_dir_all(&workspace_path)?;

    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!(
        "  {} - Start chatting",
        style("docchat chat --file report.pdf").cyan()
    );
    println!(
        "  {} - One-shot question",
        style("docchat ask --message 'Summarize this' --file notes.txt").cyan()
    );

    Ok(())
}

/// Show system status
fn run_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;

    println!("{}", style("docchat Status").bold().cyan());
    println!("Version: 0.2.0\n");

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Workspace: {}", config.chat.workspace);
    println!("  Default model: {}", config.chat.model);
    let credential = if config.provider.api_key.trim().is_empty() {
        style("not configured").red()
    } else {
        style("configured").green()
    };
    println!("  API key: {}", credential);
    println!();

    println!("{}", style("Sessions:").bold());
    let workspace = expand_tilde(&config.chat.workspace);
    let manager = SessionManager::new(&workspace);
    let sessions = manager.list_sessions();
    if sessions.is_empty() {
        println!("  (none)");
    } else {
        for info in sessions {
            println!(
                "  {} (updated {})",
                style(&info.key).bold(),
                info.updated_at.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}
