//! Skillbot CLI — entry point.
//!
//! # Commands
//!
//! - `skillbot chat [-m MESSAGE] [-t THREAD] [--new]` — chat (single-shot or REPL)
//! - `skillbot threads` — list past conversations
//! - `skillbot skills` — list the skill catalog
//! - `skillbot onboard` — initialize config and directories
//! - `skillbot status` — show configuration

mod callbacks;
mod helpers;
mod onboard;
mod repl;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use skillbot_agent::{Orchestrator, SkillCatalog};
use skillbot_core::checkpoint::JsonlCheckpointStore;
use skillbot_core::config::{load_config, Config};
use skillbot_core::conversations::ConversationStore;
use skillbot_core::utils::{checkpoints_dir, expand_home, title_from_query};
use skillbot_providers::http_provider::create_provider;

use crate::callbacks::CliCallback;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Skillbot — tool-using agent with skills, approvals, and data analysis
#[derive(Parser)]
#[command(name = "skillbot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (single-shot or interactive REPL)
    Chat {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing thread
        #[arg(short, long)]
        thread: Option<String>,

        /// Start a new conversation without showing the selector
        #[arg(long, default_value_t = false)]
        new: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// List past conversations
    Threads,

    /// List available skills
    Skills,

    /// Initialize configuration and directories
    Onboard,

    /// Show configuration status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            thread,
            new,
            logs,
        } => {
            init_logging(logs);
            run_chat(message, thread, new).await
        }
        Commands::Threads => list_threads(),
        Commands::Skills => list_skills(),
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(message: Option<String>, thread: Option<String>, force_new: bool) -> Result<()> {
    let config = load_config(None);
    let agent = build_orchestrator(&config)?;
    let conversations = ConversationStore::new(&config.storage.data_path())
        .context("failed to open conversation store")?;
    let user_id = config.agent.user_id.as_str();

    match message {
        Some(msg) => {
            let thread_id = thread.unwrap_or_else(helpers::new_thread_id);
            info!(thread = %thread_id, "processing single message");
            conversations.create(&thread_id, user_id, &title_from_query(&msg, 60))?;

            let response = agent
                .run_interactive(&thread_id, &msg)
                .await
                .context("agent processing failed")?;
            helpers::print_response(&response);
            if let Err(e) = conversations.touch(&thread_id) {
                warn!(error = %e, "failed to update conversation timestamp");
            }
        }
        None => {
            let session = repl::Session {
                agent: &agent,
                conversations: &conversations,
                user_id,
                history_dir: config.storage.data_path().join("history"),
            };
            session.run(thread, force_new).await?;
        }
    }

    Ok(())
}

/// Build the orchestrator from the loaded configuration.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let provider = create_provider(config).context("failed to create provider")?;
    let store = JsonlCheckpointStore::new(checkpoints_dir(&config.storage.data_path()))
        .context("failed to open checkpoint store")?;

    Ok(
        Orchestrator::from_config(config, Arc::new(provider), Arc::new(store))
            .with_callback(Arc::new(CliCallback)),
    )
}

// ─────────────────────────────────────────────
// Listing commands
// ─────────────────────────────────────────────

fn list_threads() -> Result<()> {
    let config = load_config(None);
    let conversations = ConversationStore::new(&config.storage.data_path())?;
    let records = conversations.list(&config.agent.user_id)?;

    println!();
    if records.is_empty() {
        println!("{}", "No conversations yet.".dimmed());
    }
    for record in &records {
        println!(
            "  {}  {}",
            helpers::conversation_line(record),
            record.thread_id.dimmed()
        );
    }
    println!();
    Ok(())
}

fn list_skills() -> Result<()> {
    let config = load_config(None);
    let skills_dir = expand_home(&config.tools.skills_dir);
    let catalog = SkillCatalog::from_dir(&skills_dir);

    println!();
    println!("{} {}", "Skills in".bold(), skills_dir.display());
    if catalog.is_empty() {
        println!("  {}", "No skills found.".dimmed());
    }
    for skill in catalog.descriptors() {
        match &skill.summary {
            Ok(summary) => println!(
                "  {} {}  {}",
                "•".green(),
                skill.id.bold(),
                summary.description.dimmed()
            ),
            Err(e) => println!("  {} {}  {}", "•".red(), skill.id.bold(), e.red()),
        }
    }
    println!();
    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("skillbot=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
