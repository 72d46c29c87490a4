//! CLI module for Conclave
//!
//! Command tree:
//! - `meeting`: start or resume a multi-agent room
//! - `run`: drive a single agent interactively
//! - `agent`: manage agent definitions
//! - `profile`: manage the active user profile
//! - `status`: endpoint and storage health

use clap::{Parser, Subcommand};

pub mod agent;
pub mod meeting;
pub mod profile;
pub mod status;

/// Conclave agent CLI
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Multi-agent meeting rooms over a local model runner")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start or resume a meeting room with two or more agents
    Meeting {
        /// Room name (the durable session key)
        room: String,
        /// Participants; required when the room does not exist yet
        agents: Vec<String>,
    },
    /// Chat with a single agent
    Run {
        /// Agent name (defaults to the configured current agent)
        agent: Option<String>,
    },
    /// Manage agent definitions
    Agent {
        #[command(subcommand)]
        action: agent::AgentCommand,
    },
    /// Manage the active user profile
    Profile {
        #[command(subcommand)]
        action: profile::ProfileCommand,
    },
    /// Show endpoint and storage health
    Status,
}

/// Run the parsed CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Meeting { room, agents }) => meeting::run(&room, &agents).await,
        Some(Commands::Run { agent }) => crate::chat::run_command(agent.as_deref()).await,
        Some(Commands::Agent { action }) => agent::run(action).await,
        Some(Commands::Profile { action }) => profile::run(action).await,
        Some(Commands::Status) => status::run().await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
