//! `conclave agent` - manage agent definitions

use anyhow::bail;
use clap::Subcommand;
use colored::Colorize;
use inquire::{Confirm, Text};

use conclave_core::lock::LockManager;
use conclave_core::storage::Storage;
use conclave_core::{Agent, ColorAssigner};

/// Agent management subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// List all agents
    List,
    /// Create a new agent interactively
    New {
        /// Agent name (prompted when omitted)
        name: Option<String>,
    },
    /// Show an agent's configuration
    Show {
        /// Agent name
        name: String,
    },
    /// Delete an agent
    Delete {
        /// Agent name
        name: String,
    },
}

/// Run an agent subcommand
pub async fn run(command: AgentCommand) -> anyhow::Result<()> {
    let storage = Storage::new();
    storage.init()?;

    match command {
        AgentCommand::List => list(&storage),
        AgentCommand::New { name } => new(&storage, name),
        AgentCommand::Show { name } => show(&storage, &name),
        AgentCommand::Delete { name } => delete(&storage, &name),
    }
}

fn list(storage: &Storage) -> anyhow::Result<()> {
    let names = storage.list_agents()?;
    if names.is_empty() {
        println!("{}", "No agents defined".yellow());
        println!("{}", "Create one with: conclave agent new <name>".dimmed());
        return Ok(());
    }

    let mut colors = ColorAssigner::new();
    println!("{}", "\nAgents\n".bold());
    for name in names {
        match storage.load_agent(&name) {
            Ok(agent) => {
                let color = colors.color_for(&agent.name);
                println!(
                    "  {} - {}",
                    agent.name.color(color),
                    agent.model.as_str().dimmed()
                );
                println!("    {}", agent.role_summary(80).dimmed());
            }
            Err(e) => {
                println!("  {} {}", name, format!("(unreadable: {e})").red());
            }
        }
    }
    println!();
    Ok(())
}

fn new(storage: &Storage, name: Option<String>) -> anyhow::Result<()> {
    let name = match name {
        Some(name) => name,
        None => Text::new("Agent name:").prompt()?,
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("agent name cannot be empty");
    }
    if storage.load_agent(&name).is_ok() {
        eprintln!("{}", format!("Agent already exists: {name}").red());
        bail!("agent already exists");
    }

    let model = Text::new("Model:").with_default("llama3.2").prompt()?;
    let system_prompt = Text::new("System prompt:")
        .with_help_message("The agent's role, e.g. \"You are the CTO. Be concise.\"")
        .prompt()?;

    let agent = Agent::new(name, model, system_prompt);
    storage.save_agent(&agent)?;

    println!("{}", format!("Created agent: {}", agent.name).green());
    println!(
        "{}",
        format!(
            "Chat with it: conclave run {}, or add it to a meeting",
            agent.name
        )
        .dimmed()
    );
    Ok(())
}

fn show(storage: &Storage, name: &str) -> anyhow::Result<()> {
    let agent = match storage.load_agent(name) {
        Ok(agent) => agent,
        Err(_) => {
            eprintln!("{}", format!("Agent not found: {name}").red());
            bail!("agent not found");
        }
    };

    println!("\n{}", format!("Agent: {}", agent.name).bold());
    println!("{}", serde_json::to_string_pretty(&agent)?);
    Ok(())
}

fn delete(storage: &Storage, name: &str) -> anyhow::Result<()> {
    if storage.load_agent(name).is_err() {
        eprintln!("{}", format!("Agent not found: {name}").red());
        bail!("agent not found");
    }

    let locks = LockManager::new(storage.locks_dir());
    if locks.is_locked(name)? {
        eprintln!(
            "{}",
            format!("{name} is currently busy in another session.").red()
        );
        bail!("agent busy");
    }

    let confirmed = Confirm::new(&format!("Delete agent {name}?"))
        .with_default(false)
        .prompt()?;
    if !confirmed {
        println!("{}", "Not deleted".dimmed());
        return Ok(());
    }

    storage.delete_agent(name)?;
    println!("{}", format!("Deleted agent: {name}").green());
    Ok(())
}
