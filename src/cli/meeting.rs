//! `conclave meeting` - enter a multi-agent room
//!
//! Validates the roster, refuses to enter when any participant is locked by
//! a live session (fail-fast, before anything is acquired), then creates or
//! resumes the room record and hands off to the interactive loop.

use anyhow::bail;
use colored::Colorize;

use conclave_core::lock::LockManager;
use conclave_core::meeting::MeetingSession;
use conclave_core::storage::Storage;
use conclave_core::{Agent, ColorAssigner};
use conclave_llm::{ChatClient, ChatClientConfig};

/// Entry point for `conclave meeting <room> [agents...]`
pub async fn run(room: &str, agent_names: &[String]) -> anyhow::Result<()> {
    let storage = Storage::new();
    storage.init()?;

    let config = storage.load_config()?;
    let client = ChatClient::new(
        ChatClientConfig::default().with_base_url(config.effective_endpoint()),
    )?;

    let session = match storage.load_meeting_session(&MeetingSession::id_for_room(room)) {
        Ok(session) => {
            println!(
                "\n{} {}",
                "Resuming meeting room:".blue(),
                session.room_name.cyan()
            );
            println!(
                "{}",
                format!("{} messages in history", session.shared_messages.len()).dimmed()
            );
            for name in agent_names {
                if !session.has_agent(name) {
                    println!(
                        "{}",
                        format!("Note: {name} is not in this room; use /add {name} inside").yellow()
                    );
                }
            }
            session
        }
        Err(_) => {
            if agent_names.len() < 2 {
                eprintln!("{}", "At least 2 agents are required for a meeting".red());
                eprintln!("\nUsage: conclave meeting <room> <agent1> <agent2> [<agent3>...]");
                eprintln!("\nExample: conclave meeting boardroom ceo cto cfo");
                bail!("not enough agents");
            }

            let profile_name = config.current_profile.clone();
            let session = MeetingSession::new(room, agent_names.to_vec(), profile_name);
            storage.save_meeting_session(&session)?;
            println!(
                "\n{} {}",
                "Starting new meeting with:".green(),
                agent_names.join(", ").cyan()
            );
            session
        }
    };

    // Validate every participant before touching any lock
    let mut agents: Vec<Agent> = Vec::with_capacity(session.agent_names.len());
    for name in &session.agent_names {
        match storage.load_agent(name) {
            Ok(agent) => agents.push(agent),
            Err(_) => {
                eprintln!("{}", format!("Agent not found: {name}").red());
                eprintln!("\nCreate an agent with: conclave agent new {name}");
                bail!("agent not found: {name}");
            }
        }
    }

    let locks = LockManager::new(storage.locks_dir());
    for name in &session.agent_names {
        if locks.is_locked(name)? {
            eprintln!(
                "{}",
                format!("{name} is currently busy in another session.").red()
            );
            eprintln!("{}", "Please try again when they are available.".yellow());
            bail!("agent busy: {name}");
        }
    }

    let mut colors = ColorAssigner::new();
    println!("\n{}", "Meeting participants:".bold());
    for agent in &agents {
        let color = colors.color_for(&agent.name);
        println!(
            "  {} - {}",
            agent.name.color(color),
            agent.model.as_str().dimmed()
        );
    }
    println!();
    println!("{}", "To direct your message to a specific agent:".dimmed());
    println!("{}", "  - Start with: <agent-name>, your message".dimmed());
    println!("{}", "  - Use anywhere: @<agent-name> your message".dimmed());
    println!(
        "{}",
        "  - No targeting: all agents receive, most qualified responds".dimmed()
    );
    println!("{}", "\nType /help for commands, /quit to exit\n".dimmed());

    crate::meeting::interactive::run_meeting(&storage, &client, session, agents, colors).await
}
