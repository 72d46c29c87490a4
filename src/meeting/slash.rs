//! Slash commands for meeting mode
//!
//! Each command reports back through [`SlashOutcome`]: stay in the loop,
//! leave the room, or hand control to single-agent mode.

use colored::Colorize;
use futures::StreamExt;
use inquire::{Confirm, InquireError, Text};

use conclave_core::lock::{LockGuard, LockManager};
use conclave_core::meeting::{
    build_agent_request, build_meeting_context, MeetingMessage, MeetingSession, Role,
};
use conclave_core::storage::{ArchivedSession, Storage};
use conclave_core::{build_system_prompt, Agent, ColorAssigner, Profile, SpeakerRenderer};
use conclave_llm::{ChatBackend, ChatClient};

/// What the loop should do after a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashOutcome {
    /// Keep prompting
    Continue,
    /// Leave the room
    Exit,
    /// Leave the room and start a single-agent session
    SwitchToAgent(String),
}

/// Dispatch one slash command (`input` has the leading `/` stripped).
#[allow(clippy::too_many_arguments)]
pub async fn handle(
    input: &str,
    session: &mut MeetingSession,
    agents: &mut Vec<Agent>,
    guard: &mut LockGuard,
    storage: &Storage,
    client: &ChatClient,
    colors: &mut ColorAssigner,
    profile: &Profile,
) -> anyhow::Result<SlashOutcome> {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match command {
        "" | "help" | "h" => {
            print_help();
            Ok(SlashOutcome::Continue)
        }
        "clear" | "c" => handle_clear(session, storage),
        "add" => handle_add(args.first().copied(), session, agents, guard, storage, colors),
        "remove" => handle_remove(args.first().copied(), session, agents, guard, storage, colors),
        "respond" | "r" => handle_respond(args.first().copied(), session, storage, colors),
        "@" => {
            handle_direct_call(
                args.first().copied(),
                session,
                agents,
                storage,
                client,
                colors,
                profile,
            )
            .await
        }
        "participants" | "p" => {
            print_participants(agents, colors);
            Ok(SlashOutcome::Continue)
        }
        "show" => handle_show(args.first().copied(), session, agents, profile),
        "history" => {
            let count = args
                .first()
                .and_then(|a| a.parse::<usize>().ok())
                .unwrap_or(10);
            print_history(session, count, colors);
            Ok(SlashOutcome::Continue)
        }
        "status" | "s" => {
            print_status(session);
            Ok(SlashOutcome::Continue)
        }
        "buffered" | "b" => {
            print_buffered(session, colors);
            Ok(SlashOutcome::Continue)
        }
        "chain-length" | "chain" => handle_chain_length(args.first().copied(), session, storage),
        "check-in-limit" | "checkin" => {
            handle_check_in_limit(args.first().copied(), session, storage)
        }
        "agent" => handle_agent_switch(args.first().copied(), storage),
        "restore" => handle_restore(args.first().copied(), session, storage),
        "quit" | "exit" | "q" | "e" | "x" => Ok(SlashOutcome::Exit),
        other => {
            eprintln!("{}", format!("Unknown command: /{other}").red());
            println!("Type /help for available commands");
            Ok(SlashOutcome::Continue)
        }
    }
}

fn print_help() {
    println!("{}", "\nMeeting Room Commands\n".bold());
    println!("  /help, /h                  - Show this help");
    println!("  /clear, /c                 - Clear room history (optionally archive first)");
    println!("  /add <agent>               - Add an agent to the room");
    println!("  /remove <agent>            - Remove an agent from the room");
    println!("  /agent <name>              - Switch to single-agent mode");
    println!("  /respond <agent>, /r       - Call on an agent with a raised hand");
    println!("  /@ <agent>                 - Ask an agent to respond to the current chat");
    println!("  /participants, /p          - Show room participants");
    println!("  /show <agent>              - Show agent config and full system prompt");
    println!("  /restore <name>            - Restore an archived chat");
    println!("  /buffered, /b              - List buffered responses");
    println!("  /status, /s                - Show room statistics");
    println!("  /history [count]           - Show recent messages");
    println!("  /chain-length [n]          - View/set max agent-to-agent chain length");
    println!("  /check-in-limit [n]        - View/set the check-in token hint");
    println!("  /quit, /q                  - Exit room");
    println!();
    println!("{}", "Message targeting:".bold());
    println!("  <agent>, message           - Direct message to one agent");
    println!("  @<agent> message           - Mention an agent in the message");
    println!("  message (no target)        - Broadcast; the most qualified agent responds");
    println!();
}

fn handle_clear(session: &mut MeetingSession, storage: &Storage) -> anyhow::Result<SlashOutcome> {
    if !session.shared_messages.is_empty() || !session.buffered_responses.is_empty() {
        let save = match Confirm::new("Save chat history before clearing?")
            .with_default(false)
            .prompt()
        {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(SlashOutcome::Continue)
            }
            Err(e) => return Err(e.into()),
        };

        if save {
            let name = match Text::new("Archive name:").prompt() {
                Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
                Ok(_) | Err(InquireError::OperationCanceled) => {
                    println!("{}", "Archive name required, not saved".yellow());
                    return Ok(SlashOutcome::Continue);
                }
                Err(e) => return Err(e.into()),
            };
            storage.save_archive(&name, &ArchivedSession::Meeting(session.clone()))?;
            println!("{}", format!("Chat saved to archive: {name}").green());
        }
    }

    session.reset();
    storage.save_meeting_session(session)?;
    println!("{}", "Cleared room history".green());
    Ok(SlashOutcome::Continue)
}

fn handle_add(
    name: Option<&str>,
    session: &mut MeetingSession,
    agents: &mut Vec<Agent>,
    guard: &mut LockGuard,
    storage: &Storage,
    colors: &mut ColorAssigner,
) -> anyhow::Result<SlashOutcome> {
    let Some(name) = name else {
        eprintln!("{}", "Agent name is required".red());
        println!("{}", "Usage: /add <agent-name>".dimmed());
        return Ok(SlashOutcome::Continue);
    };

    if session.has_agent(name) {
        println!("{}", format!("{name} is already in the room").yellow());
        return Ok(SlashOutcome::Continue);
    }

    let agent = match storage.load_agent(name) {
        Ok(agent) => agent,
        Err(_) => {
            eprintln!("{}", format!("Agent not found: {name}").red());
            println!(
                "{}",
                format!("Create an agent with: conclave agent new {name}").dimmed()
            );
            return Ok(SlashOutcome::Continue);
        }
    };

    let locks = LockManager::new(storage.locks_dir());
    if locks.is_locked(&agent.name)? {
        println!(
            "{}",
            format!("{} is currently busy in another session.", agent.name).red()
        );
        println!("{}", "Please try again when they are available.".yellow());
        return Ok(SlashOutcome::Continue);
    }

    guard.extend(&agent.name)?;
    session.add_agent(agent.name.clone());
    storage.save_meeting_session(session)?;

    let color = colors.color_for(&agent.name);
    println!(
        "\n{} {} {}",
        "+".green(),
        agent.name.color(color),
        "joined the room".green()
    );
    println!("  {}", format!("Model: {}", agent.model).dimmed());
    println!("  {}", format!("Role: {}", agent.role_summary(80)).dimmed());
    println!();

    agents.push(agent);
    Ok(SlashOutcome::Continue)
}

fn handle_remove(
    name: Option<&str>,
    session: &mut MeetingSession,
    agents: &mut Vec<Agent>,
    guard: &mut LockGuard,
    storage: &Storage,
    colors: &mut ColorAssigner,
) -> anyhow::Result<SlashOutcome> {
    let Some(name) = name else {
        eprintln!("{}", "Agent name is required".red());
        println!("{}", "Usage: /remove <agent-name>".dimmed());
        print_participants(agents, colors);
        return Ok(SlashOutcome::Continue);
    };

    if !session.has_agent(name) {
        println!("{}", format!("{name} is not in the room").yellow());
        return Ok(SlashOutcome::Continue);
    }

    // A room stops being a meeting below two participants
    if session.agent_names.len() <= 2 {
        eprintln!(
            "{}",
            "Cannot remove agent - at least 2 agents must remain in the room".red()
        );
        println!("{}", "If you want to end this meeting, use /quit".dimmed());
        return Ok(SlashOutcome::Continue);
    }

    if let Some(removed) = session.remove_agent(name) {
        storage.save_meeting_session(session)?;
        guard.release_one(&removed)?;
        agents.retain(|a| !a.name.eq_ignore_ascii_case(&removed));

        let color = colors.color_for(&removed);
        println!(
            "\n{} {} {}\n",
            "-".green(),
            removed.color(color),
            "left the room".green()
        );
    }

    Ok(SlashOutcome::Continue)
}

fn handle_respond(
    name: Option<&str>,
    session: &mut MeetingSession,
    storage: &Storage,
    colors: &mut ColorAssigner,
) -> anyhow::Result<SlashOutcome> {
    let Some(name) = name else {
        eprintln!("{}", "Agent name is required".red());
        println!("Usage: /respond <agent-name>");
        print_buffered(session, colors);
        return Ok(SlashOutcome::Continue);
    };

    match session.consume_buffered(name) {
        Some(buffered) => {
            let color = colors.color_for(&buffered.agent_name);
            println!(
                "\n{}",
                format!("{}:", buffered.agent_name).color(color).bold()
            );
            println!("{}\n", buffered.content.as_str().color(color));
            storage.save_meeting_session(session)?;
        }
        None => {
            println!(
                "{}",
                format!("{name} does not have a raised hand (no buffered response)").yellow()
            );
            println!(
                "{}",
                format!("To ask {name} to respond to the current chat, use: /@ {name}").dimmed()
            );
        }
    }

    Ok(SlashOutcome::Continue)
}

/// `/@ <agent>`: force a streamed response to the current conversation,
/// outside the solicitation protocol.
async fn handle_direct_call(
    name: Option<&str>,
    session: &mut MeetingSession,
    agents: &[Agent],
    storage: &Storage,
    client: &ChatClient,
    colors: &mut ColorAssigner,
    profile: &Profile,
) -> anyhow::Result<SlashOutcome> {
    let Some(name) = name else {
        eprintln!("{}", "Agent name is required".red());
        println!("Usage: /@ <agent-name>");
        return Ok(SlashOutcome::Continue);
    };

    let Some(agent) = agents.iter().find(|a| a.name.eq_ignore_ascii_case(name)) else {
        eprintln!("{}", format!("Agent not found in room: {name}").red());
        return Ok(SlashOutcome::Continue);
    };

    if !session
        .shared_messages
        .iter()
        .any(|m| m.role == Role::User)
    {
        eprintln!("{}", "No user message to respond to".red());
        return Ok(SlashOutcome::Continue);
    }

    println!("\n{}\n", format!("Asking {} to respond...", agent.name).blue());

    let mut request = build_agent_request(agent, agents, session, profile, 0, false);
    if let Some(system) = request.messages.first_mut() {
        system.content.push_str(
            "\nNOTE: The user has specifically requested your response. \
             Please provide your perspective on the discussion so far.\n",
        );
    }

    let color = colors.color_for(&agent.name);
    println!("{}", format!("{}:", agent.name).color(color).bold());

    let mut stream = match ChatBackend::chat_stream(client, request).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!(
                "{}",
                format!("x Error streaming response from {}: {e}", agent.name).red()
            );
            return Ok(SlashOutcome::Continue);
        }
    };

    let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
    let mut stdout = std::io::stdout();
    let mut renderer = SpeakerRenderer::new(&mut stdout, colors, &agent.name, &roster);

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                if chunk.done {
                    break;
                }
                renderer.feed(&chunk.delta)?;
                if chunk.finish_reason.is_some() {
                    break;
                }
            }
            Err(e) => {
                eprintln!("\n{}", format!("x Stream failed: {e}").red());
                break;
            }
        }
    }
    let content = renderer.finish()?;

    if !content.is_empty() {
        session.push_message(MeetingMessage::assistant(&agent.name, content, 0));
        storage.save_meeting_session(session)?;
    }

    Ok(SlashOutcome::Continue)
}

fn print_participants(agents: &[Agent], colors: &mut ColorAssigner) {
    println!("{}", "\nRoom participants\n".bold());
    for agent in agents {
        let color = colors.color_for(&agent.name);
        println!("  {}", agent.name.color(color));
        println!("    Model: {}", agent.model.as_str().dimmed());
        println!("    Role: {}", agent.role_summary(80).dimmed());
    }
    println!();
}

fn handle_show(
    name: Option<&str>,
    session: &MeetingSession,
    agents: &[Agent],
    profile: &Profile,
) -> anyhow::Result<SlashOutcome> {
    let Some(name) = name else {
        println!("{}", "Please specify an agent name".yellow());
        println!("{}", "Usage: /show <agent-name>".dimmed());
        return Ok(SlashOutcome::Continue);
    };

    let Some(agent) = agents.iter().find(|a| a.name.eq_ignore_ascii_case(name)) else {
        eprintln!("{}", format!("Agent not found in meeting: {name}").red());
        return Ok(SlashOutcome::Continue);
    };

    let base = build_system_prompt(&agent.system_prompt, Some(agent), profile);
    let full = format!("{base}{}", build_meeting_context(agent, agents, session, 0));

    println!("\n{}", format!("Agent configuration: {}", agent.name).bold());
    println!("  Name:        {}", agent.name.cyan());
    println!("  Model:       {}", agent.model.cyan());
    println!(
        "  Params:      ctx={} max_tokens={} temp={} top_p={} top_k={}",
        agent.model_params.ctx_size,
        agent.model_params.max_tokens,
        agent.model_params.temperature,
        agent.model_params.top_p,
        agent.model_params.top_k
    );
    println!("\n{}", "Raw configuration:".bold());
    println!("{}", serde_json::to_string_pretty(agent)?.dimmed());
    println!("\n{}", "Full system prompt for this meeting:".bold());
    println!("{}", full);
    println!();

    Ok(SlashOutcome::Continue)
}

fn print_history(session: &MeetingSession, count: usize, colors: &mut ColorAssigner) {
    let start = session.shared_messages.len().saturating_sub(count);
    let recent = &session.shared_messages[start..];

    if recent.is_empty() {
        println!("{}", "\n(No message history)\n".dimmed());
        return;
    }

    println!(
        "{}",
        format!("\nRecent messages (last {})\n", recent.len()).bold()
    );
    for message in recent {
        match (&message.role, &message.agent_name) {
            (Role::Assistant, Some(name)) => {
                let color = colors.color_for(name);
                println!("{}", format!("[{name}]").color(color));
                println!("{}", message.content.as_str().color(color));
            }
            _ => {
                println!("{}", "[User]".blue());
                if let Some(target) = &message.target_agent {
                    println!("{}", format!("  (to: {target})").dimmed());
                }
                println!("{}", message.content);
            }
        }
        println!();
    }
}

fn print_status(session: &MeetingSession) {
    println!("{}", "\nRoom status\n".bold());
    println!("  Room name:          {}", session.room_name.cyan());
    println!(
        "  Participants:       {}",
        session.agent_names.join(", ").cyan()
    );
    println!(
        "  Total messages:     {}",
        session.shared_messages.len().to_string().cyan()
    );
    println!(
        "  Buffered responses: {}",
        session.buffered_responses.len().to_string().cyan()
    );
    println!(
        "  Chain length:       {}",
        session.max_chain_length.to_string().cyan()
    );
    println!(
        "  Check-in limit:     {}",
        session.check_in_token_limit.to_string().cyan()
    );
    println!();
}

fn print_buffered(session: &MeetingSession, colors: &mut ColorAssigner) {
    println!("{}", "\nBuffered responses\n".bold());
    if session.buffered_responses.is_empty() {
        println!("{}", "  (none)".dimmed());
    } else {
        for response in &session.buffered_responses {
            let color = colors.color_for(&response.agent_name);
            let preview: String = response.content.chars().take(100).collect();
            println!(
                "  {} - {}",
                response.agent_name.color(color),
                response.timestamp.to_rfc3339().dimmed()
            );
            println!("    {}...", preview.dimmed());
        }
        println!(
            "{}",
            "\nUse /respond <agent-name> to show a full response".dimmed()
        );
    }
    println!();
}

fn handle_chain_length(
    value: Option<&str>,
    session: &mut MeetingSession,
    storage: &Storage,
) -> anyhow::Result<SlashOutcome> {
    let Some(value) = value else {
        println!("{}", "\nAgent-to-agent chain settings\n".bold());
        println!(
            "  Max chain length: {}",
            session.max_chain_length.to_string().cyan()
        );
        println!(
            "{}",
            "\nThis controls how many times agents can respond to each other\n\
             before the conversation returns to the user. Use 0 to disable\n\
             chaining entirely."
                .dimmed()
        );
        println!(
            "{}",
            format!(
                "\nUse /chain-length <number> to change (current: {})\n",
                session.max_chain_length
            )
            .dimmed()
        );
        return Ok(SlashOutcome::Continue);
    };

    let Ok(new_length) = value.parse::<u32>() else {
        eprintln!("{}", "Invalid chain length. Must be a non-negative number.".red());
        println!("{}", "Use 0 to disable agent-to-agent chaining.".dimmed());
        return Ok(SlashOutcome::Continue);
    };

    let old = session.max_chain_length;
    session.max_chain_length = new_length;
    session.touch();
    storage.save_meeting_session(session)?;

    println!(
        "{}",
        format!("Max chain length updated: {old} -> {new_length}").green()
    );
    if new_length == 0 {
        println!("{}", "Agent-to-agent chaining is now disabled.".yellow());
        println!(
            "{}",
            "Agents can still @mention each other, but won't auto-respond.".dimmed()
        );
    } else if new_length > 10 {
        println!(
            "{}",
            format!("A chain length of {new_length} may produce very long conversations.").yellow()
        );
    }

    Ok(SlashOutcome::Continue)
}

fn handle_check_in_limit(
    value: Option<&str>,
    session: &mut MeetingSession,
    storage: &Storage,
) -> anyhow::Result<SlashOutcome> {
    let Some(value) = value else {
        println!("{}", "\nAgent check-in settings\n".bold());
        println!(
            "  Check-in token limit: {}",
            session.check_in_token_limit.to_string().cyan()
        );
        println!(
            "{}",
            "\nAgents are instructed to pause and address you after roughly\n\
             this many tokens of agent-to-agent conversation. It is a prompt\n\
             hint, not an enforced counter."
                .dimmed()
        );
        println!(
            "{}",
            format!(
                "\nUse /check-in-limit <number> to change (current: {})\n",
                session.check_in_token_limit
            )
            .dimmed()
        );
        return Ok(SlashOutcome::Continue);
    };

    let Ok(new_limit) = value.parse::<u32>() else {
        eprintln!("{}", "Invalid check-in limit. Must be a non-negative number.".red());
        println!(
            "{}",
            "Typical values: 512 (frequent), 1024, 2048 (infrequent)".dimmed()
        );
        return Ok(SlashOutcome::Continue);
    };

    let old = session.check_in_token_limit;
    session.check_in_token_limit = new_limit;
    session.touch();
    storage.save_meeting_session(session)?;

    println!(
        "{}",
        format!("Check-in token limit updated: {old} -> {new_limit}").green()
    );

    Ok(SlashOutcome::Continue)
}

fn handle_agent_switch(
    name: Option<&str>,
    storage: &Storage,
) -> anyhow::Result<SlashOutcome> {
    let Some(name) = name else {
        let names = storage.list_agents()?;
        if names.is_empty() {
            eprintln!("{}", "No agents available".red());
            return Ok(SlashOutcome::Continue);
        }

        println!("{}", "\nAvailable agents\n".bold());
        for name in names {
            match storage.load_agent(&name) {
                Ok(agent) => {
                    println!("  {} - {}", name.cyan(), agent.model.as_str().dimmed());
                    println!("    {}", agent.role_summary(80).dimmed());
                }
                Err(_) => println!("  {}", name.cyan()),
            }
        }
        println!("\n{}", "Usage: /agent <agent-name>\n".dimmed());
        return Ok(SlashOutcome::Continue);
    };

    match storage.load_agent(name) {
        Ok(agent) => {
            println!("{}", format!("Switching to agent: {}", agent.name).green());
            Ok(SlashOutcome::SwitchToAgent(agent.name))
        }
        Err(_) => {
            eprintln!("{}", format!("Agent not found: {name}").red());
            println!("{}", "Use /agent to see available agents".dimmed());
            Ok(SlashOutcome::Continue)
        }
    }
}

fn handle_restore(
    name: Option<&str>,
    session: &mut MeetingSession,
    storage: &Storage,
) -> anyhow::Result<SlashOutcome> {
    let Some(name) = name else {
        let archives = storage.list_archives()?;
        if archives.is_empty() {
            println!("{}", "No archived chats found".yellow());
            println!(
                "{}",
                "Use /clear to save your current chat to the archive".dimmed()
            );
            return Ok(SlashOutcome::Continue);
        }

        println!("{}", "\nArchived chats\n".bold());
        for name in archives {
            match storage.load_archive(&name) {
                Ok(ArchivedSession::Meeting(meeting)) => {
                    println!("  {}", name.cyan());
                    println!(
                        "    {}",
                        format!(
                            "Meeting room, {} messages, updated {}",
                            meeting.shared_messages.len(),
                            meeting.updated_at.to_rfc3339()
                        )
                        .dimmed()
                    );
                }
                Ok(ArchivedSession::Chat(chat)) => {
                    println!("  {}", name.cyan());
                    println!(
                        "    {}",
                        format!(
                            "Agent chat with {}, {} messages",
                            chat.agent_name,
                            chat.messages.len()
                        )
                        .dimmed()
                    );
                }
                Err(_) => println!("  {}", name.cyan()),
            }
        }
        println!("\n{}", "Usage: /restore <archive-name>\n".dimmed());
        return Ok(SlashOutcome::Continue);
    };

    let archived = match storage.load_archive(name) {
        Ok(archived) => archived,
        Err(_) => {
            eprintln!("{}", format!("Archive not found: {name}").red());
            println!("{}", "Use /restore to see available archives".dimmed());
            return Ok(SlashOutcome::Continue);
        }
    };

    match archived {
        ArchivedSession::Meeting(meeting) => {
            if meeting.room_name == session.room_name {
                session.restore_from(&meeting);
                storage.save_meeting_session(session)?;
                println!(
                    "{}",
                    "Room history restored, use /history to show the conversation".green()
                );
            } else {
                // A different room: persist it and let the user re-enter
                storage.save_meeting_session(&meeting)?;
                println!(
                    "{}",
                    "To restore a different room, exit and run:".yellow()
                );
                println!(
                    "{}",
                    format!("  conclave meeting {}", meeting.room_name).dimmed()
                );
            }
            Ok(SlashOutcome::Continue)
        }
        ArchivedSession::Chat(chat) => {
            println!(
                "{}",
                format!("Restoring agent chat: {}", chat.agent_name).green()
            );
            storage.save_chat_session(&chat)?;
            Ok(SlashOutcome::SwitchToAgent(chat.agent_name))
        }
    }
}
