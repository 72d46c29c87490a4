//! Single-agent chat mode
//!
//! The `run` command and the target of the meeting `/agent` switch. Holds
//! the agent's lock for the duration of the loop via the same guard the
//! meeting uses.

use anyhow::bail;
use colored::Colorize;
use futures::StreamExt;
use inquire::{InquireError, Text};

use conclave_core::chat::ChatSession;
use conclave_core::lock::LockManager;
use conclave_core::meeting::Role;
use conclave_core::storage::Storage;
use conclave_core::{build_system_prompt, Agent, ColorAssigner, Error, Profile, SpeakerRenderer};
use conclave_llm::{ChatBackend, ChatClient, ChatClientConfig, ChatRequest, Message};

/// Entry point for `conclave run [agent]`
pub async fn run_command(agent: Option<&str>) -> anyhow::Result<()> {
    let storage = Storage::new();
    storage.init()?;
    let config = storage.load_config()?;

    let agent_name = match agent.map(str::to_string).or(config.current_agent.clone()) {
        Some(name) => name,
        None => {
            eprintln!("{}", "No agent specified and no current agent configured".red());
            eprintln!("\nUsage: conclave run <agent-name>");
            let names = storage.list_agents()?;
            if !names.is_empty() {
                eprintln!("\nAvailable agents: {}", names.join(", "));
            }
            bail!("no agent specified");
        }
    };

    let client = ChatClient::new(
        ChatClientConfig::default().with_base_url(config.effective_endpoint()),
    )?;

    run_agent_session(&storage, &client, &agent_name).await
}

/// Interactive loop against one agent.
pub async fn run_agent_session(
    storage: &Storage,
    client: &ChatClient,
    agent_name: &str,
) -> anyhow::Result<()> {
    let agent = match storage.load_agent(agent_name) {
        Ok(agent) => agent,
        Err(_) => {
            eprintln!("{}", format!("Agent not found: {agent_name}").red());
            eprintln!("\nCreate an agent with: conclave agent new {agent_name}");
            bail!("agent not found: {agent_name}");
        }
    };

    let locks = LockManager::new(storage.locks_dir());
    let guard = match locks.lock_all(std::slice::from_ref(&agent.name)) {
        Ok(guard) => guard,
        Err(Error::AgentBusy { name }) => {
            eprintln!(
                "{}",
                format!("{name} is currently busy in another session.").red()
            );
            eprintln!("{}", "Please try again when they are available.".yellow());
            bail!("agent busy: {name}");
        }
        Err(e) => return Err(e.into()),
    };

    let config = storage.load_config()?;
    let profile = storage
        .load_profile(&config.current_profile)
        .unwrap_or_else(|_| Profile::new(&config.current_profile));

    let mut session = storage
        .load_chat_session(&ChatSession::id_for_agent(&agent.name))
        .unwrap_or_else(|_| ChatSession::new(&agent.name));

    let mut colors = ColorAssigner::new();
    let color = colors.color_for(&agent.name);
    println!(
        "\n{} {} ({})",
        "Chatting with".bold(),
        agent.name.color(color).bold(),
        agent.model.as_str().dimmed()
    );
    if !session.messages.is_empty() {
        println!(
            "{}",
            format!("{} messages in history", session.messages.len()).dimmed()
        );
    }
    println!("{}", "Type /help for commands, /quit to exit\n".dimmed());

    loop {
        let input = match Text::new(">").prompt() {
            Ok(line) => line,
            Err(InquireError::OperationCanceled) => continue,
            Err(InquireError::OperationInterrupted) => {
                println!("\n{}", "Interrupted. Saving session...".yellow());
                break;
            }
            Err(e) => {
                drop(guard);
                return Err(e.into());
            }
        };

        let input = input.trim().to_string();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            match parts.next().unwrap_or("") {
                "quit" | "exit" | "q" | "e" | "x" => break,
                "" | "help" | "h" => {
                    println!("{}", "\nChat commands\n".bold());
                    println!("  /help, /h        - Show this help");
                    println!("  /clear, /c       - Clear chat history");
                    println!("  /history [n]     - Show recent messages");
                    println!("  /quit, /q        - Exit chat");
                    println!();
                }
                "clear" | "c" => {
                    session.messages.clear();
                    storage.save_chat_session(&session)?;
                    println!("{}", "Cleared chat history".green());
                }
                "history" => {
                    let count = parts
                        .next()
                        .and_then(|a| a.parse::<usize>().ok())
                        .unwrap_or(10);
                    print_history(&session, &agent, count, &mut colors);
                }
                other => {
                    eprintln!("{}", format!("Unknown command: /{other}").red());
                }
            }
            continue;
        }

        if let Err(e) =
            handle_user_message(&input, &agent, &profile, &mut session, client, storage, &mut colors)
                .await
        {
            eprintln!("{}", format!("x {e}").red());
        }
    }

    storage.save_chat_session(&session)?;
    drop(guard);
    println!("{}", "Goodbye!\n".dimmed());
    Ok(())
}

async fn handle_user_message(
    input: &str,
    agent: &Agent,
    profile: &Profile,
    session: &mut ChatSession,
    client: &ChatClient,
    storage: &Storage,
    colors: &mut ColorAssigner,
) -> anyhow::Result<()> {
    session.push(Role::User, input);

    let system_prompt = build_system_prompt(&agent.system_prompt, Some(agent), profile);
    let mut messages = vec![Message::system(system_prompt)];
    messages.extend(session.messages.iter().map(|m| match m.role {
        Role::User => Message::user(&m.content),
        Role::Assistant => Message::assistant(&m.content),
    }));

    let request = ChatRequest::new(&agent.model)
        .with_messages(messages)
        .with_max_tokens(agent.model_params.max_tokens)
        .with_temperature(agent.model_params.temperature)
        .with_top_p(agent.model_params.top_p)
        .with_top_k(agent.model_params.top_k);

    let mut stream = match ChatBackend::chat_stream(client, request).await {
        Ok(stream) => stream,
        Err(e) => {
            // Keep the session consistent: no reply, no dangling user turn
            session.messages.pop();
            eprintln!("{}", format!("x Error: {e}").red());
            return Ok(());
        }
    };

    let roster = vec![agent.name.clone()];
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
    session.push(Role::Assistant, content);
    storage.save_chat_session(session)?;
    Ok(())
}

fn print_history(session: &ChatSession, agent: &Agent, count: usize, colors: &mut ColorAssigner) {
    let start = session.messages.len().saturating_sub(count);
    let recent = &session.messages[start..];

    if recent.is_empty() {
        println!("{}", "\n(No message history)\n".dimmed());
        return;
    }

    println!(
        "{}",
        format!("\nRecent messages (last {})\n", recent.len()).bold()
    );
    for message in recent {
        match message.role {
            Role::User => {
                println!("{}", "[User]".blue());
                println!("{}", message.content);
            }
            Role::Assistant => {
                let color = colors.color_for(&agent.name);
                println!("{}", format!("[{}]", agent.name).color(color));
                println!("{}", message.content.as_str().color(color));
            }
        }
        println!();
    }
}
