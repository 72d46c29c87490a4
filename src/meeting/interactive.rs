//! Interactive meeting loop
//!
//! Locks every participant for the lifetime of the loop. The locks live in
//! a guard whose drop releases them, so quitting, Ctrl-C at the prompt,
//! errors, and the `/agent` mode switch all leave no lock behind.

use colored::Colorize;
use inquire::{InquireError, Text};
use tracing::warn;

use conclave_core::lock::LockManager;
use conclave_core::meeting::{targeting, MeetingSession, TurnDriver};
use conclave_core::storage::Storage;
use conclave_core::{Agent, ColorAssigner, Profile};
use conclave_llm::ChatClient;

use super::slash::{self, SlashOutcome};

/// Run the meeting loop until quit, interrupt, or mode switch.
pub async fn run_meeting(
    storage: &Storage,
    client: &ChatClient,
    mut session: MeetingSession,
    mut agents: Vec<Agent>,
    mut colors: ColorAssigner,
) -> anyhow::Result<()> {
    let locks = LockManager::new(storage.locks_dir());
    let mut guard = locks.lock_all(&session.agent_names)?;

    let profile = storage
        .load_profile(&session.profile_name)
        .unwrap_or_else(|_| Profile::new(&session.profile_name));

    loop {
        let input = match Text::new(">").prompt() {
            Ok(line) => line,
            // Esc cancels the current line; keep prompting
            Err(InquireError::OperationCanceled) => continue,
            // Ctrl-C leaves the room; the guard releases every lock
            Err(InquireError::OperationInterrupted) => {
                println!("\n{}", "Interrupted. Unlocking agents...".yellow());
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
            let outcome = slash::handle(
                command,
                &mut session,
                &mut agents,
                &mut guard,
                storage,
                client,
                &mut colors,
                &profile,
            )
            .await;

            match outcome {
                Ok(SlashOutcome::Continue) => continue,
                Ok(SlashOutcome::Exit) => break,
                Ok(SlashOutcome::SwitchToAgent(name)) => {
                    // Release the room before the single-agent mode takes over
                    drop(guard);
                    println!(
                        "{}",
                        format!("Leaving meeting, switching to agent: {name}\n").dimmed()
                    );
                    return crate::chat::run_agent_session(storage, client, &name).await;
                }
                Err(e) => {
                    eprintln!("{}", format!("x {e}").red());
                    continue;
                }
            }
        }

        let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
        let targeted = targeting::resolve(&input, &roster);

        let mut stdout = std::io::stdout();
        let mut driver = TurnDriver::new(client, storage, &mut colors, &mut stdout);
        if let Err(e) = driver
            .run_user_turn(&mut session, &agents, &profile, targeted)
            .await
        {
            // A turn failure never tears down the room
            warn!(error = %e, "meeting turn failed");
            eprintln!("{}", format!("x Turn failed: {e}").red());
        }
    }

    drop(guard);
    println!("{}", "Goodbye!\n".dimmed());
    Ok(())
}
