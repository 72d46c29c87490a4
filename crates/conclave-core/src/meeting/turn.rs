//! Turn driver and chain dispatcher
//!
//! Runs one user turn end to end: solicit intents, stream the first
//! accepted responder live, buffer the rest, then decide whether the live
//! response hands the floor to another agent.
//!
//! Chaining is driven as an iterative work list with an explicit depth
//! counter rather than recursion; the depth comparison here is the hard
//! cutoff, the prompt-injected depth warning is only advisory. A check-in
//! (the agent addressing the user) always ends the chain: agents mentioned
//! in a check-in reply into the buffer instead of taking the floor.

use std::io::Write;

use colored::Colorize;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use conclave_llm::ChatBackend;

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::meeting::session::{MeetingMessage, MeetingSession};
use crate::meeting::solicit::{build_agent_request, select_responders, solicit, ResponseIntent};
use crate::meeting::targeting::{detect_agent_mentions, is_addressing_user, TargetedMessage};
use crate::profile::Profile;
use crate::render::{ColorAssigner, SpeakerRenderer};
use crate::storage::Storage;

/// A response must carry more than this many characters for its mentions
/// to trigger a chain (guards against a bare "@agent" cascading).
const MIN_CHAIN_CONTENT_LEN: usize = 20;

/// How a user turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn ran to completion (including "everyone passed")
    Completed,
    /// The live stream was interrupted; the user turn was retracted
    Cancelled,
}

enum LiveResult {
    Complete(String),
    Cancelled,
}

/// Drives meeting turns against a backend, rendering to `out`
pub struct TurnDriver<'a, W: Write + Send> {
    backend: &'a dyn ChatBackend,
    storage: &'a Storage,
    colors: &'a mut ColorAssigner,
    out: &'a mut W,
}

impl<'a, W: Write + Send> TurnDriver<'a, W> {
    /// Create a driver borrowing the session-wide collaborators
    pub fn new(
        backend: &'a dyn ChatBackend,
        storage: &'a Storage,
        colors: &'a mut ColorAssigner,
        out: &'a mut W,
    ) -> Self {
        Self {
            backend,
            storage,
            colors,
            out,
        }
    }

    /// Run one user turn, following agent-to-agent handoffs up to the
    /// session's chain bound.
    pub async fn run_user_turn(
        &mut self,
        session: &mut MeetingSession,
        agents: &[Agent],
        profile: &Profile,
        message: TargetedMessage,
    ) -> Result<TurnOutcome> {
        let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
        let mut next = Some((message, 0u32));

        while let Some((message, depth)) = next.take() {
            // A fresh top-level turn discards unclaimed raised hands
            if depth == 0 && !session.buffered_responses.is_empty() {
                let dropped = session.clear_buffered();
                let plural = if dropped == 1 { "" } else { "s" };
                writeln!(
                    self.out,
                    "\n{}",
                    format!("(Clearing {dropped} buffered response{plural})").dimmed()
                )?;
            }

            session.push_message(MeetingMessage::user(
                message.content.clone(),
                &message.targeted_agents,
                depth,
            ));

            let responders = select_responders(agents, &message);
            if responders.is_empty() {
                writeln!(
                    self.out,
                    "{}",
                    "No matching agents found for that target".yellow()
                )?;
                self.storage.save_meeting_session(session)?;
                return Ok(TurnOutcome::Completed);
            }

            let broadcast = !message.is_direct_target;
            let intents = solicit(
                self.backend,
                &responders,
                agents,
                session,
                profile,
                depth,
                broadcast,
            )
            .await;

            for intent in intents.iter().filter(|i| i.error.is_some()) {
                let reason = intent.error.as_deref().unwrap_or("unknown error");
                writeln!(
                    self.out,
                    "{}",
                    format!("x Error getting response from {}: {reason}", intent.agent_name).red()
                )?;
                writeln!(
                    self.out,
                    "{}",
                    format!("  {} will be skipped for this turn", intent.agent_name).yellow()
                )?;
            }

            let active: Vec<&ResponseIntent> =
                intents.iter().filter(|i| i.wants_to_respond).collect();
            if active.is_empty() {
                writeln!(
                    self.out,
                    "\n{}",
                    "(None of the agents felt qualified to respond)".yellow()
                )?;
                writeln!(
                    self.out,
                    "{}",
                    "Use /respond <agent-name> to request a specific agent to answer".dimmed()
                )?;
                self.storage.save_meeting_session(session)?;
                return Ok(TurnOutcome::Completed);
            }

            // First accepted responder in roster order takes the floor;
            // its reply is regenerated as a streamed call.
            let first = active[0];
            let first_agent = agents
                .iter()
                .find(|a| a.name == first.agent_name)
                .ok_or_else(|| Error::AgentNotFound {
                    name: first.agent_name.clone(),
                })?;

            let name_color = self.colors.color_for(&first.agent_name);
            writeln!(
                self.out,
                "\n{}",
                format!("{}:", first.agent_name).color(name_color).bold()
            )?;

            let live = self
                .stream_live(first_agent, agents, session, profile, depth)
                .await?;

            let content = match live {
                LiveResult::Cancelled => {
                    // No orphaned user turn without a reply
                    session.retract_last_message();
                    self.storage.save_meeting_session(session)?;
                    return Ok(TurnOutcome::Cancelled);
                }
                LiveResult::Complete(content) => content,
            };

            session.push_message(MeetingMessage::assistant(
                &first.agent_name,
                content.clone(),
                depth,
            ));

            // Everyone else who wanted the floor raises a hand instead
            if active.len() > 1 {
                writeln!(self.out)?;
                for intent in &active[1..] {
                    session.buffer_response(&intent.agent_name, &intent.content);
                    self.print_raised_hand(&intent.agent_name, "also has an answer")?;
                }
            }

            self.storage.save_meeting_session(session)?;

            if is_addressing_user(&content, &session.profile_name) {
                self.buffer_check_in_mentions(
                    session,
                    agents,
                    profile,
                    &roster,
                    &first.agent_name,
                    &content,
                    depth,
                )
                .await?;
                return Ok(TurnOutcome::Completed);
            }

            let mentions = detect_agent_mentions(&content, &roster, Some(&first.agent_name));
            let has_substance = content.trim().len() > MIN_CHAIN_CONTENT_LEN;
            if !mentions.is_empty() && has_substance && depth < session.max_chain_length {
                let next_depth = depth + 1;
                let indent = "  ".repeat(next_depth as usize);
                writeln!(
                    self.out,
                    "\n{}",
                    format!(
                        "{indent}-> [agent-to-agent chain, depth {next_depth}/{}]",
                        session.max_chain_length
                    )
                    .dimmed()
                )?;
                next = Some((TargetedMessage::direct(content, mentions), next_depth));
            }
        }

        Ok(TurnOutcome::Completed)
    }

    /// Stream the live speaker's response, watching for an interrupt.
    async fn stream_live(
        &mut self,
        agent: &Agent,
        agents: &[Agent],
        session: &MeetingSession,
        profile: &Profile,
        depth: u32,
    ) -> Result<LiveResult> {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let result = self
            .stream_live_inner(agent, agents, session, profile, depth, &cancel)
            .await;
        watcher.abort();
        result
    }

    async fn stream_live_inner(
        &mut self,
        agent: &Agent,
        agents: &[Agent],
        session: &MeetingSession,
        profile: &Profile,
        depth: u32,
        cancel: &CancellationToken,
    ) -> Result<LiveResult> {
        let request = build_agent_request(agent, agents, session, profile, depth, false);

        let mut stream = match self.backend.chat_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                writeln!(
                    self.out,
                    "{}",
                    format!("x Error streaming response from {}: {e}", agent.name).red()
                )?;
                return Ok(LiveResult::Complete(String::new()));
            }
        };

        let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
        let mut cancelled = false;
        let mut stream_error = None;

        let outcome = {
            let mut renderer =
                SpeakerRenderer::new(&mut *self.out, &mut *self.colors, &agent.name, &roster);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    chunk = stream.next() => match chunk {
                        Some(Ok(chunk)) => {
                            if chunk.done {
                                break;
                            }
                            renderer.feed(&chunk.delta)?;
                            if chunk.finish_reason.is_some() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            stream_error = Some(e.to_string());
                            break;
                        }
                        None => break,
                    }
                }
            }

            if cancelled {
                // Partial output already on the terminal stays; the
                // persisted state is what gets repaired by the caller.
                drop(renderer);
                LiveResult::Cancelled
            } else {
                LiveResult::Complete(renderer.finish()?)
            }
        };

        drop(stream);

        if cancelled {
            writeln!(self.out, "\n{}", "Interrupted, response discarded".yellow())?;
            debug!(agent = %agent.name, "live stream cancelled");
        } else if let Some(reason) = stream_error {
            writeln!(
                self.out,
                "{}",
                format!("x Stream from {} failed mid-response: {reason}", agent.name).red()
            )?;
            warn!(agent = %agent.name, error = %reason, "live stream failed");
        }

        Ok(outcome)
    }

    /// Agents mentioned inside a check-in reply into the buffer; the chain
    /// never continues from a check-in.
    #[allow(clippy::too_many_arguments)]
    async fn buffer_check_in_mentions(
        &mut self,
        session: &mut MeetingSession,
        agents: &[Agent],
        profile: &Profile,
        roster: &[String],
        speaker: &str,
        content: &str,
        depth: u32,
    ) -> Result<()> {
        let mentioned = detect_agent_mentions(content, roster, Some(speaker));
        if mentioned.is_empty() {
            return Ok(());
        }

        writeln!(
            self.out,
            "\n{}",
            format!(
                "{speaker} is checking in with you; mentioned agents ({}) will buffer responses",
                mentioned.join(", ")
            )
            .dimmed()
        )?;

        for name in &mentioned {
            let Some(agent) = agents.iter().find(|a| a.name.eq_ignore_ascii_case(name)) else {
                continue;
            };
            let request = build_agent_request(agent, agents, session, profile, depth, false);
            match self.backend.chat(request).await {
                Ok(response) => {
                    let reply = response.content().to_string();
                    if !reply.is_empty() && reply.trim().to_uppercase() != "PASS" {
                        session.buffer_response(&agent.name, reply);
                        self.print_raised_hand(&agent.name, "has a response")?;
                    }
                }
                Err(e) => {
                    // One agent failing to buffer never disturbs the check-in
                    debug!(agent = %agent.name, error = %e, "check-in buffer query failed");
                }
            }
        }

        self.storage.save_meeting_session(session)?;
        Ok(())
    }

    fn print_raised_hand(&mut self, name: &str, verb: &str) -> Result<()> {
        let color = self.colors.color_for(name);
        writeln!(
            self.out,
            "{} {} {}",
            "[hand]".dimmed(),
            name.color(color),
            format!("{verb} (use /respond {name})").dimmed()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meeting::targeting::resolve;
    use crate::meeting::testing::ScriptedBackend;
    use crate::meeting::session::Role;
    use tempfile::TempDir;

    fn agents() -> Vec<Agent> {
        vec![
            Agent::new("ceo", "model-ceo", "You are the CEO."),
            Agent::new("cto", "model-cto", "You are the CTO."),
            Agent::new("cfo", "model-cfo", "You are the CFO."),
        ]
    }

    fn roster() -> Vec<String> {
        vec!["ceo".into(), "cto".into(), "cfo".into()]
    }

    fn setup() -> (TempDir, Storage, MeetingSession, Profile) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::with_base_dir(dir.path());
        storage.init().unwrap();
        let session = MeetingSession::new("boardroom", roster(), "default");
        let profile = Profile::new("default");
        (dir, storage, session, profile)
    }

    async fn run(
        backend: &ScriptedBackend,
        storage: &Storage,
        session: &mut MeetingSession,
        agents: &[Agent],
        profile: &Profile,
        input: &str,
    ) -> TurnOutcome {
        let mut colors = ColorAssigner::new();
        let mut out = Vec::new();
        let mut driver = TurnDriver::new(backend, storage, &mut colors, &mut out);
        let message = resolve(input, &roster());
        driver
            .run_user_turn(session, agents, profile, message)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_target_queries_only_that_agent_then_chains() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_reply(
                "model-ceo",
                "Growth first, hiring second. @cto what's feasible this quarter?",
            )
            .with_reply("model-cto", "Feasible by March with two engineers.");

        let outcome = run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "ceo, what's our Q1 plan?",
        )
        .await;

        assert_eq!(outcome, TurnOutcome::Completed);
        // cfo was never consulted in either phase
        assert!(!backend.chat_calls().contains(&"model-cfo".to_string()));
        assert_eq!(
            backend.stream_calls(),
            vec!["model-ceo".to_string(), "model-cto".to_string()]
        );

        // Log: user(0), ceo(0), relayed user(1), cto(1)
        let log = &session.shared_messages;
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[0].chain_depth, 0);
        assert_eq!(log[1].agent_name.as_deref(), Some("ceo"));
        assert_eq!(log[2].role, Role::User);
        assert_eq!(log[2].chain_depth, 1);
        assert_eq!(log[2].target_agent.as_deref(), Some("cto"));
        assert_eq!(log[3].agent_name.as_deref(), Some("cto"));
        assert_eq!(log[3].chain_depth, 1);
    }

    #[tokio::test]
    async fn test_broadcast_single_accepter_streams_without_buffering() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_reply("model-ceo", "PASS")
            .with_reply("model-cto", "We should prioritize the platform rewrite.")
            .with_reply("model-cfo", "pass");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "What should we prioritize?",
        )
        .await;

        // All three were asked, only cto streamed, nothing buffered
        assert_eq!(backend.chat_calls().len(), 3);
        assert_eq!(backend.stream_calls(), vec!["model-cto".to_string()]);
        assert!(session.buffered_responses.is_empty());
        assert_eq!(
            session.shared_messages.last().unwrap().agent_name.as_deref(),
            Some("cto")
        );
    }

    #[tokio::test]
    async fn test_everyone_passes_leaves_only_user_message() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_reply("model-ceo", "PASS")
            .with_reply("model-cto", "PASS")
            .with_reply("model-cfo", "PASS");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "Anyone?",
        )
        .await;

        assert_eq!(session.shared_messages.len(), 1);
        assert_eq!(session.shared_messages[0].role, Role::User);
        assert!(backend.stream_calls().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_accepters_buffer_in_roster_order() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_reply("model-ceo", "Here is the strategy view.")
            .with_reply("model-cto", "Here is the technical view.")
            .with_reply("model-cfo", "Here is the budget view.");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "Thoughts on the acquisition?",
        )
        .await;

        // ceo (first in roster) streams; cto and cfo raise hands
        assert_eq!(backend.stream_calls(), vec!["model-ceo".to_string()]);
        let buffered: Vec<_> = session
            .buffered_responses
            .iter()
            .map(|b| b.agent_name.as_str())
            .collect();
        assert_eq!(buffered, vec!["cto", "cfo"]);
    }

    #[tokio::test]
    async fn test_chain_stops_at_exact_depth_limit() {
        let (_dir, storage, mut session, profile) = setup();
        session.max_chain_length = 2;
        let agents = agents();
        // ceo and cto keep volleying; every reply is substantial
        let backend = ScriptedBackend::new()
            .with_reply("model-ceo", "Interesting point, more detail needed. @cto thoughts?")
            .with_reply("model-cto", "Pushing back on that, needs review. @ceo thoughts?");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "ceo, kick us off",
        )
        .await;

        // Hops at depth 0, 1, 2 then the depth comparison cuts the chain:
        // no call at depth 3.
        assert_eq!(backend.stream_calls().len(), 3);
        let max_depth = session
            .shared_messages
            .iter()
            .map(|m| m.chain_depth)
            .max()
            .unwrap();
        assert_eq!(max_depth, 2);
    }

    #[tokio::test]
    async fn test_chain_disabled_at_zero() {
        let (_dir, storage, mut session, profile) = setup();
        session.max_chain_length = 0;
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_reply("model-ceo", "Handing over to the expert here. @cto take this one.");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "ceo, your call",
        )
        .await;

        assert_eq!(backend.stream_calls(), vec!["model-ceo".to_string()]);
        assert!(!backend.chat_calls().contains(&"model-cto".to_string()));
    }

    #[tokio::test]
    async fn test_bare_mention_without_substance_does_not_chain() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new().with_reply("model-ceo", "@cto");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "ceo, anything to add?",
        )
        .await;

        assert_eq!(backend.stream_calls(), vec!["model-ceo".to_string()]);
        assert!(!backend.chat_calls().contains(&"model-cto".to_string()));
    }

    #[tokio::test]
    async fn test_check_in_buffers_mentions_and_stops_chain() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_reply(
                "model-ceo",
                "@user we've compared the options; @cto can detail the tradeoffs.",
            )
            .with_reply("model-cto", "Tradeoffs: speed versus stability.");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "ceo, where did you land?",
        )
        .await;

        // cto's reply is buffered, never streamed; the chain ends here
        assert_eq!(backend.stream_calls(), vec!["model-ceo".to_string()]);
        assert_eq!(session.buffered_responses.len(), 1);
        assert_eq!(session.buffered_responses[0].agent_name, "cto");
        assert_eq!(
            session.shared_messages.last().unwrap().agent_name.as_deref(),
            Some("ceo")
        );
    }

    #[tokio::test]
    async fn test_new_top_level_turn_clears_buffer() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        session.buffer_response("cto", "stale take");
        session.buffer_response("cfo", "stale numbers");

        let backend = ScriptedBackend::new()
            .with_reply("model-ceo", "Fresh start, noted.")
            .with_reply("model-cto", "PASS")
            .with_reply("model-cfo", "PASS");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "new topic",
        )
        .await;

        assert!(session.buffered_responses.is_empty());
    }

    #[tokio::test]
    async fn test_failed_agent_excluded_but_turn_continues() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_failure("model-ceo", "connection refused")
            .with_reply("model-cto", "I'll field this one.")
            .with_reply("model-cfo", "PASS");

        let outcome = run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "status update please",
        )
        .await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(backend.stream_calls(), vec!["model-cto".to_string()]);
        assert_eq!(
            session.shared_messages.last().unwrap().agent_name.as_deref(),
            Some("cto")
        );
    }

    #[tokio::test]
    async fn test_session_persisted_after_turn() {
        let (_dir, storage, mut session, profile) = setup();
        let agents = agents();
        let backend = ScriptedBackend::new()
            .with_reply("model-ceo", "On it.")
            .with_reply("model-cto", "PASS")
            .with_reply("model-cfo", "PASS");

        run(
            &backend,
            &storage,
            &mut session,
            &agents,
            &profile,
            "quick sync",
        )
        .await;

        let reloaded = storage.load_meeting_session("room-boardroom").unwrap();
        assert_eq!(reloaded.shared_messages.len(), session.shared_messages.len());
        assert_eq!(reloaded.metadata.total_messages, reloaded.shared_messages.len());
    }
}
