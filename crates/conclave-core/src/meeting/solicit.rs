//! Response solicitation protocol
//!
//! For one inbound message, decides which agents are asked to respond and
//! queries each of them concurrently with a non-streaming completion. In
//! broadcast mode agents are instructed to answer `PASS` when they judge
//! themselves unqualified; a `PASS` (trimmed, case-normalized) counts as
//! declining. One agent's failure never aborts the turn; it is reported
//! as a warning and the agent is treated as declining.

use futures::future::join_all;
use tracing::{debug, warn};

use conclave_llm::{ChatBackend, ChatRequest, Message};

use crate::agent::Agent;
use crate::meeting::context::{broadcast_instruction, build_meeting_context};
use crate::meeting::session::{MeetingSession, Role};
use crate::meeting::targeting::TargetedMessage;
use crate::profile::Profile;
use crate::prompt::build_system_prompt;

/// One agent's answer to "do you want to respond?"
#[derive(Debug, Clone)]
pub struct ResponseIntent {
    /// The queried agent
    pub agent_name: String,
    /// False when the agent answered `PASS` or its call failed
    pub wants_to_respond: bool,
    /// The generated content (empty on failure)
    pub content: String,
    /// Failure description, surfaced to the user as a warning
    pub error: Option<String>,
}

/// Pick the responder set for a message: explicit targets when directly
/// addressed, the whole roster on broadcast. Roster order is preserved.
#[must_use]
pub fn select_responders<'a>(agents: &'a [Agent], message: &TargetedMessage) -> Vec<&'a Agent> {
    if message.is_direct_target {
        agents
            .iter()
            .filter(|a| {
                message
                    .targeted_agents
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(&a.name))
            })
            .collect()
    } else {
        agents.iter().collect()
    }
}

/// Render the shared log as strictly alternating chat messages.
///
/// Each entry is prefixed with its speaker tag and consecutive same-role
/// entries are coalesced, since the serving endpoint expects alternating
/// user/assistant turns.
#[must_use]
pub fn transcript_messages(session: &MeetingSession) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();
    let mut last_role: Option<Role> = None;
    let mut accumulated = String::new();

    for m in &session.shared_messages {
        let content = match &m.agent_name {
            Some(name) => format!("[{name}]: {}", m.content),
            None => format!("[User]: {}", m.content),
        };

        if last_role == Some(m.role) {
            accumulated.push_str("\n\n");
            accumulated.push_str(&content);
        } else {
            if let (Some(role), false) = (last_role, accumulated.is_empty()) {
                messages.push(to_chat_message(role, std::mem::take(&mut accumulated)));
            }
            last_role = Some(m.role);
            accumulated = content;
        }
    }

    if let (Some(role), false) = (last_role, accumulated.is_empty()) {
        messages.push(to_chat_message(role, accumulated));
    }

    messages
}

fn to_chat_message(role: Role, content: String) -> Message {
    match role {
        Role::User => Message::user(content),
        Role::Assistant => Message::assistant(content),
    }
}

/// Build the completion request for one agent's turn in the meeting.
#[must_use]
pub fn build_agent_request(
    agent: &Agent,
    all_agents: &[Agent],
    session: &MeetingSession,
    profile: &Profile,
    chain_depth: u32,
    broadcast: bool,
) -> ChatRequest {
    let mut system_prompt = build_system_prompt(&agent.system_prompt, Some(agent), profile);
    system_prompt.push_str(&build_meeting_context(agent, all_agents, session, chain_depth));
    if broadcast {
        system_prompt.push_str(broadcast_instruction());
    }

    let mut messages = vec![Message::system(system_prompt)];
    messages.extend(transcript_messages(session));

    ChatRequest::new(&agent.model)
        .with_messages(messages)
        .with_max_tokens(agent.model_params.max_tokens)
        .with_temperature(agent.model_params.temperature)
        .with_top_p(agent.model_params.top_p)
        .with_top_k(agent.model_params.top_k)
}

/// Query every responder concurrently and collect intents in roster order.
pub async fn solicit(
    backend: &dyn ChatBackend,
    responders: &[&Agent],
    all_agents: &[Agent],
    session: &MeetingSession,
    profile: &Profile,
    chain_depth: u32,
    broadcast: bool,
) -> Vec<ResponseIntent> {
    let queries = responders.iter().map(|agent| {
        let request =
            build_agent_request(agent, all_agents, session, profile, chain_depth, broadcast);
        async move {
            match backend.chat(request).await {
                Ok(response) => {
                    let content = response.content().to_string();
                    let wants_to_respond = content.trim().to_uppercase() != "PASS";
                    debug!(agent = %agent.name, wants_to_respond, "intent query complete");
                    ResponseIntent {
                        agent_name: agent.name.clone(),
                        wants_to_respond,
                        content,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(agent = %agent.name, error = %e, "intent query failed");
                    ResponseIntent {
                        agent_name: agent.name.clone(),
                        wants_to_respond: false,
                        content: String::new(),
                        error: Some(e.to_string()),
                    }
                }
            }
        }
    });

    // Results arrive in any order on the wire, but join_all preserves
    // roster order, which keeps first-speaker selection deterministic.
    join_all(queries).await
}
