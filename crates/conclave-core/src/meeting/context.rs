//! Meeting context injection
//!
//! Extra system-prompt text that tells an agent who else is in the room,
//! how @handles and response buffering behave, and when to check in with
//! the user. The depth-limit guidance here is advisory; the hard chain
//! cutoff lives in the dispatcher.

use std::fmt::Write;

use crate::agent::Agent;
use crate::meeting::session::MeetingSession;

const RULE: &str = "---------------------------------------------------------------\n";

/// Build the meeting context appended to an agent's system prompt.
#[must_use]
pub fn build_meeting_context(
    current_agent: &Agent,
    all_agents: &[Agent],
    session: &MeetingSession,
    chain_depth: u32,
) -> String {
    let others: Vec<&Agent> = all_agents
        .iter()
        .filter(|a| !a.name.eq_ignore_ascii_case(&current_agent.name))
        .collect();

    let mut ctx = String::new();
    ctx.push_str("\n\n");
    ctx.push_str(RULE);
    ctx.push_str("MEETING CONTEXT\n");
    ctx.push_str(RULE);

    let _ = writeln!(
        ctx,
        "\nYou are in a meeting with {} other agent{}:\n",
        others.len(),
        if others.len() == 1 { "" } else { "s" }
    );
    for agent in &others {
        let _ = writeln!(ctx, "- @{}: {}", agent.name, agent.role_summary(200));
    }

    ctx.push_str("\nADDRESSING OTHER AGENTS\n");
    ctx.push_str(
        "To direct a question to another agent, use their @handle anywhere in \
         your response, e.g. \"I agree. @cto is this feasible?\". You can \
         address several agents in one response.\n",
    );

    ctx.push_str("\nRESPONSE MECHANICS\n");
    let _ = writeln!(
        ctx,
        "- An agent you @mention will respond automatically.\n\
         - Agent-to-agent conversations can chain up to {} levels deep.\n\
         - If you mention several agents, the first streams immediately and \
           the others buffer their responses (they \"raise their hand\"); the \
           user retrieves those with /respond <agent>.",
        session.max_chain_length
    );

    ctx.push_str("\nWHEN TO CHECK IN WITH THE USER\n");
    let _ = writeln!(
        ctx,
        "Check in after roughly {} tokens of agent-to-agent discussion, after \
         major decisions, or when you need user input. To check in, address \
         the user with @user or @{}: summarize the discussion and ask for \
         guidance. Agents mentioned in a check-in buffer their responses \
         instead of continuing the chain.",
        session.check_in_token_limit, session.profile_name
    );

    ctx.push_str("\nRESPONSE FORMATTING\n");
    ctx.push_str(
        "- Speak in your own voice; no prefix is needed.\n\
         - To present multiple perspectives, start each on a new line as \
           \"[agent-name]: ...\" (lowercase name in brackets).\n\
         - NEVER speak as the user. Do not write \"[User]:\" lines or invent \
           user replies. The user is a real person and types their own \
           responses. You may quote what the user previously said.\n",
    );
    let _ = writeln!(
        ctx,
        "- Do not @mention yourself (@{}); you cannot respond to yourself.",
        current_agent.name
    );

    if chain_depth + 1 >= session.max_chain_length {
        ctx.push('\n');
        ctx.push_str(RULE);
        ctx.push_str("CONVERSATION DEPTH LIMIT\n");
        ctx.push_str(RULE);
        let _ = writeln!(
            ctx,
            "You are at chain depth {} of {}. You MUST check in with the user \
             now using @user. Do NOT @mention other agents; summarize the \
             discussion and ask the user how to proceed.",
            chain_depth, session.max_chain_length
        );
    } else if chain_depth + 2 >= session.max_chain_length {
        let _ = writeln!(
            ctx,
            "\nNote: you are approaching the conversation depth limit \
             (current depth {} of {}). Consider checking in with @user soon.",
            chain_depth, session.max_chain_length
        );
    }

    ctx
}

/// Broadcast-mode addendum: ask the agent to `PASS` unless it judges itself
/// the most qualified responder.
#[must_use]
pub fn broadcast_instruction() -> &'static str {
    "\nNOTE: The user's message was not directed at anyone specific. Only \
     respond if you believe you are the most qualified agent in this meeting \
     to answer, based on your role and expertise. If you do not think you \
     should respond, reply with exactly: \"PASS\"\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<Agent> {
        vec![
            Agent::new("ceo", "llama3.2", "You are the CEO."),
            Agent::new("cto", "llama3.2", "You are the CTO."),
            Agent::new("cfo", "llama3.2", "You are the CFO."),
        ]
    }

    fn session() -> MeetingSession {
        MeetingSession::new(
            "boardroom",
            vec!["ceo".into(), "cto".into(), "cfo".into()],
            "alex",
        )
    }

    #[test]
    fn test_lists_other_participants_only() {
        let agents = agents();
        let ctx = build_meeting_context(&agents[0], &agents, &session(), 0);

        assert!(ctx.contains("@cto"));
        assert!(ctx.contains("@cfo"));
        assert!(!ctx.contains("- @ceo"));
        assert!(ctx.contains("Do not @mention yourself (@ceo)"));
    }

    #[test]
    fn test_mentions_profile_handle() {
        let agents = agents();
        let ctx = build_meeting_context(&agents[0], &agents, &session(), 0);
        assert!(ctx.contains("@alex"));
    }

    #[test]
    fn test_no_depth_warning_far_from_limit() {
        let agents = agents();
        let ctx = build_meeting_context(&agents[0], &agents, &session(), 0);
        assert!(!ctx.contains("DEPTH LIMIT"));
        assert!(!ctx.contains("approaching"));
    }

    #[test]
    fn test_soft_warning_two_from_limit() {
        let agents = agents();
        let s = session(); // max_chain_length = 5
        let ctx = build_meeting_context(&agents[0], &agents, &s, 3);
        assert!(ctx.contains("approaching the conversation depth limit"));
        assert!(!ctx.contains("DEPTH LIMIT"));
    }

    #[test]
    fn test_hard_warning_one_from_limit() {
        let agents = agents();
        let s = session();
        let ctx = build_meeting_context(&agents[0], &agents, &s, 4);
        assert!(ctx.contains("CONVERSATION DEPTH LIMIT"));
        assert!(ctx.contains("MUST check in"));
    }
}
