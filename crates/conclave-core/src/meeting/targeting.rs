//! Message targeting resolution
//!
//! Turns a raw user line into structured targeting intent. Resolution is a
//! pure function of the text and the participant roster.
//!
//! Priority: a `name,` direct-address prefix wins outright, even over
//! `@mentions` later in the same text (preserved compatibility quirk: in
//! "ceo, ask @cto about X" only `ceo` is targeted; the mention stays
//! visible to the agent in the content). Otherwise every `@name` match
//! becomes a target. Otherwise the message is a broadcast.

use regex::Regex;

/// Structured targeting intent for one user line (transient, not persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetedMessage {
    /// Message text, with any direct-address prefix stripped
    pub content: String,
    /// Resolved targets in roster order (empty for broadcast)
    pub targeted_agents: Vec<String>,
    /// Whether any explicit target was found
    pub is_direct_target: bool,
}

impl TargetedMessage {
    /// A message addressed at explicit targets (agent-to-agent hops)
    #[must_use]
    pub fn direct(content: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            content: content.into(),
            targeted_agents: targets,
            is_direct_target: true,
        }
    }
}

/// Case-insensitive `^name\s*,\s*` prefix matcher
fn prefix_regex(name: &str) -> Regex {
    Regex::new(&format!(r"(?i)^{}\s*,\s*", regex::escape(name))).expect("valid prefix regex")
}

/// Case-insensitive `@name` word-boundary matcher
fn mention_regex(name: &str) -> Regex {
    Regex::new(&format!(r"(?i)@{}\b", regex::escape(name))).expect("valid mention regex")
}

/// Resolve a raw user line against the participant roster.
#[must_use]
pub fn resolve(input: &str, roster: &[String]) -> TargetedMessage {
    let mut content = input.to_string();
    let mut targeted_agents = Vec::new();
    let mut is_direct_target = false;

    // Direct-address prefix: first roster match wins, prefix is stripped
    for name in roster {
        let pattern = prefix_regex(name);
        if pattern.is_match(&content) {
            targeted_agents.push(name.clone());
            is_direct_target = true;
            content = pattern.replace(&content, "").into_owned();
            break;
        }
    }

    // Mention scan, only when no prefix matched; mentions stay in the text
    if targeted_agents.is_empty() {
        for name in roster {
            if mention_regex(name).is_match(&content) && !targeted_agents.contains(name) {
                targeted_agents.push(name.clone());
                is_direct_target = true;
            }
        }
    }

    TargetedMessage {
        content: content.trim().to_string(),
        targeted_agents,
        is_direct_target,
    }
}

/// `@name` mentions of roster members inside a response, excluding the
/// speaker itself.
#[must_use]
pub fn detect_agent_mentions(content: &str, roster: &[String], exclude: Option<&str>) -> Vec<String> {
    let mut mentions = Vec::new();

    for name in roster {
        if let Some(excluded) = exclude {
            if name.eq_ignore_ascii_case(excluded) {
                continue;
            }
        }
        if mention_regex(name).is_match(content) {
            mentions.push(name.clone());
        }
    }

    mentions
}

/// Whether a response addresses the user directly (`@user` or the profile
/// name), the designed chain-termination signal.
#[must_use]
pub fn is_addressing_user(content: &str, profile_name: &str) -> bool {
    if mention_regex("user").is_match(content) {
        return true;
    }
    !profile_name.is_empty() && mention_regex(profile_name).is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_direct_prefix_strips_and_targets() {
        let r = roster(&["ceo", "cto", "cfo"]);
        let resolved = resolve("ceo, what's our Q1 plan?", &r);

        assert_eq!(resolved.targeted_agents, vec!["ceo"]);
        assert!(resolved.is_direct_target);
        assert_eq!(resolved.content, "what's our Q1 plan?");
    }

    #[test]
    fn test_direct_prefix_case_insensitive() {
        let r = roster(&["ceo", "cto"]);
        let resolved = resolve("CEO , hello there", &r);
        assert_eq!(resolved.targeted_agents, vec!["ceo"]);
        assert_eq!(resolved.content, "hello there");
    }

    #[test]
    fn test_prefix_beats_later_mentions() {
        // Compatibility quirk: the @cto mention is not targeted, though it
        // remains visible in the content.
        let r = roster(&["ceo", "cto"]);
        let resolved = resolve("ceo, ask @cto about X", &r);

        assert_eq!(resolved.targeted_agents, vec!["ceo"]);
        assert_eq!(resolved.content, "ask @cto about X");
    }

    #[test]
    fn test_mentions_collected_in_roster_order() {
        let r = roster(&["ceo", "cto", "cfo"]);
        let resolved = resolve("what do @cfo and @cto think?", &r);

        assert_eq!(resolved.targeted_agents, vec!["cto", "cfo"]);
        assert!(resolved.is_direct_target);
        // Mentions are preserved for downstream chain detection
        assert_eq!(resolved.content, "what do @cfo and @cto think?");
    }

    #[test]
    fn test_mention_requires_word_boundary() {
        let r = roster(&["ceo"]);
        let resolved = resolve("talk to @ceos about it", &r);
        assert!(resolved.targeted_agents.is_empty());
        assert!(!resolved.is_direct_target);
    }

    #[test]
    fn test_broadcast_when_untargeted() {
        let r = roster(&["ceo", "cto"]);
        let resolved = resolve("What should we prioritize?", &r);

        assert!(resolved.targeted_agents.is_empty());
        assert!(!resolved.is_direct_target);
        assert_eq!(resolved.content, "What should we prioritize?");
    }

    #[test]
    fn test_non_participant_names_ignored() {
        let r = roster(&["ceo"]);
        let resolved = resolve("intern, fetch @coffee", &r);
        assert!(resolved.targeted_agents.is_empty());
    }

    #[test]
    fn test_detect_mentions_excludes_speaker() {
        let r = roster(&["ceo", "cto", "cfo"]);
        let mentions =
            detect_agent_mentions("I agree. @ceo and @cfo should weigh in.", &r, Some("ceo"));
        assert_eq!(mentions, vec!["cfo"]);
    }

    #[test]
    fn test_is_addressing_user() {
        assert!(is_addressing_user("@user what do you think?", "alex"));
        assert!(is_addressing_user("@alex should we proceed?", "alex"));
        assert!(!is_addressing_user("@cto please review", "alex"));
        assert!(!is_addressing_user("no mentions here", ""));
    }

    #[test]
    fn test_names_with_regex_metacharacters() {
        let r = roster(&["c++dev"]);
        let resolved = resolve("c++dev, review this", &r);
        assert_eq!(resolved.targeted_agents, vec!["c++dev"]);
    }
}
