//! System prompt assembly
//!
//! Combines an agent's base prompt with its own attributes and the active
//! profile's attributes, rendered as markdown sections.

use std::collections::BTreeMap;

use crate::agent::Agent;
use crate::profile::Profile;

/// Build the full system prompt for an agent under a profile.
#[must_use]
pub fn build_system_prompt(base_prompt: &str, agent: Option<&Agent>, profile: &Profile) -> String {
    let mut prompt = base_prompt.to_string();

    if let Some(agent) = agent {
        if !agent.attributes.is_empty() {
            prompt.push_str("\n\n# Agent Attributes\n\n");
            prompt.push_str(&format_attributes(&agent.attributes));
        }
    }

    if !profile.attributes.is_empty() {
        prompt.push_str("\n\n# User Attributes\n\n");
        prompt.push_str(&format_attributes(&profile.attributes));
    }

    prompt
}

/// Render attribute maps as markdown bullet lines.
fn format_attributes(attributes: &BTreeMap<String, serde_json::Value>) -> String {
    let mut lines = Vec::new();

    for (key, value) in attributes {
        let formatted_key = title_case(key);
        match value {
            serde_json::Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("**{formatted_key}**: {joined}"));
            }
            serde_json::Value::Object(map) => {
                lines.push(format!("**{formatted_key}**:"));
                for (sub_key, sub_value) in map {
                    lines.push(format!(
                        "  - {}: {}",
                        title_case(sub_key),
                        scalar_to_string(sub_value)
                    ));
                }
            }
            other => {
                lines.push(format!("**{formatted_key}**: {}", scalar_to_string(other)));
            }
        }
    }

    lines.join("\n")
}

/// Split a camelCase key into capitalized words ("preferredName" -> "Preferred Name").
fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else {
            if c.is_uppercase() {
                out.push(' ');
            }
            out.push(c);
        }
    }
    out
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_prompt_unchanged_without_attributes() {
        let profile = Profile::new("default");
        let prompt = build_system_prompt("You are helpful.", None, &profile);
        assert_eq!(prompt, "You are helpful.");
    }

    #[test]
    fn test_attributes_appended() {
        let mut agent = Agent::new("ceo", "llama3.2", "You are the CEO.");
        agent
            .attributes
            .insert("focusArea".into(), serde_json::json!("growth"));

        let mut profile = Profile::new("alex");
        profile
            .attributes
            .insert("preferredName".into(), serde_json::json!("Alex"));
        profile
            .attributes
            .insert("interests".into(), serde_json::json!(["rust", "sailing"]));

        let prompt = build_system_prompt(&agent.system_prompt, Some(&agent), &profile);
        assert!(prompt.contains("# Agent Attributes"));
        assert!(prompt.contains("**Focus Area**: growth"));
        assert!(prompt.contains("# User Attributes"));
        assert!(prompt.contains("**Preferred Name**: Alex"));
        assert!(prompt.contains("**Interests**: rust, sailing"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("preferredName"), "Preferred Name");
        assert_eq!(title_case("name"), "Name");
    }
}
