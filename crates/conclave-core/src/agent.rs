//! Agent definitions
//!
//! An agent is a named model + system prompt configuration stored as one
//! JSON file under `agents/`. Sampling parameters ride along so every
//! completion for the agent is issued with the same tuning.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sampling parameters for an agent's completions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    /// Context window size hint
    pub ctx_size: u32,
    /// Maximum tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
    /// Top-k sampling cutoff
    pub top_k: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            ctx_size: 4096,
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

/// A locally-defined agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Agent name (also the storage key and the @handle in meetings)
    pub name: String,
    /// Model identifier passed to the serving endpoint
    pub model: String,
    /// Base system prompt
    pub system_prompt: String,
    /// Sampling parameters
    #[serde(default)]
    pub model_params: ModelParams,
    /// Free-form attributes rendered into the system prompt
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Create an agent with default parameters
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            model_params: ModelParams::default(),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// First line of the system prompt, truncated for display
    #[must_use]
    pub fn role_summary(&self, max_len: usize) -> String {
        let first_line = self.system_prompt.lines().next().unwrap_or("");
        if first_line.len() <= max_len {
            first_line.to_string()
        } else {
            let end = first_line
                .char_indices()
                .take_while(|(i, _)| *i < max_len)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            format!("{}...", &first_line[..end])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = ModelParams::default();
        assert_eq!(params.ctx_size, 4096);
        assert_eq!(params.max_tokens, 512);
        assert_eq!(params.top_k, 40);
    }

    #[test]
    fn test_camel_case_round_trip() {
        let agent = Agent::new("ceo", "llama3.2", "You are the CEO.");
        let json = serde_json::to_value(&agent).unwrap();
        assert!(json.get("systemPrompt").is_some());
        assert!(json["modelParams"].get("ctxSize").is_some());

        let back: Agent = serde_json::from_value(json).unwrap();
        assert_eq!(back.name, "ceo");
    }

    #[test]
    fn test_role_summary_truncates() {
        let agent = Agent::new("a", "m", "A very long first line that should be cut\nsecond");
        let summary = agent.role_summary(10);
        assert!(summary.ends_with("..."));
        assert!(!summary.contains("second"));
    }
}
