//! CLI configuration
//!
//! One `config.json` at the storage root tracks the active profile, the
//! default agent, and the model-serving endpoint.

use serde::{Deserialize, Serialize};

use conclave_llm::DEFAULT_BASE_URL;

/// Persisted CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Active profile name
    pub current_profile: String,
    /// Default agent for `run` without arguments
    #[serde(default)]
    pub current_agent: Option<String>,
    /// Model-serving endpoint base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_profile: "default".to_string(),
            current_agent: None,
            endpoint: default_endpoint(),
        }
    }
}

impl Config {
    /// Endpoint with the `CONCLAVE_ENDPOINT` environment override applied
    #[must_use]
    pub fn effective_endpoint(&self) -> String {
        std::env::var("CONCLAVE_ENDPOINT").unwrap_or_else(|_| self.endpoint.clone())
    }
}
