//! User profiles
//!
//! A profile carries user attributes that are appended to every agent's
//! system prompt. Agents address the user as `@<profile name>` in meetings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile name
    pub name: String,
    /// Free-form attributes rendered into system prompts
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Create an empty profile
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
