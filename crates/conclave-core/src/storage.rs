//! JSON-file storage
//!
//! Everything lives under one base directory (default `~/.conclave`,
//! overridable with `CONCLAVE_HOME`):
//!
//! ```text
//! config.json
//! profiles/<name>.json
//! agents/<name>.json
//! sessions/<id>.json      (chat-<agent> and room-<name> records)
//! archive/<name>.json
//! locks/<agent>.lock
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::chat::ChatSession;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::meeting::session::MeetingSession;
use crate::profile::Profile;

/// An archived conversation; rooms and single-agent chats share the archive.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ArchivedSession {
    /// A meeting room (recognized by its `roomName` field)
    Meeting(MeetingSession),
    /// A single-agent chat
    Chat(ChatSession),
}

/// File-backed storage for agents, profiles, sessions, and archives
#[derive(Debug, Clone)]
pub struct Storage {
    base_dir: PathBuf,
}

impl Storage {
    /// Storage rooted at `CONCLAVE_HOME` or `~/.conclave`
    #[must_use]
    pub fn new() -> Self {
        let base_dir = std::env::var("CONCLAVE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".conclave")
            });
        Self { base_dir }
    }

    /// Storage rooted at an explicit directory (tests)
    #[must_use]
    pub fn with_base_dir(path: impl AsRef<Path>) -> Self {
        Self {
            base_dir: path.as_ref().to_path_buf(),
        }
    }

    /// The storage root
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding agent lock files
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.base_dir.join("locks")
    }

    /// Create the directory tree plus a default config and profile
    pub fn init(&self) -> Result<()> {
        for sub in ["profiles", "agents", "sessions", "archive", "locks"] {
            fs::create_dir_all(self.base_dir.join(sub))
                .map_err(|e| Error::Storage(format!("failed to create {sub} dir: {e}")))?;
        }

        let config_path = self.base_dir.join("config.json");
        if !config_path.exists() {
            self.save_config(&Config::default())?;
        }

        if self.load_profile("default").is_err() {
            self.save_profile(&Profile::new("default"))?;
        }

        debug!(base_dir = %self.base_dir.display(), "storage initialized");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Config
    // ------------------------------------------------------------------

    /// Load `config.json`, falling back to defaults when missing
    pub fn load_config(&self) -> Result<Config> {
        match read_json(&self.base_dir.join("config.json")) {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Ok(Config::default()),
            Err(e) => Err(e),
        }
    }

    /// Persist `config.json`
    pub fn save_config(&self, config: &Config) -> Result<()> {
        write_json(&self.base_dir.join("config.json"), config)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Load a profile by name
    pub fn load_profile(&self, name: &str) -> Result<Profile> {
        read_json(&self.profile_path(name))?.ok_or_else(|| Error::ProfileNotFound {
            name: name.to_string(),
        })
    }

    /// Persist a profile
    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        write_json(&self.profile_path(&profile.name), profile)
    }

    /// List profile names
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        list_json_stems(&self.base_dir.join("profiles"))
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.base_dir.join("profiles").join(format!("{name}.json"))
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Load an agent definition by name
    pub fn load_agent(&self, name: &str) -> Result<Agent> {
        read_json(&self.agent_path(name))?.ok_or_else(|| Error::AgentNotFound {
            name: name.to_string(),
        })
    }

    /// Persist an agent definition
    pub fn save_agent(&self, agent: &Agent) -> Result<()> {
        write_json(&self.agent_path(&agent.name), agent)
    }

    /// Delete an agent definition
    pub fn delete_agent(&self, name: &str) -> Result<()> {
        remove_file(&self.agent_path(name))
    }

    /// List agent names
    pub fn list_agents(&self) -> Result<Vec<String>> {
        list_json_stems(&self.base_dir.join("agents"))
    }

    fn agent_path(&self, name: &str) -> PathBuf {
        self.base_dir.join("agents").join(format!("{name}.json"))
    }

    // ------------------------------------------------------------------
    // Sessions (single-agent chats and meeting rooms)
    // ------------------------------------------------------------------

    /// Load a single-agent chat session
    pub fn load_chat_session(&self, id: &str) -> Result<ChatSession> {
        read_json(&self.session_path(id))?.ok_or_else(|| Error::SessionNotFound {
            id: id.to_string(),
        })
    }

    /// Persist a single-agent chat session
    pub fn save_chat_session(&self, session: &ChatSession) -> Result<()> {
        write_json(&self.session_path(&session.id), session)
    }

    /// Load a meeting session.
    ///
    /// A record that fails to parse is treated as missing: the caller
    /// creates a fresh room instead of crashing on a corrupt file.
    pub fn load_meeting_session(&self, id: &str) -> Result<MeetingSession> {
        let path = self.session_path(id);
        match read_json::<MeetingSession>(&path) {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(Error::SessionNotFound { id: id.to_string() }),
            Err(e) => {
                warn!(%id, error = %e, "meeting session unreadable, treating as missing");
                Err(Error::SessionNotFound { id: id.to_string() })
            }
        }
    }

    /// Persist a meeting session
    pub fn save_meeting_session(&self, session: &MeetingSession) -> Result<()> {
        write_json(&self.session_path(&session.id), session)
    }

    /// Delete a session record
    pub fn delete_session(&self, id: &str) -> Result<()> {
        remove_file(&self.session_path(id))
    }

    /// List session ids
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        list_json_stems(&self.base_dir.join("sessions"))
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{}.json", sanitize_id(id)))
    }

    // ------------------------------------------------------------------
    // Archive
    // ------------------------------------------------------------------

    /// Save a conversation under an archive name
    pub fn save_archive(&self, name: &str, session: &ArchivedSession) -> Result<()> {
        write_json(&self.archive_path(name), session)
    }

    /// Load an archived conversation
    pub fn load_archive(&self, name: &str) -> Result<ArchivedSession> {
        read_json(&self.archive_path(name))?.ok_or_else(|| Error::SessionNotFound {
            id: name.to_string(),
        })
    }

    /// List archive names
    pub fn list_archives(&self) -> Result<Vec<String>> {
        list_json_stems(&self.base_dir.join("archive"))
    }

    fn archive_path(&self, name: &str) -> PathBuf {
        self.base_dir
            .join("archive")
            .join(format!("{}.json", sanitize_id(name)))
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep ids filesystem-safe: path separators and dots become dashes.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | '.' | ':' => '-',
            other => other,
        })
        .collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };
    Ok(Some(serde_json::from_str(&data)?))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Storage(format!("failed to create {}: {e}", parent.display())))?;
    }
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)
        .map_err(|e| Error::Storage(format!("failed to write {}: {e}", path.display())))
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Storage(format!(
            "failed to remove {}: {e}",
            path.display()
        ))),
    }
}

fn list_json_stems(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::Storage(format!(
                "failed to read {}: {e}",
                dir.display()
            )))
        }
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
