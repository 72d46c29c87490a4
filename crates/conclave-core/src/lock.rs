//! Agent lock manager
//!
//! A non-blocking, fail-fast mutex keyed by agent name, backed by one lock
//! file per agent. The file records the owning process id; a lock whose
//! owner is no longer alive is stale and removed as a side effect of the
//! check. Without process visibility (sandboxed environments) a recorded
//! owner is assumed alive, so a lock is never stolen from a live session.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Contents of a lock file
#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    /// Owning process id
    pid: u32,
    /// When the lock was taken
    acquired_at: DateTime<Utc>,
}

/// File-backed agent mutex
#[derive(Debug, Clone)]
pub struct LockManager {
    locks_dir: PathBuf,
}

impl LockManager {
    /// Manager over a lock directory
    #[must_use]
    pub fn new(locks_dir: impl AsRef<Path>) -> Self {
        Self {
            locks_dir: locks_dir.as_ref().to_path_buf(),
        }
    }

    /// Whether an agent is locked by a live owner.
    ///
    /// Stale locks (dead owner, unreadable record) are removed here and
    /// reported as unlocked.
    pub fn is_locked(&self, name: &str) -> Result<bool> {
        let path = self.lock_path(name);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read lock {}: {e}",
                    path.display()
                )))
            }
        };

        let record: LockRecord = match serde_json::from_str(&data) {
            Ok(record) => record,
            Err(_) => {
                warn!(agent = name, "unreadable lock record, removing");
                let _ = fs::remove_file(&path);
                return Ok(false);
            }
        };

        if record.pid == std::process::id() {
            return Ok(true);
        }

        if process_alive(record.pid) {
            Ok(true)
        } else {
            debug!(agent = name, pid = record.pid, "stale lock, removing");
            let _ = fs::remove_file(&path);
            Ok(false)
        }
    }

    /// Acquire the lock for an agent.
    ///
    /// Fails fast with [`Error::AgentBusy`] when a live owner holds it;
    /// never blocks or queues.
    pub fn lock(&self, name: &str) -> Result<()> {
        if self.is_locked(name)? {
            return Err(Error::AgentBusy {
                name: name.to_string(),
            });
        }

        fs::create_dir_all(&self.locks_dir)
            .map_err(|e| Error::Storage(format!("failed to create locks dir: {e}")))?;

        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let path = self.lock_path(name);
        fs::write(&path, serde_json::to_string_pretty(&record)?)
            .map_err(|e| Error::Storage(format!("failed to write lock {}: {e}", path.display())))?;

        debug!(agent = name, "locked");
        Ok(())
    }

    /// Release the lock for an agent. Unlocking an unlocked agent is a no-op.
    pub fn unlock(&self, name: &str) -> Result<()> {
        let path = self.lock_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(agent = name, "unlocked");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "failed to remove lock {}: {e}",
                path.display()
            ))),
        }
    }

    /// Acquire locks for a whole roster, rolling back on the first failure.
    ///
    /// The returned guard releases every lock when dropped, which covers
    /// normal exit, errors, and mode switches alike.
    pub fn lock_all(&self, names: &[String]) -> Result<LockGuard> {
        let mut held: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if let Err(e) = self.lock(name) {
                for locked in &held {
                    let _ = self.unlock(locked);
                }
                return Err(e);
            }
            held.push(name.clone());
        }

        Ok(LockGuard {
            manager: self.clone(),
            names: held,
        })
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", name.to_lowercase()))
    }
}

/// Scoped ownership of a set of agent locks
#[derive(Debug)]
pub struct LockGuard {
    manager: LockManager,
    names: Vec<String>,
}

impl LockGuard {
    /// Agents held by this guard
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Add one more agent to the guard (used by `/add`)
    pub fn extend(&mut self, name: &str) -> Result<()> {
        self.manager.lock(name)?;
        self.names.push(name.to_string());
        Ok(())
    }

    /// Drop an agent from the guard, releasing its lock (used by `/remove`)
    pub fn release_one(&mut self, name: &str) -> Result<()> {
        if let Some(index) = self.names.iter().position(|n| n.eq_ignore_ascii_case(name)) {
            let held = self.names.remove(index);
            self.manager.unlock(&held)?;
        }
        Ok(())
    }

    /// Release everything now (Drop does the same; this surfaces errors)
    pub fn release_all(mut self) -> Result<()> {
        for name in std::mem::take(&mut self.names) {
            self.manager.unlock(&name)?;
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        for name in &self.names {
            if let Err(e) = self.manager.unlock(name) {
                warn!(agent = %name, error = %e, "failed to release lock on drop");
            }
        }
    }
}

/// Whether a pid belongs to a live process.
fn process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[Pid::from_u32(pid)]),
        false,
        ProcessRefreshKind::nothing(),
    );
    if system.process(Pid::from_u32(pid)).is_some() {
        return true;
    }

    // Target not visible. If our own process is invisible too, the process
    // table is opaque here; report "alive" so a live owner never loses its
    // lock to a false stale-detection.
    let own = Pid::from_u32(std::process::id());
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[own]),
        false,
        ProcessRefreshKind::nothing(),
    );
    system.process(own).is_none()
}
