//! After-sales staff roster.
//!
//! The roster is edited through administrative calls and persisted as a JSON
//! document (`[{"nick_name": "..."}]`). Each analysis run takes a
//! [`RosterSnapshot`] before it starts, so later edits never leak into a run
//! already in flight.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::FilterConfig;
use crate::error::RosterError;
use crate::pipeline::classifier::parse_messages;
use crate::pipeline::types::RawRecord;

/// One entry of the persisted roster document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffEntry {
    pub nick_name: String,
}

/// Immutable view of the roster, shared by one run.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    lookup: Arc<HashSet<String>>,
}

impl RosterSnapshot {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            lookup: Arc::new(names.into_iter().collect()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains(name)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

/// Persistent, mutable roster.
pub struct RosterStore {
    path: PathBuf,
    names: RwLock<Vec<String>>,
}

impl RosterStore {
    /// Open the roster at `path`. A missing file is an empty roster.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RosterError> {
        let path = path.into();
        let names = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let entries: Vec<StaffEntry> = serde_json::from_slice(&bytes)?;
                entries.into_iter().map(|e| e.nick_name).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Roster file missing, starting with an empty roster");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), staff = names.len(), "Loaded staff roster");
        Ok(Self {
            path,
            names: RwLock::new(names),
        })
    }

    /// In-memory roster that is never written to disk.
    pub fn in_memory(names: Vec<String>) -> Self {
        Self {
            path: PathBuf::new(),
            names: RwLock::new(names),
        }
    }

    pub async fn list(&self) -> Vec<String> {
        self.names.read().await.clone()
    }

    pub async fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot::new(self.names.read().await.clone())
    }

    /// Replace the whole roster. Names are trimmed; blanks and repeats dropped.
    pub async fn replace(&self, names: Vec<String>) -> Result<Vec<String>, RosterError> {
        let cleaned = clean_names(names);
        let mut guard = self.names.write().await;
        self.persist(&cleaned).await?;
        *guard = cleaned.clone();
        info!(staff = cleaned.len(), "Roster replaced");
        Ok(cleaned)
    }

    pub async fn add(&self, name: &str) -> Result<String, RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::BlankName);
        }

        let mut guard = self.names.write().await;
        if guard.iter().any(|n| n == name) {
            return Err(RosterError::Duplicate(name.to_string()));
        }
        let mut next = guard.clone();
        next.push(name.to_string());
        self.persist(&next).await?;
        *guard = next;
        info!(nick_name = name, "Staff member added");
        Ok(name.to_string())
    }

    pub async fn remove(&self, name: &str) -> Result<(), RosterError> {
        let mut guard = self.names.write().await;
        let Some(pos) = guard.iter().position(|n| n == name) else {
            return Err(RosterError::NotFound(name.to_string()));
        };
        let mut next = guard.clone();
        next.remove(pos);
        self.persist(&next).await?;
        *guard = next;
        info!(nick_name = name, "Staff member removed");
        Ok(())
    }

    async fn persist(&self, names: &[String]) -> Result<(), RosterError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }

        let entries: Vec<StaffEntry> = names
            .iter()
            .map(|n| StaffEntry {
                nick_name: n.clone(),
            })
            .collect();
        let json = serde_json::to_vec_pretty(&entries)?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to write roster");
            RosterError::Io(e)
        })
    }
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}

/// Collect storefront staff nicknames appearing in a chat dataset.
///
/// Any sender or receiver carrying the store prefix counts, except the service
/// assistant account. Rows whose messages do not parse are skipped.
pub fn extract_staff(records: &[RawRecord], config: &FilterConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for record in records {
        let Ok(messages) = parse_messages(record) else {
            continue;
        };
        for message in &messages {
            for nick in [&message.sender_id, &message.receiver_id].into_iter().flatten() {
                let prefix = config.store_prefix.as_str();
                if !nick.contains(prefix) || *nick == config.assistant_account {
                    continue;
                }
                if nick.rsplit(prefix).next().unwrap_or_default().is_empty() {
                    continue;
                }
                if seen.insert(nick.clone()) {
                    found.push(nick.clone());
                }
            }
        }
    }

    found
}
