//! Albums that keep failing to find a match
//!
//! Passed into a hunt and handed back updated; the processor persists it
//! once per pass.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::write_atomic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenylistEntry {
    pub album_id: i64,
    pub failures: u32,
    pub last_attempt: DateTime<Utc>,
}

/// Failure counters keyed by album id (as a string, matching the JSON file)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denylist {
    entries: HashMap<String, DenylistEntry>,
}

impl Denylist {
    /// Load from disk; a missing file is an empty denylist
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse denylist {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read denylist {}", path.display())),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize denylist")?;
        write_atomic(path, &json).await
    }

    pub fn is_denylisted(&self, album_id: i64, max_failures: u32) -> bool {
        self.entry(album_id)
            .is_some_and(|e| e.failures >= max_failures)
    }

    /// Success clears the album; failure bumps its counter
    pub fn record_attempt(&mut self, album_id: i64, success: bool) {
        let key = album_id.to_string();

        if success {
            self.entries.remove(&key);
            return;
        }

        let entry = self.entries.entry(key).or_insert_with(|| DenylistEntry {
            album_id,
            failures: 0,
            last_attempt: Utc::now(),
        });
        entry.failures += 1;
        entry.last_attempt = Utc::now();
    }

    pub fn entry(&self, album_id: i64) -> Option<&DenylistEntry> {
        self.entries.get(&album_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
