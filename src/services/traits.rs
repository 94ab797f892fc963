//! Collaborator capabilities the acquisition pipeline consumes
//!
//! The pipeline only ever talks to these traits. The HTTP clients in
//! [`super::lidarr`] and [`super::slskd`] implement them for real services;
//! tests implement them in memory.

use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Album, CandidateGroup, EnqueueFile, ExpectedTrack, Release, TransferDirectory};

/// Which catalog wanted-list to pull albums from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WantedSource {
    #[default]
    Missing,
    CutoffUnmet,
}

impl WantedSource {
    /// Path segment under `/api/v1/wanted/`
    pub fn path_segment(&self) -> &'static str {
        match self {
            WantedSource::Missing => "missing",
            WantedSource::CutoffUnmet => "cutoff",
        }
    }
}

impl fmt::Display for WantedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WantedSource::Missing => write!(f, "missing"),
            WantedSource::CutoffUnmet => write!(f, "cutoff_unmet"),
        }
    }
}

/// One page of the wanted list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WantedPage {
    pub total_records: u64,
    pub records: Vec<Album>,
}

/// State of a catalog command (e.g. an import scan)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandStatus {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl CommandStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}

/// Catalog / library manager
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn wanted_albums(&self, source: WantedSource, page: u32, page_size: u32)
    -> Result<WantedPage>;

    async fn releases(&self, album_id: i64) -> Result<Vec<Release>>;

    async fn tracks(&self, album_id: i64) -> Result<Vec<ExpectedTrack>>;

    /// Album ids already sitting in the catalog's download queue
    async fn queued_album_ids(&self) -> Result<HashSet<i64>>;

    async fn post_command(&self, name: &str, path: &str) -> Result<CommandStatus>;

    async fn command(&self, id: i64) -> Result<CommandStatus>;
}

/// Parameters of a peer search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub search_text: String,
    pub search_timeout_ms: u64,
    pub maximum_peer_queue: u32,
    pub minimum_peer_upload_speed: u64,
}

/// Opaque handle of a running search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchHandle {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    InProgress,
    Completed,
}

/// Peer file-sharing network
#[async_trait]
pub trait PeerService: Send + Sync {
    /// Server version, used as a connectivity check
    async fn version(&self) -> Result<String>;

    async fn search(&self, request: &SearchRequest) -> Result<SearchHandle>;

    async fn search_state(&self, handle: &SearchHandle) -> Result<SearchStatus>;

    /// Results grouped per (peer, directory), peer order then directory order
    async fn search_results(&self, handle: &SearchHandle) -> Result<Vec<CandidateGroup>>;

    async fn delete_search(&self, handle: &SearchHandle) -> Result<()>;

    async fn enqueue(&self, peer: &str, files: &[EnqueueFile]) -> Result<()>;

    async fn cancel_transfer(&self, peer: &str, file_id: &str) -> Result<()>;

    async fn list_transfers(&self) -> Result<Vec<TransferDirectory>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wanted_source_serde() {
        let source: WantedSource = serde_yaml::from_str("cutoff_unmet").unwrap();
        assert_eq!(source, WantedSource::CutoffUnmet);
        assert_eq!(source.path_segment(), "cutoff");
        assert_eq!(WantedSource::default().path_segment(), "missing");
    }

    #[test]
    fn test_command_finished() {
        let mut status = CommandStatus {
            status: "started".into(),
            ..Default::default()
        };
        assert!(!status.is_finished());
        status.status = "completed".into();
        assert!(status.is_finished());
        status.status = "failed".into();
        assert!(status.is_finished());
    }
}
