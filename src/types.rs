//! Core data model shared by the matcher, the orchestrator and the collaborators
//!
//! These are already-deserialized values: the HTTP clients map their wire
//! formats onto them and the pipeline never sees JSON.

use serde::{Deserialize, Serialize};

/// Artist as reported by the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    #[serde(default)]
    pub id: i64,
    pub artist_name: String,
}

/// A wanted album with whatever releases the catalog attached to it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub artist: Artist,
    #[serde(default)]
    pub releases: Vec<Release>,
}

impl Album {
    /// Query text sent to the peer network
    pub fn search_query(&self) -> String {
        format!("{} {}", self.artist.artist_name, self.title)
    }
}

/// One catalog variant/pressing of an album
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub album_id: i64,
    #[serde(default)]
    pub track_count: u32,
    #[serde(default)]
    pub medium_count: u32,
    #[serde(default)]
    pub country: Vec<String>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub status: String,
}

impl Release {
    pub fn is_official(&self) -> bool {
        self.status.eq_ignore_ascii_case("official")
    }
}

/// A track the album is expected to contain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedTrack {
    pub title: String,
    #[serde(default = "default_medium")]
    pub medium_number: u32,
}

fn default_medium() -> u32 {
    1
}

/// A file advertised by a peer in a search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFile {
    /// Full remote path, separators exactly as the peer sent them
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub bit_rate: Option<u32>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub bit_depth: Option<u32>,
}

impl CandidateFile {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            size,
            ..Default::default()
        }
    }

    /// Remote path with backslashes turned into forward slashes
    pub fn normalized_path(&self) -> String {
        normalize_remote_path(&self.filename)
    }

    /// Directory portion of the normalized path (`"."` when there is none)
    pub fn directory(&self) -> String {
        match self.normalized_path().rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => dir.to_string(),
            Some(_) => "/".to_string(),
            None => ".".to_string(),
        }
    }

    /// Last path component
    pub fn base_name(&self) -> String {
        let path = self.normalized_path();
        match path.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None => path,
        }
    }

    /// Lowercased extension without the leading dot
    pub fn extension(&self) -> Option<String> {
        let name = self.base_name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_lowercase()),
            _ => None,
        }
    }
}

/// Convert a peer path (usually Windows-style) to forward slashes
pub fn normalize_remote_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// One peer's one directory from a search response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateGroup {
    pub peer: String,
    pub directory: String,
    pub files: Vec<CandidateFile>,
}

/// A file to hand to the peer network's download queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueFile {
    pub filename: String,
    pub size: u64,
}

impl From<&CandidateFile> for EnqueueFile {
    fn from(file: &CandidateFile) -> Self {
        Self {
            filename: file.filename.clone(),
            size: file.size,
        }
    }
}

/// A downloaded file and the disc it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedTrack {
    pub filename: String,
    pub medium_number: u32,
}

/// The chosen candidate group bound to an album
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionItem {
    pub album_id: i64,
    pub artist_name: String,
    pub album_title: String,
    pub peer: String,
    /// Normalized remote directory
    pub directory: String,
    pub medium_count: u32,
    /// Exactly the files that were enqueued
    pub files: Vec<EnqueueFile>,
    pub tracks: Vec<DownloadedTrack>,
}

impl AcquisitionItem {
    /// Name of the local folder the peer network downloads into
    pub fn folder_name(&self) -> String {
        match self.directory.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => name.to_string(),
            _ => self.directory.trim_matches('/').to_string(),
        }
    }
}

/// Classified state of one remote transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Completed,
    Errored,
    InProgress,
}

const ERRORED_STATES: &[&str] = &[
    "Completed, Cancelled",
    "Completed, TimedOut",
    "Completed, Errored",
    "Completed, Rejected",
];

impl TransferState {
    /// Classify a composite `"Phase, Status"` state string
    pub fn classify(state: &str) -> Self {
        if ERRORED_STATES.contains(&state) {
            TransferState::Errored
        } else if state.starts_with("Completed") {
            TransferState::Completed
        } else {
            TransferState::InProgress
        }
    }
}

/// One file of a remote transfer listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferFile {
    pub id: String,
    pub filename: String,
    pub state: String,
    pub bytes_transferred: u64,
    pub size: u64,
}

impl TransferFile {
    pub fn status(&self) -> TransferState {
        TransferState::classify(&self.state)
    }
}

/// Transfers for one (peer, directory) pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferDirectory {
    pub peer: String,
    pub directory: String,
    pub files: Vec<TransferFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_file_paths() {
        let file = CandidateFile::new("Music\\Artist\\Album\\01 - Intro.FLAC", 10);
        assert_eq!(file.normalized_path(), "Music/Artist/Album/01 - Intro.FLAC");
        assert_eq!(file.directory(), "Music/Artist/Album");
        assert_eq!(file.base_name(), "01 - Intro.FLAC");
        assert_eq!(file.extension(), Some("flac".to_string()));
    }

    #[test]
    fn test_candidate_file_without_extension() {
        assert_eq!(CandidateFile::new("dir/README", 1).extension(), None);
        assert_eq!(CandidateFile::new(".hidden", 1).extension(), None);
        assert_eq!(CandidateFile::new("track.mp3", 1).directory(), ".");
    }

    #[test]
    fn test_transfer_state_classification() {
        assert_eq!(TransferState::classify("Completed, Succeeded"), TransferState::Completed);
        assert_eq!(TransferState::classify("Completed, Errored"), TransferState::Errored);
        assert_eq!(TransferState::classify("Completed, TimedOut"), TransferState::Errored);
        assert_eq!(TransferState::classify("InProgress"), TransferState::InProgress);
        assert_eq!(TransferState::classify("Queued, Remotely"), TransferState::InProgress);
        assert_eq!(TransferState::classify(""), TransferState::InProgress);
    }

    #[test]
    fn test_official_release_is_case_insensitive() {
        let release = Release {
            status: "OFFICIAL".to_string(),
            ..Default::default()
        };
        assert!(release.is_official());
        assert!(!Release::default().is_official());
    }

    #[test]
    fn test_folder_name() {
        let item = AcquisitionItem {
            album_id: 1,
            artist_name: "A".into(),
            album_title: "B".into(),
            peer: "p".into(),
            directory: "Music/Artist/Album Name".into(),
            medium_count: 1,
            files: vec![],
            tracks: vec![],
        };
        assert_eq!(item.folder_name(), "Album Name");
    }
}
