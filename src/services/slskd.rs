//! slskd v0 API client
//!
//! slskd is a Soulseek daemon with an HTTP API. Search responses and transfer
//! listings come back with Windows-style paths; everything leaving this module
//! uses forward slashes for directories.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::traits::{PeerService, SearchHandle, SearchRequest, SearchStatus};
use crate::types::{
    CandidateFile, CandidateGroup, EnqueueFile, TransferDirectory, TransferFile,
    normalize_remote_path,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    search_text: &'a str,
    search_timeout: u64,
    filter_responses: bool,
    maximum_peer_queue_length: u32,
    minimum_peer_upload_speed: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    id: String,
    #[serde(default)]
    state: String,
}

/// One peer's answer to a search
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerResponse {
    username: String,
    #[serde(default)]
    files: Vec<CandidateFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDownloads {
    username: String,
    #[serde(default)]
    directories: Vec<DirectoryDownloads>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryDownloads {
    directory: String,
    #[serde(default)]
    files: Vec<DownloadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadFile {
    id: String,
    filename: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    bytes_transferred: u64,
    #[serde(default)]
    size: u64,
}

/// Split peer responses into (peer, directory) groups.
///
/// Groups follow peer order, then the order each directory first appears in
/// that peer's file list. File order within a group is preserved.
fn group_by_directory(responses: Vec<PeerResponse>) -> Vec<CandidateGroup> {
    let mut groups = Vec::new();

    for response in responses {
        let mut peer_groups: Vec<CandidateGroup> = Vec::new();
        for file in response.files {
            let directory = file.directory();
            match peer_groups.iter_mut().find(|g| g.directory == directory) {
                Some(group) => group.files.push(file),
                None => peer_groups.push(CandidateGroup {
                    peer: response.username.clone(),
                    directory,
                    files: vec![file],
                }),
            }
        }
        groups.extend(peer_groups);
    }

    groups
}

fn flatten_downloads(downloads: Vec<UserDownloads>) -> Vec<TransferDirectory> {
    downloads
        .into_iter()
        .flat_map(|user| {
            let peer = user.username;
            user.directories
                .into_iter()
                .map(move |dir| TransferDirectory {
                    peer: peer.clone(),
                    directory: normalize_remote_path(&dir.directory),
                    files: dir
                        .files
                        .into_iter()
                        .map(|f| TransferFile {
                            id: f.id,
                            filename: f.filename,
                            state: f.state,
                            bytes_transferred: f.bytes_transferred,
                            size: f.size,
                        })
                        .collect(),
                })
        })
        .collect()
}

/// HTTP client for an slskd instance
pub struct SlskdClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl SlskdClient {
    pub fn new(host_url: &str, api_key: &str, url_base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build slskd HTTP client")?;

        let prefix = url_base.trim_matches('/');
        let host = host_url.trim_end_matches('/');
        let base_url = if prefix.is_empty() {
            host.to_string()
        } else {
            format!("{}/{}", host, prefix)
        };

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            client,
        })
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, endpoint))
            .header("X-API-Key", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("slskd request failed: {}", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("slskd {} returned {}: {}", what, status, body);
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse slskd response: {}", what))
    }
}

#[async_trait]
impl PeerService for SlskdClient {
    async fn version(&self) -> Result<String> {
        let body = self
            .send(self.request(Method::GET, "/api/v0/application/version"), "get version")
            .await?
            .text()
            .await
            .context("Failed to read slskd version")?;
        Ok(body.trim().trim_matches('"').to_string())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchHandle> {
        let body = SearchBody {
            search_text: &request.search_text,
            search_timeout: request.search_timeout_ms,
            filter_responses: true,
            maximum_peer_queue_length: request.maximum_peer_queue,
            minimum_peer_upload_speed: request.minimum_peer_upload_speed,
        };

        let response: SearchResponse = self
            .send_json(self.request(Method::POST, "/api/v0/searches").json(&body), "search")
            .await
            .with_context(|| format!("Failed to start search for {:?}", request.search_text))?;

        debug!(search_id = %response.id, state = %response.state, "Search initiated");
        Ok(SearchHandle { id: response.id })
    }

    async fn search_state(&self, handle: &SearchHandle) -> Result<SearchStatus> {
        let endpoint = format!("/api/v0/searches/{}", handle.id);
        let response: SearchResponse = self
            .send_json(self.request(Method::GET, &endpoint), "get search state")
            .await?;

        Ok(if response.state.starts_with("Completed") {
            SearchStatus::Completed
        } else {
            SearchStatus::InProgress
        })
    }

    async fn search_results(&self, handle: &SearchHandle) -> Result<Vec<CandidateGroup>> {
        let endpoint = format!("/api/v0/searches/{}/responses", handle.id);
        let responses: Vec<PeerResponse> = self
            .send_json(self.request(Method::GET, &endpoint), "get search results")
            .await?;

        debug!(search_id = %handle.id, peers = responses.len(), "Fetched search results");
        Ok(group_by_directory(responses))
    }

    async fn delete_search(&self, handle: &SearchHandle) -> Result<()> {
        let endpoint = format!("/api/v0/searches/{}", handle.id);
        self.send(self.request(Method::DELETE, &endpoint), "delete search")
            .await?;
        Ok(())
    }

    async fn enqueue(&self, peer: &str, files: &[EnqueueFile]) -> Result<()> {
        let endpoint = format!("/api/v0/transfers/downloads/{}", peer);
        self.send(self.request(Method::POST, &endpoint).json(files), "enqueue downloads")
            .await
            .with_context(|| format!("Failed to enqueue {} files from {}", files.len(), peer))?;
        Ok(())
    }

    async fn cancel_transfer(&self, peer: &str, file_id: &str) -> Result<()> {
        let endpoint = format!("/api/v0/transfers/downloads/{}/{}", peer, file_id);
        self.send(self.request(Method::DELETE, &endpoint), "cancel download")
            .await?;
        Ok(())
    }

    async fn list_transfers(&self) -> Result<Vec<TransferDirectory>> {
        let downloads: Vec<UserDownloads> = self
            .send_json(self.request(Method::GET, "/api/v0/transfers/downloads"), "get downloads")
            .await?;
        Ok(flatten_downloads(downloads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_group_by_directory_preserves_order() {
        let body = r#"[
            {"username": "alice", "files": [
                {"filename": "Music\\B\\01.flac", "size": 1, "bitDepth": 16, "sampleRate": 44100},
                {"filename": "Music\\A\\01.flac", "size": 2},
                {"filename": "Music\\B\\02.flac", "size": 3}
            ]},
            {"username": "bob", "files": [
                {"filename": "Music\\A\\01.mp3", "size": 4, "bitRate": 320}
            ]}
        ]"#;

        let responses: Vec<PeerResponse> = serde_json::from_str(body).unwrap();
        let groups = group_by_directory(responses);

        let summary: Vec<(&str, &str, usize)> = groups
            .iter()
            .map(|g| (g.peer.as_str(), g.directory.as_str(), g.files.len()))
            .collect();
        assert_eq!(
            summary,
            vec![("alice", "Music/B", 2), ("alice", "Music/A", 1), ("bob", "Music/A", 1)]
        );
        assert_eq!(groups[0].files[1].filename, "Music\\B\\02.flac");
        assert_eq!(groups[0].files[0].bit_depth, Some(16));
        assert_eq!(groups[2].files[0].bit_rate, Some(320));
    }

    #[test]
    fn test_flatten_downloads_normalizes_directories() {
        let body = r#"[
            {"username": "alice", "directories": [
                {"directory": "Music\\Album", "files": [
                    {"id": "f1", "filename": "Music\\Album\\01.flac", "state": "Completed, Succeeded",
                     "bytesTransferred": 10, "size": 10},
                    {"id": "f2", "filename": "Music\\Album\\02.flac", "state": "InProgress",
                     "bytesTransferred": 3, "size": 10}
                ]}
            ]}
        ]"#;

        let downloads: Vec<UserDownloads> = serde_json::from_str(body).unwrap();
        let listing = flatten_downloads(downloads);

        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].peer, "alice");
        assert_eq!(listing[0].directory, "Music/Album");
        assert_eq!(listing[0].files[1].id, "f2");
        assert_eq!(listing[0].files[1].bytes_transferred, 3);
    }

    #[test]
    fn test_search_body_wire_names() {
        let body = SearchBody {
            search_text: "Artist X Album Y",
            search_timeout: 5000,
            filter_responses: true,
            maximum_peer_queue_length: 50,
            minimum_peer_upload_speed: 0,
        };

        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["searchText"], "Artist X Album Y");
        assert_eq!(value["maximumPeerQueueLength"], 50);
        assert_eq!(value["filterResponses"], true);
    }

    #[test]
    fn test_url_base_prefix() {
        let plain = SlskdClient::new("http://slskd:5030/", "k", "/").unwrap();
        assert_eq!(plain.base_url, "http://slskd:5030");

        let prefixed = SlskdClient::new("http://host", "k", "/slskd/").unwrap();
        assert_eq!(prefixed.base_url, "http://host/slskd");
    }
}
