//! Lidarr v1 API client
//!
//! Lidarr is the catalog: it knows which albums are wanted, which release
//! variants and tracks they have, and imports finished downloads.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::traits::{CatalogService, CommandStatus, WantedPage, WantedSource};
use crate::types::{Album, ExpectedTrack, Release};

/// Import scans can run for minutes
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Queue entries fetched when looking for already-queued albums
const QUEUE_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WantedResponse {
    #[serde(default)]
    total_records: u64,
    #[serde(default)]
    records: Vec<Album>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueResponse {
    #[serde(default)]
    records: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueItem {
    #[serde(default)]
    album_id: Option<i64>,
}

impl QueueResponse {
    fn album_ids(self) -> HashSet<i64> {
        self.records.into_iter().filter_map(|r| r.album_id).collect()
    }
}

/// HTTP client for a Lidarr instance
pub struct LidarrClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl LidarrClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Lidarr HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, endpoint))
            .header("X-Api-Key", &self.api_key)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Lidarr request failed: {}", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Lidarr {} returned {}: {}", what, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Lidarr response: {}", what))
    }
}

#[async_trait]
impl CatalogService for LidarrClient {
    async fn wanted_albums(
        &self,
        source: WantedSource,
        page: u32,
        page_size: u32,
    ) -> Result<WantedPage> {
        let endpoint = format!("/api/v1/wanted/{}", source.path_segment());
        let request = self.request(Method::GET, &endpoint).query(&[
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("includeArtist", "true".to_string()),
        ]);

        let response: WantedResponse = self.send(request, "get wanted").await?;
        debug!(
            source = %source,
            page,
            total = response.total_records,
            returned = response.records.len(),
            "Fetched wanted albums"
        );

        Ok(WantedPage {
            total_records: response.total_records,
            records: response.records,
        })
    }

    async fn releases(&self, album_id: i64) -> Result<Vec<Release>> {
        let request = self.request(Method::GET, &format!("/api/v1/album/{}", album_id));
        let album: Album = self
            .send(request, "get album")
            .await
            .with_context(|| format!("Failed to fetch album {}", album_id))?;
        Ok(album.releases)
    }

    async fn tracks(&self, album_id: i64) -> Result<Vec<ExpectedTrack>> {
        let request = self
            .request(Method::GET, "/api/v1/track")
            .query(&[("albumId", album_id)]);
        self.send(request, "get tracks")
            .await
            .with_context(|| format!("Failed to fetch tracks for album {}", album_id))
    }

    async fn queued_album_ids(&self) -> Result<HashSet<i64>> {
        let request = self
            .request(Method::GET, "/api/v1/queue")
            .query(&[("page", 1), ("pageSize", QUEUE_PAGE_SIZE)]);
        let response: QueueResponse = self.send(request, "get queue").await?;
        Ok(response.album_ids())
    }

    async fn post_command(&self, name: &str, path: &str) -> Result<CommandStatus> {
        let request = self
            .request(Method::POST, "/api/v1/command")
            .json(&json!({ "name": name, "path": path }));
        self.send(request, "post command")
            .await
            .with_context(|| format!("Failed to post {} for {}", name, path))
    }

    async fn command(&self, id: i64) -> Result<CommandStatus> {
        let request = self.request(Method::GET, &format!("/api/v1/command/{}", id));
        self.send(request, "get command").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_wanted_response() {
        let body = r#"{
            "page": 1,
            "pageSize": 10,
            "totalRecords": 42,
            "records": [{
                "id": 7,
                "title": "Album Y",
                "artistId": 3,
                "monitored": true,
                "artist": {"id": 3, "artistName": "Artist X"},
                "releases": [{"id": 70, "albumId": 7, "trackCount": 2, "mediumCount": 1,
                              "country": ["GB"], "format": "CD", "status": "Official"}]
            }]
        }"#;

        let response: WantedResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.total_records, 42);
        let album = &response.records[0];
        assert_eq!(album.search_query(), "Artist X Album Y");
        assert_eq!(album.releases[0].track_count, 2);
        assert!(album.releases[0].is_official());
    }

    #[test]
    fn test_parse_tracks_default_medium() {
        let body = r#"[
            {"id": 1, "title": "One", "albumId": 7, "mediumNumber": 2},
            {"id": 2, "title": "Two", "albumId": 7}
        ]"#;

        let tracks: Vec<ExpectedTrack> = serde_json::from_str(body).unwrap();

        assert_eq!(tracks[0].medium_number, 2);
        assert_eq!(tracks[1].medium_number, 1);
    }

    #[test]
    fn test_queue_album_ids_skip_missing() {
        let body = r#"{"records": [{"id": 1, "albumId": 5}, {"id": 2}, {"id": 3, "albumId": null}]}"#;

        let response: QueueResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.album_ids(), HashSet::from([5]));
    }

    #[test]
    fn test_parse_command_status() {
        let body = r#"{"id": 9, "name": "DownloadedAlbumsScan", "status": "completed",
                       "message": "Completed", "body": {"path": "/music/A"}}"#;

        let status: CommandStatus = serde_json::from_str(body).unwrap();

        assert_eq!(status.id, 9);
        assert!(status.is_finished());
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = LidarrClient::new("http://lidarr:8686/", "key").unwrap();
        assert_eq!(client.base_url, "http://lidarr:8686");
    }
}
