//! Small pieces of state persisted next to the downloads
//!
//! - [`denylist`]: per-album failure counters
//! - [`page_tracker`]: wanted-list cursor for incrementing-page mode
//! - [`lockfile`]: single-instance lock

pub mod denylist;
pub mod lockfile;
pub mod page_tracker;

pub use denylist::{Denylist, DenylistEntry};
pub use lockfile::LockFile;
pub use page_tracker::PageTracker;

use std::path::Path;

use anyhow::{Context, Result};

pub const DENYLIST_FILE: &str = "search_denylist.json";
pub const PAGE_FILE: &str = ".current_page.txt";
pub const LOCK_FILE: &str = ".seekarr.lock";

/// Write `contents` to a temp file beside `path`, then rename over it
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name.trim_start_matches('.'), std::process::id()));

    if let Err(e) = tokio::fs::write(&tmp_path, contents).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e).with_context(|| format!("Failed to write {}", tmp_path.display()));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    Ok(())
}
