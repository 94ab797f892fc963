//! Reorganizes finished downloads into the layout the catalog imports from
//!
//! slskd drops each download into a folder named after the remote directory.
//! Single-disc albums are renamed to `<artist>`; multi-disc albums get their
//! disc numbers tagged and are moved into `<artist>/<album>/`.
//!
//! Everything here is blocking filesystem and tag I/O; callers on the async
//! runtime should go through `spawn_blocking`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use tracing::{debug, info, warn};

use super::text_utils::sanitize_folder_name;
use crate::types::AcquisitionItem;

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Outcome of organizing a batch of albums
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizeReport {
    /// Top-level folder (under the download dir) of each organized album
    pub folders: Vec<String>,
    pub failed: usize,
}

pub struct Organizer {
    download_dir: PathBuf,
}

impl Organizer {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    /// Organize every album; one album failing does not stop the others
    pub fn organize_all(&self, items: &[AcquisitionItem]) -> OrganizeReport {
        let mut report = OrganizeReport::default();

        for item in items {
            match self.organize_album(item) {
                Ok(folder) => report.folders.push(folder),
                Err(e) => {
                    warn!(
                        artist = %item.artist_name,
                        album = %item.album_title,
                        error = %e,
                        "Failed to organize album"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Organize one album, returning the top-level folder name it ended up in
    pub fn organize_album(&self, item: &AcquisitionItem) -> Result<String> {
        let artist_folder = folder_or(&item.artist_name, UNKNOWN_ARTIST);

        if item.medium_count > 1 {
            self.organize_multi_disc(item, &artist_folder)
        } else {
            self.organize_single_disc(item, &artist_folder)
        }
    }

    fn organize_single_disc(&self, item: &AcquisitionItem, artist_folder: &str) -> Result<String> {
        let old_path = self.download_dir.join(item.folder_name());
        let mut new_path = self.download_dir.join(artist_folder);

        if !old_path.exists() {
            bail!("Source folder does not exist: {}", old_path.display());
        }

        if old_path == new_path {
            debug!(path = %new_path.display(), "Folder already correctly named");
            return Ok(artist_folder.to_string());
        }

        if new_path.exists() {
            new_path = find_available_path(&new_path);
        }

        info!(
            from = %old_path.display(),
            to = %new_path.display(),
            "Renaming album folder"
        );
        fs::rename(&old_path, &new_path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                old_path.display(),
                new_path.display()
            )
        })?;

        Ok(file_name_of(&new_path))
    }

    fn organize_multi_disc(&self, item: &AcquisitionItem, artist_folder: &str) -> Result<String> {
        let folder_path = self.download_dir.join(item.folder_name());
        if !folder_path.is_dir() {
            bail!("Source folder does not exist: {}", folder_path.display());
        }

        for track in &item.tracks {
            let file_path = folder_path.join(&track.filename);
            if let Err(e) = tag_disc(
                &file_path,
                &item.artist_name,
                &item.album_title,
                track.medium_number,
            ) {
                warn!(file = %track.filename, error = %e, "Failed to tag file");
            }
        }

        let album_dir = self
            .download_dir
            .join(artist_folder)
            .join(folder_or(&item.album_title, UNKNOWN_ALBUM));
        fs::create_dir_all(&album_dir)
            .with_context(|| format!("Failed to create {}", album_dir.display()))?;

        let entries = fs::read_dir(&folder_path)
            .with_context(|| format!("Failed to read {}", folder_path.display()))?;

        for entry in entries.filter_map(|e| e.ok()) {
            let src = entry.path();
            if src.is_dir() {
                continue;
            }

            let mut dst = album_dir.join(entry.file_name());
            if dst.exists() {
                dst = find_available_path(&dst);
            }

            if let Err(e) = fs::rename(&src, &dst) {
                warn!(
                    from = %src.display(),
                    to = %dst.display(),
                    error = %e,
                    "Failed to move file"
                );
            }
        }

        if let Err(e) = fs::remove_dir(&folder_path) {
            warn!(path = %folder_path.display(), error = %e, "Failed to remove original folder");
        }

        info!(
            artist = %item.artist_name,
            album = %item.album_title,
            discs = item.medium_count,
            "Organized multi-disc album"
        );

        Ok(artist_folder.to_string())
    }
}

fn folder_or(name: &str, fallback: &str) -> String {
    let sanitized = sanitize_folder_name(name);
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First free `<name>_N` (or `<stem>_N.<ext>` for files) next to `base`
pub fn find_available_path(base: &Path) -> PathBuf {
    let dir = base.parent().unwrap_or_else(|| Path::new(""));
    let is_dir = base.is_dir();

    let (name, ext) = match (is_dir, base.extension()) {
        (false, Some(ext)) => (
            base.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Some(ext.to_string_lossy().into_owned()),
        ),
        _ => (file_name_of(base), None),
    };

    (1..)
        .map(|i| match &ext {
            Some(ext) => dir.join(format!("{}_{}.{}", name, i, ext)),
            None => dir.join(format!("{}_{}", name, i)),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| base.to_path_buf())
}

/// Write artist, album, album-artist and disc number into the file's primary tag
pub fn tag_disc(path: &Path, artist: &str, album: &str, disc: u32) -> Result<()> {
    let mut tagged_file = Probe::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .read()
        .with_context(|| format!("Failed to read tags from {}", path.display()))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .context("Audio file has no writable tag")?;

    tag.set_artist(artist.to_string());
    tag.set_album(album.to_string());
    tag.insert_text(ItemKey::AlbumArtist, artist.to_string());
    if disc > 0 {
        tag.set_disk(disc);
    }

    tag.save_to_path(path, WriteOptions::default())
        .with_context(|| format!("Failed to write tags to {}", path.display()))?;

    debug!(file = %path.display(), disc, "Tagged disc number");
    Ok(())
}
