//! Wanted-list page cursor for incrementing-page mode

use std::path::Path;

use anyhow::{Context, Result};

use super::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTracker {
    current: u32,
}

impl Default for PageTracker {
    fn default() -> Self {
        Self { current: 1 }
    }
}

impl PageTracker {
    pub fn new(current: u32) -> Self {
        Self {
            current: current.max(1),
        }
    }

    /// Load from disk; a missing or blank file starts at page 1
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read page cursor {}", path.display()));
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let page = trimmed
            .parse::<u32>()
            .with_context(|| format!("Invalid page number {:?} in {}", trimmed, path.display()))?;
        Ok(Self::new(page))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.current.to_string().as_bytes()).await
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Next page, wrapping to 1 past `total_pages`
    pub fn advance(self, total_pages: u32) -> Self {
        let next = self.current.saturating_add(1);
        Self {
            current: if next > total_pages { 1 } else { next },
        }
    }
}
