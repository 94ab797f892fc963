//! Typed per-album outcomes of a hunt.
//!
//! Collaborator and process plumbing uses `anyhow`; the orchestrator needs to
//! branch on why an album produced nothing, so those reasons get an enum.

/// Why an album did not produce an acquisition item
#[derive(Debug, thiserror::Error)]
pub enum HuntError {
    /// The catalog lists no release variants for the album
    #[error("no releases available")]
    NoReleases,

    /// Releases or tracks could not be fetched
    #[error("catalog error: {0:#}")]
    Catalog(anyhow::Error),

    /// The peer search could not be issued or read back
    #[error("search error: {0:#}")]
    Search(anyhow::Error),

    /// Every returned directory was filtered out or failed matching
    #[error("no matching directory among {groups} search results")]
    NoMatch { groups: usize },

    /// Skipped: failed too many times before
    #[error("denylisted after {failures} failed searches")]
    Denylisted { failures: u32 },

    /// Skipped: title contains a blacklisted word
    #[error("title matches blacklist entry {pattern:?}")]
    Blacklisted { pattern: String },

    /// Shutdown was requested before anything was enqueued
    #[error("cancelled")]
    Cancelled,
}

impl HuntError {
    /// Skips are not failures and leave the denylist untouched
    pub fn is_skip(&self) -> bool {
        matches!(self, HuntError::Denylisted { .. } | HuntError::Blacklisted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_skip() {
        assert!(HuntError::Denylisted { failures: 3 }.is_skip());
        assert!(
            HuntError::Blacklisted {
                pattern: "live".into()
            }
            .is_skip()
        );
        assert!(!HuntError::NoReleases.is_skip());
        assert!(!HuntError::NoMatch { groups: 2 }.is_skip());
        assert!(!HuntError::Cancelled.is_skip());
    }

    #[test]
    fn test_display() {
        let err = HuntError::Search(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "search error: connection refused");
    }
}
