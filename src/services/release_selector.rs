//! Release variant selection
//!
//! Picks the release to hunt for before any search goes out. The dominant
//! track count across all variants is usually the "real" album; an official
//! release with that count beats everything else.

use tracing::debug;

use crate::error::HuntError;
use crate::types::Release;

/// Most frequent track count. Ties go to the value seen first.
pub fn track_count_mode(releases: &[Release]) -> Option<u32> {
    // (value, occurrences) in first-appearance order
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for release in releases {
        match counts.iter_mut().find(|(value, _)| *value == release.track_count) {
            Some((_, n)) => *n += 1,
            None => counts.push((release.track_count, 1)),
        }
    }

    let mut best: Option<(u32, usize)> = None;
    for (value, n) in counts {
        if best.is_none_or(|(_, best_n)| n > best_n) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value)
}

/// Choose exactly one release.
///
/// Preference: official with the mode track count, then the first official,
/// then the first release.
pub fn select_release(releases: &[Release]) -> Result<&Release, HuntError> {
    let mode = track_count_mode(releases).ok_or(HuntError::NoReleases)?;

    let selected = releases
        .iter()
        .find(|r| r.is_official() && r.track_count == mode)
        .or_else(|| releases.iter().find(|r| r.is_official()))
        .or_else(|| releases.first())
        .ok_or(HuntError::NoReleases)?;

    debug!(
        release_id = selected.id,
        track_count = selected.track_count,
        mode,
        candidates = releases.len(),
        "Selected release"
    );

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn release(id: i64, track_count: u32, status: &str) -> Release {
        Release {
            id,
            track_count,
            medium_count: 1,
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_first_encountered_on_tie() {
        let releases = vec![
            release(1, 12, "Official"),
            release(2, 10, "Official"),
            release(3, 10, "Official"),
            release(4, 12, "Official"),
        ];
        assert_eq!(track_count_mode(&releases), Some(12));
        assert_eq!(track_count_mode(&[]), None);
    }

    #[test]
    fn test_official_with_mode_wins() {
        let releases = vec![
            release(1, 10, "Promotion"),
            release(2, 12, "Official"),
            release(3, 10, "Official"),
            release(4, 10, "Bootleg"),
        ];
        assert_eq!(select_release(&releases).unwrap().id, 3);
    }

    #[test]
    fn test_falls_back_to_first_official() {
        let releases = vec![
            release(1, 10, "Promotion"),
            release(2, 10, "Bootleg"),
            release(3, 12, "Official"),
        ];
        let selected = select_release(&releases).unwrap();
        assert_eq!(selected.id, 3);
        assert_eq!(selected.track_count, 12);
    }

    #[test]
    fn test_falls_back_to_first_release() {
        let releases = vec![release(7, 9, "Bootleg"), release(8, 11, "")];
        assert_eq!(select_release(&releases).unwrap().id, 7);
    }

    #[test]
    fn test_no_releases() {
        assert_matches!(select_release(&[]), Err(HuntError::NoReleases));
    }
}
