//! Track-set matching for peer directories
//!
//! Decides whether one peer directory fully covers an album's expected track
//! list. Every expected track must find a filename scoring at or above the
//! threshold; a directory with fewer files than tracks is rejected outright.

use tracing::debug;

use super::similarity::score;
use super::text_utils::{normalize, strip_extension};
use crate::types::{DownloadedTrack, ExpectedTrack};

/// Result of matching a directory's files against expected tracks
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMatchResult {
    /// Every expected track reached the threshold
    pub is_match: bool,
    /// Mean of the per-track best scores (only meaningful when `is_match`)
    pub average_score: f64,
    /// Per-track details, in expected-track order
    pub matches: Vec<TrackMatch>,
}

impl TrackMatchResult {
    /// Default threshold of 80%
    pub const DEFAULT_THRESHOLD: f64 = 0.8;

    fn rejected() -> Self {
        Self {
            is_match: false,
            average_score: 0.0,
            matches: vec![],
        }
    }

    /// Titles whose best candidate stayed below the threshold
    pub fn unmatched_tracks(&self) -> Vec<&str> {
        self.matches
            .iter()
            .filter(|m| !m.matched)
            .map(|m| m.track_title.as_str())
            .collect()
    }
}

/// Best candidate for a single expected track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMatch {
    pub track_title: String,
    /// Best-scoring filename, first one wins on ties
    pub file_name: String,
    pub score: f64,
    pub matched: bool,
}

/// Match expected track titles against a directory's filenames.
///
/// Extensions are stripped from the filenames before scoring. Filenames may
/// still carry a path prefix; the scorer's truncation absorbs it.
pub fn match_tracks<T, F>(expected_titles: &[T], filenames: &[F], threshold: f64) -> TrackMatchResult
where
    T: AsRef<str>,
    F: AsRef<str>,
{
    if expected_titles.is_empty() || filenames.is_empty() {
        return TrackMatchResult::rejected();
    }

    if filenames.len() < expected_titles.len() {
        debug!(
            expected = expected_titles.len(),
            files = filenames.len(),
            "Directory has fewer files than expected tracks"
        );
        return TrackMatchResult::rejected();
    }

    let stems: Vec<&str> = filenames
        .iter()
        .map(|f| strip_extension(f.as_ref()))
        .collect();

    let matches: Vec<TrackMatch> = expected_titles
        .iter()
        .map(|title| best_match(title.as_ref(), filenames, &stems, threshold))
        .collect();

    let is_match = matches.iter().all(|m| m.matched);
    let average_score = matches.iter().map(|m| m.score).sum::<f64>() / matches.len() as f64;

    debug!(
        is_match,
        average_score = format!("{:.3}", average_score),
        unmatched_tracks = ?matches.iter().filter(|m| !m.matched).map(|m| &m.track_title).collect::<Vec<_>>(),
        "Track matching complete"
    );

    TrackMatchResult {
        is_match,
        average_score,
        matches,
    }
}

fn best_match<F: AsRef<str>>(
    title: &str,
    filenames: &[F],
    stems: &[&str],
    threshold: f64,
) -> TrackMatch {
    let mut best: Option<(usize, f64)> = None;

    for (idx, stem) in stems.iter().enumerate() {
        let candidate_score = score(title, stem);
        // Strict comparison keeps the first-encountered file on ties
        if best.is_none_or(|(_, s)| candidate_score > s) {
            best = Some((idx, candidate_score));
        }
    }

    let (idx, best_score) = best.unwrap_or((0, 0.0));
    TrackMatch {
        track_title: title.to_string(),
        file_name: filenames
            .get(idx)
            .map(|f| f.as_ref().to_string())
            .unwrap_or_default(),
        score: best_score,
        matched: best_score >= threshold,
    }
}

/// Disc number for a downloaded file.
///
/// The first expected track (in list order) whose normalized title is
/// contained in the file's normalized stem decides; otherwise disc 1.
pub fn infer_medium(filename: &str, tracks: &[ExpectedTrack]) -> u32 {
    let stem = normalize(strip_extension(filename));

    tracks
        .iter()
        .find(|t| {
            let title = normalize(&t.title);
            !title.is_empty() && stem.contains(&title)
        })
        .map(|t| t.medium_number)
        .unwrap_or(1)
}

/// Pair each file with its inferred disc number
pub fn map_tracks<F: AsRef<str>>(filenames: &[F], tracks: &[ExpectedTrack]) -> Vec<DownloadedTrack> {
    filenames
        .iter()
        .map(|f| DownloadedTrack {
            filename: f.as_ref().to_string(),
            medium_number: infer_medium(f.as_ref(), tracks),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, medium: u32) -> ExpectedTrack {
        ExpectedTrack {
            title: title.to_string(),
            medium_number: medium,
        }
    }

    #[test]
    fn test_match_tracks_exact() {
        let titles = ["Speak to Me", "Breathe", "Time"];
        let files = [
            "01 - Speak to Me.flac",
            "02 - Breathe.flac",
            "03 - Time.flac",
            "cover.jpg",
        ];

        let result = match_tracks(&titles, &files, TrackMatchResult::DEFAULT_THRESHOLD);

        assert!(result.is_match);
        assert_eq!(result.average_score, 1.0);
        assert_eq!(result.matches[1].file_name, "02 - Breathe.flac");
        assert!(result.unmatched_tracks().is_empty());
    }

    #[test]
    fn test_fewer_files_than_tracks_never_matches() {
        let titles = ["One", "Two", "Three"];
        let files = ["One.flac", "Two.flac"];

        let result = match_tracks(&titles, &files, 0.0);

        assert!(!result.is_match);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        let none: [&str; 0] = [];
        assert!(!match_tracks(&none, &["a.flac"], 0.0).is_match);
        assert!(!match_tracks(&["a"], &none, 0.0).is_match);
    }

    #[test]
    fn test_one_unmatched_track_fails_the_set() {
        let titles = ["Speak to Me", "Breathe", "Money"];
        let files = [
            "01 - Speak to Me.flac",
            "02 - Breathe.flac",
            "03 - Completely Unrelated Noise.flac",
        ];

        let result = match_tracks(&titles, &files, 0.8);

        assert!(!result.is_match);
        assert_eq!(result.unmatched_tracks(), vec!["Money"]);
        assert_eq!(result.matches.iter().filter(|m| m.matched).count(), 2);
    }

    #[test]
    fn test_bonus_files_are_fine() {
        let titles = ["Track One", "Track Two"];
        let files = [
            "Artist - Album - Track One.mp3",
            "Artist - Album - Track Two.mp3",
            "Artist - Album - Bonus Cut.mp3",
        ];

        assert!(match_tracks(&titles, &files, 0.8).is_match);
    }

    #[test]
    fn test_ties_keep_first_file() {
        let titles = ["Intro"];
        let files = ["01 - Intro.flac", "07 - Intro.flac"];

        let result = match_tracks(&titles, &files, 0.8);

        assert!(result.is_match);
        assert_eq!(result.matches[0].file_name, "01 - Intro.flac");
    }

    #[test]
    fn test_infer_medium() {
        let tracks = vec![track("Intro", 1), track("Outro", 2)];

        assert_eq!(infer_medium("CD2/05 - Outro.flac", &tracks), 2);
        assert_eq!(infer_medium("01 - INTRO.flac", &tracks), 1);
        assert_eq!(infer_medium("99 - Hidden Track.flac", &tracks), 1);
    }

    #[test]
    fn test_map_tracks() {
        let tracks = vec![track("Alpha", 1), track("Beta", 2)];
        let mapped = map_tracks(&["1-01 Alpha.flac", "2-01 Beta.flac"], &tracks);

        assert_eq!(
            mapped,
            vec![
                DownloadedTrack {
                    filename: "1-01 Alpha.flac".to_string(),
                    medium_number: 1
                },
                DownloadedTrack {
                    filename: "2-01 Beta.flac".to_string(),
                    medium_number: 2
                },
            ]
        );
    }
}
