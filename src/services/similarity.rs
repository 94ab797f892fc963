//! Filename-to-title similarity scoring
//!
//! Peer filenames usually carry a track number, the artist and sometimes the
//! album in front of the title, glued together with whatever separator the
//! uploader liked. Instead of tokenizing those prefixes away, the scorer tries
//! a few "keep only the last N tokens" hypotheses and takes the best one.

use strsim::levenshtein;

use super::text_utils::normalize;

/// Separators tried when truncating a candidate to its title suffix
const TRUNCATION_SEPARATORS: [&str; 3] = [" ", "_", "-"];

/// Similarity between an expected title and a candidate filename stem.
///
/// Both inputs are normalized first. The result is the maximum of the plain
/// edit-distance ratio and one truncated ratio per separator, always in `[0, 1]`.
pub fn score(expected: &str, candidate: &str) -> f64 {
    let expected = normalize(expected);
    let candidate = normalize(candidate);

    TRUNCATION_SEPARATORS
        .iter()
        .map(|sep| truncated_ratio(&expected, &candidate, sep))
        .fold(ratio(&expected, &candidate), f64::max)
}

/// `1 - editDistance / maxLen` over code points.
///
/// Equal strings (including two empty ones) score `1.0`; exactly one empty
/// string scores `0.0`.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Ratio against the last N separator-delimited parts of `candidate`, where N
/// is the number of words in `expected`.
fn truncated_ratio(expected: &str, candidate: &str, separator: &str) -> f64 {
    let word_count = expected.split_whitespace().count();
    if word_count == 0 {
        return 0.0;
    }

    let parts: Vec<&str> = candidate.split(separator).collect();
    if parts.len() <= word_count {
        return ratio(expected, candidate);
    }

    let truncated = parts[parts.len() - word_count..].join(" ");
    ratio(expected, truncated.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_edge_cases() {
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("a", ""), 0.0);
        assert_eq!(ratio("", "a"), 0.0);
        assert_eq!(ratio("abc", "abc"), 1.0);
        assert!((ratio("hello", "helo") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_counts_code_points() {
        // Two single-char strings differ by one substitution
        assert_eq!(ratio("é", "e"), 0.0);
        assert!((ratio("日本", "日木") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_identity_and_empty() {
        assert_eq!(score("Some Title", "Some Title"), 1.0);
        assert_eq!(score("Some Title", "  SOME   title "), 1.0);
        assert_eq!(score("", ""), 1.0);
        assert_eq!(score("a", ""), 0.0);
        assert_eq!(score("", "abc"), 0.0);
    }

    #[test]
    fn test_score_strips_prefixes() {
        assert!(score("Track Name", "Artist - Album - Track Name") >= 0.8);
        assert_eq!(score("One", "01 - Artist X - One"), 1.0);
        assert_eq!(score("Song A", "01_Artist_Song_A"), 1.0);
        assert_eq!(score("Song B", "Artist-Album-Song-B"), 1.0);
    }

    #[test]
    fn test_score_rejects_unrelated() {
        assert!(score("Track Name", "Completely Different Title") < 0.3);
        assert!(score("Two", "01 - Artist X - One") < 0.3);
    }

    #[test]
    fn test_score_ignores_accents() {
        assert_eq!(score("Déjà Vu", "03 - Deja Vu"), 1.0);
    }

    #[test]
    fn test_score_bounds() {
        let pairs = [
            ("a", "b"),
            ("long expected title here", "x"),
            ("x", "a - b - c - d - e - f"),
            ("one two three", "one_two"),
            ("", "anything"),
            ("ünïcödé", "unicode"),
        ];
        for (expected, candidate) in pairs {
            let s = score(expected, candidate);
            assert!((0.0..=1.0).contains(&s), "{expected:?} vs {candidate:?} = {s}");
        }
    }
}
