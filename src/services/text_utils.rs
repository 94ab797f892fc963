//! Shared text normalization utilities
//!
//! Everything the matcher compares goes through [`normalize`] first, so
//! accents, case and stray whitespace never count against a score.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonicalize a text fragment for comparison.
///
/// Compatibility-decomposes, drops combining marks, recomposes, lowercases,
/// collapses whitespace runs to a single space and trims.
///
/// # Example
/// ```
/// use seekarr::services::text_utils::normalize;
/// assert_eq!(normalize("  Beyoncé   Déjà Vu "), "beyonce deja vu");
/// ```
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect();

    // Lowercasing can reintroduce a combining mark ('İ' -> "i\u{307}")
    stripped
        .to_lowercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove the file extension, keeping dot-files intact.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}

/// Make an artist/album name safe to use as a folder name.
pub fn sanitize_folder_name(name: &str) -> String {
    sanitize_filename::sanitize(name).trim().to_string()
}
