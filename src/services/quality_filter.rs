//! Audio quality filtering for peer search results
//!
//! The policy is an ordered list of patterns like `"flac"`, `"flac 24/192"`,
//! `"flac 16/44.1"`, `"mp3 320"`. A file is accepted when any pattern
//! matches. Quality constraints only match files that actually report the
//! metadata: a missing bit depth is never treated as a wildcard.

use std::fmt;

use tracing::debug;

use crate::types::CandidateFile;

const LOSSLESS_EXTENSIONS: &[&str] = &["flac", "alac", "wav", "aiff", "aif", "ape", "wv"];
const LOSSY_EXTENSIONS: &[&str] = &["mp3", "ogg", "opus", "aac", "m4a", "wma"];

/// One parsed entry of the allowed-filetype policy
#[derive(Debug, Clone, PartialEq)]
pub enum QualityPattern {
    /// `"<ext>"`: any file with that extension
    Extension(String),
    /// `"<lossless ext> <depth>/<kHz>"`
    Lossless {
        extension: String,
        bit_depth: u32,
        sample_rate: u32,
    },
    /// `"<lossy ext> <kbps>"`
    Lossy { extension: String, bit_rate: u32 },
    /// Anything else; never matches
    Malformed(String),
}

impl QualityPattern {
    pub fn parse(pattern: &str) -> Self {
        let lowered = pattern.to_lowercase();
        let parts: Vec<&str> = lowered.split_whitespace().collect();

        match parts.as_slice() {
            [ext] => QualityPattern::Extension(ext.to_string()),
            [ext, quality] if LOSSLESS_EXTENSIONS.contains(ext) => {
                match parse_depth_rate(quality) {
                    Some((bit_depth, sample_rate)) => QualityPattern::Lossless {
                        extension: ext.to_string(),
                        bit_depth,
                        sample_rate,
                    },
                    None => QualityPattern::Malformed(pattern.to_string()),
                }
            }
            [ext, quality] if LOSSY_EXTENSIONS.contains(ext) => match quality.parse::<u32>() {
                Ok(bit_rate) => QualityPattern::Lossy {
                    extension: ext.to_string(),
                    bit_rate,
                },
                Err(_) => QualityPattern::Malformed(pattern.to_string()),
            },
            _ => QualityPattern::Malformed(pattern.to_string()),
        }
    }

    fn extension(&self) -> Option<&str> {
        match self {
            QualityPattern::Extension(ext) => Some(ext),
            QualityPattern::Lossless { extension, .. } | QualityPattern::Lossy { extension, .. } => {
                Some(extension)
            }
            QualityPattern::Malformed(_) => None,
        }
    }

    /// Whether `file` (with lowercased extension `ext`) satisfies this pattern
    pub fn matches(&self, file: &CandidateFile, ext: &str) -> bool {
        if self.extension() != Some(ext) {
            return false;
        }

        match self {
            QualityPattern::Extension(_) => true,
            QualityPattern::Lossless {
                bit_depth,
                sample_rate,
                ..
            } => file.bit_depth == Some(*bit_depth) && file.sample_rate == Some(*sample_rate),
            QualityPattern::Lossy { bit_rate, .. } => file.bit_rate == Some(*bit_rate),
            QualityPattern::Malformed(_) => false,
        }
    }
}

impl fmt::Display for QualityPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityPattern::Extension(ext) => write!(f, "{ext}"),
            QualityPattern::Lossless {
                extension,
                bit_depth,
                sample_rate,
            } => write!(f, "{extension} {bit_depth}/{sample_rate}Hz"),
            QualityPattern::Lossy {
                extension,
                bit_rate,
            } => write!(f, "{extension} {bit_rate}kbps"),
            QualityPattern::Malformed(raw) => write!(f, "malformed({raw})"),
        }
    }
}

/// Parse `"24/192"` or `"16/44.1"` into (bit depth, sample rate in Hz)
fn parse_depth_rate(quality: &str) -> Option<(u32, u32)> {
    let (depth, rate) = quality.split_once('/')?;
    let depth = depth.parse::<u32>().ok()?;

    let rate = if rate.contains('.') {
        let khz = rate.parse::<f64>().ok()?;
        if !khz.is_finite() || khz <= 0.0 {
            return None;
        }
        (khz * 1000.0).round() as u32
    } else {
        rate.parse::<u32>().ok()?.checked_mul(1000)?
    };

    Some((depth, rate))
}

/// Declarative allowed-format policy
#[derive(Debug, Clone, Default)]
pub struct QualityFilter {
    patterns: Vec<QualityPattern>,
}

impl QualityFilter {
    pub fn new<S: AsRef<str>>(allowed_filetypes: &[S]) -> Self {
        let patterns: Vec<QualityPattern> = allowed_filetypes
            .iter()
            .map(|p| QualityPattern::parse(p.as_ref()))
            .collect();

        for pattern in &patterns {
            if let QualityPattern::Malformed(raw) = pattern {
                debug!(pattern = %raw, "Quality pattern is malformed and will never match");
            }
        }

        Self { patterns }
    }

    /// No patterns configured: every file passes
    pub fn allows_any(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern that accepts `file`, if any
    pub fn matching_pattern(&self, file: &CandidateFile) -> Option<&QualityPattern> {
        let ext = file.extension()?;
        self.patterns.iter().find(|p| p.matches(file, &ext))
    }

    pub fn accepts(&self, file: &CandidateFile) -> bool {
        self.allows_any() || self.matching_pattern(file).is_some()
    }

    /// Files that pass the policy, in their original order
    pub fn filter(&self, files: &[CandidateFile]) -> Vec<CandidateFile> {
        files.iter().filter(|f| self.accepts(f)).cloned().collect()
    }
}
