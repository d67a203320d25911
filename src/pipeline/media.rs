//! Format/type classification: is a candidate an audio file we can send?
//!
//! Two independent signals are accepted, either one is enough:
//! the lower-cased filename extension against an allow-list, or the MIME
//! type against a prefix. An empty MIME type never matches, so the
//! extension alone decides for inputs that carry no type.

use crate::pipeline::input::Candidate;
use serde::{Deserialize, Serialize};

/// Audio container extensions accepted by default.
pub const AUDIO_EXTENSIONS: [&str; 28] = [
    "mp3", "wav", "flac", "ogg", "aac", "m4a", "mp4", "wma", "aiff", "aif", "opus", "amr", "3gp",
    "ac3", "eac3", "dts", "mp2", "mpa", "ra", "rm", "au", "snd", "voc", "wv", "ape", "tta", "tak",
    "webm",
];

/// MIME prefix accepted by default.
pub const AUDIO_MIME_PREFIX: &str = "audio/";

/// Extension allow-list plus MIME prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFilter {
    /// Lower-case, without the leading dot.
    pub extensions: Vec<String>,
    /// Matched with `starts_with`; an empty prefix disables MIME matching.
    pub mime_prefix: String,
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self {
            extensions: AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            mime_prefix: AUDIO_MIME_PREFIX.to_string(),
        }
    }
}

impl MediaFilter {
    /// Filter for a single-purpose deployment that converts one container,
    /// e.g. `single_container("mp4", "video/mp4")`.
    pub fn single_container(extension: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            extensions: vec![extension.into().trim_start_matches('.').to_ascii_lowercase()],
            mime_prefix: mime_type.into(),
        }
    }

    pub fn is_accepted_media(&self, candidate: &Candidate) -> bool {
        if let Some(ext) = candidate.extension() {
            if self.extensions.iter().any(|e| *e == ext) {
                return true;
            }
        }
        !candidate.mime_type.is_empty()
            && !self.mime_prefix.is_empty()
            && candidate.mime_type.starts_with(&self.mime_prefix)
    }
}

/// Classify with the default audio filter.
pub fn is_accepted_media(candidate: &Candidate) -> bool {
    MediaFilter::default().is_accepted_media(candidate)
}
