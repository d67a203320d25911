//! Output naming: `Content-Disposition` first, derived name otherwise.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::path::Path;

/// `filename*=` (RFC 5987) value, charset and language prefix included.
static FILENAME_EXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\*\s*=\s*"?([^";]+)"?"#).expect("valid regex")
});

/// Plain `filename=` value, quoted or bare.
static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]*)"|([^;]+))"#).expect("valid regex")
});

/// Extract a file name from a `Content-Disposition` header value.
///
/// `filename*` wins over `filename`. Surrounding quotes, the RFC 5987
/// `charset''` prefix and any directory components are removed. Returns
/// `None` if nothing usable is left.
pub fn from_content_disposition(header: &str) -> Option<String> {
    let raw = FILENAME_EXT_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| decode_ext_value(m.as_str()))
        .or_else(|| {
            FILENAME_RE
                .captures(header)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().to_string())
        })?;
    sanitize(&raw)
}

/// `UTF-8''na%C3%AFve.mp3` → `naïve.mp3`.
fn decode_ext_value(value: &str) -> String {
    let encoded = match value.split_once("''") {
        Some((_, rest)) => rest,
        None => value,
    };
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

fn sanitize(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('"').trim();
    let base = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

/// Name for an artifact the service did not name.
///
/// Replaces the last extension of `original` with `extension`, or appends
/// it when `original` has none.
pub fn output_name(original: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(original);
    format!("{stem}.{extension}")
}
