//! Input resolution: turn user-supplied files into [`Candidate`]s.
//!
//! A candidate carries just enough to decide admission (`name`, `size`,
//! `mime_type`) plus a [`Payload`] that is only read when the file is
//! actually submitted. Local paths are checked for existence and read
//! permission up front, and the first bytes are sniffed for a MIME type so
//! the classifier has something beyond the extension to go on.

use crate::error::ConvertError;
use bytes::Bytes;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the bytes of a candidate live.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Already in memory (tests, embedders that received an upload).
    Memory(Bytes),
    /// On disk; read at submission time.
    File(PathBuf),
}

/// A raw input before any acceptance checks.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub name: String,
    pub size: u64,
    /// Possibly empty.
    pub mime_type: String,
    #[serde(skip)]
    pub payload: Payload,
}

impl Candidate {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            payload,
        }
    }

    /// In-memory candidate whose size is the byte length.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self::new(name, data.len() as u64, mime_type, Payload::Memory(data))
    }

    /// Identity key used for de-duplication.
    pub fn identity(&self) -> (&str, u64) {
        (&self.name, self.size)
    }

    /// Lower-cased extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Load the payload bytes for submission.
    pub async fn read_payload(&self) -> Result<Bytes, ConvertError> {
        match &self.payload {
            Payload::Memory(b) => Ok(b.clone()),
            Payload::File(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| ConvertError::ReadFailed {
                    path: path.clone(),
                    source: e,
                }),
        }
    }
}

/// Resolve a local path to a candidate, validating existence and sniffing
/// the MIME type from the file header.
pub fn resolve_path(path: impl AsRef<Path>) -> Result<Candidate, ConvertError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(ConvertError::InputNotFound { path });
    }

    let mut header = [0u8; 12];
    let read = match std::fs::File::open(&path) {
        Ok(mut f) => read_header(&mut f, &mut header).map_err(|e| ConvertError::ReadFailed {
            path: path.clone(),
            source: e,
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => return Err(ConvertError::InputNotFound { path }),
    };

    let size = std::fs::metadata(&path)
        .map_err(|e| ConvertError::ReadFailed {
            path: path.clone(),
            source: e,
        })?
        .len();

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = sniff_mime(&header[..read]).unwrap_or_default();

    debug!("Resolved {} ({} bytes, mime {:?})", path.display(), size, mime);
    Ok(Candidate::new(name, size, mime, Payload::File(path)))
}

/// A path that could not be turned into a candidate.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadableInput {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of resolving a list of paths.
#[derive(Debug, Default)]
pub struct ResolvedInputs {
    /// In argument order.
    pub candidates: Vec<Candidate>,
    pub unreadable: Vec<UnreadableInput>,
}

/// Resolve every path on its own. A missing or unreadable path is recorded
/// and skipped; the rest still become candidates.
pub fn resolve_paths<P: AsRef<Path>>(paths: &[P]) -> ResolvedInputs {
    let mut resolved = ResolvedInputs::default();
    for path in paths {
        let path = path.as_ref();
        match resolve_path(path) {
            Ok(candidate) => resolved.candidates.push(candidate),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                resolved.unreadable.push(UnreadableInput {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }
    resolved
}

fn read_header(f: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match f.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Best-effort MIME detection from magic bytes.
///
/// Only the containers worth recognising without an extension are listed.
pub fn sniff_mime(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(b"ID3")
        || header.starts_with(&[0xFF, 0xFB])
        || header.starts_with(&[0xFF, 0xF3])
    {
        return Some("audio/mpeg");
    }
    if header.starts_with(b"fLaC") {
        return Some("audio/flac");
    }
    if header.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    if header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WAVE" {
        return Some("audio/wav");
    }
    if header.len() >= 12 && &header[..4] == b"FORM" && &header[8..12] == b"AIFF" {
        return Some("audio/aiff");
    }
    if header.len() >= 8 && &header[4..8] == b"ftyp" {
        return Some("audio/mp4");
    }
    None
}
