//! Error types for the soundshift library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **Fatal** to a single call. Admission failed
//!   (no audio in the batch, selection full), a run is already in flight,
//!   or configuration is invalid. Returned as `Err(ConvertError)`; prior
//!   state is left untouched.
//!
//! * [`FileError`]: **Non-fatal**. One file in a batch failed (the proxy
//!   rejected its size, the service answered with an error, the connection
//!   dropped) while every other file is still attempted. Stored inside
//!   [`crate::output::FailedFile`] so callers see partial success.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the soundshift library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::output::BatchResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Admission errors ──────────────────────────────────────────────────
    /// None of the submitted candidates is an accepted audio file.
    #[error("No valid audio files in the selection.\nPick files such as .mp3, .wav, .flac or .m4a.")]
    NoValidFiles,

    /// The selection is already full; nothing from the batch was staged.
    #[error("File limit of {max} reached. Remove some files before adding more.")]
    CapacityExceeded { max: usize },

    // ── Run errors ────────────────────────────────────────────────────────
    /// `start()` was called while another run is still in progress.
    #[error("A conversion is already in progress")]
    AlreadyInProgress,

    /// `start()` was called with an empty selection.
    #[error("Select at least one file to convert")]
    NothingToConvert,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading an input file failed after it was opened.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write a converted file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Closed taxonomy of per-file failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The origin server or an intermediary refused the upload size.
    PayloadTooLarge,
    /// Non-2xx response from the conversion service.
    RemoteError,
    /// 2xx response with a zero-byte body.
    EmptyArtifact,
    /// No response was received at all.
    TransportError,
    /// A message exists but carries no recognised signal.
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::PayloadTooLarge => "payload too large",
            FailureKind::RemoteError => "remote error",
            FailureKind::EmptyArtifact => "empty artifact",
            FailureKind::TransportError => "transport error",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A non-fatal error for a single file.
///
/// The batch continues after any of these; see
/// [`crate::pipeline::failure`] for how raw signals map onto variants.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum FileError {
    /// Rejected for size. `message` already cites the edge limit.
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// The service answered with a non-success status.
    #[error("{message}")]
    RemoteError { status: u16, message: String },

    /// The service answered 2xx but sent no bytes.
    #[error("The converted file is empty. Check that the conversion service's encoder is working.")]
    EmptyArtifact,

    /// The request never produced a response.
    #[error("{message}")]
    TransportError { message: String },

    /// Anything else, passed through verbatim.
    #[error("{message}")]
    Unknown { message: String },
}

impl FileError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            FileError::PayloadTooLarge { .. } => FailureKind::PayloadTooLarge,
            FileError::RemoteError { .. } => FailureKind::RemoteError,
            FileError::EmptyArtifact => FailureKind::EmptyArtifact,
            FileError::TransportError { .. } => FailureKind::TransportError,
            FileError::Unknown { .. } => FailureKind::Unknown,
        }
    }
}
