//! # soundshift
//!
//! Client-side orchestrator for batch audio conversion against a remote
//! HTTP conversion service.
//!
//! The service does the transcoding. This crate does everything around it:
//! deciding which files are audio, keeping the batch within the upload
//! limits the server declares, sending the files one by one, explaining
//! each failure in plain words and summarising the outcome.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Limits     fetch server-declared ceilings (fallback 50 MB / 50 MB)
//!  ├─ 2. Admission  audio filter → size filter → capacity → de-duplication
//!  ├─ 3. Submit     multipart POST per file: file, quality, format
//!  ├─ 4. Classify   413 / JSON error / empty body / transport failure
//!  └─ 5. Summarise  headline, download actions, error banner, warning
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use soundshift::{
//!     resolve_paths, summarize, ConversionOptions, Converter, ConverterConfig, LimitsResolver,
//!     SelectionSet,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder()
//!         .base_url("http://localhost:5000")
//!         .build()?;
//!
//!     let limits = LimitsResolver::from_config(&config)?.refresh().await;
//!     let mut selection = SelectionSet::from_config(&config);
//!     let report = selection.submit(
//!         resolve_paths(&["intro.wav", "outro.flac"]).candidates,
//!         &limits,
//!         &config.media_filter,
//!     )?;
//!     eprintln!("{} staged, {} oversized", report.added, report.oversized.len());
//!
//!     let converter = Converter::new(config)?;
//!     let result = converter
//!         .start(selection.files(), &limits, &ConversionOptions::default())
//!         .await?;
//!     result.save_all("converted").await?;
//!     println!("{:?}", summarize(&result).headline);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `soundshift` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! soundshift = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod limits;
pub mod messages;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod selection;
pub mod stream;
pub mod summary;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionOptions, ConverterConfig, ConverterConfigBuilder, MAX_FILES};
pub use convert::Converter;
pub use error::{ConvertError, FailureKind, FileError};
pub use limits::{LimitsHandle, LimitsResolver, LimitsStatus, ServerLimits};
pub use output::{human_size, BatchResult, ConversionOutcome, ConvertedFile, FailedFile};
pub use pipeline::input::{
    resolve_path, resolve_paths, Candidate, Payload, ResolvedInputs, UnreadableInput,
};
pub use pipeline::media::{is_accepted_media, MediaFilter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent};
pub use selection::{AdmissionReport, SelectionSet, StagedFile};
pub use stream::{convert_stream, BatchEvent, BatchStream};
pub use summary::{summarize, DisplayModel, DownloadAction, DownloadAll};
