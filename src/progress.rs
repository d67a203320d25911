//! Progress events and the callback trait that receives them.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to receive
//! events while a run walks the selection, or use
//! [`crate::stream::convert_stream`] to get the same events as a `Stream`.
//!
//! # Example
//!
//! ```rust
//! use soundshift::{BatchProgressCallback, ConverterConfig, ProgressEvent};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl BatchProgressCallback for Printer {
//!     fn on_progress(&self, event: &ProgressEvent) {
//!         eprintln!("{:.0}% {:?}", event.percent, event.current_file);
//!     }
//! }
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::FileError;
use crate::output::ConvertedFile;
use serde::Serialize;
use std::sync::Arc;

/// Highest percentage reported while files are still in flight.
pub const RUNNING_PERCENT_CAP: f64 = 95.0;

/// Snapshot of run progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Files finished so far.
    pub completed: usize,
    pub total: usize,
    /// File being sent (sequential mode) or just finished (concurrent mode).
    /// `None` on the final event.
    pub current_file: Option<String>,
    /// 0–100. Capped at [`RUNNING_PERCENT_CAP`] until the run completes.
    pub percent: f64,
}

impl ProgressEvent {
    /// Event emitted before sending file `index` (0-based) of `total`.
    pub fn before_file(index: usize, total: usize, name: impl Into<String>) -> Self {
        Self {
            completed: index,
            total,
            current_file: Some(name.into()),
            percent: running_percent(index + 1, total),
        }
    }

    /// Event emitted after `completed` files have finished, concurrent mode.
    pub fn after_file(completed: usize, total: usize, name: impl Into<String>) -> Self {
        Self {
            completed,
            total,
            current_file: Some(name.into()),
            percent: running_percent(completed, total),
        }
    }

    /// The terminal 100% event.
    pub fn finished(total: usize) -> Self {
        Self {
            completed: total,
            total,
            current_file: None,
            percent: 100.0,
        }
    }
}

fn running_percent(step: usize, total: usize) -> f64 {
    if total == 0 {
        return RUNNING_PERCENT_CAP;
    }
    (100.0 * step as f64 / total as f64).min(RUNNING_PERCENT_CAP)
}

/// Called by the conversion pipeline as it processes each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `concurrency > 1` the per-file methods may be
/// called in completion order rather than selection order.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file is sent.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called with every progress snapshot, including the final 100% one.
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = event;
    }

    /// Called when file `index` (0-based, selection order) converted.
    fn on_file_complete(&self, index: usize, total: usize, file: &ConvertedFile) {
        let _ = (index, total, file);
    }

    /// Called when file `index` failed; the batch continues.
    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &FileError) {
        let _ = (index, total, name, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
