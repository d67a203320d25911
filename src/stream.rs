//! Streaming conversion API: emit events as the run progresses.
//!
//! Unlike [`crate::convert::Converter::start`], which returns only after
//! every file was attempted, [`convert_stream`] hands back a `Stream` of
//! [`BatchEvent`]s right away and drives the run on a background task. The
//! last item is always [`BatchEvent::Completed`] carrying the full result.

use crate::config::ConversionOptions;
use crate::convert::Converter;
use crate::error::{ConvertError, FileError};
use crate::limits::ServerLimits;
use crate::output::{BatchResult, ConvertedFile, FailedFile};
use crate::progress::{BatchProgressCallback, ProgressEvent};
use crate::selection::StagedFile;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::{info, warn};

/// One observable step of a run.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Progress(ProgressEvent),
    /// File `index` (selection order) converted.
    FileConverted { index: usize, file: ConvertedFile },
    /// File `index` failed; the run continues.
    FileFailed { index: usize, failure: FailedFile },
    /// Terminal event.
    Completed(BatchResult),
}

/// A boxed stream of batch events.
pub type BatchStream = Pin<Box<dyn Stream<Item = BatchEvent> + Send>>;

/// Forwards callback events into the channel.
struct ChannelCallback {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelCallback {
    fn send(&self, event: BatchEvent) {
        // The receiver may have been dropped; the run still finishes.
        let _ = self.tx.send(event);
    }
}

impl BatchProgressCallback for ChannelCallback {
    fn on_progress(&self, event: &ProgressEvent) {
        self.send(BatchEvent::Progress(event.clone()));
    }

    fn on_file_complete(&self, index: usize, _total: usize, file: &ConvertedFile) {
        self.send(BatchEvent::FileConverted {
            index,
            file: file.clone(),
        });
    }

    fn on_file_error(&self, index: usize, _total: usize, name: &str, error: &FileError) {
        self.send(BatchEvent::FileFailed {
            index,
            failure: FailedFile {
                original_name: name.to_string(),
                error: error.clone(),
            },
        });
    }
}

/// Start a run and stream its events.
///
/// The run-in-progress check and the empty-selection check happen before
/// this returns, so those errors are reported here rather than in the
/// stream. Must be called from within a tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use soundshift::{convert_stream, BatchEvent, ConversionOptions, Converter, ConverterConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConverterConfig::default();
/// let limits = config.fallback_limits();
/// let converter = Arc::new(Converter::new(config)?);
/// # let files = Vec::new();
/// let mut events = convert_stream(converter, files, limits, ConversionOptions::default())?;
/// while let Some(event) = events.next().await {
///     if let BatchEvent::Progress(p) = event {
///         println!("{:.0}%", p.percent);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn convert_stream(
    converter: Arc<Converter>,
    files: Vec<StagedFile>,
    limits: ServerLimits,
    options: ConversionOptions,
) -> Result<BatchStream, ConvertError> {
    let guard = converter.try_begin()?;
    if files.is_empty() {
        return Err(ConvertError::NothingToConvert);
    }
    info!("Starting streaming conversion of {} file(s)", files.len());

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let callback = ChannelCallback { tx };
        match converter
            .run(guard, &files, &limits, &options, Some(&callback))
            .await
        {
            Ok(result) => callback.send(BatchEvent::Completed(result)),
            Err(e) => warn!("Streaming conversion aborted: {e}"),
        }
    });

    Ok(Box::pin(UnboundedReceiverStream::new(rx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;

    #[tokio::test]
    async fn empty_selection_fails_up_front() {
        let converter = Arc::new(Converter::new(ConverterConfig::default()).unwrap());
        let err = convert_stream(
            Arc::clone(&converter),
            Vec::new(),
            ServerLimits::default(),
            ConversionOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConvertError::NothingToConvert));
        assert!(!converter.is_running());
    }

    #[test]
    fn channel_callback_forwards_failures() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cb = ChannelCallback { tx };
        cb.on_file_error(2, 3, "c.mp3", &FileError::EmptyArtifact);
        match rx.try_recv().unwrap() {
            BatchEvent::FileFailed { index, failure } => {
                assert_eq!(index, 2);
                assert_eq!(failure.original_name, "c.mp3");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
