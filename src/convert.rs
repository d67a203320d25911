//! Batch conversion entry points.
//!
//! [`Converter::start`] walks a snapshot of the selection, sends each file
//! to the conversion service and returns once every file has been attempted.
//! A failed file never stops the batch; it is recorded in the
//! [`BatchResult`] and the loop moves on. Use [`crate::stream::convert_stream`]
//! instead when you want events as a `Stream`.

use crate::config::{ConversionOptions, ConverterConfig};
use crate::error::{ConvertError, FileError};
use crate::limits::ServerLimits;
use crate::output::{BatchResult, ConversionOutcome, ConvertedFile, FailedFile};
use crate::pipeline::submit::ConversionClient;
use crate::progress::{BatchProgressCallback, ProgressEvent};
use crate::selection::StagedFile;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives conversion runs against one service.
///
/// At most one run is in flight per `Converter`; a second
/// [`start`](Self::start) while one is running fails with
/// [`ConvertError::AlreadyInProgress`] and leaves the live run alone.
///
/// # Example
/// ```rust,no_run
/// use soundshift::{Candidate, ConversionOptions, Converter, ConverterConfig, SelectionSet};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConverterConfig::builder().base_url("http://localhost:5000").build()?;
/// let limits = config.fallback_limits();
/// let mut selection = SelectionSet::from_config(&config);
/// selection.submit(
///     vec![Candidate::from_bytes("take1.wav", "audio/wav", std::fs::read("take1.wav")?)],
///     &limits,
///     &config.media_filter,
/// )?;
///
/// let converter = Converter::new(config)?;
/// let result = converter
///     .start(selection.files(), &limits, &ConversionOptions::default())
///     .await?;
/// println!("{} converted, {} failed", result.successes().len(), result.failures().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Converter {
    config: ConverterConfig,
    client: ConversionClient,
    running: Arc<AtomicBool>,
}

/// Holds the run-in-progress flag; clears it on drop.
#[derive(Debug)]
pub(crate) struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Result<Self, ConvertError> {
        let client = ConversionClient::new(
            config.endpoint.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self {
            config,
            client,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Whether a run currently holds this converter.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn try_begin(&self) -> Result<RunGuard, ConvertError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConvertError::AlreadyInProgress)?;
        Ok(RunGuard {
            flag: Arc::clone(&self.running),
        })
    }

    /// Convert every file in `files`, in order.
    ///
    /// # Returns
    /// `Ok(BatchResult)` once every file was attempted, even if all failed.
    ///
    /// # Errors
    /// - [`ConvertError::AlreadyInProgress`] if another run holds this converter.
    /// - [`ConvertError::NothingToConvert`] if `files` is empty.
    pub async fn start(
        &self,
        files: &[StagedFile],
        limits: &ServerLimits,
        options: &ConversionOptions,
    ) -> Result<BatchResult, ConvertError> {
        let guard = self.try_begin()?;
        self.run(guard, files, limits, options, None).await
    }

    /// Body of a run. `extra` receives the same events as the configured
    /// callback.
    pub(crate) async fn run(
        &self,
        _guard: RunGuard,
        files: &[StagedFile],
        limits: &ServerLimits,
        options: &ConversionOptions,
        extra: Option<&dyn BatchProgressCallback>,
    ) -> Result<BatchResult, ConvertError> {
        if files.is_empty() {
            return Err(ConvertError::NothingToConvert);
        }

        let mut callbacks: Vec<&dyn BatchProgressCallback> = Vec::with_capacity(2);
        if let Some(cb) = self.config.progress_callback.as_deref() {
            callbacks.push(cb);
        }
        if let Some(cb) = extra {
            callbacks.push(cb);
        }
        let observers = Observers(callbacks);

        let total = files.len();
        let started = Instant::now();
        info!(
            "Converting {} file(s) via {} (quality {}, format {})",
            total,
            self.client.endpoint(),
            options.quality,
            options.target_format.as_deref().unwrap_or("default")
        );
        observers.on_batch_start(total);

        let outcomes = if self.config.concurrency > 1 {
            self.process_concurrent(files, limits, options, &observers)
                .await
        } else {
            self.process_sequential(files, limits, options, &observers)
                .await
        };

        let result = BatchResult::from_outcomes(outcomes);
        observers.on_progress(&ProgressEvent::finished(total));
        observers.on_batch_complete(total, result.successes().len());

        info!(
            "Batch complete: {}/{} converted in {}ms",
            result.successes().len(),
            total,
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    /// One file at a time, progress announced before each send.
    async fn process_sequential(
        &self,
        files: &[StagedFile],
        limits: &ServerLimits,
        options: &ConversionOptions,
        observers: &Observers<'_>,
    ) -> Vec<ConversionOutcome> {
        let total = files.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, file) in files.iter().enumerate() {
            observers.on_progress(&ProgressEvent::before_file(index, total, file.name()));
            outcomes.push(
                self.convert_one(index, total, file, limits, options, observers)
                    .await,
            );
        }
        outcomes
    }

    /// Up to `concurrency` files in flight; progress announced as each
    /// finishes. Outcomes are put back into selection order.
    async fn process_concurrent(
        &self,
        files: &[StagedFile],
        limits: &ServerLimits,
        options: &ConversionOptions,
        observers: &Observers<'_>,
    ) -> Vec<ConversionOutcome> {
        let total = files.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        let mut indexed: Vec<(usize, ConversionOutcome)> =
            stream::iter(files.iter().cloned().enumerate().map(|(index, file)| async move {
                let outcome = self
                    .convert_one(index, total, &file, limits, options, observers)
                    .await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                observers.on_progress(&ProgressEvent::after_file(done, total, file.name()));
                (index, outcome)
            }))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn convert_one(
        &self,
        index: usize,
        total: usize,
        file: &StagedFile,
        limits: &ServerLimits,
        options: &ConversionOptions,
        observers: &Observers<'_>,
    ) -> ConversionOutcome {
        debug!("[{}/{}] {}", index + 1, total, file.name());
        match self
            .client
            .convert(file, options, limits, &self.config.default_output_extension)
            .await
        {
            Ok(converted) => {
                info!(
                    "[{}/{}] {} -> {} ({} bytes)",
                    index + 1,
                    total,
                    file.name(),
                    converted.output_name,
                    converted.size
                );
                observers.on_file_complete(index, total, &converted);
                ConversionOutcome::Success(converted)
            }
            Err(error) => {
                warn!(
                    "[{}/{}] {} failed ({}): {}",
                    index + 1,
                    total,
                    file.name(),
                    error.kind(),
                    error
                );
                observers.on_file_error(index, total, file.name(), &error);
                ConversionOutcome::Failure(FailedFile {
                    original_name: file.name().to_string(),
                    error,
                })
            }
        }
    }
}

/// Fans every event out to each registered callback.
struct Observers<'a>(Vec<&'a dyn BatchProgressCallback>);

impl BatchProgressCallback for Observers<'_> {
    fn on_batch_start(&self, total: usize) {
        self.0.iter().for_each(|cb| cb.on_batch_start(total));
    }

    fn on_progress(&self, event: &ProgressEvent) {
        self.0.iter().for_each(|cb| cb.on_progress(event));
    }

    fn on_file_complete(&self, index: usize, total: usize, file: &ConvertedFile) {
        self.0
            .iter()
            .for_each(|cb| cb.on_file_complete(index, total, file));
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &FileError) {
        self.0
            .iter()
            .for_each(|cb| cb.on_file_error(index, total, name, error));
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.0
            .iter()
            .for_each(|cb| cb.on_batch_complete(total, success_count));
    }
}
