//! Configuration types for batch conversion.
//!
//! Everything a [`crate::Converter`] and a [`crate::LimitsResolver`] need
//! is injected through [`ConverterConfig`], built via its
//! [`ConverterConfigBuilder`]. No component reads global state: the
//! endpoint, the fallback limits and the media filter all travel in this
//! struct.

use crate::error::ConvertError;
use crate::limits::{ServerLimits, FALLBACK_EDGE_UPLOAD_LIMIT_MB, FALLBACK_MAX_UPLOAD_MB};
use crate::pipeline::media::MediaFilter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default capacity of the selection set.
pub const MAX_FILES: usize = 15;

/// Configuration for a conversion client.
///
/// Built via [`ConverterConfig::builder()`] or using
/// [`ConverterConfig::default()`].
///
/// # Example
/// ```rust
/// use soundshift::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .base_url("https://convert.example.com")
///     .request_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint, "https://convert.example.com/convert");
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Conversion endpoint receiving the multipart upload.
    /// Default: `http://localhost:5000/convert`.
    pub endpoint: String,

    /// Resource declaring the server limits. `None` disables the refresh and
    /// the fallback limits apply for the whole session.
    pub config_endpoint: Option<String>,

    /// Maximum number of staged files. Default: 15.
    pub max_files: usize,

    /// Files in flight at once. Default: 1 (strictly sequential).
    ///
    /// Raising this trades deterministic per-file progress for throughput;
    /// progress is then reported as files complete.
    pub concurrency: usize,

    /// Per-upload timeout in seconds. Default: 300.
    pub request_timeout_secs: u64,

    /// Timeout for the limits fetch in seconds. Default: 10.
    pub config_timeout_secs: u64,

    /// Service ceiling assumed until the server says otherwise. Default: 50.
    pub fallback_max_upload_mb: Option<f64>,

    /// Proxy ceiling assumed until the server says otherwise. Default: 50.
    pub fallback_edge_upload_limit_mb: Option<f64>,

    /// Which candidates count as audio.
    pub media_filter: MediaFilter,

    /// Extension for output names when no target format is requested and
    /// the service sends no filename. Default: `m4a`.
    pub default_output_extension: String,

    /// Receives progress events during a run.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/convert".to_string(),
            config_endpoint: None,
            max_files: MAX_FILES,
            concurrency: 1,
            request_timeout_secs: 300,
            config_timeout_secs: 10,
            fallback_max_upload_mb: Some(FALLBACK_MAX_UPLOAD_MB),
            fallback_edge_upload_limit_mb: Some(FALLBACK_EDGE_UPLOAD_LIMIT_MB),
            media_filter: MediaFilter::default(),
            default_output_extension: "m4a".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("endpoint", &self.endpoint)
            .field("config_endpoint", &self.config_endpoint)
            .field("max_files", &self.max_files)
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("fallback_max_upload_mb", &self.fallback_max_upload_mb)
            .field(
                "fallback_edge_upload_limit_mb",
                &self.fallback_edge_upload_limit_mb,
            )
            .field("default_output_extension", &self.default_output_extension)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// The limits snapshot in force before any refresh.
    pub fn fallback_limits(&self) -> ServerLimits {
        ServerLimits::new(
            self.fallback_max_upload_mb,
            self.fallback_edge_upload_limit_mb,
            "",
        )
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    /// Derive both endpoints from one base: `{base}/convert` and
    /// `{base}/config`.
    pub fn base_url(mut self, base: impl AsRef<str>) -> Self {
        let base = base.as_ref().trim_end_matches('/');
        self.config.endpoint = format!("{base}/convert");
        self.config.config_endpoint = Some(format!("{base}/config"));
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn config_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.config_endpoint = Some(url.into());
        self
    }

    pub fn no_config_endpoint(mut self) -> Self {
        self.config.config_endpoint = None;
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.max_files = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn config_timeout_secs(mut self, secs: u64) -> Self {
        self.config.config_timeout_secs = secs;
        self
    }

    pub fn fallback_limits_mb(mut self, max: Option<f64>, edge: Option<f64>) -> Self {
        self.config.fallback_max_upload_mb = max;
        self.config.fallback_edge_upload_limit_mb = edge;
        self
    }

    pub fn media_filter(mut self, filter: MediaFilter) -> Self {
        self.config.media_filter = filter;
        self
    }

    pub fn default_output_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.default_output_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        check_url("endpoint", &c.endpoint)?;
        if let Some(ref url) = c.config_endpoint {
            check_url("config endpoint", url)?;
        }
        if c.max_files == 0 {
            return Err(ConvertError::InvalidConfig(
                "max_files must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Request timeout must be ≥ 1s".into(),
            ));
        }
        for (label, v) in [
            ("fallback max upload", c.fallback_max_upload_mb),
            ("fallback edge limit", c.fallback_edge_upload_limit_mb),
        ] {
            if let Some(mb) = v {
                if !mb.is_finite() || mb <= 0.0 {
                    return Err(ConvertError::InvalidConfig(format!(
                        "{label} must be a positive number of MB, got {mb}"
                    )));
                }
            }
        }
        Ok(self.config)
    }
}

fn check_url(label: &str, url: &str) -> Result<(), ConvertError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ConvertError::InvalidConfig(format!("{label} '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConvertError::InvalidConfig(format!(
            "{label} '{url}' must be an HTTP/HTTPS URL"
        )));
    }
    Ok(())
}

/// Per-run options passed straight through to the conversion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Opaque quality string, e.g. `"192k"`.
    pub quality: String,
    /// Opaque target format, e.g. `"mp3"`. `None` omits the `format` field.
    pub target_format: Option<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            quality: "192k".to_string(),
            target_format: None,
        }
    }
}

impl ConversionOptions {
    pub fn new(quality: impl Into<String>, target_format: Option<String>) -> Self {
        Self {
            quality: quality.into(),
            target_format,
        }
    }
}
