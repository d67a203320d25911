//! Server-declared upload limits and the resolver that fetches them.
//!
//! Two independent ceilings are tracked: the conversion service's own
//! `max_upload_size_mb` and the `edge_upload_limit_mb` enforced by whatever
//! proxy or gateway sits in front of it. Pre-flight filtering uses the
//! smaller of the two; payload-size failures are explained with the edge
//! value, since that is the layer that answers 413 before the service sees
//! the request.
//!
//! [`ServerLimits`] is an immutable snapshot. [`LimitsResolver::refresh`]
//! never mutates anything: it returns a new snapshot, and
//! [`LimitsResolver::spawn_refresh`] publishes it through a `watch` channel
//! so readers always see either the fallback or the fetched value, never a
//! mix of the two.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Fallback for the service ceiling until the server says otherwise.
pub const FALLBACK_MAX_UPLOAD_MB: f64 = 50.0;

/// Fallback for the proxy ceiling until the server says otherwise.
pub const FALLBACK_EDGE_UPLOAD_LIMIT_MB: f64 = 50.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Where a [`ServerLimits`] snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimitsStatus {
    /// Built-in values; no refresh has resolved yet (or none is configured).
    #[default]
    Fallback,
    /// The server declared its limits.
    Confirmed,
    /// The refresh failed; built-in values stand and may be wrong.
    Degraded,
}

/// Snapshot of the upload ceilings in megabytes.
///
/// A limit is either unknown (`None`) or a positive finite number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerLimits {
    max_upload_size_mb: Option<f64>,
    edge_upload_limit_mb: Option<f64>,
    deployment_hint: String,
    status: LimitsStatus,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self::new(
            Some(FALLBACK_MAX_UPLOAD_MB),
            Some(FALLBACK_EDGE_UPLOAD_LIMIT_MB),
            "",
        )
    }
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}

/// Accept JSON numbers and numeric strings.
fn declared_number(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    positive(n)
}

impl ServerLimits {
    /// Build a snapshot; non-positive or non-finite limits become unknown.
    pub fn new(
        max_upload_size_mb: Option<f64>,
        edge_upload_limit_mb: Option<f64>,
        deployment_hint: impl Into<String>,
    ) -> Self {
        Self {
            max_upload_size_mb: positive(max_upload_size_mb),
            edge_upload_limit_mb: positive(edge_upload_limit_mb),
            deployment_hint: deployment_hint.into(),
            status: LimitsStatus::Fallback,
        }
    }

    pub fn with_status(mut self, status: LimitsStatus) -> Self {
        self.status = status;
        self
    }

    /// Overlay a config body on top of `fallback`, field by field.
    ///
    /// Returns `None` when the body is not a JSON object. Fields that are
    /// absent or invalid keep the fallback value.
    pub fn from_declared(fallback: &ServerLimits, body: &Value) -> Option<ServerLimits> {
        let obj = body.as_object()?;
        let mut limits = fallback.clone();
        if let Some(v) = declared_number(obj.get("max_upload_size_mb")) {
            limits.max_upload_size_mb = Some(v);
        }
        if let Some(v) = declared_number(obj.get("edge_upload_limit_mb")) {
            limits.edge_upload_limit_mb = Some(v);
        }
        if let Some(hint) = obj.get("deployment_hint").and_then(Value::as_str) {
            let hint = hint.trim();
            if !hint.is_empty() {
                limits.deployment_hint = hint.to_string();
            }
        }
        limits.status = LimitsStatus::Confirmed;
        Some(limits)
    }

    pub fn max_upload_size_mb(&self) -> Option<f64> {
        self.max_upload_size_mb
    }

    pub fn edge_upload_limit_mb(&self) -> Option<f64> {
        self.edge_upload_limit_mb
    }

    pub fn deployment_hint(&self) -> &str {
        &self.deployment_hint
    }

    pub fn status(&self) -> LimitsStatus {
        self.status
    }

    /// True unless the server confirmed these values.
    pub fn is_unconfirmed(&self) -> bool {
        self.status != LimitsStatus::Confirmed
    }

    /// The effective ceiling in MB.
    ///
    /// The minimum of the known limits, or the edge limit directly when
    /// `prefer_edge` is set and one is known. `None` means no filtering is
    /// possible.
    pub fn active_limit_mb(&self, prefer_edge: bool) -> Option<f64> {
        if prefer_edge {
            if let Some(edge) = self.edge_upload_limit_mb {
                return Some(edge);
            }
        }
        match (self.max_upload_size_mb, self.edge_upload_limit_mb) {
            (Some(max), Some(edge)) => Some(max.min(edge)),
            (max, edge) => max.or(edge),
        }
    }

    /// The pre-flight ceiling in bytes.
    pub fn active_limit_bytes(&self) -> Option<u64> {
        self.active_limit_mb(false)
            .map(|mb| (mb * BYTES_PER_MB).floor() as u64)
    }

    /// Whether `size` bytes is over the pre-flight ceiling.
    pub fn exceeds(&self, size: u64) -> bool {
        self.active_limit_mb(false)
            .is_some_and(|mb| size as f64 > mb * BYTES_PER_MB)
    }

    /// The active limit for display, e.g. `"50 MB"` or `"12.5 MB"`.
    pub fn readable_limit_text(&self, prefer_edge: bool) -> String {
        match self.active_limit_mb(prefer_edge) {
            Some(mb) => format!("{} MB", format_megabytes(mb)),
            None => "an unknown size".to_string(),
        }
    }
}

/// At most two decimals, trailing zeros stripped.
pub fn format_megabytes(mb: f64) -> String {
    let s = format!("{mb:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// Fetches the config resource once and turns it into a snapshot.
#[derive(Debug, Clone)]
pub struct LimitsResolver {
    client: reqwest::Client,
    config_url: Option<String>,
    fallback: ServerLimits,
}

impl LimitsResolver {
    pub fn new(
        config_url: Option<String>,
        fallback: ServerLimits,
        timeout: Duration,
    ) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config_url,
            fallback,
        })
    }

    /// Resolver using the endpoint, fallbacks and timeout from `config`.
    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConvertError> {
        Self::new(
            config.config_endpoint.clone(),
            config.fallback_limits(),
            Duration::from_secs(config.config_timeout_secs),
        )
    }

    pub fn fallback(&self) -> &ServerLimits {
        &self.fallback
    }

    /// Fetch the limits once.
    ///
    /// Never fails: any transport error, non-2xx status or malformed body
    /// yields the fallback snapshot marked [`LimitsStatus::Degraded`].
    pub async fn refresh(&self) -> ServerLimits {
        let Some(url) = self.config_url.as_deref() else {
            debug!("No config endpoint configured; keeping fallback limits");
            return self.fallback.clone();
        };

        match self.fetch(url).await {
            Ok(limits) => {
                info!(
                    "Server limits: max {:?} MB, edge {:?} MB",
                    limits.max_upload_size_mb, limits.edge_upload_limit_mb
                );
                limits
            }
            Err(reason) => {
                warn!("Could not load server limits from {url}: {reason}; using fallback values");
                self.fallback.clone().with_status(LimitsStatus::Degraded)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<ServerLimits, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body: Value = response.json().await.map_err(|e| e.to_string())?;
        ServerLimits::from_declared(&self.fallback, &body)
            .ok_or_else(|| "config body is not a JSON object".to_string())
    }

    /// Run [`refresh`](Self::refresh) on a background task.
    ///
    /// The returned handle yields the fallback until the task resolves.
    /// Must be called from within a tokio runtime.
    pub fn spawn_refresh(self) -> LimitsHandle {
        let (tx, rx) = watch::channel(self.fallback.clone());
        tokio::spawn(async move {
            let limits = self.refresh().await;
            let _ = tx.send(limits);
        });
        LimitsHandle { rx }
    }
}

/// Read side of a published limits snapshot.
#[derive(Debug, Clone)]
pub struct LimitsHandle {
    rx: watch::Receiver<ServerLimits>,
}

impl LimitsHandle {
    /// A handle that never changes.
    pub fn fixed(limits: ServerLimits) -> Self {
        let (_tx, rx) = watch::channel(limits);
        Self { rx }
    }

    /// The latest snapshot.
    pub fn current(&self) -> ServerLimits {
        self.rx.borrow().clone()
    }

    /// Wait until the background refresh resolves, then return its snapshot.
    pub async fn settled(&mut self) -> ServerLimits {
        loop {
            if self.rx.borrow_and_update().status() != LimitsStatus::Fallback {
                break;
            }
            if self.rx.changed().await.is_err() {
                break;
            }
        }
        self.current()
    }
}
