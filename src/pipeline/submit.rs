//! The only stage with network I/O: one multipart POST per staged file.
//!
//! [`ConversionClient::send`] returns the raw response untouched so that
//! [`interpret`] can be tested without a server. Everything that can go
//! wrong before a response arrives is folded into a transport failure.

use crate::config::ConversionOptions;
use crate::error::{ConvertError, FileError};
use crate::limits::ServerLimits;
use crate::output::ConvertedFile;
use crate::pipeline::{failure, filename};
use crate::selection::StagedFile;
use bytes::Bytes;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::debug;

/// A response as received, before any classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why no response was obtained.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    /// Status surfaced by the transport layer, if any.
    pub status: Option<u16>,
    pub message: String,
}

/// HTTP client bound to one conversion endpoint.
#[derive(Debug, Clone)]
pub struct ConversionClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ConversionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `file` with fields `file`, `quality` and, when set, `format`.
    pub async fn send(
        &self,
        file: &StagedFile,
        options: &ConversionOptions,
    ) -> Result<RawResponse, TransportFailure> {
        let candidate = file.candidate();
        let data = candidate
            .read_payload()
            .await
            .map_err(|e| TransportFailure {
                status: None,
                message: e.to_string(),
            })?;

        let mut form = Form::new()
            .part("file", file_part(&candidate.name, &candidate.mime_type, data))
            .text("quality", options.quality.clone());
        if let Some(ref format) = options.target_format {
            form = form.text("format", format.clone());
        }

        debug!("POST {} ({}, {} bytes)", self.endpoint, candidate.name, candidate.size);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        let status = response.status();
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_failure(e))?;

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            content_type,
            content_disposition,
            body,
        })
    }

    fn transport_failure(&self, e: reqwest::Error) -> TransportFailure {
        let message = if e.is_timeout() {
            format!(
                "The request timed out after {}s without a response",
                self.timeout.as_secs()
            )
        } else if e.is_connect() {
            format!("Could not connect to the conversion service: {e}")
        } else {
            e.to_string()
        };
        TransportFailure {
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Send one file and turn whatever happens into a per-file outcome.
    pub async fn convert(
        &self,
        file: &StagedFile,
        options: &ConversionOptions,
        limits: &ServerLimits,
        default_extension: &str,
    ) -> Result<ConvertedFile, FileError> {
        match self.send(file, options).await {
            Ok(raw) => interpret(raw, file.name(), options, default_extension, limits),
            Err(t) => Err(failure::classify_transport(t.status, &t.message, limits)),
        }
    }
}

fn file_part(name: &str, mime: &str, data: Bytes) -> Part {
    let len = data.len() as u64;
    let build = || Part::stream_with_length(data.clone(), len).file_name(name.to_string());
    if mime.is_empty() {
        return build();
    }
    build().mime_str(mime).unwrap_or_else(|_| build())
}

/// Classify a received response.
///
/// Non-success goes through the status classifier. A success carrying JSON
/// is an error report, not audio. A success with no bytes is an empty
/// artifact. Anything else is the converted file.
pub fn interpret(
    raw: RawResponse,
    original_name: &str,
    options: &ConversionOptions,
    default_extension: &str,
    limits: &ServerLimits,
) -> Result<ConvertedFile, FileError> {
    if !raw.is_success() {
        return Err(failure::classify_status(raw.status, &raw.reason, &raw.body, limits));
    }

    let is_json = raw
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    if is_json {
        return Err(failure::classify_json_success(&raw.body, limits));
    }

    if raw.body.is_empty() {
        return Err(FileError::EmptyArtifact);
    }

    let output_name = raw
        .content_disposition
        .as_deref()
        .and_then(filename::from_content_disposition)
        .unwrap_or_else(|| {
            let ext = options
                .target_format
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .unwrap_or(default_extension);
            filename::output_name(original_name, ext)
        });

    Ok(ConvertedFile::new(
        output_name,
        original_name,
        raw.content_type,
        raw.body,
    ))
}
