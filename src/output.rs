//! Result types produced by a conversion run.
//!
//! A [`BatchResult`] is built exactly once per run and never mutated
//! afterwards. Converted bytes stay in memory ([`ConvertedFile::data`]);
//! writing them somewhere is the consumer's call, helped by
//! [`ConvertedFile::save_to`] and [`BatchResult::save_all`].

use crate::error::{ConvertError, FailureKind, FileError};
use bytes::Bytes;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One successfully converted file.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedFile {
    /// Name to save the artifact under.
    pub output_name: String,
    /// Name of the staged input.
    pub original_name: String,
    /// `Content-Type` the service reported, if any.
    pub content_type: Option<String>,
    /// Size of `data` in bytes.
    pub size: u64,
    /// Artifact bytes.
    #[serde(skip)]
    pub data: Bytes,
}

impl ConvertedFile {
    pub fn new(
        output_name: impl Into<String>,
        original_name: impl Into<String>,
        content_type: Option<String>,
        data: Bytes,
    ) -> Self {
        Self {
            output_name: output_name.into(),
            original_name: original_name.into(),
            content_type,
            size: data.len() as u64,
            data,
        }
    }

    /// Write the artifact into `dir` as `output_name`.
    ///
    /// Writes to a temp file in the same directory, then renames, so a
    /// crash never leaves a truncated artifact under the final name.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ConvertError> {
        let dir = dir.as_ref().to_path_buf();
        let target = dir.join(&self.output_name);
        let data = self.data.clone();
        let dest = target.clone();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: target.clone(),
                source: e,
            })?;

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.persist(&dest).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("save task: {e}")))?
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: target.clone(),
            source: e,
        })?;

        debug!("Saved {} ({} bytes)", target.display(), self.size);
        Ok(target)
    }
}

/// One file that could not be converted.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub original_name: String,
    pub error: FileError,
}

impl FailedFile {
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Outcome for a single staged file.
#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    Success(ConvertedFile),
    Failure(FailedFile),
}

/// Successes and failures of one run, each in selection order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    successes: Vec<ConvertedFile>,
    failures: Vec<FailedFile>,
}

impl BatchResult {
    /// Split ordered outcomes into the two lists.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ConversionOutcome>) -> Self {
        let mut result = Self::default();
        for outcome in outcomes {
            match outcome {
                ConversionOutcome::Success(f) => result.successes.push(f),
                ConversionOutcome::Failure(f) => result.failures.push(f),
            }
        }
        result
    }

    pub fn successes(&self) -> &[ConvertedFile] {
        &self.successes
    }

    pub fn failures(&self) -> &[FailedFile] {
        &self.failures
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Save every success into `dir`, one after another, in order.
    pub async fn save_all(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ConvertError> {
        let dir = dir.as_ref();
        let mut saved = Vec::with_capacity(self.successes.len());
        for file in &self.successes {
            saved.push(file.save_to(dir).await?);
        }
        Ok(saved)
    }
}

/// Human-readable byte size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `3.25 MB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", crate::limits::format_megabytes(rounded), UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(name: &str) -> ConversionOutcome {
        ConversionOutcome::Success(ConvertedFile::new(
            format!("{name}.m4a"),
            format!("{name}.mp3"),
            Some("audio/mp4".into()),
            Bytes::from_static(b"data"),
        ))
    }

    fn failed(name: &str) -> ConversionOutcome {
        ConversionOutcome::Failure(FailedFile {
            original_name: name.into(),
            error: FileError::EmptyArtifact,
        })
    }

    #[test]
    fn outcomes_keep_order() {
        let r = BatchResult::from_outcomes(vec![ok("a"), failed("b.mp3"), ok("c")]);
        assert_eq!(r.total(), 3);
        let names: Vec<_> = r.successes().iter().map(|s| s.output_name.as_str()).collect();
        assert_eq!(names, vec!["a.m4a", "c.m4a"]);
        assert_eq!(r.failures()[0].kind(), FailureKind::EmptyArtifact);
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0 Bytes");
        assert_eq!(human_size(512), "512 Bytes");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn serialises_without_bytes() {
        let r = BatchResult::from_outcomes(vec![ok("a")]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["successes"][0]["size"], 4);
        assert!(json["successes"][0].get("data").is_none());
    }

    #[tokio::test]
    async fn save_all_writes_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let r = BatchResult::from_outcomes(vec![ok("a"), ok("b")]);
        let paths = r.save_all(dir.path()).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read(dir.path().join("b.m4a")).unwrap(), b"data");
    }
}
