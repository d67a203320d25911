//! Turn a [`BatchResult`] into what the presentation layer shows.
//!
//! [`summarize`] is pure; it decides wording and which download actions
//! exist. Performing the downloads is [`DownloadAll::run`] or
//! [`DownloadAction::run`].

use crate::error::ConvertError;
use crate::messages;
use crate::output::{BatchResult, ConvertedFile};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// A single "download this file" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadAction {
    /// Position in [`BatchResult::successes`].
    pub index: usize,
    pub file_name: String,
    pub label: String,
    pub size: u64,
}

impl DownloadAction {
    /// Save the artifact this action points at into `dir`.
    pub async fn run(
        &self,
        result: &BatchResult,
        dir: impl AsRef<Path>,
    ) -> Result<PathBuf, ConvertError> {
        let file = artifact(result, self.index)?;
        file.save_to(dir).await
    }
}

/// Triggers every individual download, one after another.
///
/// No archive is built; each artifact is written as its own file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadAll {
    pub label: String,
    pub count: usize,
}

impl DownloadAll {
    pub async fn run(
        result: &BatchResult,
        dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, ConvertError> {
        let dir = dir.as_ref();
        let saved = result.save_all(dir).await?;
        info!("Saved {} file(s) to {}", saved.len(), dir.display());
        Ok(saved)
    }
}

fn artifact(result: &BatchResult, index: usize) -> Result<&ConvertedFile, ConvertError> {
    result
        .successes()
        .get(index)
        .ok_or_else(|| ConvertError::Internal(format!("no converted file at index {index}")))
}

/// Everything needed to render the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayModel {
    /// `None` when nothing converted; `error_banner` is set instead.
    pub headline: Option<String>,
    pub downloads: Vec<DownloadAction>,
    pub download_all: Option<DownloadAll>,
    /// Set only when there are no successes.
    pub error_banner: Option<String>,
    /// Set when some files failed next to at least one success.
    pub warning: Option<String>,
}

/// Build the display model for a finished run.
pub fn summarize(result: &BatchResult) -> DisplayModel {
    let successes = result.successes();
    let failures = result.failures();

    if successes.is_empty() {
        let reasons: Vec<(&str, String)> = failures
            .iter()
            .map(|f| (f.original_name.as_str(), f.error.to_string()))
            .collect();
        return DisplayModel {
            headline: None,
            downloads: Vec::new(),
            download_all: None,
            error_banner: Some(messages::all_failed(&reasons)),
            warning: None,
        };
    }

    let downloads: Vec<DownloadAction> = successes
        .iter()
        .enumerate()
        .map(|(index, f)| DownloadAction {
            index,
            file_name: f.output_name.clone(),
            label: messages::download_label(&f.output_name),
            size: f.size,
        })
        .collect();

    let (headline, download_all) = if successes.len() == 1 {
        (messages::SINGLE_SUCCESS.to_string(), None)
    } else {
        (
            messages::plural_success(successes.len()),
            Some(DownloadAll {
                label: messages::DOWNLOAD_ALL_LABEL.to_string(),
                count: successes.len(),
            }),
        )
    };

    let warning = (!failures.is_empty()).then(|| {
        let names: Vec<&str> = failures.iter().map(|f| f.original_name.as_str()).collect();
        messages::partial_failure(&names)
    });

    DisplayModel {
        headline: Some(headline),
        downloads,
        download_all,
        error_banner: None,
        warning,
    }
}
