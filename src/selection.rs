//! The bounded, deduplicated working set of files awaiting conversion.
//!
//! [`SelectionSet::submit`] is the single admission path. It is atomic: when
//! it returns `Err`, the set is exactly as it was before the call.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::limits::{LimitsStatus, ServerLimits};
use crate::pipeline::input::Candidate;
use crate::pipeline::media::MediaFilter;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// A candidate admitted into the selection.
#[derive(Debug, Clone, Serialize)]
pub struct StagedFile {
    #[serde(flatten)]
    candidate: Candidate,
}

impl StagedFile {
    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn name(&self) -> &str {
        &self.candidate.name
    }

    pub fn size(&self) -> u64 {
        self.candidate.size
    }

    /// `(name, size)`: two files with the same key are the same file.
    pub fn identity(&self) -> (&str, u64) {
        self.candidate.identity()
    }
}

impl From<Candidate> for StagedFile {
    fn from(candidate: Candidate) -> Self {
        Self { candidate }
    }
}

/// What happened to one submitted batch.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionReport {
    /// Files newly staged by this call.
    pub added: usize,
    /// Audio candidates over the active size limit; never staged.
    pub oversized: Vec<Candidate>,
    /// The batch was cut down to the remaining capacity.
    pub truncated: bool,
    /// Candidates dropped for not being audio.
    pub rejected: usize,
    /// Candidates skipped because their key was already staged.
    pub duplicates: usize,
    /// Readable active limit at admission time, e.g. `"50 MB"`.
    pub limit_text: String,
    /// Whether that limit was confirmed by the server.
    pub limits_status: LimitsStatus,
}

impl AdmissionReport {
    pub fn oversized_names(&self) -> Vec<&str> {
        self.oversized.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Ordered, capacity-bounded sequence of staged files with unique keys.
#[derive(Debug, Clone)]
pub struct SelectionSet {
    files: Vec<StagedFile>,
    capacity: usize,
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::new(crate::config::MAX_FILES)
    }
}

impl SelectionSet {
    /// An empty set holding at most `capacity` files (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            files: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.max_files)
    }

    /// Admit a batch of candidates.
    ///
    /// Non-audio candidates are dropped, then oversized ones are set aside,
    /// then the rest is truncated to the remaining capacity and appended
    /// in order, skipping keys already staged.
    ///
    /// # Errors
    /// - [`ConvertError::NoValidFiles`] when no candidate is audio.
    /// - [`ConvertError::CapacityExceeded`] when the batch has admissible
    ///   files but the set is already full.
    pub fn submit(
        &mut self,
        candidates: impl IntoIterator<Item = Candidate>,
        limits: &ServerLimits,
        filter: &MediaFilter,
    ) -> Result<AdmissionReport, ConvertError> {
        let mut rejected = 0;
        let media: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| {
                let ok = filter.is_accepted_media(c);
                if !ok {
                    debug!("Ignoring non-audio candidate '{}'", c.name);
                    rejected += 1;
                }
                ok
            })
            .collect();

        if media.is_empty() {
            return Err(ConvertError::NoValidFiles);
        }

        let (mut within, oversized): (Vec<Candidate>, Vec<Candidate>) =
            media.into_iter().partition(|c| !limits.exceeds(c.size));

        let mut truncated = false;
        if self.files.len() + within.len() > self.capacity {
            let remaining = self.remaining_capacity();
            if remaining == 0 {
                return Err(ConvertError::CapacityExceeded { max: self.capacity });
            }
            within.truncate(remaining);
            truncated = true;
        }

        let mut seen: HashSet<(String, u64)> = self
            .files
            .iter()
            .map(|f| (f.name().to_string(), f.size()))
            .collect();
        let mut added = 0;
        let mut duplicates = 0;
        for candidate in within {
            if seen.insert((candidate.name.clone(), candidate.size)) {
                self.files.push(StagedFile::from(candidate));
                added += 1;
            } else {
                duplicates += 1;
            }
        }

        info!(
            "Staged {added} file(s) ({} total); {} oversized, {duplicates} duplicate(s), \
             {rejected} rejected",
            self.files.len(),
            oversized.len()
        );

        Ok(AdmissionReport {
            added,
            oversized,
            truncated,
            rejected,
            duplicates,
            limit_text: limits.readable_limit_text(false),
            limits_status: limits.status(),
        })
    }

    /// Remove the file at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<StagedFile> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.files.len())
    }

    /// Read-only view in insertion order; what a run receives.
    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }
}
