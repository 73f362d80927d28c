//! Process manifests and batch reports
//!
//! A [`ProcessManifest`] serializes as
//!
//! ```json
//! {"uris": {"b": "avocado.png/full/!2048,1536/0/color.jpg"}, "dimensions": {"b": [2048, 1536]}}
//! ```
//!
//! with an optional `palette` entry. A label missing from `uris` means its
//! derivative failed; the reasons travel in the non-serialized
//! [`TaskSummary`].

use crate::backend::{Dimensions, Palette};
use crate::error::{ErrorKind, ProcessError};
use crate::instructions::Label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Results for one source image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessManifest {
    /// Derivative URI per successful label
    #[serde(default)]
    pub uris: BTreeMap<Label, String>,
    /// `[width, height]` per successful label
    #[serde(default)]
    pub dimensions: BTreeMap<Label, [u32; 2]>,
    /// Dominant colours, when enabled and computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<Palette>,
    #[serde(skip)]
    summary: TaskSummary,
}

impl ProcessManifest {
    /// Create empty manifest
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful derivative
    pub fn insert_derivative(&mut self, label: Label, uri: String, dimensions: Dimensions) {
        self.dimensions.insert(label.clone(), dimensions.into());
        self.uris.insert(label, uri);
    }

    /// Check if `label` was produced
    #[inline]
    #[must_use]
    pub fn contains(&self, label: &Label) -> bool {
        self.uris.contains_key(label)
    }

    /// Task bookkeeping for the run that produced this manifest
    #[inline]
    #[must_use]
    pub fn summary(&self) -> &TaskSummary {
        &self.summary
    }

    /// Check if every task succeeded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.summary.failures.is_empty()
    }

    pub(crate) fn with_summary(mut self, summary: TaskSummary) -> Self {
        self.summary = summary;
        self
    }

    /// Encode as JSON
    ///
    /// # Errors
    /// - `ProcessError::Encode` if serialization fails
    pub fn to_json(&self) -> Result<Vec<u8>, ProcessError> {
        serde_json::to_vec(self).map_err(|source| ProcessError::Encode {
            what: "process manifest",
            source,
        })
    }
}

/// Which task a failure belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Palette,
    Derivative(Label),
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Palette => f.write_str("palette"),
            Self::Derivative(label) => write!(f, "derivative {label}"),
        }
    }
}

/// One absorbed task error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskKind,
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskFailure {
    /// Record `error` against `task`
    #[must_use]
    pub fn new(task: TaskKind, error: &ProcessError) -> Self {
        Self {
            task,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Task bookkeeping for one orchestrator run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSummary {
    /// Tasks spawned, derivatives plus palette
    pub spawned: usize,
    /// Completion signals received
    pub completed: usize,
    /// Absorbed errors, in arrival order
    pub failures: Vec<TaskFailure>,
}

impl TaskSummary {
    /// Failure recorded for the derivative `label`
    #[must_use]
    pub fn failure_for(&self, label: &Label) -> Option<&TaskFailure> {
        self.failures
            .iter()
            .find(|f| matches!(&f.task, TaskKind::Derivative(l) if l == label))
    }

    /// Check if the palette task failed
    #[must_use]
    pub fn palette_failed(&self) -> bool {
        self.failures.iter().any(|f| f.task == TaskKind::Palette)
    }
}

/// Manifests for a batch, keyed by source origin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchReport {
    manifests: BTreeMap<String, ProcessManifest>,
    #[serde(skip)]
    failed_reports: Vec<String>,
}

impl BatchReport {
    /// Create empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the manifest for `origin`, replacing any earlier one
    #[inline]
    pub fn insert(&mut self, origin: impl Into<String>, manifest: ProcessManifest) {
        self.manifests.insert(origin.into(), manifest);
    }

    /// Manifest for `origin`
    #[inline]
    #[must_use]
    pub fn get(&self, origin: &str) -> Option<&ProcessManifest> {
        self.manifests.get(origin)
    }

    /// Number of sources
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Check if no source was processed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Iterate over origins and manifests
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProcessManifest)> {
        self.manifests.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Report keys whose write failed
    #[inline]
    #[must_use]
    pub fn failed_reports(&self) -> &[String] {
        &self.failed_reports
    }

    pub(crate) fn record_failed_report(&mut self, key: String) {
        self.failed_reports.push(key);
    }

    /// Encode as JSON, the batch's single observable result
    ///
    /// # Errors
    /// - `ProcessError::Encode` if serialization fails
    pub fn to_json(&self) -> Result<String, ProcessError> {
        serde_json::to_string(self).map_err(|source| ProcessError::Encode {
            what: "batch report",
            source,
        })
    }
}
