// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Value Objects
// ============================================================================

/// Unique identifier for a transfer job.
///
/// Ids are handed out by the queue from a monotonic counter, so later jobs
/// always compare greater than earlier ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Category of a transfer job, as requested by the route layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferJobKind {
    LocalUpload,
    S3Upload,
    S3Download,
    CrossStorage,
    Huggingface,
}

/// Lifecycle state of a whole job.
///
/// Derived from the file states after every mutation, except that
/// `Cancelled` is sticky and authoritative once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Lifecycle state of a single file within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Queued,
    Transferring,
    Completed,
    Error,
}

/// One file transfer as submitted by the route layer.
///
/// Paths are opaque strings of the form `<backend>:<locationId>/<relative>`;
/// `size` may be unknown at enqueue time and is filled in by the executor
/// once the source is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_path: String,
    pub destination_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Tracked state of one file transfer inside a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFileJob {
    pub source_path: String,
    pub destination_path: String,
    pub size: u64,
    pub loaded: u64,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate progress, recomputed on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub total_bytes: u64,
    pub loaded_bytes: u64,
    pub percentage: u32,
}

/// One batch transfer request tracked as a unit.
///
/// Owned exclusively by the transfer queue; consumers only ever see clones
/// (full snapshots) carried by events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJob {
    pub id: JobId,
    #[serde(rename = "type")]
    pub kind: TransferJobKind,
    pub status: JobStatus,
    pub files: Vec<TransferFileJob>,
    pub progress: TransferProgress,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferJob {
    pub fn new(id: JobId, kind: TransferJobKind, requests: &[TransferRequest]) -> Self {
        let files = requests
            .iter()
            .map(|r| TransferFileJob {
                source_path: r.source_path.clone(),
                destination_path: r.destination_path.clone(),
                size: r.size.unwrap_or(0),
                loaded: 0,
                status: FileStatus::Queued,
                error: None,
            })
            .collect();

        let mut job = Self {
            id,
            kind,
            status: JobStatus::Queued,
            files,
            progress: TransferProgress::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        };
        job.recompute();
        job
    }

    /// Recompute aggregate progress and derive the job status from the file
    /// states. Cancellation is sticky: once `Cancelled`, file-derived rules
    /// never overwrite it.
    pub fn recompute(&mut self) {
        self.recompute_progress();

        if self.status == JobStatus::Cancelled {
            return;
        }

        let all_completed = self.files.iter().all(|f| f.status == FileStatus::Completed);
        let all_terminal = self
            .files
            .iter()
            .all(|f| matches!(f.status, FileStatus::Completed | FileStatus::Error));
        let any_error = self.files.iter().any(|f| f.status == FileStatus::Error);
        let any_transferring = self
            .files
            .iter()
            .any(|f| f.status == FileStatus::Transferring);

        let next = if all_completed {
            JobStatus::Completed
        } else if any_error && all_terminal {
            JobStatus::Failed
        } else if any_transferring {
            JobStatus::Active
        } else {
            self.status
        };

        if next != self.status {
            self.status = next;
            match next {
                JobStatus::Active => {
                    if self.started_at.is_none() {
                        self.started_at = Some(Utc::now());
                    }
                }
                JobStatus::Completed => {
                    self.completed_at = Some(Utc::now());
                }
                JobStatus::Failed => {
                    self.completed_at = Some(Utc::now());
                    self.error = Some(format!(
                        "{} of {} file(s) failed",
                        self.progress.failed_files, self.progress.total_files
                    ));
                }
                _ => {}
            }
        }
    }

    /// Cancel the job: terminal, authoritative over file-derived status.
    ///
    /// Every file that has not completed is marked as errored. In-flight
    /// executor calls are not interrupted; this is bookkeeping only.
    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        for file in &mut self.files {
            if file.status != FileStatus::Completed {
                file.status = FileStatus::Error;
                file.error = Some("Cancelled by user".to_string());
            }
        }
        self.recompute_progress();
    }

    fn recompute_progress(&mut self) {
        let total_files = self.files.len();
        let completed_files = self
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Completed)
            .count();
        let failed_files = self
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Error)
            .count();
        let total_bytes: u64 = self.files.iter().map(|f| f.size).sum();
        let loaded_bytes: u64 = self.files.iter().map(|f| f.loaded).sum();
        let percentage = if total_bytes > 0 {
            ((loaded_bytes as f64 / total_bytes as f64) * 100.0).round() as u32
        } else {
            0
        };

        self.progress = TransferProgress {
            total_files,
            completed_files,
            failed_files,
            total_bytes,
            loaded_bytes,
            percentage,
        };
    }
}

// ============================================================================
// Transfer Endpoints
// ============================================================================

/// Conflict resolution policy applied to a destination that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    Overwrite,
    Skip,
    Rename,
}

#[derive(Debug, Error)]
pub enum EndpointParseError {
    #[error("Invalid transfer path: {0}")]
    Invalid(String),

    #[error("Unsupported storage backend: {0}")]
    UnknownBackend(String),
}

/// A parsed transfer endpoint.
///
/// The opaque string form `<backend>:<locationId>/<relativePath>` is the wire
/// contract with the route layer; internally endpoints are this tagged value.
/// Parsing splits on the FIRST `:` and FIRST `/` only, so the relative path
/// may itself contain both characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEndpoint {
    Local { location: String, path: String },
    ObjectStore { location: String, path: String },
}

impl TransferEndpoint {
    pub fn parse(s: &str) -> Result<Self, EndpointParseError> {
        let (backend, rest) = s
            .split_once(':')
            .ok_or_else(|| EndpointParseError::Invalid(s.to_string()))?;
        let (location, path) = rest
            .split_once('/')
            .ok_or_else(|| EndpointParseError::Invalid(s.to_string()))?;

        match backend {
            "local" => Ok(Self::Local {
                location: location.to_string(),
                path: path.to_string(),
            }),
            "s3" => Ok(Self::ObjectStore {
                location: location.to_string(),
                path: path.to_string(),
            }),
            other => Err(EndpointParseError::UnknownBackend(other.to_string())),
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Self::Local { location, .. } | Self::ObjectStore { location, .. } => location,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Local { path, .. } | Self::ObjectStore { path, .. } => path,
        }
    }

    /// Replace the relative path, keeping backend and location.
    pub fn with_path(&self, path: String) -> Self {
        match self {
            Self::Local { location, .. } => Self::Local {
                location: location.clone(),
                path,
            },
            Self::ObjectStore { location, .. } => Self::ObjectStore {
                location: location.clone(),
                path,
            },
        }
    }
}

impl std::fmt::Display for TransferEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { location, path } => write!(f, "local:{location}/{path}"),
            Self::ObjectStore { location, path } => write!(f, "s3:{location}/{path}"),
        }
    }
}
