// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local File Operations Application Service
//!
//! Directory listing, creation, deletion, metadata, and size-limit checks
//! against the configured local storage roots, plus the location registry
//! itself. All paths passed to the file operations must already have been
//! validated by the path resolver; this service performs the I/O only.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::location::{
    DirectoryListing, FileEntry, FileEntryKind, LocationId, StorageLocation, StorageLocationKind,
};

pub struct LocalFileService {
    roots: Vec<PathBuf>,
    max_file_size_bytes: u64,
}

impl LocalFileService {
    pub fn new(roots: Vec<PathBuf>, max_file_size_bytes: u64) -> Self {
        Self {
            roots,
            max_file_size_bytes,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.storage_roots.clone(), config.max_file_size_bytes)
    }

    /// Enumerate configured roots with current availability.
    ///
    /// Availability is recomputed by a stat on every call and never cached.
    /// This never fails; an unreachable root is reported as unavailable.
    pub fn list_locations(&self) -> Vec<StorageLocation> {
        self.roots
            .iter()
            .enumerate()
            .map(|(index, root)| {
                let available = match std::fs::metadata(root) {
                    Ok(meta) if meta.is_dir() => true,
                    Ok(_) => {
                        tracing::warn!(root = %root.display(), "Storage root exists but is not a directory");
                        false
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        tracing::warn!(root = %root.display(), "Storage root is missing");
                        false
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                        tracing::warn!(root = %root.display(), "Storage root is not accessible: permission denied");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(root = %root.display(), error = %e, "Failed to stat storage root");
                        false
                    }
                };

                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| root.display().to_string());

                StorageLocation {
                    id: LocationId(index).to_string(),
                    name,
                    path: root.display().to_string(),
                    kind: StorageLocationKind::Local,
                    available,
                }
            })
            .collect()
    }

    /// List a directory, directories first then lexicographic by name.
    ///
    /// `total_count` reports the full entry count; pagination slices after
    /// sorting. Entries that cannot be stat'd are skipped rather than
    /// failing the whole listing.
    pub fn list_directory(
        &self,
        path: &Path,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<DirectoryListing, GatewayError> {
        let read_dir = std::fs::read_dir(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotADirectory => {
                GatewayError::Storage("Not a directory".to_string())
            }
            _ => GatewayError::from_io(&e, &path.display().to_string()),
        })?;

        let mut entries: Vec<FileEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| self.read_entry(path, &entry))
            .collect();

        entries.sort_by(|a, b| {
            let a_dir = a.kind == FileEntryKind::Directory;
            let b_dir = b.kind == FileEntryKind::Directory;
            b_dir.cmp(&a_dir).then_with(|| a.name.cmp(&b.name))
        });

        let total_count = entries.len();
        let files: Vec<FileEntry> = entries
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        Ok(DirectoryListing { files, total_count })
    }

    /// Create a directory tree. Idempotent when it already exists.
    pub fn create_directory(&self, path: &Path) -> Result<(), GatewayError> {
        std::fs::create_dir_all(path)
            .map_err(|e| GatewayError::from_io(&e, &path.display().to_string()))
    }

    /// Delete a file or directory tree, returning the number of items
    /// removed (a directory counts its descendants plus itself).
    pub fn delete(&self, path: &Path) -> Result<u64, GatewayError> {
        let meta = std::fs::symlink_metadata(path)
            .map_err(|e| GatewayError::from_io(&e, &path.display().to_string()))?;

        if meta.is_dir() {
            let count = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .count() as u64;
            std::fs::remove_dir_all(path)
                .map_err(|e| GatewayError::from_io(&e, &path.display().to_string()))?;
            tracing::info!(path = %path.display(), items = count, "Deleted directory tree");
            Ok(count)
        } else {
            std::fs::remove_file(path)
                .map_err(|e| GatewayError::from_io(&e, &path.display().to_string()))?;
            Ok(1)
        }
    }

    /// Metadata for a single entry. Uses a non-following stat so symlinks
    /// report their own type and target.
    pub fn file_metadata(&self, path: &Path) -> Result<FileEntry, GatewayError> {
        let meta = std::fs::symlink_metadata(path)
            .map_err(|e| GatewayError::from_io(&e, &path.display().to_string()))?;

        let kind = entry_kind(&meta.file_type());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let (size, modified) = match kind {
            FileEntryKind::Directory => (None, None),
            _ => (
                Some(meta.len()),
                meta.modified().ok().map(DateTime::<Utc>::from),
            ),
        };
        let target = if kind == FileEntryKind::Symlink {
            std::fs::read_link(path)
                .ok()
                .map(|t| t.display().to_string())
        } else {
            None
        };

        Ok(FileEntry {
            name,
            path: self.relative_to_root(path),
            kind,
            size,
            modified,
            target,
        })
    }

    /// Reject files strictly larger than the configured maximum. Equality is
    /// allowed.
    pub fn check_file_size(&self, path: &Path) -> Result<(), GatewayError> {
        let meta = std::fs::metadata(path)
            .map_err(|e| GatewayError::from_io(&e, &path.display().to_string()))?;

        if meta.len() > self.max_file_size_bytes {
            return Err(GatewayError::Storage(format!(
                "File size {:.2} GB exceeds the maximum allowed size {:.2} GB",
                gigabytes(meta.len()),
                gigabytes(self.max_file_size_bytes)
            )));
        }
        Ok(())
    }

    fn read_entry(&self, dir: &Path, entry: &std::fs::DirEntry) -> Option<FileEntry> {
        // DirEntry::metadata does not traverse symlinks.
        let meta = entry.metadata().ok()?;
        let kind = entry_kind(&meta.file_type());
        let name = entry.file_name().to_string_lossy().into_owned();
        let full = dir.join(entry.file_name());

        let (size, modified) = match kind {
            FileEntryKind::Directory => (None, None),
            _ => (
                Some(meta.len()),
                meta.modified().ok().map(DateTime::<Utc>::from),
            ),
        };
        let target = if kind == FileEntryKind::Symlink {
            std::fs::read_link(&full).ok().map(|t| t.display().to_string())
        } else {
            None
        };

        Some(FileEntry {
            name,
            path: self.relative_to_root(&full),
            kind,
            size,
            modified,
            target,
        })
    }

    /// Strip the owning root so listings report location-relative paths.
    /// Resolved paths may carry the canonicalized root prefix, so both forms
    /// are tried.
    fn relative_to_root(&self, path: &Path) -> String {
        for root in &self.roots {
            if let Ok(rel) = path.strip_prefix(root) {
                return rel.display().to_string();
            }
            if let Ok(root_real) = std::fs::canonicalize(root) {
                if let Ok(rel) = path.strip_prefix(&root_real) {
                    return rel.display().to_string();
                }
            }
        }
        path.display().to_string()
    }
}

fn entry_kind(file_type: &std::fs::FileType) -> FileEntryKind {
    if file_type.is_symlink() {
        FileEntryKind::Symlink
    } else if file_type.is_dir() {
        FileEntryKind::Directory
    } else {
        FileEntryKind::File
    }
}

fn gigabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
