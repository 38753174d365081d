// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

/// Index of a configured local storage root.
///
/// The external form is `local-<index>` ("local-0", "local-1", ...). Parsing
/// is strict: only ASCII digits after the prefix, no sign, no whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(pub usize);

impl LocationId {
    /// Parse a `local-<nonnegative integer>` identifier.
    ///
    /// Returns `None` for anything else, including object-store identifiers.
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("local-")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEntryKind {
    File,
    Directory,
    Symlink,
}

/// One configured storage root, as reported to clients.
///
/// Built at query time from configuration; `available` is recomputed on every
/// query by a filesystem stat and never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocation {
    /// External identifier, e.g. "local-0".
    pub id: String,

    /// Basename of the root directory.
    pub name: String,

    /// Absolute root path.
    pub path: String,

    #[serde(rename = "type")]
    pub kind: StorageLocationKind,

    /// Whether the root currently exists and is a directory.
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocationKind {
    Local,
}

/// One entry of a directory listing or metadata query.
///
/// Ephemeral; produced per call. `path` is relative to the location root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,

    pub path: String,

    #[serde(rename = "type")]
    pub kind: FileEntryKind,

    /// Size in bytes. Populated for files and symlinks only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Last modification time. Populated for files and symlinks only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    /// Link destination, for symlinks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Result of a paginated directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub files: Vec<FileEntry>,

    /// Full entry count irrespective of pagination.
    pub total_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_id_parse_valid() {
        assert_eq!(LocationId::parse("local-0"), Some(LocationId(0)));
        assert_eq!(LocationId::parse("local-17"), Some(LocationId(17)));
    }

    #[test]
    fn test_location_id_parse_invalid() {
        assert_eq!(LocationId::parse("local-"), None);
        assert_eq!(LocationId::parse("local--1"), None);
        assert_eq!(LocationId::parse("local-+1"), None);
        assert_eq!(LocationId::parse("local-1x"), None);
        assert_eq!(LocationId::parse("local-1 "), None);
        assert_eq!(LocationId::parse("s3-0"), None);
        assert_eq!(LocationId::parse("remote-0"), None);
        assert_eq!(LocationId::parse(""), None);
    }

    #[test]
    fn test_location_id_display_roundtrip() {
        let id = LocationId(3);
        assert_eq!(LocationId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn test_file_entry_serialization_omits_empty_fields() {
        let entry = FileEntry {
            name: "sub".to_string(),
            path: "a/sub".to_string(),
            kind: FileEntryKind::Directory,
            size: None,
            modified: None,
            target: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "directory");
        assert!(json.get("size").is_none());
        assert!(json.get("target").is_none());
    }
}
