// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path Resolver Domain Service
//!
//! Turns a user-supplied (location id, relative path) pair into an absolute
//! filesystem path guaranteed to stay inside the configured root, even in the
//! presence of symlinks, percent-encoding tricks, combining-character
//! disguises, and `..` traversal sequences. This is a domain service because
//! path containment is a core business rule for security, not a technical
//! concern.
//!
//! # Security Guarantees
//!
//! - Percent-encoded and Unicode-composed traversal sequences are decoded and
//!   NFC-normalized before any check runs
//! - Backslashes and NUL bytes are rejected outright
//! - Lexical traversal (`../../etc`) is rejected before touching the
//!   filesystem
//! - Symlinks are fully resolved; a link inside the root pointing outside it
//!   is rejected after resolution

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use unicode_normalization::UnicodeNormalization;

use crate::domain::error::GatewayError;
use crate::domain::location::LocationId;

/// Resolves user paths against the configured local storage roots.
pub struct PathResolver {
    roots: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `relative_path` inside the root named by `location_id`.
    ///
    /// Returns the validated absolute path. For a path that does not exist
    /// yet (creation scenarios) the parent directory is resolved and
    /// validated instead, and `parent/basename` is returned. Callers own all
    /// subsequent I/O.
    ///
    /// # Errors
    /// * `GatewayError::NotFound` - unknown location, missing parent
    /// * `GatewayError::Security` - the path escapes the root in any form
    /// * `GatewayError::Permission` / `GatewayError::Storage` - filesystem
    ///   failures during resolution
    pub fn resolve(&self, location_id: &str, relative_path: &str) -> Result<PathBuf, GatewayError> {
        let location = LocationId::parse(location_id).ok_or_else(|| {
            GatewayError::NotFound(format!("Unknown storage location: {location_id}"))
        })?;
        let root = self.roots.get(location.index()).ok_or_else(|| {
            GatewayError::NotFound(format!("Unknown storage location: {location_id}"))
        })?;

        // Decode percent-escapes so "%2e%2e%2f" is seen as "../". A path that
        // fails to decode is checked in its raw form instead of rejected.
        let decoded = match percent_decode_str(relative_path).decode_utf8() {
            Ok(cow) => cow.into_owned(),
            Err(_) => relative_path.to_string(),
        };

        // Canonical composition closes combining-character disguises of '.'
        // and '/'.
        let composed: String = decoded.nfc().collect();

        if composed.contains('\\') {
            tracing::warn!(path = %relative_path, "Rejected path containing backslash");
            return Err(GatewayError::Security(
                "Path contains disallowed backslash".to_string(),
            ));
        }
        if composed.contains('\0') {
            tracing::warn!(path = %relative_path, "Rejected path containing NUL byte");
            return Err(GatewayError::Security(
                "Path contains NUL byte".to_string(),
            ));
        }

        let composed = if composed.is_empty() {
            ".".to_string()
        } else {
            composed
        };
        let rel = Path::new(&composed);
        if rel.is_absolute() {
            tracing::warn!(path = %relative_path, "Rejected absolute relative-path input");
            return Err(GatewayError::Security(
                "Absolute paths are not allowed".to_string(),
            ));
        }

        // Lexical pre-flight: resolve "." and ".." without filesystem access
        // and require the join to stay under the root. This rejects pure
        // traversal cheaply before any stat.
        let root_norm = lexical_normalize(root);
        let joined = lexical_normalize(&root_norm.join(rel));
        if !joined.starts_with(&root_norm) {
            tracing::warn!(
                path = %relative_path,
                root = %root.display(),
                "Path traversal attempt blocked before filesystem access"
            );
            return Err(GatewayError::Security(format!(
                "Path escapes storage root: {relative_path}"
            )));
        }

        let root_real = std::fs::canonicalize(&root_norm)
            .map_err(|e| GatewayError::from_io(&e, &root_norm.display().to_string()))?;

        // Resolve symlinks on the joined path. A missing leaf falls back to
        // resolving the parent so that creation targets can be validated.
        let resolved = match std::fs::canonicalize(&joined) {
            Ok(real) => real,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.resolve_missing(&joined, &root_real)?
            }
            Err(e) => return Err(GatewayError::from_io(&e, &joined.display().to_string())),
        };

        // Post-resolution containment defeats symlinks created inside the
        // root that point outside it.
        if !resolved.starts_with(&root_real) {
            tracing::warn!(
                path = %relative_path,
                resolved = %resolved.display(),
                root = %root_real.display(),
                "Symlink escape blocked after resolution"
            );
            return Err(GatewayError::Security(format!(
                "Path escapes storage root: {relative_path}"
            )));
        }

        Ok(resolved)
    }

    /// Validate a not-yet-existing path by resolving its parent directory.
    fn resolve_missing(&self, joined: &Path, root_real: &Path) -> Result<PathBuf, GatewayError> {
        let parent = joined.parent().ok_or_else(|| {
            GatewayError::NotFound(format!("Parent directory does not exist: {}", joined.display()))
        })?;
        let name = joined.file_name().ok_or_else(|| {
            GatewayError::Security(format!("Invalid path: {}", joined.display()))
        })?;

        let parent_real = std::fs::canonicalize(parent).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewayError::NotFound(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                ))
            } else {
                GatewayError::from_io(&e, &parent.display().to_string())
            }
        })?;

        if !parent_real.starts_with(root_real) {
            tracing::warn!(
                parent = %parent_real.display(),
                root = %root_real.display(),
                "Parent directory escapes storage root"
            );
            return Err(GatewayError::Security(format!(
                "Path escapes storage root: {}",
                joined.display()
            )));
        }

        Ok(parent_real.join(name))
    }
}

/// Lexical path normalization without filesystem access.
///
/// Removes `.` components and resolves `..` components lexically. A `..`
/// that cannot be popped is kept, so an escaping path still compares outside
/// the root.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::ParentDir) | Some(Component::RootDir)
                    )
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_normalize_drops_cur_dir() {
        assert_eq!(
            lexical_normalize(Path::new("/data/./a/./b")),
            PathBuf::from("/data/a/b")
        );
    }

    #[test]
    fn test_lexical_normalize_resolves_parent_dir() {
        assert_eq!(
            lexical_normalize(Path::new("/data/a/../b")),
            PathBuf::from("/data/b")
        );
    }

    #[test]
    fn test_lexical_normalize_keeps_unpoppable_parent() {
        let normalized = lexical_normalize(Path::new("/data/../../etc"));
        assert!(!normalized.starts_with("/data"));
    }

    #[test]
    fn test_unknown_location_is_not_found() {
        let resolver = PathResolver::new(vec![PathBuf::from("/tmp")]);
        assert!(matches!(
            resolver.resolve("local-9", "x"),
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("s3-0", "x"),
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("local-abc", "x"),
            Err(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn test_backslash_and_nul_are_security_errors() {
        let resolver = PathResolver::new(vec![PathBuf::from("/tmp")]);
        assert!(matches!(
            resolver.resolve("local-0", "a\\b"),
            Err(GatewayError::Security(_))
        ));
        assert!(matches!(
            resolver.resolve("local-0", "a\0b"),
            Err(GatewayError::Security(_))
        ));
        // Encoded forms decode to the same rejected bytes.
        assert!(matches!(
            resolver.resolve("local-0", "a%5Cb"),
            Err(GatewayError::Security(_))
        ));
        assert!(matches!(
            resolver.resolve("local-0", "a%00b"),
            Err(GatewayError::Security(_))
        ));
    }

    #[test]
    fn test_absolute_input_is_security_error() {
        let resolver = PathResolver::new(vec![PathBuf::from("/tmp")]);
        assert!(matches!(
            resolver.resolve("local-0", "/etc/passwd"),
            Err(GatewayError::Security(_))
        ));
    }

    #[test]
    fn test_lexical_traversal_is_security_error() {
        let resolver = PathResolver::new(vec![PathBuf::from("/tmp")]);
        assert!(matches!(
            resolver.resolve("local-0", "../etc/passwd"),
            Err(GatewayError::Security(_))
        ));
        assert!(matches!(
            resolver.resolve("local-0", "a/../../etc/passwd"),
            Err(GatewayError::Security(_))
        ));
        // Percent-encoded traversal decodes to the same sequence.
        assert!(matches!(
            resolver.resolve("local-0", "%2e%2e%2fetc%2fpasswd"),
            Err(GatewayError::Security(_))
        ));
    }
}
