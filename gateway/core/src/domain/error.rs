// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Error Taxonomy
//!
//! Four-way classification shared by every core component. The route layer
//! maps these onto HTTP statuses (Security/NotFound/Permission/Storage map to
//! rejection, not-found, forbidden, and server-side failure respectively).

use thiserror::Error;

/// Errors surfaced by the storage gateway core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Path escapes bounds, absolute path injected, or disallowed characters.
    /// Never retried.
    #[error("Security violation: {0}")]
    Security(String),

    /// Unknown location, out-of-range index, missing parent, missing file.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Filesystem access denied.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Disk full, wrong node type, size limit exceeded, generic I/O failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Map an I/O error to the gateway taxonomy, attaching path context.
    pub fn from_io(err: &std::io::Error, context: &str) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(context.to_string()),
            ErrorKind::PermissionDenied => Self::Permission(context.to_string()),
            ErrorKind::StorageFull => Self::Storage("Disk full".to_string()),
            _ => Self::Storage(format!("{context}: {err}")),
        }
    }
}
