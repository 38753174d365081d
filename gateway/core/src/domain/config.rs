// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration consumed by the storage gateway core:
// - Ordered local storage roots (index position defines the location id)
// - Upload size and concurrency bounds
// - Object store connection parameters (S3-compatible endpoint)
// - Proxy settings forwarded to the HTTP stack
//
// Loading (environment variables, files) is owned by the embedding process;
// the core only consumes the resulting value.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default maximum size for a single file, 50 GiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024 * 1024;

/// Default number of file transfers admitted concurrently across all jobs.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 5;

/// Top-level configuration for the storage gateway core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Ordered list of local storage roots. The position in this list is the
    /// location index: the first root is `local-0`, the second `local-1`, ...
    #[serde(default)]
    pub storage_roots: Vec<PathBuf>,

    /// Maximum size of a single file accepted for upload/transfer.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Global concurrency limit for file-level transfer tasks.
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,

    /// Object store connection parameters. Absent when the deployment only
    /// serves local roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_store: Option<ObjectStoreConfig>,

    /// Optional proxy settings for outbound object-store traffic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            storage_roots: Vec::new(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            object_store: None,
            proxy: None,
        }
    }
}

/// Connection parameters for an S3-compatible object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Endpoint URL, e.g. "https://s3.us-east-1.amazonaws.com" or a MinIO URL.
    pub endpoint: String,

    /// Region name. S3-compatible stores usually accept any non-empty value.
    #[serde(default = "default_region")]
    pub region: String,

    pub access_key_id: String,
    pub secret_access_key: String,

    /// Default bucket. Doubles as the object-store location id in opaque
    /// transfer paths ("s3:<bucket>/<key>").
    pub bucket: String,
}

/// Proxy settings applied to the object-store HTTP stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE_BYTES
}

fn default_max_concurrent_transfers() -> usize {
    DEFAULT_MAX_CONCURRENT_TRANSFERS
}

fn default_region() -> String {
    "us-east-1".to_string()
}
