// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer Executor Application Service
//!
//! Moves one file between two storage backends. Four strategies, selected by
//! the (source, destination) backend pair:
//!
//! - object store -> local: streamed download through a byte-counting stage
//! - local -> object store: streamed multipart upload, abortable
//! - local -> local: streamed copy through the same byte-counting stage
//! - object store -> object store: native server-side copy, no gateway
//!   streaming
//!
//! Conflict resolution (overwrite / skip / rename) is applied to the
//! destination before any bytes move. Existence probes fail open: a probe
//! error is treated as "does not exist" and the transfer proceeds.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::application::transfer_queue::{ProgressHandle, TransferHandler};
use crate::domain::object_store::ObjectStoreProvider;
use crate::domain::path_resolver::PathResolver;
use crate::domain::transfer::{ConflictPolicy, TransferEndpoint, TransferRequest};

/// Buffer size for counted stream copies, 1 MiB.
const COPY_CHUNK_SIZE: usize = 1024 * 1024;

/// Executor over the gateway's two backend families.
///
/// One instance is created per job, closed over the job's conflict policy,
/// and handed to the queue as its `TransferHandler`.
pub struct StorageTransferExecutor {
    resolver: Arc<PathResolver>,
    object_store: Arc<dyn ObjectStoreProvider>,
    conflict_policy: ConflictPolicy,
}

impl StorageTransferExecutor {
    pub fn new(
        resolver: Arc<PathResolver>,
        object_store: Arc<dyn ObjectStoreProvider>,
        conflict_policy: ConflictPolicy,
    ) -> Self {
        Self {
            resolver,
            object_store,
            conflict_policy,
        }
    }

    /// Apply the conflict policy to the destination. `None` means the
    /// transfer should be skipped entirely.
    async fn resolve_conflict(
        &self,
        destination: &TransferEndpoint,
    ) -> anyhow::Result<Option<TransferEndpoint>> {
        match self.conflict_policy {
            ConflictPolicy::Overwrite => Ok(Some(destination.clone())),
            ConflictPolicy::Skip => {
                if self.destination_exists(destination).await {
                    tracing::debug!(destination = %destination, "Destination exists, skipping");
                    Ok(None)
                } else {
                    Ok(Some(destination.clone()))
                }
            }
            ConflictPolicy::Rename => {
                if !self.destination_exists(destination).await {
                    return Ok(Some(destination.clone()));
                }
                let mut suffix = 1u32;
                loop {
                    let candidate = destination.with_path(renamed(destination.path(), suffix));
                    if !self.destination_exists(&candidate).await {
                        tracing::debug!(destination = %candidate, "Renamed conflicting destination");
                        return Ok(Some(candidate));
                    }
                    suffix += 1;
                }
            }
        }
    }

    /// Existence probe for a destination endpoint. Any failure counts as
    /// "does not exist".
    async fn destination_exists(&self, endpoint: &TransferEndpoint) -> bool {
        match endpoint {
            TransferEndpoint::Local { location, path } => self
                .resolver
                .resolve(location, path)
                .map(|abs| abs.exists())
                .unwrap_or(false),
            TransferEndpoint::ObjectStore { location, path } => self
                .object_store
                .exists(location, path)
                .await
                .unwrap_or(false),
        }
    }

    /// Validate a local destination and make sure its directory tree exists.
    ///
    /// The resolver only tolerates one missing level (the leaf), so missing
    /// ancestor directories are created one validated segment at a time.
    async fn prepare_local_destination(
        &self,
        location: &str,
        rel_path: &str,
    ) -> anyhow::Result<std::path::PathBuf> {
        if let Some((dir, _file)) = rel_path.rsplit_once('/') {
            let mut partial = String::new();
            for segment in dir.split('/').filter(|s| !s.is_empty() && *s != ".") {
                if !partial.is_empty() {
                    partial.push('/');
                }
                partial.push_str(segment);
                let abs = self.resolver.resolve(location, &partial)?;
                tokio::fs::create_dir_all(&abs)
                    .await
                    .with_context(|| format!("creating {}", abs.display()))?;
            }
        }
        Ok(self.resolver.resolve(location, rel_path)?)
    }

    async fn object_to_local(
        &self,
        source_location: &str,
        source_key: &str,
        dest_location: &str,
        dest_path: &str,
        progress: &ProgressHandle,
    ) -> anyhow::Result<()> {
        let meta = self.object_store.head(source_location, source_key).await?;
        progress.set_file_size(meta.size);

        let dest_abs = self.prepare_local_destination(dest_location, dest_path).await?;

        let mut stream = self.object_store.get(source_location, source_key).await?;
        let mut file = tokio::fs::File::create(&dest_abs)
            .await
            .with_context(|| format!("creating {}", dest_abs.display()))?;

        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk).await?;
            progress.add_loaded(chunk.len() as u64);
        }
        file.flush().await?;
        Ok(())
    }

    async fn local_to_object(
        &self,
        source_location: &str,
        source_path: &str,
        dest_location: &str,
        dest_key: &str,
        progress: &ProgressHandle,
    ) -> anyhow::Result<()> {
        let source_abs = self.resolver.resolve(source_location, source_path)?;
        let meta = tokio::fs::metadata(&source_abs)
            .await
            .with_context(|| format!("reading {}", source_abs.display()))?;
        progress.set_file_size(meta.len());

        let mut file = tokio::fs::File::open(&source_abs).await?;
        let mut writer = self.object_store.writer(dest_location, dest_key).await?;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];

        loop {
            // The multipart upload is the one path with a real abort
            // channel; honor a cancellation observed between chunks.
            if progress.is_cancelled() {
                let _ = writer.abort().await;
                return Err(anyhow!("Upload aborted after cancellation"));
            }

            let read = file.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            if let Err(e) = writer.write(Bytes::copy_from_slice(&buf[..read])).await {
                let _ = writer.abort().await;
                return Err(e.into());
            }
            progress.add_loaded(read as u64);
        }

        writer.close().await?;
        Ok(())
    }

    async fn local_to_local(
        &self,
        source_location: &str,
        source_path: &str,
        dest_location: &str,
        dest_path: &str,
        progress: &ProgressHandle,
    ) -> anyhow::Result<()> {
        let source_abs = self.resolver.resolve(source_location, source_path)?;
        let meta = tokio::fs::metadata(&source_abs)
            .await
            .with_context(|| format!("reading {}", source_abs.display()))?;
        progress.set_file_size(meta.len());

        let dest_abs = self.prepare_local_destination(dest_location, dest_path).await?;

        let mut reader = tokio::fs::File::open(&source_abs).await?;
        let mut writer = tokio::fs::File::create(&dest_abs)
            .await
            .with_context(|| format!("creating {}", dest_abs.display()))?;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];

        loop {
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buf[..read]).await?;
            progress.add_loaded(read as u64);
        }
        writer.flush().await?;
        Ok(())
    }

    async fn object_to_object(
        &self,
        source_location: &str,
        source_key: &str,
        dest_location: &str,
        dest_key: &str,
        progress: &ProgressHandle,
    ) -> anyhow::Result<()> {
        let meta = self.object_store.head(source_location, source_key).await?;
        progress.set_file_size(meta.size);

        self.object_store
            .copy(source_location, source_key, dest_location, dest_key)
            .await?;

        // The copy is atomic on the server; report full progress at once.
        progress.add_loaded(meta.size);
        Ok(())
    }
}

#[async_trait]
impl TransferHandler for StorageTransferExecutor {
    async fn execute(
        &self,
        request: &TransferRequest,
        progress: &ProgressHandle,
    ) -> anyhow::Result<()> {
        let source = TransferEndpoint::parse(&request.source_path)?;
        let destination = TransferEndpoint::parse(&request.destination_path)?;

        let Some(destination) = self.resolve_conflict(&destination).await? else {
            // Skipped: report as completed with zero bytes.
            progress.set_file_size(0);
            return Ok(());
        };

        match (&source, &destination) {
            (
                TransferEndpoint::ObjectStore { location: src_loc, path: src_key },
                TransferEndpoint::Local { location: dst_loc, path: dst_path },
            ) => {
                self.object_to_local(src_loc, src_key, dst_loc, dst_path, progress)
                    .await
            }
            (
                TransferEndpoint::Local { location: src_loc, path: src_path },
                TransferEndpoint::ObjectStore { location: dst_loc, path: dst_key },
            ) => {
                self.local_to_object(src_loc, src_path, dst_loc, dst_key, progress)
                    .await
            }
            (
                TransferEndpoint::Local { location: src_loc, path: src_path },
                TransferEndpoint::Local { location: dst_loc, path: dst_path },
            ) => {
                self.local_to_local(src_loc, src_path, dst_loc, dst_path, progress)
                    .await
            }
            (
                TransferEndpoint::ObjectStore { location: src_loc, path: src_key },
                TransferEndpoint::ObjectStore { location: dst_loc, path: dst_key },
            ) => {
                self.object_to_object(src_loc, src_key, dst_loc, dst_key, progress)
                    .await
            }
        }
    }
}

/// Build the `suffix`-th rename candidate: `name-1.ext`, `name-2.ext`, ...
/// Only the final path segment is rewritten.
fn renamed(path: &str, suffix: u32) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };

    let renamed_file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{suffix}.{ext}"),
        _ => format!("{file}-{suffix}"),
    };

    match dir {
        Some(dir) => format!("{dir}/{renamed_file}"),
        None => renamed_file,
    }
}
