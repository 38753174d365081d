// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the transfer executor
//!
//! These tests drive full jobs through the queue with a mock object store
//! and real tempdir-backed local roots, covering all four strategies and
//! every conflict-resolution policy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aegis_gateway::application::transfer_queue::TransferQueue;
use aegis_gateway::application::StorageTransferExecutor;
use aegis_gateway::domain::object_store::{
    ByteStream, ObjectMetadata, ObjectStoreError, ObjectStoreProvider, ObjectWriter,
};
use aegis_gateway::domain::path_resolver::PathResolver;
use aegis_gateway::domain::transfer::{
    ConflictPolicy, FileStatus, JobId, JobStatus, TransferJob, TransferJobKind, TransferRequest,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::TempDir;

type ObjectMap = Arc<Mutex<HashMap<(String, String), Vec<u8>>>>;

/// In-memory object store mirroring the provider contract.
#[derive(Default)]
struct MockObjectStore {
    objects: ObjectMap,
}

impl MockObjectStore {
    fn insert(&self, location: &str, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((location.to_string(), key.to_string()), data.to_vec());
    }

    fn data(&self, location: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(location.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStoreProvider for MockObjectStore {
    async fn head(&self, location: &str, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        self.data(location, key)
            .map(|data| ObjectMetadata {
                size: data.len() as u64,
            })
            .ok_or_else(|| ObjectStoreError::NotFound(format!("{location}/{key}")))
    }

    async fn exists(&self, location: &str, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.data(location, key).is_some())
    }

    async fn get(&self, location: &str, key: &str) -> Result<ByteStream, ObjectStoreError> {
        let data = self
            .data(location, key)
            .ok_or_else(|| ObjectStoreError::NotFound(format!("{location}/{key}")))?;
        let chunks: Vec<Result<Bytes, ObjectStoreError>> = data
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn writer(
        &self,
        location: &str,
        key: &str,
    ) -> Result<Box<dyn ObjectWriter>, ObjectStoreError> {
        Ok(Box::new(MockWriter {
            objects: self.objects.clone(),
            destination: (location.to_string(), key.to_string()),
            buffer: Vec::new(),
        }))
    }

    async fn copy(
        &self,
        source_location: &str,
        source_key: &str,
        dest_location: &str,
        dest_key: &str,
    ) -> Result<(), ObjectStoreError> {
        let data = self
            .data(source_location, source_key)
            .ok_or_else(|| ObjectStoreError::NotFound(format!("{source_location}/{source_key}")))?;
        self.insert(dest_location, dest_key, &data);
        Ok(())
    }
}

struct MockWriter {
    objects: ObjectMap,
    destination: (String, String),
    buffer: Vec<u8>,
}

#[async_trait]
impl ObjectWriter for MockWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<(), ObjectStoreError> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .insert(self.destination.clone(), std::mem::take(&mut self.buffer));
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), ObjectStoreError> {
        self.buffer.clear();
        Ok(())
    }
}

struct Harness {
    queue: TransferQueue,
    store: Arc<MockObjectStore>,
    roots: Vec<TempDir>,
    resolver: Arc<PathResolver>,
}

impl Harness {
    fn new() -> Self {
        let roots = vec![TempDir::new().unwrap(), TempDir::new().unwrap()];
        let resolver = Arc::new(PathResolver::new(
            roots.iter().map(|r| r.path().to_path_buf()).collect(),
        ));
        Self {
            queue: TransferQueue::new(2),
            store: Arc::new(MockObjectStore::default()),
            roots,
            resolver,
        }
    }

    fn executor(&self, policy: ConflictPolicy) -> Arc<StorageTransferExecutor> {
        Arc::new(StorageTransferExecutor::new(
            self.resolver.clone(),
            self.store.clone(),
            policy,
        ))
    }

    fn run_one(
        &self,
        kind: TransferJobKind,
        policy: ConflictPolicy,
        source: &str,
        dest: &str,
    ) -> JobId {
        self.queue.queue_job(
            kind,
            vec![TransferRequest {
                source_path: source.to_string(),
                destination_path: dest.to_string(),
                size: None,
            }],
            self.executor(policy),
        )
    }

    async fn wait_terminal(&self, id: JobId) -> TransferJob {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let job = self.queue.get_job(id).expect("job should exist");
            if job.status.is_terminal() {
                return job;
            }
            assert!(tokio::time::Instant::now() < deadline, "job did not finish");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[tokio::test]
async fn test_local_to_local_copy_creates_destination_tree() {
    let harness = Harness::new();
    std::fs::write(harness.roots[0].path().join("src.bin"), b"hello world").unwrap();

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Overwrite,
        "local:local-0/src.bin",
        "local:local-1/nested/dir/dst.bin",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.total_bytes, 11);
    assert_eq!(job.progress.loaded_bytes, 11);
    let copied =
        std::fs::read(harness.roots[1].path().join("nested/dir/dst.bin")).unwrap();
    assert_eq!(copied, b"hello world");
}

#[tokio::test]
async fn test_local_to_object_upload() {
    let harness = Harness::new();
    std::fs::write(harness.roots[0].path().join("up.bin"), b"upload me").unwrap();

    let id = harness.run_one(
        TransferJobKind::S3Upload,
        ConflictPolicy::Overwrite,
        "local:local-0/up.bin",
        "s3:bucket/models/up.bin",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        harness.store.data("bucket", "models/up.bin").unwrap(),
        b"upload me"
    );
    assert_eq!(job.progress.loaded_bytes, 9);
}

#[tokio::test]
async fn test_object_to_local_download() {
    let harness = Harness::new();
    harness.store.insert("bucket", "models/down.bin", b"streamed content");

    let id = harness.run_one(
        TransferJobKind::S3Download,
        ConflictPolicy::Overwrite,
        "s3:bucket/models/down.bin",
        "local:local-0/downloads/down.bin",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    // Size comes from the head request, bytes from the counted stream.
    assert_eq!(job.files[0].size, 16);
    assert_eq!(job.progress.loaded_bytes, 16);
    let downloaded =
        std::fs::read(harness.roots[0].path().join("downloads/down.bin")).unwrap();
    assert_eq!(downloaded, b"streamed content");
}

#[tokio::test]
async fn test_object_to_object_server_side_copy() {
    let harness = Harness::new();
    harness.store.insert("bucket", "a/orig.bin", b"copy me");

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Overwrite,
        "s3:bucket/a/orig.bin",
        "s3:bucket/b/copy.bin",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(harness.store.data("bucket", "b/copy.bin").unwrap(), b"copy me");
    // Atomic copy reports full progress at once.
    assert_eq!(job.progress.percentage, 100);
}

#[tokio::test]
async fn test_skip_policy_reports_zero_byte_completion() {
    let harness = Harness::new();
    std::fs::write(harness.roots[0].path().join("src.txt"), b"new content").unwrap();
    std::fs::write(harness.roots[1].path().join("dst.txt"), b"old").unwrap();

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Skip,
        "local:local-0/src.txt",
        "local:local-1/dst.txt",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.files[0].size, 0);
    assert_eq!(job.files[0].loaded, 0);
    // The existing destination was left alone.
    assert_eq!(
        std::fs::read(harness.roots[1].path().join("dst.txt")).unwrap(),
        b"old"
    );
}

#[tokio::test]
async fn test_overwrite_policy_replaces_destination() {
    let harness = Harness::new();
    std::fs::write(harness.roots[0].path().join("src.txt"), b"new content").unwrap();
    std::fs::write(harness.roots[1].path().join("dst.txt"), b"old").unwrap();

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Overwrite,
        "local:local-0/src.txt",
        "local:local-1/dst.txt",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        std::fs::read(harness.roots[1].path().join("dst.txt")).unwrap(),
        b"new content"
    );
}

#[tokio::test]
async fn test_rename_policy_probes_for_free_name() {
    let harness = Harness::new();
    std::fs::write(harness.roots[0].path().join("src.txt"), b"renamed content").unwrap();
    std::fs::write(harness.roots[1].path().join("dst.txt"), b"old").unwrap();
    std::fs::write(harness.roots[1].path().join("dst-1.txt"), b"older").unwrap();

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Rename,
        "local:local-0/src.txt",
        "local:local-1/dst.txt",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    // dst.txt and dst-1.txt were taken; dst-2.txt is the first free slot.
    assert_eq!(
        std::fs::read(harness.roots[1].path().join("dst-2.txt")).unwrap(),
        b"renamed content"
    );
    assert_eq!(
        std::fs::read(harness.roots[1].path().join("dst.txt")).unwrap(),
        b"old"
    );
}

#[tokio::test]
async fn test_rename_policy_in_object_store() {
    let harness = Harness::new();
    std::fs::write(harness.roots[0].path().join("src.txt"), b"upload").unwrap();
    harness.store.insert("bucket", "k.txt", b"taken");

    let id = harness.run_one(
        TransferJobKind::S3Upload,
        ConflictPolicy::Rename,
        "local:local-0/src.txt",
        "s3:bucket/k.txt",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(harness.store.data("bucket", "k-1.txt").unwrap(), b"upload");
    assert_eq!(harness.store.data("bucket", "k.txt").unwrap(), b"taken");
}

#[tokio::test]
async fn test_malformed_opaque_path_fails_the_file() {
    let harness = Harness::new();

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Overwrite,
        "garbage-without-separators",
        "local:local-0/dst.txt",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.files[0].status, FileStatus::Error);
    assert!(job.files[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Invalid transfer path"));
}

#[tokio::test]
async fn test_unknown_backend_fails_the_file() {
    let harness = Harness::new();

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Overwrite,
        "ftp:host/file.txt",
        "local:local-0/dst.txt",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.files[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Unsupported storage backend: ftp"));
}

#[tokio::test]
async fn test_traversal_in_transfer_source_fails_the_file() {
    let harness = Harness::new();

    let id = harness.run_one(
        TransferJobKind::CrossStorage,
        ConflictPolicy::Overwrite,
        "local:local-0/../../etc/passwd",
        "local:local-1/stolen.txt",
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.files[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Security violation"));
}

#[tokio::test]
async fn test_missing_object_fails_only_that_file() {
    let harness = Harness::new();
    harness.store.insert("bucket", "present.bin", b"data");

    let executor = harness.executor(ConflictPolicy::Overwrite);
    let id = harness.queue.queue_job(
        TransferJobKind::S3Download,
        vec![
            TransferRequest {
                source_path: "s3:bucket/present.bin".to_string(),
                destination_path: "local:local-0/present.bin".to_string(),
                size: None,
            },
            TransferRequest {
                source_path: "s3:bucket/absent.bin".to_string(),
                destination_path: "local:local-0/absent.bin".to_string(),
                size: None,
            },
        ],
        executor,
    );
    let job = harness.wait_terminal(id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress.completed_files, 1);
    assert_eq!(job.progress.failed_files, 1);
    assert!(harness
        .roots[0]
        .path()
        .join("present.bin")
        .exists());
}
