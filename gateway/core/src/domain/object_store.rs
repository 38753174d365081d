// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Object Store Provider Trait - Anti-Corruption Layer for S3 Backends
//!
//! Abstracts the S3-compatible backend so the transfer engine stays isolated
//! from the concrete client library. Enables testing with mocks and future
//! migration to other object stores.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::error::GatewayError;

/// Stream of object content chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, ObjectStoreError>>;

/// Metadata returned by a head request.
#[derive(Debug, Clone, Copy)]
pub struct ObjectMetadata {
    /// Content length in bytes.
    pub size: u64,
}

/// Object store errors
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Unknown object store location: {0}")]
    UnknownLocation(String),

    #[error("Unsupported object store operation: {0}")]
    Unsupported(String),

    #[error("Object store I/O error: {0}")]
    Io(String),
}

impl From<ObjectStoreError> for GatewayError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound(key) => GatewayError::NotFound(key),
            ObjectStoreError::UnknownLocation(loc) => GatewayError::NotFound(loc),
            other => GatewayError::Storage(other.to_string()),
        }
    }
}

/// Operations the transfer engine needs from an S3-compatible backend.
///
/// `location` names one configured store (the bucket); `key` is the object
/// key within it.
#[async_trait]
pub trait ObjectStoreProvider: Send + Sync {
    /// Metadata-only head request.
    async fn head(&self, location: &str, key: &str) -> Result<ObjectMetadata, ObjectStoreError>;

    /// Whether an object exists. Used as the conflict-resolution probe.
    async fn exists(&self, location: &str, key: &str) -> Result<bool, ObjectStoreError>;

    /// Fetch an object as a chunk stream.
    async fn get(&self, location: &str, key: &str) -> Result<ByteStream, ObjectStoreError>;

    /// Open a streaming (multipart) writer for an object.
    async fn writer(
        &self,
        location: &str,
        key: &str,
    ) -> Result<Box<dyn ObjectWriter>, ObjectStoreError>;

    /// Server-side copy within one store. Atomic; content never flows
    /// through the gateway.
    async fn copy(
        &self,
        source_location: &str,
        source_key: &str,
        dest_location: &str,
        dest_key: &str,
    ) -> Result<(), ObjectStoreError>;
}

/// Streaming upload handle.
///
/// `abort` tears down the backing multipart upload; it is the only explicit
/// cancellation channel the transfer engine has (see the queue's
/// cancellation semantics).
#[async_trait]
pub trait ObjectWriter: Send {
    async fn write(&mut self, chunk: Bytes) -> Result<(), ObjectStoreError>;

    async fn close(&mut self) -> Result<(), ObjectStoreError>;

    async fn abort(&mut self) -> Result<(), ObjectStoreError>;
}
