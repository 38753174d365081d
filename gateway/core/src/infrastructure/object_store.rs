// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! OpenDAL Object Store Adapter
//!
//! Concrete `ObjectStoreProvider` backed by OpenDAL's S3 service. One
//! operator is built per configured bucket; the bucket name doubles as the
//! object-store location id in opaque transfer paths.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use opendal::services::S3;
use opendal::Operator;

use crate::domain::config::{ObjectStoreConfig, ProxyConfig};
use crate::domain::object_store::{
    ByteStream, ObjectMetadata, ObjectStoreError, ObjectStoreProvider, ObjectWriter,
};

/// Part size for multipart uploads, 16 MiB.
const MULTIPART_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// S3-compatible object store client keyed by location (bucket).
pub struct OpendalObjectStore {
    operators: HashMap<String, Operator>,
}

impl OpendalObjectStore {
    /// Build operators from connection parameters.
    pub fn from_config(
        config: &ObjectStoreConfig,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self, ObjectStoreError> {
        if let Some(proxy) = proxy {
            apply_proxy_env(proxy);
        }

        let builder = S3::default()
            .bucket(&config.bucket)
            .endpoint(&config.endpoint)
            .region(&config.region)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key);

        let operator = Operator::new(builder)
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?
            .finish();

        let mut operators = HashMap::new();
        operators.insert(config.bucket.clone(), operator);

        tracing::info!(bucket = %config.bucket, endpoint = %config.endpoint, "Object store client ready");
        Ok(Self { operators })
    }

    fn operator(&self, location: &str) -> Result<&Operator, ObjectStoreError> {
        self.operators
            .get(location)
            .ok_or_else(|| ObjectStoreError::UnknownLocation(location.to_string()))
    }
}

#[async_trait]
impl ObjectStoreProvider for OpendalObjectStore {
    async fn head(&self, location: &str, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        let meta = self
            .operator(location)?
            .stat(key)
            .await
            .map_err(|e| map_opendal_error(e, location, key))?;
        Ok(ObjectMetadata {
            size: meta.content_length(),
        })
    }

    async fn exists(&self, location: &str, key: &str) -> Result<bool, ObjectStoreError> {
        self.operator(location)?
            .exists(key)
            .await
            .map_err(|e| map_opendal_error(e, location, key))
    }

    async fn get(&self, location: &str, key: &str) -> Result<ByteStream, ObjectStoreError> {
        let reader = self
            .operator(location)?
            .reader(key)
            .await
            .map_err(|e| map_opendal_error(e, location, key))?;
        let stream = reader
            .into_bytes_stream(..)
            .await
            .map_err(|e| map_opendal_error(e, location, key))?;
        Ok(stream
            .map_err(|e: std::io::Error| ObjectStoreError::Io(e.to_string()))
            .boxed())
    }

    async fn writer(
        &self,
        location: &str,
        key: &str,
    ) -> Result<Box<dyn ObjectWriter>, ObjectStoreError> {
        let writer = self
            .operator(location)?
            .writer_with(key)
            .chunk(MULTIPART_CHUNK_SIZE)
            .await
            .map_err(|e| map_opendal_error(e, location, key))?;
        Ok(Box::new(OpendalWriter { writer }))
    }

    async fn copy(
        &self,
        source_location: &str,
        source_key: &str,
        dest_location: &str,
        dest_key: &str,
    ) -> Result<(), ObjectStoreError> {
        // OpenDAL copies within one operator; a cross-bucket copy would have
        // to stream through the gateway, which this strategy must not do.
        if source_location != dest_location {
            return Err(ObjectStoreError::Unsupported(format!(
                "server-side copy across stores ({source_location} -> {dest_location})"
            )));
        }
        self.operator(source_location)?
            .copy(source_key, dest_key)
            .await
            .map_err(|e| map_opendal_error(e, source_location, source_key))
    }
}

struct OpendalWriter {
    writer: opendal::Writer,
}

#[async_trait]
impl ObjectWriter for OpendalWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<(), ObjectStoreError> {
        self.writer
            .write(chunk)
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ObjectStoreError> {
        self.writer
            .close()
            .await
            .map(|_| ())
            .map_err(|e| ObjectStoreError::Io(e.to_string()))
    }

    async fn abort(&mut self) -> Result<(), ObjectStoreError> {
        self.writer
            .abort()
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))
    }
}

fn map_opendal_error(err: opendal::Error, location: &str, key: &str) -> ObjectStoreError {
    if err.kind() == opendal::ErrorKind::NotFound {
        ObjectStoreError::NotFound(format!("{location}/{key}"))
    } else {
        ObjectStoreError::Io(err.to_string())
    }
}

/// The HTTP stack resolves proxies from the process environment, so forward
/// the configured values there before the first client is built.
fn apply_proxy_env(proxy: &ProxyConfig) {
    if let Some(http_proxy) = &proxy.http_proxy {
        std::env::set_var("HTTP_PROXY", http_proxy);
    }
    if let Some(https_proxy) = &proxy.https_proxy {
        std::env::set_var("HTTPS_PROXY", https_proxy);
    }
    if let Some(no_proxy) = &proxy.no_proxy {
        std::env::set_var("NO_PROXY", no_proxy);
    }
}
