//! Amazon S3 backend.
//!
//! The SDK is async-only; the relay is a sequential batch job, so each call
//! is driven to completion on a private current-thread runtime.

use std::path::Path;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Runtime;
use tracing::debug;

use super::ObjectStore;
use crate::error::{RelayError, Result};

/// S3 client using the standard AWS credential and region chain.
pub struct S3Store {
    runtime: Runtime,
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Load AWS configuration from the environment.
    ///
    /// `region` overrides whatever the environment or profile specifies.
    pub fn from_env(region: Option<&str>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RelayError::Config(format!("cannot start storage runtime: {e}")))?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region.to_string()));
        }
        let cfg = runtime.block_on(loader.load());
        debug!(region = ?cfg.region(), "Loaded AWS configuration");

        Ok(Self {
            runtime,
            client: aws_sdk_s3::Client::new(&cfg),
        })
    }
}

impl ObjectStore for S3Store {
    fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let storage_error = |reason: String| RelayError::Storage {
            key: key.to_string(),
            reason,
        };

        self.runtime.block_on(async {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| storage_error(format!("read {}: {e}", local_path.display())))?;
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    storage_error(format!("s3://{bucket}/{key}: {}", DisplayErrorContext(e)))
                })?;
            Ok(())
        })
    }
}
