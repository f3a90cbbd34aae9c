//! Object storage: the upload capability and the local scratch area that
//! feeds it.

pub mod s3;
pub mod scratch;

use std::path::Path;

use crate::error::Result;

/// Destination for relayed attachments.
pub trait ObjectStore {
    /// Upload the file at `local_path` to `bucket` under `key`.
    ///
    /// Failures are reported as [`crate::error::RelayError::Storage`].
    /// Implementations do not retry.
    fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;
}
