//! Transfer of selected attachments into object storage.
//!
//! Per attachment, strictly in order: date-suffix the filename, decode the
//! destination from the suffixed name, stage the bytes in the scratch
//! directory, upload, and delete the staged copy once the upload succeeded.

use std::path::PathBuf;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::config::RunSettings;
use crate::error::{RelayError, Result};
use crate::model::attachment::SelectedAttachment;
use crate::parser::filename::{dated_filename, decode};
use crate::storage::scratch::ScratchFile;
use crate::storage::ObjectStore;

/// What happened to one selected attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Stored under `key`; the scratch copy is gone (or its removal was logged).
    Uploaded { key: String, size: u64, sha256: String },
    /// Dry run: the key that would have been written.
    Planned { key: String },
    /// No destination could be decoded; nothing was written.
    Skipped { reason: String },
    /// Upload failed; the staged bytes remain at `scratch`.
    Failed {
        key: String,
        scratch: PathBuf,
        reason: String,
    },
}

/// Moves selected attachments into the store.
pub struct Transfer<'a, O: ObjectStore + ?Sized> {
    store: &'a O,
    settings: &'a RunSettings,
}

impl<'a, O: ObjectStore + ?Sized> Transfer<'a, O> {
    pub fn new(store: &'a O, settings: &'a RunSettings) -> Self {
        Self { store, settings }
    }

    /// Make sure the scratch directory exists. Not needed for dry runs.
    pub fn prepare(&self) -> Result<()> {
        if self.settings.dry_run {
            return Ok(());
        }
        let dir = &self.settings.scratch_dir;
        std::fs::create_dir_all(dir).map_err(|e| RelayError::io(dir, e))
    }

    /// Relay one attachment.
    ///
    /// Per-attachment problems come back as an outcome. Errors are fatal to
    /// the run: a scratch write failure, or a malformed filename when
    /// `strict_filenames` is set.
    pub fn relay(&self, selected: &SelectedAttachment) -> Result<TransferOutcome> {
        let part = &selected.part;
        let upload_name = dated_filename(&part.filename, self.settings.run_date);

        let destination = match decode(&upload_name, &self.settings.keyword) {
            Ok(destination) => destination,
            Err(e) if !self.settings.strict_filenames => {
                warn!(
                    id = %selected.message_id,
                    filename = %part.filename,
                    error = %e,
                    "Cannot decode storage path, skipping attachment"
                );
                return Ok(TransferOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        let key = destination.object_key();

        if self.settings.dry_run {
            info!(
                id = %selected.message_id,
                bucket = %self.settings.bucket,
                key = %key,
                "Dry run, would upload attachment"
            );
            return Ok(TransferOutcome::Planned { key });
        }

        let scratch = ScratchFile::persist(&self.settings.scratch_dir, &upload_name, &part.bytes)?;
        info!(
            id = %selected.message_id,
            path = %scratch.path().display(),
            size = scratch.size(),
            "Attachment staged"
        );

        info!(bucket = %self.settings.bucket, key = %key, "Uploading attachment");
        match self
            .store
            .put_object(&self.settings.bucket, &key, scratch.path())
        {
            Ok(()) => {
                info!(bucket = %self.settings.bucket, key = %key, "Upload complete");
                let size = scratch.size();
                match scratch.remove() {
                    Ok(()) => info!(filename = %upload_name, "Scratch file removed"),
                    Err(e) => warn!(
                        error = %e,
                        "Uploaded, but the scratch file could not be removed"
                    ),
                }
                Ok(TransferOutcome::Uploaded {
                    key,
                    size,
                    sha256: format!("{:x}", Sha256::digest(&part.bytes)),
                })
            }
            Err(e) if !e.is_fatal() => {
                let scratch = scratch.keep();
                error!(
                    id = %selected.message_id,
                    key = %key,
                    scratch = %scratch.display(),
                    error = %e,
                    "Upload failed, keeping scratch file"
                );
                Ok(TransferOutcome::Failed {
                    key,
                    scratch,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}
