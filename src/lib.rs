//! `attachment-relay` — files keyword-tagged mail attachments into S3.
//!
//! One run scans an IMAP mailbox for a single day, picks the attachments
//! whose filename contains the configured keyword, decodes a storage path
//! from the filename prefix, and uploads each one through a local scratch
//! copy that is removed once the upload succeeds.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod storage;
