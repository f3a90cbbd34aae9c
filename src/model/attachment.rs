//! Attachment parts pulled out of a message's MIME tree.

use super::message::MessageId;

/// A leaf MIME part that qualifies as an attachment.
///
/// Only produced for non-container parts that carry a `Content-Disposition`
/// header and a filename; `bytes` is already transfer-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// Filename from the disposition `filename` or content-type `name` parameter.
    pub filename: String,

    /// MIME content type (e.g. `"text/csv"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded payload.
    pub bytes: Vec<u8>,
}

impl AttachmentPart {
    /// Decoded size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// An attachment whose filename matched the configured keyword,
/// together with the message it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAttachment {
    pub message_id: MessageId,
    pub part: AttachmentPart,
}
