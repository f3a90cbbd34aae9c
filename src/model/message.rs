//! Mailbox message handles.

use std::fmt;

/// Opaque handle for one message within a mailbox session.
///
/// Wraps the sequence number assigned by the server. Only meaningful
/// inside the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Header fields logged for each message that carries selected attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSummary {
    /// `From:` header, as written in the message.
    pub from: String,
    /// Decoded subject line, empty when absent.
    pub subject: String,
}
