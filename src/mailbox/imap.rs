//! Blocking IMAP-over-TLS implementation of [`MailSession`].

use std::fmt;
use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use super::{DateCriterion, MailSession};
use crate::error::{RelayError, Result};
use crate::model::message::MessageId;

/// Connection parameters for [`ImapSession::connect`].
#[derive(Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub mailbox: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ImapSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mailbox", &self.mailbox)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated IMAP session with the configured mailbox selected.
pub struct ImapSession {
    host: String,
    inner: ::imap::Session<TlsStream<TcpStream>>,
}

impl ImapSession {
    /// Open a TLS connection, log in, and select the mailbox.
    pub fn connect(settings: &ImapSettings) -> Result<Self> {
        let connection_error = |reason: String| RelayError::Connection {
            host: settings.host.clone(),
            reason,
        };

        info!(host = %settings.host, port = settings.port, "Connecting to IMAP server");

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| connection_error(e.to_string()))?;
        let client = ::imap::connect(
            (settings.host.as_str(), settings.port),
            settings.host.as_str(),
            &tls,
        )
        .map_err(|e| connection_error(e.to_string()))?;

        let mut inner = client
            .login(&settings.user, &settings.password)
            .map_err(|(e, _client)| connection_error(format!("login failed: {e}")))?;

        let mailbox = inner
            .select(&settings.mailbox)
            .map_err(|e| connection_error(format!("cannot select '{}': {e}", settings.mailbox)))?;

        info!(
            mailbox = %settings.mailbox,
            exists = mailbox.exists,
            "Connection successful"
        );

        Ok(Self {
            host: settings.host.clone(),
            inner,
        })
    }
}

impl MailSession for ImapSession {
    fn search(&mut self, criterion: &DateCriterion) -> Result<Vec<MessageId>> {
        let query = criterion.to_imap_query();
        let seqs = self
            .inner
            .search(&query)
            .map_err(|e| RelayError::Search(format!("{query}: {e}")))?;
        Ok(seqs.into_iter().map(MessageId).collect())
    }

    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>> {
        debug!(id = %id, "Fetching message");
        let fetches = self
            .inner
            .fetch(id.to_string(), "RFC822")
            .map_err(|e| RelayError::Fetch {
                id: id.0,
                reason: e.to_string(),
            })?;

        fetches
            .iter()
            .find_map(|f| f.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| RelayError::Fetch {
                id: id.0,
                reason: "server returned no message body".into(),
            })
    }

    fn logout(&mut self) -> Result<()> {
        info!(host = %self.host, "Logging out and terminating IMAP session");
        if let Err(e) = self.inner.close() {
            warn!(error = %e, "Failed to close mailbox before logout");
        }
        self.inner.logout().map_err(|e| RelayError::Connection {
            host: self.host.clone(),
            reason: format!("logout failed: {e}"),
        })?;
        info!("IMAP session terminated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let settings = ImapSettings {
            host: "imap.example.com".into(),
            port: 993,
            mailbox: "INBOX".into(),
            user: "ops@example.com".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{settings:?}");
        assert!(shown.contains("ops@example.com"));
        assert!(!shown.contains("hunter2"));
    }
}
