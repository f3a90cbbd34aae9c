//! Mailbox access: the session capability the relay runs against, and the
//! date scan that picks one day's messages.

pub mod imap;

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::message::MessageId;

/// `strftime` format of IMAP search dates (RFC 3501 `date`).
pub const IMAP_DATE_FORMAT: &str = "%d-%b-%Y";

/// A stateful mailbox connection.
///
/// Sessions are not reentrant; the relay drives one sequentially.
pub trait MailSession {
    /// Return the ids of every message matching `criterion`.
    fn search(&mut self, criterion: &DateCriterion) -> Result<Vec<MessageId>>;

    /// Fetch the full raw bytes of one message.
    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>>;

    /// Release the session. Called once, after the run.
    fn logout(&mut self) -> Result<()>;
}

/// Which date a message is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    /// The `Date:` header (IMAP `SENTON`).
    #[default]
    Sent,
    /// The server's internal arrival date (IMAP `ON`).
    Received,
}

/// Day-granularity search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCriterion {
    pub date: NaiveDate,
    pub field: DateField,
}

impl DateCriterion {
    pub fn new(date: NaiveDate, field: DateField) -> Self {
        Self { date, field }
    }

    /// Render as an IMAP `SEARCH` key, e.g. `SENTON "01-Sep-2018"`.
    pub fn to_imap_query(&self) -> String {
        let key = match self.field {
            DateField::Sent => "SENTON",
            DateField::Received => "ON",
        };
        format!("{key} \"{}\"", self.date.format(IMAP_DATE_FORMAT))
    }
}

impl fmt::Display for DateCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_imap_query())
    }
}

/// Find the messages dated on the criterion's day.
///
/// Ids come back ascending and unique; an empty mailbox day is not an error.
/// Any session fault is returned as-is and ends the run.
pub fn scan<S: MailSession + ?Sized>(
    session: &mut S,
    criterion: &DateCriterion,
) -> Result<Vec<MessageId>> {
    info!(query = %criterion, "Searching mailbox");

    let ids: BTreeSet<MessageId> = session.search(criterion)?.into_iter().collect();
    let ids: Vec<MessageId> = ids.into_iter().collect();

    info!(count = ids.len(), "Messages found for search date");
    debug!(ids = ?ids, "Message ids");
    Ok(ids)
}
