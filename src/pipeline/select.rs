//! Selection filter: which attachments of which messages get relayed.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::Result;
use crate::mailbox::MailSession;
use crate::model::attachment::SelectedAttachment;
use crate::model::message::{MessageId, MessageSummary};
use crate::parser::mime;

/// Case-insensitive substring test of `keyword` against `filename`.
pub fn matches_keyword(filename: &str, keyword: &str) -> bool {
    filename.to_lowercase().contains(&keyword.to_lowercase())
}

/// Fetch each message and keep the attachments whose filename contains `keyword`.
///
/// Output follows `ids` order, then MIME order within a message. Ids seen
/// more than once are only processed the first time. A fetch failure ends
/// the selection; a message that cannot be parsed is skipped with a warning.
pub fn select<S: MailSession + ?Sized>(
    session: &mut S,
    ids: &[MessageId],
    keyword: &str,
) -> Result<Vec<SelectedAttachment>> {
    let mut selector = Selector::new(keyword);
    let mut selected = Vec::new();

    for &id in ids {
        if let Some((_, mut found)) = selector.message(session, id)? {
            selected.append(&mut found);
        }
    }

    Ok(selected)
}

/// Message-at-a-time selection that remembers which ids it has handled.
#[derive(Debug)]
pub struct Selector<'a> {
    keyword: &'a str,
    seen: HashSet<MessageId>,
}

impl<'a> Selector<'a> {
    pub fn new(keyword: &'a str) -> Self {
        Self {
            keyword,
            seen: HashSet::new(),
        }
    }

    /// Select from `id` unless it was already handled.
    ///
    /// Repeats are not fetched again and come back as `None`, like skipped
    /// messages. See [`select_from_message`].
    pub fn message<S: MailSession + ?Sized>(
        &mut self,
        session: &mut S,
        id: MessageId,
    ) -> Result<Option<(MessageSummary, Vec<SelectedAttachment>)>> {
        if !self.seen.insert(id) {
            debug!(id = %id, "Message already selected, skipping repeat");
            return Ok(None);
        }
        select_from_message(session, id, self.keyword)
    }
}

/// Select from a single message.
///
/// Returns `None` when the message is skipped entirely (unparseable or not
/// multipart), otherwise its header summary and the matching attachments,
/// which may be empty.
pub fn select_from_message<S: MailSession + ?Sized>(
    session: &mut S,
    id: MessageId,
    keyword: &str,
) -> Result<Option<(MessageSummary, Vec<SelectedAttachment>)>> {
    let raw = session.fetch(id)?;

    let parsed = match mime::parse_message(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(id = %id, error = %e, "Cannot parse message, skipping");
            return Ok(None);
        }
    };

    if !parsed.tree.is_container() {
        debug!(
            id = %id,
            content_type = %parsed.tree.content_type(),
            "Message is not multipart, skipping"
        );
        return Ok(None);
    }

    let mut selected = Vec::new();
    for part in mime::enumerate(parsed.tree) {
        if matches_keyword(&part.filename, keyword) {
            debug!(id = %id, filename = %part.filename, size = part.size(), "Attachment selected");
            selected.push(SelectedAttachment {
                message_id: id,
                part,
            });
        } else {
            debug!(id = %id, filename = %part.filename, "Attachment does not match keyword");
        }
    }

    Ok(Some((parsed.summary, selected)))
}
