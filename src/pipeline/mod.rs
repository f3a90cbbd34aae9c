//! The relay run: scan one day, then select and transfer message by message.

pub mod select;
pub mod transfer;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info};

use crate::config::RunSettings;
use crate::error::Result;
use crate::mailbox::{self, MailSession};
use crate::model::message::MessageId;
use crate::storage::ObjectStore;

use self::transfer::{Transfer, TransferOutcome};

/// Result for one selected attachment.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentRecord {
    pub message_id: MessageId,
    /// Filename as it appeared in the message.
    pub filename: String,
    #[serde(flatten)]
    pub outcome: TransferOutcome,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub search_date: NaiveDate,
    pub messages_scanned: usize,
    pub attachments_selected: usize,
    pub records: Vec<AttachmentRecord>,
}

impl RunReport {
    fn new(settings: &RunSettings, messages_scanned: usize) -> Self {
        Self {
            run_date: settings.run_date,
            search_date: settings.criterion.date,
            messages_scanned,
            attachments_selected: 0,
            records: Vec::new(),
        }
    }

    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Uploaded { .. }))
    }

    pub fn planned(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Planned { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Failed { .. }))
    }

    /// Total bytes uploaded.
    pub fn bytes_uploaded(&self) -> u64 {
        self.records
            .iter()
            .map(|r| match r.outcome {
                TransferOutcome::Uploaded { size, .. } => size,
                _ => 0,
            })
            .sum()
    }

    /// `false` if any upload failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&TransferOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Run the relay for the configured day.
///
/// Each message is fetched and all of its selected attachments are
/// transferred before the next message is touched. Fatal errors are logged
/// with the message and attachment in progress and returned; the caller
/// still owns the session and must log out.
pub fn run<S, O>(session: &mut S, store: &O, settings: &RunSettings) -> Result<RunReport>
where
    S: MailSession + ?Sized,
    O: ObjectStore + ?Sized,
{
    let transfer = Transfer::new(store, settings);
    transfer.prepare()?;

    let ids = mailbox::scan(session, &settings.criterion)?;
    let mut report = RunReport::new(settings, ids.len());
    let mut selector = select::Selector::new(&settings.keyword);

    for id in ids {
        let selected = match selector.message(session, id) {
            Ok(Some((summary, selected))) if !selected.is_empty() => {
                info!(
                    id = %id,
                    from = %summary.from,
                    subject = %summary.subject,
                    attachments = selected.len(),
                    "Relaying attachments"
                );
                selected
            }
            Ok(_) => continue,
            Err(e) => {
                error!(id = %id, error = %e, "Run aborted while selecting attachments");
                return Err(e);
            }
        };
        report.attachments_selected += selected.len();

        for attachment in &selected {
            let outcome = transfer.relay(attachment).map_err(|e| {
                error!(
                    id = %id,
                    filename = %attachment.part.filename,
                    error = %e,
                    "Run aborted while transferring attachment"
                );
                e
            })?;
            report.records.push(AttachmentRecord {
                message_id: id,
                filename: attachment.part.filename.clone(),
                outcome,
            });
        }
    }

    info!(
        scanned = report.messages_scanned,
        selected = report.attachments_selected,
        uploaded = report.uploaded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "Run finished"
    );
    Ok(report)
}
