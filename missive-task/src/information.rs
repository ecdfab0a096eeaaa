//! Serializable task progress
//!
//! The shape and key names are a stable contract with the task monitoring
//! tooling that polls and archives task state; changing them breaks every
//! consumer of the task status endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::MailLocator;

/// Which reprocessing variant produced this state
///
/// The three variants share one state shape over progressively narrower
/// sources. The tag is explicit in the serialized form; consumers dispatch
/// on it rather than on any runtime type information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReprocessingKind {
    #[serde(rename = "full-reprocessing")]
    Full,
    #[serde(rename = "mailbox-reprocessing")]
    SingleMailbox,
    #[serde(rename = "message-reprocessing")]
    SingleMessage,
}

/// The failed messages of one mailbox, in encounter order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureGroup {
    #[serde(rename = "mailboxId")]
    pub mailbox_id: String,
    pub uids: Vec<u64>,
}

/// Progress and outcome accounting of one reprocessing task
///
/// Monotonically updated while the task runs, exposed for polling at any
/// point, and serialized on completion, cancellation, or crash so the
/// failure list survives the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprocessingDetails {
    #[serde(rename = "type")]
    pub kind: ReprocessingKind,
    #[serde(rename = "successfullyReprocessedMailCount")]
    pub successfully_reprocessed_mail_count: u64,
    #[serde(rename = "failedReprocessedMailCount")]
    pub failed_reprocessed_mail_count: u64,
    #[serde(default)]
    pub failures: Vec<FailureGroup>,
    pub timestamp: DateTime<Utc>,
}

impl ReprocessingDetails {
    #[must_use]
    pub fn new(kind: ReprocessingKind) -> Self {
        Self {
            kind,
            successfully_reprocessed_mail_count: 0,
            failed_reprocessed_mail_count: 0,
            failures: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.successfully_reprocessed_mail_count += 1;
        self.timestamp = Utc::now();
    }

    pub(crate) fn record_failure(&mut self, locator: &MailLocator) {
        match self
            .failures
            .iter_mut()
            .find(|group| group.mailbox_id == locator.mailbox_id)
        {
            Some(group) => group.uids.push(locator.uid),
            None => self.failures.push(FailureGroup {
                mailbox_id: locator.mailbox_id.clone(),
                uids: vec![locator.uid],
            }),
        }
        self.failed_reprocessed_mail_count += 1;
        self.timestamp = Utc::now();
    }

    /// Total number of mails the task has looked at so far
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.successfully_reprocessed_mail_count + self.failed_reprocessed_mail_count
    }
}
