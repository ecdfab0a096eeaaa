use std::collections::VecDeque;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use missive_common::Mail;

/// Errors from walking a mail source.
///
/// Unlike a per-item reprocessing failure, a source error is fatal to the
/// whole batch: the task cannot know what it has not seen.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying repository or mailbox became unreadable.
    #[error("Mail source unreadable: {0}")]
    Unreadable(String),
}

/// Position of a stored mail within its source
///
/// Identifies the mail for failure accounting and auditing: which mailbox,
/// which message uid within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailLocator {
    pub mailbox_id: String,
    pub uid: u64,
}

impl MailLocator {
    #[must_use]
    pub fn new(mailbox_id: impl Into<String>, uid: u64) -> Self {
        Self {
            mailbox_id: mailbox_id.into(),
            uid,
        }
    }
}

impl std::fmt::Display for MailLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.mailbox_id, self.uid)
    }
}

/// One stored mail together with its source position
#[derive(Debug, Clone)]
pub struct StoredMail {
    pub locator: MailLocator,
    pub mail: Mail,
}

/// A walkable source of stored mails
///
/// Full reprocessing walks every mail of a repository or mailbox set;
/// single-mailbox and single-message reprocessing are the same walk over a
/// narrower source.
#[async_trait]
pub trait MailSource: Send {
    /// The next stored mail, or `None` once the source is exhausted
    async fn next(&mut self) -> Result<Option<StoredMail>, SourceError>;
}

/// Source over a preloaded in-memory list
#[derive(Debug, Default)]
pub struct MemoryMailSource {
    mails: VecDeque<StoredMail>,
}

impl MemoryMailSource {
    #[must_use]
    pub fn new(mails: impl IntoIterator<Item = StoredMail>) -> Self {
        Self {
            mails: mails.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mails.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mails.is_empty()
    }
}

#[async_trait]
impl MailSource for MemoryMailSource {
    async fn next(&mut self) -> Result<Option<StoredMail>, SourceError> {
        Ok(self.mails.pop_front())
    }
}
