use std::sync::Arc;

use ahash::AHashMap;

/// The processing state a mail is in when it enters the queue.
///
/// Mirrors the mail lifecycle of the surrounding platform: freshly accepted
/// mail is in the root state; mail parked in an error repository carries the
/// state it was parked with.
pub const STATE_ROOT: &str = "root";

/// A routable unit of content moving through the platform
///
/// Ownership of the byte content transfers to the blob store on save; the
/// header and body blocks are held behind `Arc` so a `Mail` is cheap to
/// clone while it moves between the enqueue pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    name: String,
    sender: String,
    recipients: Vec<String>,
    state: String,
    attributes: AHashMap<String, String>,
    header: Arc<[u8]>,
    body: Arc<[u8]>,
}

impl Mail {
    #[must_use]
    pub fn builder() -> MailBuilder {
        MailBuilder::default()
    }

    /// The mail's name (its key within the platform)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The envelope sender address
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// The envelope recipient addresses
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// The mail's processing state
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Per-mail attributes attached by upstream processing
    #[must_use]
    pub const fn attributes(&self) -> &AHashMap<String, String> {
        &self.attributes
    }

    /// The MIME header block
    #[must_use]
    pub fn header(&self) -> &Arc<[u8]> {
        &self.header
    }

    /// The message body block
    #[must_use]
    pub fn body(&self) -> &Arc<[u8]> {
        &self.body
    }

    /// Return the same mail under a different name
    ///
    /// Used when a mail is re-submitted through the queue and must not be
    /// mistaken for its previous incarnation.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Builder for [`Mail`]
#[derive(Debug, Default)]
pub struct MailBuilder {
    name: Option<String>,
    sender: String,
    recipients: Vec<String>,
    state: Option<String>,
    attributes: AHashMap<String, String>,
    header: Option<Arc<[u8]>>,
    body: Option<Arc<[u8]>>,
}

impl MailBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    #[must_use]
    pub fn recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients.extend(recipients.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn header(mut self, header: impl Into<Arc<[u8]>>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Arc<[u8]>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build the final [`Mail`]
    ///
    /// A missing name is generated from a fresh ULID; missing header or body
    /// blocks default to empty, since a structurally empty mail is still
    /// routable.
    #[must_use]
    pub fn build(self) -> Mail {
        Mail {
            name: self
                .name
                .unwrap_or_else(|| format!("mail-{}", ulid::Ulid::new())),
            sender: self.sender,
            recipients: self.recipients,
            state: self.state.unwrap_or_else(|| STATE_ROOT.to_string()),
            attributes: self.attributes,
            header: self.header.unwrap_or_else(|| Arc::from(&[][..])),
            body: self.body.unwrap_or_else(|| Arc::from(&[][..])),
        }
    }
}
