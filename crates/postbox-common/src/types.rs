//! Common types for Postbox

use uuid::Uuid;

/// Unique identifier for stored messages
pub type MessageId = Uuid;

/// Message envelope (SMTP level)
///
/// Recipients keep their arrival order; a forward-path already present is
/// not added a second time so each mailbox receives one copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Sender (MAIL FROM), empty string for the null reverse-path
    pub sender: Option<String>,

    /// Recipients (RCPT TO)
    pub recipients: Vec<String>,
}

impl Envelope {
    /// Start a new transaction for `sender`, dropping any earlier recipients
    pub fn begin(&mut self, sender: impl Into<String>) {
        self.sender = Some(sender.into());
        self.recipients.clear();
    }

    /// Add a recipient. Returns false if it was already present.
    pub fn add_recipient(&mut self, recipient: impl Into<String>) -> bool {
        let recipient = recipient.into();
        if self.recipients.contains(&recipient) {
            return false;
        }
        self.recipients.push(recipient);
        true
    }

    pub fn has_sender(&self) -> bool {
        self.sender.is_some()
    }

    pub fn has_recipients(&self) -> bool {
        !self.recipients.is_empty()
    }

    /// Forget sender and recipients
    pub fn clear(&mut self) {
        self.sender = None;
        self.recipients.clear();
    }
}
