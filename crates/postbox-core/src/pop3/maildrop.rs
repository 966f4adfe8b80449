//! Maildrop view held by an authenticated POP3 session
//!
//! Fetched once when the session enters the transaction state. Message
//! numbers are 1-based and never shift: a deleted message keeps its number
//! and its slot until the session commits.

use postbox_common::types::MessageId;
use postbox_storage::MessageEntry;

/// One message in the maildrop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Store id, also used as the UIDL unique id
    pub id: MessageId,
    /// Message size in bytes
    pub size: u64,
    /// Marked by DELE, not yet committed
    pub deleted: bool,
}

/// Why a message number could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    NoSuchMessage,
    Deleted,
}

/// Ordered maildrop with soft-delete marks
#[derive(Debug, Clone, Default)]
pub struct Maildrop {
    messages: Vec<MessageInfo>,
}

impl Maildrop {
    pub fn new(entries: Vec<MessageEntry>) -> Self {
        Self {
            messages: entries
                .into_iter()
                .map(|e| MessageInfo {
                    id: e.id,
                    size: e.size,
                    deleted: false,
                })
                .collect(),
        }
    }

    /// All messages, deleted ones included
    pub fn total_count(&self) -> usize {
        self.messages.len()
    }

    /// Get message count (excluding deleted)
    pub fn message_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.deleted).count()
    }

    /// Get total size of messages (excluding deleted)
    pub fn total_size(&self) -> u64 {
        self.messages
            .iter()
            .filter(|m| !m.deleted)
            .map(|m| m.size)
            .sum()
    }

    /// Get message by number (1-indexed)
    pub fn get_message(&self, num: u32) -> Result<&MessageInfo, LookupError> {
        let idx = (num as usize)
            .checked_sub(1)
            .ok_or(LookupError::NoSuchMessage)?;
        match self.messages.get(idx) {
            Some(msg) if msg.deleted => Err(LookupError::Deleted),
            Some(msg) => Ok(msg),
            None => Err(LookupError::NoSuchMessage),
        }
    }

    /// Mark message for deletion
    pub fn mark_deleted(&mut self, num: u32) -> Result<(), LookupError> {
        self.get_message(num)?;
        self.messages[num as usize - 1].deleted = true;
        Ok(())
    }

    /// Clear every deletion mark, returning how many were cleared
    pub fn reset_deletions(&mut self) -> usize {
        let mut recovered = 0;
        for msg in self.messages.iter_mut().filter(|m| m.deleted) {
            msg.deleted = false;
            recovered += 1;
        }
        recovered
    }

    /// Ids of messages marked for deletion
    pub fn deleted_ids(&self) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| m.deleted)
            .map(|m| m.id)
            .collect()
    }

    /// Numbered, non-deleted messages in order
    pub fn list_messages(&self) -> impl Iterator<Item = (u32, &MessageInfo)> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.deleted)
            .map(|(idx, m)| (idx as u32 + 1, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn maildrop(sizes: &[u64]) -> Maildrop {
        Maildrop::new(
            sizes
                .iter()
                .map(|&size| MessageEntry {
                    id: Uuid::now_v7(),
                    size,
                })
                .collect(),
        )
    }

    #[test]
    fn test_message_operations() {
        let mut view = maildrop(&[100, 200]);

        assert_eq!(view.message_count(), 2);
        assert_eq!(view.total_size(), 300);

        // Delete a message
        assert!(view.mark_deleted(1).is_ok());
        assert_eq!(view.message_count(), 1);
        assert_eq!(view.total_count(), 2);
        assert_eq!(view.total_size(), 200);

        // Can't delete already deleted
        assert_eq!(view.mark_deleted(1), Err(LookupError::Deleted));

        // Reset
        assert_eq!(view.reset_deletions(), 1);
        assert_eq!(view.message_count(), 2);
    }

    #[test]
    fn test_numbers_are_stable() {
        let mut view = maildrop(&[10, 20, 30]);
        view.mark_deleted(2).unwrap();

        let listed: Vec<(u32, u64)> = view.list_messages().map(|(n, m)| (n, m.size)).collect();
        assert_eq!(listed, vec![(1, 10), (3, 30)]);
        assert_eq!(view.get_message(3).unwrap().size, 30);
        assert_eq!(view.get_message(2), Err(LookupError::Deleted));
    }

    #[test]
    fn test_out_of_range() {
        let mut view = maildrop(&[10]);
        assert_eq!(view.get_message(0), Err(LookupError::NoSuchMessage));
        assert_eq!(view.get_message(2), Err(LookupError::NoSuchMessage));
        assert_eq!(view.mark_deleted(5), Err(LookupError::NoSuchMessage));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut view = maildrop(&[10, 20]);
        view.mark_deleted(1).unwrap();
        view.mark_deleted(2).unwrap();

        assert_eq!(view.reset_deletions(), 2);
        let once: Vec<MessageInfo> = view.list_messages().map(|(_, m)| m.clone()).collect();
        assert_eq!(view.reset_deletions(), 0);
        let twice: Vec<MessageInfo> = view.list_messages().map(|(_, m)| m.clone()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_deleted_ids() {
        let mut view = maildrop(&[1, 2, 3]);
        let id = view.get_message(3).unwrap().id;
        view.mark_deleted(3).unwrap();
        assert_eq!(view.deleted_ids(), vec![id]);
    }
}
