//! Mailbox lock table
//!
//! One process-wide set of locked mailboxes, shared by every retrieval
//! session. Acquisition never waits: a mailbox that is already held is
//! refused. The returned lease releases the mailbox when dropped, so a
//! session that ends for any reason (QUIT, commit failure, disconnect,
//! timeout, panic) gives the mailbox back.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type LockSet = Arc<Mutex<HashSet<String>>>;

/// Keyed table of held mailboxes
#[derive(Debug, Clone, Default)]
pub struct MailboxLocks {
    held: LockSet,
}

impl MailboxLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `mailbox` unless some session already holds it
    pub fn try_acquire(&self, mailbox: &str) -> Option<MailboxLease> {
        let mut held = lock_set(&self.held);
        if !held.insert(mailbox.to_string()) {
            debug!(mailbox, "Mailbox already locked");
            return None;
        }

        debug!(mailbox, "Mailbox locked");
        Some(MailboxLease {
            mailbox: mailbox.to_string(),
            held: self.held.clone(),
        })
    }

    /// Whether some session currently holds `mailbox`
    pub fn is_locked(&self, mailbox: &str) -> bool {
        lock_set(&self.held).contains(mailbox)
    }

    /// Number of mailboxes currently held
    pub fn held_count(&self) -> usize {
        lock_set(&self.held).len()
    }
}

/// Exclusive hold on one mailbox, released on drop
#[derive(Debug)]
pub struct MailboxLease {
    mailbox: String,
    held: LockSet,
}

impl MailboxLease {
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }
}

impl Drop for MailboxLease {
    fn drop(&mut self) {
        lock_set(&self.held).remove(&self.mailbox);
        debug!(mailbox = %self.mailbox, "Mailbox unlocked");
    }
}

// The set stays consistent even if a holder panicked mid-update: every
// mutation is a single insert or remove.
fn lock_set(held: &LockSet) -> MutexGuard<'_, HashSet<String>> {
    held.lock().unwrap_or_else(PoisonError::into_inner)
}
