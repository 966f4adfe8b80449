//! Collaborators shared by every session of a server

use postbox_storage::{MailStore, MailboxLocks, UserDirectory};
use std::sync::Arc;

/// Directory, mail store and lock table handed to each session
#[derive(Clone)]
pub struct Backend {
    pub directory: Arc<dyn UserDirectory>,
    pub store: Arc<dyn MailStore>,
    pub locks: MailboxLocks,
}

impl Backend {
    pub fn new(directory: Arc<dyn UserDirectory>, store: Arc<dyn MailStore>) -> Self {
        Self {
            directory,
            store,
            locks: MailboxLocks::new(),
        }
    }
}
