//! Postbox Storage - user directory, mailbox store and mailbox locks
//!
//! These are the collaborators the protocol sessions talk to: the directory
//! answers who exists and whether a password matches, the mail store holds
//! each user's messages on the local filesystem, and the lock table keeps a
//! mailbox to one retrieval session at a time.

pub mod directory;
pub mod locks;
pub mod store;

pub use directory::{FileDirectory, UserDirectory};
pub use locks::{MailboxLease, MailboxLocks};
pub use store::{DeliveryReport, LocalMailStore, MailStore, MessageEntry};
