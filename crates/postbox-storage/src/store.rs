//! Mailbox store
//!
//! Each mailbox is a directory under the store root; each message is one
//! `<uuid>.eml` file. Message ids are UUIDv7 so sorting by id gives arrival
//! order. Messages are written to a temporary name and renamed into place,
//! so a listing never sees a partially written message.

use async_trait::async_trait;
use postbox_common::types::MessageId;
use postbox_common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MESSAGE_EXTENSION: &str = "eml";

/// One stored message as seen by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    /// Store-assigned message id
    pub id: MessageId,
    /// Message size in bytes
    pub size: u64,
}

/// Outcome of delivering one message to several mailboxes
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Message id shared by every delivered copy
    pub message_id: Option<MessageId>,
    /// Recipients that received a copy
    pub delivered: Vec<String>,
    /// Recipients that did not, with the reason
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_total_failure(&self) -> bool {
        self.delivered.is_empty() && !self.failed.is_empty()
    }
}

/// Mail store trait
#[async_trait]
pub trait MailStore: Send + Sync {
    /// List a mailbox in arrival order. A mailbox never written to is empty.
    async fn list_messages(&self, mailbox: &str) -> Result<Vec<MessageEntry>>;

    /// Read one message; `Error::NotFound` if it is gone
    async fn read_message(&self, mailbox: &str, id: MessageId) -> Result<Vec<u8>>;

    /// Permanently remove messages. Every id is attempted; the count of
    /// removed messages is returned, or an error if any removal failed.
    async fn commit_deletions(&self, mailbox: &str, ids: &[MessageId]) -> Result<usize>;

    /// Append one copy of `body` to each recipient's mailbox
    async fn append_message(&self, recipients: &[String], body: &[u8]) -> DeliveryReport;
}

/// Local filesystem mail store
#[derive(Debug, Clone)]
pub struct LocalMailStore {
    base_path: PathBuf,
}

impl LocalMailStore {
    /// Open the store rooted at `path`, creating the directory if needed
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::Storage(format!("Failed to create storage directory: {}", e)))?;

        info!(path = %path.display(), "Initialized local mail store");

        Ok(Self {
            base_path: path.to_path_buf(),
        })
    }

    /// Directory of a mailbox, rejecting names that would escape the root
    fn mailbox_path(&self, mailbox: &str) -> Result<PathBuf> {
        if mailbox.is_empty()
            || mailbox.starts_with('.')
            || mailbox.contains(['/', '\\', '\0'])
        {
            return Err(Error::Validation(format!(
                "Invalid mailbox name: {:?}",
                mailbox
            )));
        }

        Ok(self.base_path.join(mailbox))
    }

    fn message_path(&self, mailbox: &str, id: MessageId) -> Result<PathBuf> {
        Ok(self
            .mailbox_path(mailbox)?
            .join(format!("{}.{}", id, MESSAGE_EXTENSION)))
    }

    async fn write_message(&self, mailbox: &str, id: MessageId, body: &[u8]) -> Result<()> {
        let dir = self.mailbox_path(mailbox)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create mailbox: {}", e)))?;

        let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let final_path = self.message_path(mailbox, id)?;

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create file: {}", e)))?;
        let written = async {
            file.write_all(body).await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Error::Storage(format!("Failed to write file: {}", e)));
        }

        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to publish message: {}", e)))?;

        debug!(mailbox, %id, size = body.len(), "Stored message");
        Ok(())
    }
}

#[async_trait]
impl MailStore for LocalMailStore {
    async fn list_messages(&self, mailbox: &str) -> Result<Vec<MessageEntry>> {
        let dir = self.mailbox_path(mailbox)?;

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(format!("Failed to read mailbox: {}", e))),
        };

        let mut messages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Storage(format!("Failed to read mailbox: {}", e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MESSAGE_EXTENSION) {
                continue;
            }

            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                warn!(path = %path.display(), "Skipping unrecognised file in mailbox");
                continue;
            };

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| Error::Storage(format!("Failed to get file metadata: {}", e)))?;

            messages.push(MessageEntry {
                id,
                size: metadata.len(),
            });
        }

        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    async fn read_message(&self, mailbox: &str, id: MessageId) -> Result<Vec<u8>> {
        let path = self.message_path(mailbox, id)?;

        match fs::read(&path).await {
            Ok(data) => {
                debug!(mailbox, %id, size = data.len(), "Read message");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("message {} in {}", id, mailbox)))
            }
            Err(e) => Err(Error::Storage(format!("Failed to read message: {}", e))),
        }
    }

    async fn commit_deletions(&self, mailbox: &str, ids: &[MessageId]) -> Result<usize> {
        let mut removed = 0;
        let mut failures = Vec::new();

        for id in ids {
            let path = self.message_path(mailbox, *id)?;
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(mailbox, %id, error = %e, "Failed to delete message");
                    failures.push(id.to_string());
                }
            }
        }

        if failures.is_empty() {
            info!(mailbox, removed, "Committed deletions");
            Ok(removed)
        } else {
            Err(Error::Storage(format!(
                "removed {} of {} messages, could not remove {}",
                removed,
                ids.len(),
                failures.join(", ")
            )))
        }
    }

    async fn append_message(&self, recipients: &[String], body: &[u8]) -> DeliveryReport {
        let message_id = Uuid::now_v7();
        let mut report = DeliveryReport {
            message_id: Some(message_id),
            ..Default::default()
        };

        for recipient in recipients {
            match self.write_message(recipient, message_id, body).await {
                Ok(()) => report.delivered.push(recipient.clone()),
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "Delivery failed");
                    report.failed.push((recipient.clone(), e.to_string()));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalMailStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalMailStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_append_list_read() {
        let (_dir, store) = store();

        let report = store
            .append_message(&["alice".to_string(), "bob".to_string()], b"Hello\r\n")
            .await;
        assert!(report.is_complete());
        assert_eq!(report.delivered, vec!["alice", "bob"]);

        let listing = store.list_messages("alice").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].size, 7);
        assert_eq!(Some(listing[0].id), report.message_id);

        let body = store.read_message("bob", listing[0].id).await.unwrap();
        assert_eq!(body, b"Hello\r\n");
    }

    #[tokio::test]
    async fn test_listing_is_in_arrival_order() {
        let (_dir, store) = store();
        let rcpt = vec!["alice".to_string()];

        for body in [&b"one\r\n"[..], b"second\r\n", b"third one\r\n"] {
            store.append_message(&rcpt, body).await;
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let sizes: Vec<u64> = store
            .list_messages("alice")
            .await
            .unwrap()
            .iter()
            .map(|m| m.size)
            .collect();
        assert_eq!(sizes, vec![5, 8, 11]);
    }

    #[tokio::test]
    async fn test_unknown_mailbox_is_empty() {
        let (_dir, store) = store();
        assert!(store.list_messages("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_message() {
        let (_dir, store) = store();
        let err = store.read_message("alice", Uuid::now_v7()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_commit_deletions() {
        let (_dir, store) = store();
        let rcpt = vec!["alice".to_string()];
        store.append_message(&rcpt, b"a\r\n").await;
        store.append_message(&rcpt, b"b\r\n").await;

        let listing = store.list_messages("alice").await.unwrap();
        let removed = store
            .commit_deletions("alice", &[listing[0].id])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = store.list_messages("alice").await.unwrap();
        assert_eq!(remaining, vec![listing[1].clone()]);

        // A second removal of the same message is reported
        assert!(store
            .commit_deletions("alice", &[listing[0].id])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_mailbox_name_traversal_rejected() {
        let (_dir, store) = store();

        assert!(store.list_messages("../etc").await.is_err());
        assert!(store.list_messages("a/b").await.is_err());
        assert!(store.list_messages("").await.is_err());

        let report = store
            .append_message(&["alice".to_string(), "../evil".to_string()], b"x\r\n")
            .await;
        assert_eq!(report.delivered, vec!["alice"]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
        assert!(!report.is_total_failure());
    }

    #[tokio::test]
    async fn test_stray_files_ignored() {
        let (dir, store) = store();
        store.append_message(&["alice".to_string()], b"a\r\n").await;
        std::fs::write(dir.path().join("alice").join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("alice").join("junk.eml"), b"x").unwrap();

        assert_eq!(store.list_messages("alice").await.unwrap().len(), 1);
    }
}
