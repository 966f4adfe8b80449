//! User directory
//!
//! Answers whether a user exists and whether a password matches. The file
//! backend reads `users.txt`, one `username password` pair per line.

use async_trait::async_trait;
use postbox_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// User directory trait
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether `username` names a known user
    async fn user_exists(&self, username: &str) -> Result<bool>;

    /// Whether `password` is the password of `username`
    async fn validate(&self, username: &str, password: &str) -> Result<bool>;
}

/// Directory loaded from a plain text users file
#[derive(Debug, Clone, Default)]
pub struct FileDirectory {
    users: HashMap<String, String>,
}

impl FileDirectory {
    /// Load the users file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read users file {}: {}",
                path.display(),
                e
            ))
        })?;

        let directory = Self::parse(&content)?;
        info!(path = %path.display(), users = directory.len(), "Loaded user directory");
        Ok(directory)
    }

    /// Parse users file content. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut users = HashMap::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(username), Some(password), None) => {
                    users.insert(username.to_string(), password.to_string());
                }
                _ => {
                    return Err(Error::Validation(format!(
                        "users file line {}: expected `username password`",
                        lineno + 1
                    )));
                }
            }
        }

        Ok(Self { users })
    }

    /// Build a directory from in-memory pairs
    pub fn from_entries<I, U, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            users: entries
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for FileDirectory {
    async fn user_exists(&self, username: &str) -> Result<bool> {
        let exists = self.users.contains_key(username);
        debug!(username, exists, "Directory lookup");
        Ok(exists)
    }

    async fn validate(&self, username: &str, password: &str) -> Result<bool> {
        Ok(self
            .users
            .get(username)
            .is_some_and(|expected| expected == password))
    }
}
