//! POP3 Session
//!
//! The per-connection state machine: authorization with USER/PASS, the
//! transaction state over a locked maildrop, and the update state that
//! commits deletions on QUIT.
//!
//! The mailbox lock is a [`MailboxLease`] owned by the session. It is
//! released on QUIT, and also whenever the session value is dropped, so a
//! disconnect or timeout gives the mailbox back without committing any
//! pending deletions.

use super::command::{ArgumentError, NumberArg, Pop3Command, Pop3Parser};
use super::maildrop::{LookupError, Maildrop};
use super::response::Pop3Response;
use crate::backend::Backend;
use crate::connection::{LineSession, Reply};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postbox_storage::MailboxLease;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// POP3 session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Authorization state (not authenticated)
    Authorization,
    /// Transaction state (authenticated, maildrop locked)
    Transaction,
    /// Update state (during QUIT processing)
    Update,
}

/// Authenticated user and the lock on their mailbox
#[derive(Debug)]
struct Authenticated {
    username: String,
    maildrop: Maildrop,
    lease: MailboxLease,
}

/// POP3 Session
pub struct Pop3Session {
    /// Session ID
    id: String,
    /// Hostname for greeting and sign-off
    server_name: String,
    backend: Backend,
    /// Current state
    state: SessionState,
    /// Username given by USER, awaiting PASS
    pending_user: Option<String>,
    /// Present only in the transaction state
    auth: Option<Authenticated>,
    /// Session start time
    started_at: DateTime<Utc>,
}

fn number_error(err: ArgumentError) -> String {
    match err {
        ArgumentError::Missing => Pop3Response::err("message number required"),
        ArgumentError::NotNumeric => Pop3Response::err("invalid message number"),
        ArgumentError::OutOfRange => Pop3Response::err("no such message"),
    }
}

fn lookup_error(num: u32, err: LookupError) -> String {
    match err {
        LookupError::NoSuchMessage => Pop3Response::err("no such message"),
        LookupError::Deleted => Pop3Response::err(&format!("message {} already deleted", num)),
    }
}

impl Pop3Session {
    /// Create a new session
    pub fn new(server_name: impl Into<String>, backend: Backend) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            server_name: server_name.into(),
            backend,
            state: SessionState::Authorization,
            pending_user: None,
            auth: None,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Username awaiting PASS
    pub fn pending_user(&self) -> Option<&str> {
        self.pending_user.as_deref()
    }

    /// Authenticated username
    pub fn username(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.username.as_str())
    }

    /// Maildrop view, present in the transaction state
    pub fn maildrop(&self) -> Option<&Maildrop> {
        self.auth.as_ref().map(|a| &a.maildrop)
    }

    /// Handle a parsed POP3 command
    pub async fn handle_command(&mut self, cmd: Pop3Command) -> Reply {
        debug!(session = %self.id, state = ?self.state, "C: {:?}", cmd);

        // After USER the very next command must be PASS
        if !matches!(cmd, Pop3Command::Pass { .. }) {
            self.pending_user = None;
        }

        if let Pop3Command::Unknown { command } = &cmd {
            return Reply::new(Pop3Response::err(&format!(
                "command not supported: {}",
                command
            )));
        }

        if !cmd.is_permitted_in(self.state) {
            return Reply::new(Pop3Response::err(&format!(
                "{} not permitted in this state",
                cmd.name()
            )));
        }

        match cmd {
            Pop3Command::User { username } => Reply::new(self.handle_user(username).await),
            Pop3Command::Pass { password } => Reply::new(self.handle_pass(password).await),
            Pop3Command::Quit => self.handle_quit().await,
            Pop3Command::Stat
            | Pop3Command::List { .. }
            | Pop3Command::Retr { .. }
            | Pop3Command::Dele { .. }
            | Pop3Command::Noop
            | Pop3Command::Rset
            | Pop3Command::Top { .. }
            | Pop3Command::Uidl { .. } => match self.auth.as_mut() {
                Some(auth) => Self::handle_transaction(&self.backend, auth, cmd).await,
                None => Reply::new(Pop3Response::err("not permitted in this state")),
            },
            Pop3Command::Unknown { .. } => {
                Reply::new(Pop3Response::err("command not supported"))
            }
        }
    }

    /// Handle USER command
    async fn handle_user(&mut self, username: Option<String>) -> String {
        let Some(username) = username else {
            return Pop3Response::err("missing username");
        };

        match self.backend.directory.user_exists(&username).await {
            Ok(true) => {
                let reply = Pop3Response::ok(&format!("{} exists, send PASS", username));
                self.pending_user = Some(username);
                reply
            }
            Ok(false) => {
                info!(session = %self.id, username = %username, "POP3 unknown user");
                Pop3Response::err("no such mailbox")
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Directory lookup failed");
                Pop3Response::err("directory unavailable")
            }
        }
    }

    /// Handle PASS command
    async fn handle_pass(&mut self, password: Option<String>) -> String {
        if self.pending_user.is_none() {
            return Pop3Response::err("issue USER first");
        }
        let Some(password) = password else {
            return Pop3Response::err("missing password");
        };
        let Some(username) = self.pending_user.take() else {
            return Pop3Response::err("issue USER first");
        };

        // Fail fast before checking credentials
        if self.backend.locks.is_locked(&username) {
            warn!(session = %self.id, username = %username, "POP3 mailbox already locked");
            return Pop3Response::err("mailbox already locked");
        }

        match self.backend.directory.validate(&username, &password).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(session = %self.id, username = %username, "POP3 invalid password");
                return Pop3Response::err("invalid password, issue USER again");
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Directory lookup failed");
                return Pop3Response::err("directory unavailable");
            }
        }

        // The check above can race with another session; this acquire is authoritative
        let Some(lease) = self.backend.locks.try_acquire(&username) else {
            warn!(session = %self.id, username = %username, "POP3 mailbox already locked");
            return Pop3Response::err("mailbox already locked");
        };

        let entries = match self.backend.store.list_messages(&username).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(session = %self.id, username = %username, error = %e, "Failed to open maildrop");
                return Pop3Response::err("unable to open maildrop");
            }
        };

        let maildrop = Maildrop::new(entries);
        let reply = Pop3Response::ok(&format!(
            "{}'s maildrop has {} messages ({} octets)",
            username,
            maildrop.message_count(),
            maildrop.total_size()
        ));

        info!(
            session = %self.id,
            username = %username,
            messages = maildrop.message_count(),
            "POP3 user authenticated"
        );

        self.auth = Some(Authenticated {
            username,
            maildrop,
            lease,
        });
        self.state = SessionState::Transaction;
        reply
    }

    /// Commands valid only in the transaction state
    async fn handle_transaction(
        backend: &Backend,
        auth: &mut Authenticated,
        cmd: Pop3Command,
    ) -> Reply {
        let maildrop = &mut auth.maildrop;

        let response = match cmd {
            Pop3Command::Stat => Pop3Response::stat(maildrop.message_count(), maildrop.total_size()),

            Pop3Command::List { msg: None } => {
                let mut response =
                    Pop3Response::list_header(maildrop.message_count(), maildrop.total_size());
                for (num, message) in maildrop.list_messages() {
                    response.push_str(&Pop3Response::list_line(num, message.size));
                }
                response.push_str(Pop3Response::terminator());
                response
            }

            Pop3Command::List { msg: Some(msg) } => match msg {
                Err(e) => number_error(e),
                Ok(num) => match maildrop.get_message(num) {
                    Ok(message) => Pop3Response::list_single(num, message.size),
                    Err(e) => lookup_error(num, e),
                },
            },

            Pop3Command::Uidl { msg: None } => {
                let mut response = Pop3Response::uidl_header();
                for (num, message) in maildrop.list_messages() {
                    response.push_str(&Pop3Response::uidl_line(num, &message.id.simple().to_string()));
                }
                response.push_str(Pop3Response::terminator());
                response
            }

            Pop3Command::Uidl { msg: Some(msg) } => match msg {
                Err(e) => number_error(e),
                Ok(num) => match maildrop.get_message(num) {
                    Ok(message) => {
                        Pop3Response::uidl_single(num, &message.id.simple().to_string())
                    }
                    Err(e) => lookup_error(num, e),
                },
            },

            Pop3Command::Retr { msg } => {
                return Self::handle_retr(backend, auth, msg, None).await;
            }

            Pop3Command::Top { msg, lines } => {
                let lines = match lines {
                    Ok(lines) => lines,
                    Err(ArgumentError::OutOfRange) => u32::MAX,
                    Err(_) => return Reply::new(Pop3Response::err("invalid line count")),
                };
                return Self::handle_retr(backend, auth, msg, Some(lines)).await;
            }

            Pop3Command::Dele { msg } => match msg {
                Err(e) => number_error(e),
                Ok(num) => match maildrop.mark_deleted(num) {
                    Ok(()) => Pop3Response::ok(&format!("message {} deleted", num)),
                    Err(e) => lookup_error(num, e),
                },
            },

            Pop3Command::Rset => {
                let recovered = maildrop.reset_deletions();
                Pop3Response::ok(&format!(
                    "{} messages recovered, {} total in maildrop",
                    recovered,
                    maildrop.total_count()
                ))
            }

            Pop3Command::Noop => Pop3Response::ok_simple(),

            Pop3Command::User { .. }
            | Pop3Command::Pass { .. }
            | Pop3Command::Quit
            | Pop3Command::Unknown { .. } => Pop3Response::err("not permitted in this state"),
        };

        Reply::new(response)
    }

    /// Handle RETR, or TOP when `top_lines` is set
    async fn handle_retr(
        backend: &Backend,
        auth: &Authenticated,
        msg: NumberArg,
        top_lines: Option<u32>,
    ) -> Reply {
        let num = match msg {
            Ok(num) => num,
            Err(e) => return Reply::new(number_error(e)),
        };
        let message = match auth.maildrop.get_message(num) {
            Ok(message) => message,
            Err(e) => return Reply::new(lookup_error(num, e)),
        };

        let content = match backend.store.read_message(&auth.username, message.id).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                warn!(username = %auth.username, msg = num, "Message vanished from store");
                return Reply::new(Pop3Response::err("message no longer available"));
            }
            Err(e) => {
                warn!(username = %auth.username, msg = num, error = %e, "Failed to read message");
                return Reply::new(Pop3Response::err("unable to read message"));
            }
        };

        let (header, content) = match top_lines {
            Some(lines) => (
                Pop3Response::top_header(),
                Pop3Response::top_of_message(&content, lines),
            ),
            None => (
                Pop3Response::retr_header(content.len() as u64),
                &content[..],
            ),
        };

        let mut data = header.into_bytes();
        data.extend_from_slice(&Pop3Response::byte_stuff(content));
        data.extend_from_slice(Pop3Response::terminator().as_bytes());
        Reply::new(data)
    }

    /// Handle QUIT command
    async fn handle_quit(&mut self) -> Reply {
        let Some(auth) = self.auth.take() else {
            info!(session = %self.id, "POP3 session ended before authentication");
            return Reply::closing(Pop3Response::ok(&format!(
                "{} POP3 server signing off",
                self.server_name
            )));
        };

        self.state = SessionState::Update;
        let Authenticated {
            username,
            maildrop,
            lease,
        } = auth;

        let deleted = maildrop.deleted_ids();
        let result = if deleted.is_empty() {
            Ok(0)
        } else {
            self.backend.store.commit_deletions(&username, &deleted).await
        };

        // Released whether or not the commit succeeded
        drop(lease);

        let elapsed = Utc::now() - self.started_at;
        match result {
            Ok(removed) => {
                info!(
                    session = %self.id,
                    username = %username,
                    removed,
                    duration_ms = elapsed.num_milliseconds(),
                    "POP3 session committed"
                );
                Reply::closing(Pop3Response::ok(&format!(
                    "{} POP3 server signing off ({} messages deleted, {} left)",
                    self.server_name,
                    removed,
                    maildrop.total_count() - removed
                )))
            }
            Err(e) => {
                warn!(session = %self.id, username = %username, error = %e, "POP3 commit failed");
                Reply::closing(Pop3Response::err("some deleted messages not removed"))
            }
        }
    }
}

#[async_trait]
impl LineSession for Pop3Session {
    fn protocol(&self) -> &'static str {
        "POP3"
    }

    fn greeting(&self) -> Reply {
        Reply::new(Pop3Response::greeting(&self.server_name))
    }

    async fn handle_line(&mut self, line: &[u8]) -> Reply {
        let cmd = Pop3Parser::parse(line);
        self.handle_command(cmd).await
    }

    fn line_too_long(&mut self) -> Reply {
        self.release("line too long");
        Reply::closing(Pop3Response::err("line too long"))
    }

    fn timed_out(&mut self) -> Reply {
        self.release("timeout");
        Reply::closing(Pop3Response::err("session timeout"))
    }

    fn disconnected(&mut self) {
        self.release("disconnect");
    }
}

impl Pop3Session {
    /// Abandon the transaction: pending deletions are discarded, the lock released
    fn release(&mut self, reason: &str) {
        if let Some(auth) = self.auth.take() {
            let pending = auth.maildrop.deleted_ids().len();
            info!(
                session = %self.id,
                username = %auth.username,
                pending,
                reason,
                "POP3 session abandoned, deletions discarded"
            );
        }
        self.pending_user = None;
    }
}
