//! SMTP session state machine
//!
//! Builds one envelope at a time from MAIL and RCPT, captures the body after
//! DATA and hands it to the mail store once the terminating dot arrives.

use super::command::{parse_command, SmtpCommand};
use super::response::SmtpResponse;
use crate::backend::Backend;
use crate::connection::{LineSession, Reply};
use async_trait::async_trait;
use postbox_common::config::SmtpConfig;
use postbox_common::types::Envelope;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// SMTP session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Banner sent, no transaction in progress
    Greeted,
    /// MAIL accepted
    SenderSet,
    /// At least one RCPT accepted
    RecipientsSet,
    /// Reading the message body after DATA
    ReceivingBody,
}

/// Message body being captured
#[derive(Debug, Default)]
struct BodyBuffer {
    data: Vec<u8>,
    /// Set once the size limit is passed; the rest is read and thrown away
    overflowed: bool,
}

/// SMTP session
pub struct SmtpSession {
    id: String,
    hostname: String,
    backend: Backend,
    max_message_size: usize,
    max_recipients: usize,
    state: SmtpState,
    envelope: Envelope,
    body: BodyBuffer,
}

impl SmtpSession {
    pub fn new(hostname: impl Into<String>, backend: Backend, config: &SmtpConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            hostname: hostname.into(),
            backend,
            max_message_size: config.max_message_size,
            max_recipients: config.max_recipients,
            state: SmtpState::Greeted,
            envelope: Envelope::default(),
            body: BodyBuffer::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Handle a parsed command outside body capture
    pub async fn handle_command(&mut self, cmd: SmtpCommand) -> Reply {
        debug!(session = %self.id, state = ?self.state, "C: {:?}", cmd);

        let response = match cmd {
            SmtpCommand::Helo { domain } => SmtpResponse::helo(&self.hostname, &domain),
            SmtpCommand::Mail { path } => self.handle_mail(path),
            SmtpCommand::Rcpt { path } => self.handle_rcpt(path).await,
            SmtpCommand::Data => self.handle_data(),
            SmtpCommand::Noop => SmtpResponse::ok(),
            SmtpCommand::Quit => {
                if self.envelope.has_sender() {
                    debug!(session = %self.id, "Envelope discarded on QUIT");
                }
                self.reset();
                return Reply::closing(SmtpResponse::closing(&self.hostname));
            }
            SmtpCommand::Unknown { .. } => SmtpResponse::not_recognized(),
        };

        Reply::new(response)
    }

    fn handle_mail(&mut self, path: Option<String>) -> String {
        let Some(sender) = path else {
            return SmtpResponse::bad_address();
        };

        debug!(session = %self.id, sender = %sender, "MAIL FROM");
        self.envelope.begin(sender);
        self.state = SmtpState::SenderSet;
        SmtpResponse::sender_ok()
    }

    async fn handle_rcpt(&mut self, path: Option<String>) -> String {
        let Some(recipient) = path else {
            return SmtpResponse::bad_address();
        };

        match self.backend.directory.user_exists(&recipient).await {
            Ok(true) => {}
            Ok(false) => {
                info!(session = %self.id, recipient = %recipient, "Unknown recipient");
                return SmtpResponse::no_such_user();
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Directory lookup failed");
                return SmtpResponse::temporary_failure();
            }
        }

        if !self.envelope.has_sender() {
            return SmtpResponse::bad_sequence();
        }

        if self.envelope.recipients.len() >= self.max_recipients
            && !self.envelope.recipients.contains(&recipient)
        {
            warn!(session = %self.id, limit = self.max_recipients, "Recipient limit reached");
            return SmtpResponse::too_many_recipients();
        }

        self.envelope.add_recipient(recipient);
        self.state = SmtpState::RecipientsSet;
        SmtpResponse::recipient_ok()
    }

    fn handle_data(&mut self) -> String {
        if self.state != SmtpState::RecipientsSet || !self.envelope.has_recipients() {
            return SmtpResponse::bad_sequence();
        }

        self.body = BodyBuffer::default();
        self.state = SmtpState::ReceivingBody;
        SmtpResponse::start_mail_input()
    }

    /// One line of the message body
    async fn handle_body_line(&mut self, line: &[u8]) -> Reply {
        if line == b"." {
            return Reply::new(self.finish_body().await);
        }

        let line = line.strip_prefix(b".").unwrap_or(line);
        if self.body.overflowed {
            return Reply::none();
        }

        if self.body.data.len() + line.len() + 2 > self.max_message_size {
            warn!(session = %self.id, limit = self.max_message_size, "Message too large");
            self.body.overflowed = true;
            self.body.data = Vec::new();
            return Reply::none();
        }

        self.body.data.extend_from_slice(line);
        self.body.data.extend_from_slice(b"\r\n");
        Reply::none()
    }

    /// Terminator received: deliver and start over
    async fn finish_body(&mut self) -> String {
        let body = std::mem::take(&mut self.body);
        let recipients = std::mem::take(&mut self.envelope.recipients);
        let sender = self.envelope.sender.take().unwrap_or_default();
        self.reset();

        if body.overflowed {
            return SmtpResponse::message_too_big();
        }

        let report = self
            .backend
            .store
            .append_message(&recipients, &body.data)
            .await;

        if report.is_total_failure() {
            warn!(session = %self.id, sender = %sender, "Delivery failed for all recipients");
            return SmtpResponse::delivery_failed();
        }

        info!(
            session = %self.id,
            sender = %sender,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            size = body.data.len(),
            "Message accepted"
        );

        match report.message_id {
            Some(id) if report.is_complete() => SmtpResponse::queued(id),
            _ => SmtpResponse::partially_delivered(report.delivered.len(), recipients.len()),
        }
    }

    /// Back to Greeted with an empty envelope
    fn reset(&mut self) {
        self.envelope.clear();
        self.body = BodyBuffer::default();
        self.state = SmtpState::Greeted;
    }

    fn abandon(&mut self, reason: &str) {
        if self.state == SmtpState::ReceivingBody {
            info!(
                session = %self.id,
                reason,
                discarded = self.body.data.len(),
                "Message body discarded"
            );
        }
        self.reset();
    }
}

#[async_trait]
impl LineSession for SmtpSession {
    fn protocol(&self) -> &'static str {
        "SMTP"
    }

    fn greeting(&self) -> Reply {
        Reply::new(SmtpResponse::greeting(&self.hostname))
    }

    async fn handle_line(&mut self, line: &[u8]) -> Reply {
        if self.state == SmtpState::ReceivingBody {
            return self.handle_body_line(line).await;
        }
        self.handle_command(parse_command(line)).await
    }

    fn line_too_long(&mut self) -> Reply {
        let response = if self.state == SmtpState::ReceivingBody {
            SmtpResponse::message_too_big()
        } else {
            SmtpResponse::line_too_long()
        };
        self.abandon("line too long");
        Reply::closing(response)
    }

    fn timed_out(&mut self) -> Reply {
        self.abandon("timeout");
        Reply::closing(SmtpResponse::timeout(&self.hostname))
    }

    fn disconnected(&mut self) {
        self.abandon("disconnect");
    }
}
