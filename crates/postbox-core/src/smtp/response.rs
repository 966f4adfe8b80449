//! SMTP reply lines

use postbox_common::types::MessageId;

/// SMTP Response builder
pub struct SmtpResponse;

impl SmtpResponse {
    /// Single-line reply
    pub fn reply(code: u16, message: &str) -> String {
        format!("{} {}\r\n", code, message)
    }

    pub fn greeting(hostname: &str) -> String {
        Self::reply(220, &format!("{} Simple Mail Transfer Service Ready", hostname))
    }

    pub fn helo(hostname: &str, domain: &str) -> String {
        Self::reply(250, &format!("{} Hello {}", hostname, domain))
    }

    pub fn ok() -> String {
        Self::reply(250, "2.0.0 OK")
    }

    pub fn sender_ok() -> String {
        Self::reply(250, "2.1.0 OK")
    }

    pub fn recipient_ok() -> String {
        Self::reply(250, "2.1.5 OK")
    }

    pub fn start_mail_input() -> String {
        Self::reply(354, "Start mail input; end with <CRLF>.<CRLF>")
    }

    pub fn queued(id: MessageId) -> String {
        Self::reply(250, &format!("2.0.0 OK: queued as {}", id))
    }

    pub fn partially_delivered(delivered: usize, total: usize) -> String {
        Self::reply(
            250,
            &format!("2.0.0 OK: delivered to {} of {} recipients", delivered, total),
        )
    }

    pub fn closing(hostname: &str) -> String {
        Self::reply(221, &format!("2.0.0 {} closing transmission channel", hostname))
    }

    pub fn timeout(hostname: &str) -> String {
        Self::reply(421, &format!("4.4.2 {} timeout, closing connection", hostname))
    }

    pub fn too_many_connections() -> String {
        Self::reply(421, "4.3.2 Too many connections, try again later")
    }

    pub fn temporary_failure() -> String {
        Self::reply(451, "4.3.0 Temporary error")
    }

    pub fn delivery_failed() -> String {
        Self::reply(451, "4.3.0 Delivery failed")
    }

    pub fn too_many_recipients() -> String {
        Self::reply(452, "4.5.3 Too many recipients")
    }

    pub fn not_recognized() -> String {
        Self::reply(500, "5.5.2 Command not recognized")
    }

    pub fn line_too_long() -> String {
        Self::reply(500, "5.5.2 Line too long")
    }

    pub fn bad_address() -> String {
        Self::reply(501, "5.1.7 Bad address syntax")
    }

    pub fn bad_sequence() -> String {
        Self::reply(503, "5.5.1 Bad sequence of commands")
    }

    pub fn no_such_user() -> String {
        Self::reply(550, "5.1.1 No such user here")
    }

    pub fn message_too_big() -> String {
        Self::reply(552, "5.3.4 Message size exceeds fixed maximum message size")
    }
}
