//! Postbox Core - POP3 and SMTP protocol sessions
//!
//! This crate holds the two per-connection state machines (mailbox access
//! over POP3, mail submission over SMTP), the line framing they share and
//! the TCP servers that run one session per accepted connection.

pub mod backend;
pub mod connection;
pub mod line;
pub mod pop3;
pub mod smtp;

pub use backend::Backend;
pub use connection::{ConnectionLimits, LineSession, Reply};
pub use line::{Line, LineCodec};
pub use pop3::{Pop3Server, Pop3Session};
pub use smtp::{SmtpServer, SmtpSession};
