//! SMTP server module

mod command;
mod response;
mod server;
mod session;

pub use command::{extract_path, parse_command, SmtpCommand};
pub use response::SmtpResponse;
pub use server::SmtpServer;
pub use session::{SmtpSession, SmtpState};
