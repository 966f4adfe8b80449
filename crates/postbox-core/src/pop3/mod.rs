//! POP3 Server Module
//!
//! Implements the Post Office Protocol version 3 (POP3) for mail retrieval.

mod command;
mod maildrop;
mod response;
mod server;
mod session;

pub use command::{ArgumentError, NumberArg, Pop3Command, Pop3Parser};
pub use maildrop::{LookupError, Maildrop, MessageInfo};
pub use response::Pop3Response;
pub use server::Pop3Server;
pub use session::{Pop3Session, SessionState};
