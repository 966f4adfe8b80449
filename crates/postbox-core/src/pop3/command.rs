//! POP3 Command definitions
//!
//! Defines the POP3 commands supported by this server and the validation of
//! their arguments.

use super::session::SessionState;
use std::fmt;

/// Why a message-number argument was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// No argument given
    Missing,
    /// Argument contains something other than decimal digits
    NotNumeric,
    /// All digits, but too large to address any message
    OutOfRange,
}

/// A validated or rejected numeric argument
pub type NumberArg = Result<u32, ArgumentError>;

/// Parse a message number or line count: decimal digits only
pub fn parse_number(arg: &str) -> NumberArg {
    if arg.is_empty() {
        return Err(ArgumentError::Missing);
    }
    if !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ArgumentError::NotNumeric);
    }
    arg.parse().map_err(|_| ArgumentError::OutOfRange)
}

/// POP3 Command
#[derive(Clone, PartialEq, Eq)]
pub enum Pop3Command {
    // Authorization state commands
    /// USER name - Identify user
    User { username: Option<String> },
    /// PASS password - Provide password
    Pass { password: Option<String> },

    // Transaction state commands
    /// STAT - Get mailbox status
    Stat,
    /// LIST [msg] - List messages
    List { msg: Option<NumberArg> },
    /// RETR msg - Retrieve message
    Retr { msg: NumberArg },
    /// DELE msg - Mark message for deletion
    Dele { msg: NumberArg },
    /// NOOP - No operation
    Noop,
    /// RSET - Reset (unmark all deletions)
    Rset,
    /// TOP msg n - Get message headers and first n body lines
    Top { msg: NumberArg, lines: NumberArg },
    /// UIDL [msg] - Get unique ID listing
    Uidl { msg: Option<NumberArg> },

    // Authorization and transaction state
    /// QUIT - End session
    Quit,

    /// Unknown command
    Unknown { command: String },
}

impl Pop3Command {
    /// States in which the command is accepted
    pub fn permitted_states(&self) -> &'static [SessionState] {
        use SessionState::*;

        match self {
            Pop3Command::User { .. } | Pop3Command::Pass { .. } => &[Authorization],
            Pop3Command::Quit => &[Authorization, Transaction],
            Pop3Command::Stat
            | Pop3Command::List { .. }
            | Pop3Command::Retr { .. }
            | Pop3Command::Dele { .. }
            | Pop3Command::Noop
            | Pop3Command::Rset
            | Pop3Command::Top { .. }
            | Pop3Command::Uidl { .. } => &[Transaction],
            Pop3Command::Unknown { .. } => &[],
        }
    }

    pub fn is_permitted_in(&self, state: SessionState) -> bool {
        self.permitted_states().contains(&state)
    }

    /// Command verb
    pub fn name(&self) -> &str {
        match self {
            Pop3Command::User { .. } => "USER",
            Pop3Command::Pass { .. } => "PASS",
            Pop3Command::Stat => "STAT",
            Pop3Command::List { .. } => "LIST",
            Pop3Command::Retr { .. } => "RETR",
            Pop3Command::Dele { .. } => "DELE",
            Pop3Command::Noop => "NOOP",
            Pop3Command::Rset => "RSET",
            Pop3Command::Top { .. } => "TOP",
            Pop3Command::Uidl { .. } => "UIDL",
            Pop3Command::Quit => "QUIT",
            Pop3Command::Unknown { command } => command,
        }
    }
}

// Keeps passwords out of logs
impl fmt::Debug for Pop3Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pop3Command::User { username } => write!(f, "USER {:?}", username),
            Pop3Command::Pass { .. } => write!(f, "PASS ****"),
            Pop3Command::List { msg } => write!(f, "LIST {:?}", msg),
            Pop3Command::Retr { msg } => write!(f, "RETR {:?}", msg),
            Pop3Command::Dele { msg } => write!(f, "DELE {:?}", msg),
            Pop3Command::Top { msg, lines } => write!(f, "TOP {:?} {:?}", msg, lines),
            Pop3Command::Uidl { msg } => write!(f, "UIDL {:?}", msg),
            other => f.write_str(other.name()),
        }
    }
}

fn optional(args: &str) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.to_string())
    }
}

fn optional_number(args: &str) -> Option<NumberArg> {
    if args.is_empty() {
        None
    } else {
        Some(parse_number(args))
    }
}

/// POP3 Command Parser
pub struct Pop3Parser;

impl Pop3Parser {
    /// Parse a POP3 command line (terminator already removed)
    pub fn parse(line: &[u8]) -> Pop3Command {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();

        let (cmd, args) = match line.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, args.trim()),
            None => (line, ""),
        };
        let cmd = cmd.to_ascii_uppercase();

        match cmd.as_str() {
            "USER" => Pop3Command::User {
                username: optional(args),
            },
            "PASS" => Pop3Command::Pass {
                password: optional(args),
            },
            "STAT" => Pop3Command::Stat,
            "LIST" => Pop3Command::List {
                msg: optional_number(args),
            },
            "RETR" => Pop3Command::Retr {
                msg: parse_number(args),
            },
            "DELE" => Pop3Command::Dele {
                msg: parse_number(args),
            },
            "NOOP" => Pop3Command::Noop,
            "RSET" => Pop3Command::Rset,
            "TOP" => {
                let (msg, lines) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
                Pop3Command::Top {
                    msg: parse_number(msg),
                    lines: parse_number(lines.trim()),
                }
            }
            "UIDL" => Pop3Command::Uidl {
                msg: optional_number(args),
            },
            "QUIT" => Pop3Command::Quit,
            _ => Pop3Command::Unknown { command: cmd },
        }
    }
}
