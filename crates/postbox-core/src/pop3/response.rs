//! POP3 Response generation
//!
//! Generates POP3 response strings for client communication.

/// POP3 Response builder
pub struct Pop3Response;

impl Pop3Response {
    /// Server greeting
    pub fn greeting(server_name: &str) -> String {
        format!("+OK {} POP3 server ready\r\n", server_name)
    }

    /// Positive response
    pub fn ok(message: &str) -> String {
        format!("+OK {}\r\n", message)
    }

    /// Positive response with no message
    pub fn ok_simple() -> String {
        "+OK\r\n".to_string()
    }

    /// Negative response
    pub fn err(message: &str) -> String {
        format!("-ERR {}\r\n", message)
    }

    /// STAT response
    pub fn stat(count: usize, size: u64) -> String {
        format!("+OK {} {}\r\n", count, size)
    }

    /// LIST response header
    pub fn list_header(count: usize, size: u64) -> String {
        format!("+OK {} messages ({} octets)\r\n", count, size)
    }

    /// LIST single message response
    pub fn list_single(msg: u32, size: u64) -> String {
        format!("+OK {} {}\r\n", msg, size)
    }

    /// LIST line for multi-line response
    pub fn list_line(msg: u32, size: u64) -> String {
        format!("{} {}\r\n", msg, size)
    }

    /// UIDL response header
    pub fn uidl_header() -> String {
        "+OK\r\n".to_string()
    }

    /// UIDL single message response
    pub fn uidl_single(msg: u32, uid: &str) -> String {
        format!("+OK {} {}\r\n", msg, uid)
    }

    /// UIDL line for multi-line response
    pub fn uidl_line(msg: u32, uid: &str) -> String {
        format!("{} {}\r\n", msg, uid)
    }

    /// RETR response header
    pub fn retr_header(size: u64) -> String {
        format!("+OK {} octets\r\n", size)
    }

    /// TOP response header
    pub fn top_header() -> String {
        "+OK top of message follows\r\n".to_string()
    }

    /// Multi-line terminator
    pub fn terminator() -> &'static str {
        ".\r\n"
    }

    /// Byte-stuff a message for a multi-line response.
    ///
    /// Lines starting with `.` get a second dot, and the result always ends
    /// with CRLF so the terminator lands on its own line.
    pub fn byte_stuff(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(body.len() + 16);
        let mut at_line_start = true;

        for &b in body {
            if at_line_start && b == b'.' {
                out.push(b'.');
            }
            out.push(b);
            at_line_start = b == b'\n';
        }

        if !body.is_empty() && !body.ends_with(b"\r\n") {
            if body.ends_with(b"\n") {
                out.pop();
            }
            out.extend_from_slice(b"\r\n");
        }

        out
    }

    /// Header block and the first `lines` body lines of a message.
    ///
    /// The header ends at the first empty line; a message without one is
    /// all header.
    pub fn top_of_message(body: &[u8], lines: u32) -> &[u8] {
        let mut pos = 0;
        let mut in_header = true;
        let mut body_lines = 0;

        while pos < body.len() {
            if !in_header && body_lines >= lines {
                break;
            }

            let end = body[pos..]
                .iter()
                .position(|b| *b == b'\n')
                .map_or(body.len(), |i| pos + i + 1);
            let line = &body[pos..end];

            if in_header {
                if line == b"\r\n" || line == b"\n" {
                    in_header = false;
                }
            } else {
                body_lines += 1;
            }
            pos = end;
        }

        &body[..pos]
    }
}
