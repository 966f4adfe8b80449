//! SMTP command parsing

/// SMTP command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    /// HELO domain
    Helo { domain: String },
    /// MAIL FROM:<reverse-path>, `None` when the path is malformed
    Mail { path: Option<String> },
    /// RCPT TO:<forward-path>, `None` when the path is malformed
    Rcpt { path: Option<String> },
    /// DATA
    Data,
    /// NOOP
    Noop,
    /// QUIT
    Quit,
    /// Anything else
    Unknown { verb: String },
}

/// Address between the first `<` and the first `>` after it
pub fn extract_path(args: &str) -> Option<&str> {
    let start = args.find('<')? + 1;
    let len = args[start..].find('>')?;
    Some(&args[start..start + len])
}

/// Parse an SMTP command line (terminator already removed)
pub fn parse_command(line: &[u8]) -> SmtpCommand {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();

    let (verb, args) = match line.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (line, ""),
    };
    let verb = verb.to_ascii_uppercase();

    match verb.as_str() {
        "HELO" => SmtpCommand::Helo {
            domain: args.to_string(),
        },
        "MAIL" => SmtpCommand::Mail {
            path: extract_path(args).map(str::to_string),
        },
        "RCPT" => SmtpCommand::Rcpt {
            path: extract_path(args)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        },
        "DATA" => SmtpCommand::Data,
        "NOOP" => SmtpCommand::Noop,
        "QUIT" => SmtpCommand::Quit,
        _ => SmtpCommand::Unknown { verb },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_path() {
        assert_eq!(extract_path("FROM:<user@example.com>"), Some("user@example.com"));
        assert_eq!(extract_path("FROM: <user@example.com> SIZE=10"), Some("user@example.com"));
        assert_eq!(extract_path("FROM:<>"), Some(""));
        assert_eq!(extract_path("FROM:user@example.com"), None);
        assert_eq!(extract_path("FROM:<user@example.com"), None);
        assert_eq!(extract_path("FROM:user>"), None);
        // A '>' before the '<' does not close the path
        assert_eq!(extract_path("> TO:<b@y.com>"), Some("b@y.com"));
    }

    #[test]
    fn test_parse_mail_and_rcpt() {
        assert_eq!(
            parse_command(b"mail FROM:<a@x.com>"),
            SmtpCommand::Mail {
                path: Some("a@x.com".to_string())
            }
        );
        assert_eq!(
            parse_command(b"MAIL FROM:<>"),
            SmtpCommand::Mail {
                path: Some(String::new())
            }
        );
        assert_eq!(parse_command(b"MAIL FROM:a@x.com"), SmtpCommand::Mail { path: None });
        assert_eq!(
            parse_command(b"RCPT TO:<b@y.com>"),
            SmtpCommand::Rcpt {
                path: Some("b@y.com".to_string())
            }
        );
        assert_eq!(parse_command(b"RCPT TO:<>"), SmtpCommand::Rcpt { path: None });
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(
            parse_command(b"HELO client.example.com"),
            SmtpCommand::Helo {
                domain: "client.example.com".to_string()
            }
        );
        assert_eq!(parse_command(b"data"), SmtpCommand::Data);
        assert_eq!(parse_command(b"NOOP"), SmtpCommand::Noop);
        assert_eq!(parse_command(b"QUIT"), SmtpCommand::Quit);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse_command(b"EHLO x"),
            SmtpCommand::Unknown {
                verb: "EHLO".to_string()
            }
        );
        assert_eq!(
            parse_command(b"MAI"),
            SmtpCommand::Unknown {
                verb: "MAI".to_string()
            }
        );
        assert_eq!(
            parse_command(b""),
            SmtpCommand::Unknown {
                verb: String::new()
            }
        );
    }
}
