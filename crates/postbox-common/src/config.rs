//! Configuration for Postbox

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// POP3 configuration
    #[serde(default)]
    pub pop3: Pop3Config,

    /// SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname used in greetings
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_line_length() -> usize {
    1024
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory holding one subdirectory per mailbox
    #[serde(default = "default_mail_dir")]
    pub mail_dir: PathBuf,

    /// User directory file, one `username password` pair per line
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mail_dir: default_mail_dir(),
            users_file: default_users_file(),
        }
    }
}

fn default_mail_dir() -> PathBuf {
    PathBuf::from("mail.store")
}

fn default_users_file() -> PathBuf {
    PathBuf::from("users.txt")
}

/// POP3 server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pop3Config {
    /// Bind host; the port comes from the command line
    #[serde(default = "default_host")]
    pub host: String,

    /// Idle timeout while waiting for a command, in seconds
    #[serde(default = "default_pop3_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent connections
    #[serde(default = "default_pop3_max_connections")]
    pub max_connections: usize,

    /// Longest accepted command line, excluding the line terminator
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for Pop3Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            timeout_secs: default_pop3_timeout(),
            max_connections: default_pop3_max_connections(),
            max_line_length: default_max_line_length(),
        }
    }
}

fn default_pop3_timeout() -> u64 {
    600
}

fn default_pop3_max_connections() -> usize {
    500
}

/// SMTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Bind host; the port comes from the command line
    #[serde(default = "default_host")]
    pub host: String,

    /// Idle timeout while waiting for a command or body line, in seconds
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent connections
    #[serde(default = "default_smtp_max_connections")]
    pub max_connections: usize,

    /// Longest accepted command or body line, excluding the line terminator
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Maximum message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Maximum recipients per message
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            timeout_secs: default_smtp_timeout(),
            max_connections: default_smtp_max_connections(),
            max_line_length: default_max_line_length(),
            max_message_size: default_max_message_size(),
            max_recipients: default_max_recipients(),
        }
    }
}

fn default_smtp_timeout() -> u64 {
    300
}

fn default_smtp_max_connections() -> usize {
    100
}

fn default_max_message_size() -> usize {
    10 * 1024 * 1024 // 10 MB
}

fn default_max_recipients() -> usize {
    100
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default locations, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        if let Ok(path) = std::env::var("POSTBOX_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        let paths = [
            PathBuf::from("./postbox.toml"),
            PathBuf::from("/etc/postbox/postbox.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.hostname, "localhost");
        assert_eq!(config.pop3.max_line_length, 1024);
        assert_eq!(config.pop3.timeout_secs, 600);
        assert_eq!(config.smtp.max_recipients, 100);
        assert_eq!(config.storage.users_file, PathBuf::from("users.txt"));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "mail.example.com"

[storage]
mail_dir = "/data/mail"

[smtp]
max_message_size = 2048
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "mail.example.com");
        assert_eq!(config.storage.mail_dir, PathBuf::from("/data/mail"));
        assert_eq!(config.storage.users_file, PathBuf::from("users.txt"));
        assert_eq!(config.smtp.max_message_size, 2048);
        assert_eq!(config.smtp.timeout_secs, 300);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("postbox.toml");
        std::fs::write(&path, "[pop3]\ntimeout_secs = 5\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.pop3.timeout_secs, 5);

        std::fs::write(&path, "[pop3\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(crate::Error::Config(_))
        ));
    }
}
