//! Postbox daemon startup
//!
//! Shared by the `postbox-pop3d` and `postbox-smtpd` binaries: command-line
//! handling, logging setup and construction of the storage backend.

use anyhow::{Context, Result};
use postbox_common::config::LoggingConfig;
use postbox_common::Config;
use postbox_core::Backend;
use postbox_storage::{FileDirectory, LocalMailStore};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

/// Bad command line; the message is the text to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError(String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// Take the listening port from `<program> <port>`
pub fn parse_port_arg<I>(args: I) -> std::result::Result<u16, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let program = args.next().unwrap_or_else(|| "postbox".to_string());
    let usage = || UsageError(format!("Invalid arguments. Expected: {} <port>", program));

    match (args.next(), args.next()) {
        (Some(port), None) => port
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(usage),
        _ => Err(usage()),
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(tracing_fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

/// Open the user directory and mail store named in the configuration
pub fn open_backend(config: &Config) -> Result<Backend> {
    let directory = FileDirectory::load(&config.storage.users_file)
        .context("Failed to load user directory")?;
    let store =
        LocalMailStore::open(&config.storage.mail_dir).context("Failed to open mail store")?;

    info!(
        users = directory.len(),
        mail_dir = %config.storage.mail_dir.display(),
        "Storage ready"
    );

    Ok(Backend::new(Arc::new(directory), Arc::new(store)))
}
