//! Postbox SMTP daemon

use anyhow::Result;
use postbox_common::Config;
use postbox_core::SmtpServer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let port = match postbox_server::parse_port_arg(std::env::args()) {
        Ok(port) => port,
        Err(usage) => {
            eprintln!("{}", usage);
            std::process::exit(1);
        }
    };

    let config = Config::load()?;
    postbox_server::init_logging(&config.logging);

    info!("Starting Postbox SMTP server...");

    let backend = postbox_server::open_backend(&config)?;
    let server = SmtpServer::new(config.smtp.clone(), config.server.hostname.clone(), backend);
    let listener = server.bind(port).await?;

    tokio::select! {
        result = server.run(listener) => {
            if let Err(e) = result {
                error!("SMTP server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("Postbox SMTP server shutdown complete");
    Ok(())
}
