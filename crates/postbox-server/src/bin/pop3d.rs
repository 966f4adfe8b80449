//! Postbox POP3 daemon

use anyhow::Result;
use postbox_common::Config;
use postbox_core::Pop3Server;
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

    info!("Starting Postbox POP3 server...");

    let backend = postbox_server::open_backend(&config)?;
    let server = Pop3Server::new(config.pop3.clone(), config.server.hostname.clone(), backend);
    let listener = server.bind(port).await?;

    tokio::select! {
        result = server.run(listener) => {
            if let Err(e) = result {
                error!("POP3 server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("Postbox POP3 server shutdown complete");
    Ok(())
}
