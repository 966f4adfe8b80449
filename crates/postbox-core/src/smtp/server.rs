//! SMTP server implementation

use super::response::SmtpResponse;
use super::session::SmtpSession;
use crate::backend::Backend;
use crate::connection::{self, ConnectionLimits};
use anyhow::Result;
use postbox_common::config::SmtpConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// SMTP Server
pub struct SmtpServer {
    config: SmtpConfig,
    hostname: String,
    backend: Backend,
    connection_semaphore: Arc<Semaphore>,
}

impl SmtpServer {
    /// Create a new SMTP server
    pub fn new(config: SmtpConfig, hostname: impl Into<String>, backend: Backend) -> Self {
        let max_connections = config.max_connections;
        Self {
            config,
            hostname: hostname.into(),
            backend,
            connection_semaphore: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Bind to the configured host on `port`
    pub async fn bind(&self, port: u16) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, port);
        let listener = TcpListener::bind(&addr).await?;
        info!("SMTP server listening on {}", addr);
        Ok(listener)
    }

    pub fn limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            idle_timeout: Duration::from_secs(self.config.timeout_secs),
            max_line_length: self.config.max_line_length,
        }
    }

    /// Accept connections until the listener fails
    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!("New SMTP connection from {}", peer_addr);
                    self.accept(stream, peer_addr).await;
                }
                Err(e) => {
                    error!("SMTP: Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Start a session on an accepted stream, or refuse it when at capacity
    pub async fn accept<IO>(&self, mut stream: IO, peer_addr: SocketAddr)
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let permit = match self.connection_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("SMTP: Max connections reached, rejecting {}", peer_addr);
                let _ = stream
                    .write_all(SmtpResponse::too_many_connections().as_bytes())
                    .await;
                let _ = stream.shutdown().await;
                return;
            }
        };

        let session = SmtpSession::new(self.hostname.clone(), self.backend.clone(), &self.config);
        let limits = self.limits();

        tokio::spawn(async move {
            if let Err(e) = connection::serve(session, stream, peer_addr, limits).await {
                error!("SMTP session error from {}: {}", peer_addr, e);
            }
            drop(permit);
        });
    }
}
