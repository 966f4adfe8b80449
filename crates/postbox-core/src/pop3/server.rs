//! POP3 Server
//!
//! Accepts TCP connections and runs one [`Pop3Session`] per connection.

use super::response::Pop3Response;
use super::session::Pop3Session;
use crate::backend::Backend;
use crate::connection::{self, ConnectionLimits};
use anyhow::Result;
use postbox_common::config::Pop3Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// POP3 Server
pub struct Pop3Server {
    config: Pop3Config,
    hostname: String,
    backend: Backend,
    connection_semaphore: Arc<Semaphore>,
}

impl Pop3Server {
    /// Create a new POP3 server
    pub fn new(config: Pop3Config, hostname: impl Into<String>, backend: Backend) -> Self {
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
        info!("POP3 server listening on {}", addr);
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
                    info!("New POP3 connection from {}", peer_addr);
                    self.accept(stream, peer_addr).await;
                }
                Err(e) => {
                    error!("POP3 accept error: {}", e);
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
                warn!("POP3: Max connections reached, rejecting {}", peer_addr);
                let refusal = Pop3Response::err("too many connections");
                let _ = stream.write_all(refusal.as_bytes()).await;
                let _ = stream.shutdown().await;
                return;
            }
        };

        let session = Pop3Session::new(self.hostname.clone(), self.backend.clone());
        let limits = self.limits();

        tokio::spawn(async move {
            if let Err(e) = connection::serve(session, stream, peer_addr, limits).await {
                error!("POP3 connection error from {}: {}", peer_addr, e);
            }
            drop(permit);
        });
    }
}
