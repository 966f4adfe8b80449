//! Per-connection driver shared by the POP3 and SMTP servers
//!
//! Pulls one line at a time from the socket, hands it to the protocol
//! session and writes back whatever the session replies, until the session
//! asks to close, the client goes away, or the idle timeout fires.

use crate::line::{Line, LineCodec};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Bytes to send back plus whether the connection ends afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub data: Vec<u8>,
    pub close: bool,
}

impl Reply {
    /// Reply data, connection stays open
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            close: false,
        }
    }

    /// Reply data, then close the connection
    pub fn closing(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            close: true,
        }
    }

    /// Nothing to send
    pub fn none() -> Self {
        Self::default()
    }

    /// Reply as text, for assertions and logging
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// A line-driven protocol session
#[async_trait]
pub trait LineSession: Send {
    /// Protocol name for logs
    fn protocol(&self) -> &'static str;

    /// Banner sent when the connection opens
    fn greeting(&self) -> Reply;

    /// Handle one complete input line
    async fn handle_line(&mut self, line: &[u8]) -> Reply;

    /// The client sent a line over the length limit
    fn line_too_long(&mut self) -> Reply;

    /// No input arrived within the idle timeout
    fn timed_out(&mut self) -> Reply;

    /// The client closed the stream or the read failed
    fn disconnected(&mut self);
}

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub idle_timeout: Duration,
    pub max_line_length: usize,
}

/// Drive `session` over `stream` until it ends
pub async fn serve<S, IO>(
    mut session: S,
    stream: IO,
    peer: SocketAddr,
    limits: ConnectionLimits,
) -> Result<()>
where
    S: LineSession,
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    let protocol = session.protocol();
    let (reader, writer) = tokio::io::split(stream);
    let mut lines = FramedRead::new(reader, LineCodec::new(limits.max_line_length));
    let mut writer = BufWriter::new(writer);

    send(&mut writer, &session.greeting()).await?;

    loop {
        let reply = match tokio::time::timeout(limits.idle_timeout, lines.next()).await {
            Ok(Some(Ok(Line::Text(line)))) => session.handle_line(&line).await,
            Ok(Some(Ok(Line::TooLong))) => {
                warn!("{} line too long from {}", protocol, peer);
                session.line_too_long()
            }
            Ok(Some(Err(e))) => {
                session.disconnected();
                return Err(e.into());
            }
            Ok(None) => {
                info!("{} connection closed by client {}", protocol, peer);
                session.disconnected();
                return Ok(());
            }
            Err(_) => {
                warn!("{} connection timeout for {}", protocol, peer);
                session.timed_out()
            }
        };

        send(&mut writer, &reply).await?;

        if reply.close {
            break;
        }
    }

    writer.shutdown().await?;
    info!("{} connection closed for {}", protocol, peer);
    Ok(())
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut BufWriter<W>, reply: &Reply) -> Result<()> {
    if reply.data.is_empty() {
        return Ok(());
    }
    writer.write_all(&reply.data).await?;
    writer.flush().await?;
    debug!("S: {}", reply.text().lines().next().unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    /// Echoes lines back, closes on "BYE"
    struct Echo {
        disconnected: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl LineSession for Echo {
        fn protocol(&self) -> &'static str {
            "ECHO"
        }

        fn greeting(&self) -> Reply {
            Reply::new("hello\r\n")
        }

        async fn handle_line(&mut self, line: &[u8]) -> Reply {
            let mut data = line.to_vec();
            data.extend_from_slice(b"\r\n");
            if line == b"BYE" {
                Reply::closing(data)
            } else {
                Reply::new(data)
            }
        }

        fn line_too_long(&mut self) -> Reply {
            Reply::closing("too long\r\n")
        }

        fn timed_out(&mut self) -> Reply {
            Reply::closing("timeout\r\n")
        }

        fn disconnected(&mut self) {
            self.disconnected
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn limits(secs: u64) -> ConnectionLimits {
        ConnectionLimits {
            idle_timeout: Duration::from_secs(secs),
            max_line_length: 16,
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    fn echo() -> (Echo, std::sync::Arc<std::sync::atomic::AtomicBool>) {
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        (
            Echo {
                disconnected: flag.clone(),
            },
            flag,
        )
    }

    #[tokio::test]
    async fn test_echo_until_close() {
        let (client, server) = tokio::io::duplex(1024);
        let (session, _) = echo();
        let task = tokio::spawn(serve(session, server, peer(), limits(5)));

        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read);
        let mut line = String::new();

        read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "hello\r\n");

        write.write_all(b"ping\r\nBYE\r\n").await.unwrap();
        line.clear();
        read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "ping\r\n");
        line.clear();
        read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "BYE\r\n");

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_line_too_long_closes() {
        let (client, server) = tokio::io::duplex(1024);
        let (session, _) = echo();
        let task = tokio::spawn(serve(session, server, peer(), limits(5)));

        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read);
        write
            .write_all(b"this line is far too long for the limit\r\n")
            .await
            .unwrap();

        let mut out = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut read, &mut out)
            .await
            .unwrap();
        assert_eq!(out, "hello\r\ntoo long\r\n");
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_disconnect_notifies_session() {
        let (client, server) = tokio::io::duplex(1024);
        let (session, flag) = echo();
        let task = tokio::spawn(serve(session, server, peer(), limits(5)));

        let mut client = BufReader::new(client);
        let mut line = String::new();
        client.read_line(&mut line).await.unwrap();
        drop(client);

        task.await.unwrap().unwrap();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let (client, server) = tokio::io::duplex(1024);
        let (session, _) = echo();
        let task = tokio::spawn(serve(session, server, peer(), limits(30)));

        let mut read = BufReader::new(client);
        let mut out = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut read, &mut out)
            .await
            .unwrap();
        assert_eq!(out, "hello\r\ntimeout\r\n");
        task.await.unwrap().unwrap();
    }
}
