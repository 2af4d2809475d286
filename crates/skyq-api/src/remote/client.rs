//! `SkyRemote` - TCP client for the box's remote-control port.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::instrument;

use super::command::RemoteCommand;
use crate::constants::{REMOTE_PORT, REMOTE_TIMEOUT};
use crate::error::{Error, Result};

/// Size of the read buffer; a full-size read ends the handshake.
const HANDSHAKE_LEN: usize = 24;

/// Number of bytes echoed back for the first short read.
const FIRST_ECHO_LEN: usize = 12;

/// Encodes the key-press frame for `code`.
#[must_use]
pub const fn press_bytes(code: u8) -> [u8; 8] {
    [4, 1, 0, 0, 0, 0, 0xE0 | (code >> 4), code & 0x0F]
}

/// Encodes the key-release frame for `code` (the press frame with byte 1 cleared).
#[must_use]
pub const fn release_bytes(code: u8) -> [u8; 8] {
    [4, 0, 0, 0, 0, 0, 0xE0 | (code >> 4), code & 0x0F]
}

/// Sends button presses to a Sky Q box.
///
/// Every [`send_command`](Self::send_command) opens a fresh connection, runs
/// the handshake, writes the press and release frames and closes. There is no
/// retry.
#[derive(Debug, Clone)]
pub struct SkyRemote {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SkyRemote {
    /// Creates a remote for `host` on the default port.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: REMOTE_PORT,
            timeout: REMOTE_TIMEOUT,
        }
    }

    /// Sets the remote port (default: 49160).
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect/read/write timeout (default: 5s).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the target host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the target port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Presses the button for `command`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] on connection, handshake or timeout
    /// failures.
    pub async fn press(&self, command: RemoteCommand) -> Result<()> {
        self.send_command(command.code()).await
    }

    /// Sends a raw command code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if the box is unreachable, closes the
    /// connection during the handshake, or does not answer within the timeout.
    #[instrument(skip_all, fields(host = %self.host, port = self.port, code))]
    pub async fn send_command(&self, code: u8) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        tracing::debug!(%addr, "Connecting to remote port");

        let mut stream = self
            .timed("connect to remote port", TcpStream::connect(&addr))
            .await?;

        self.handshake(&mut stream).await?;

        self.timed("send key press", stream.write_all(&press_bytes(code)))
            .await?;
        self.timed("send key release", stream.write_all(&release_bytes(code)))
            .await?;

        if let Err(e) = stream.shutdown().await {
            tracing::debug!(error = %e, "Remote socket shutdown failed");
        }

        tracing::debug!(code, "Command sent");
        Ok(())
    }

    /// Echoes short reads back to the box until a full-size read arrives.
    async fn handshake(&self, stream: &mut TcpStream) -> Result<()> {
        let mut buf = [0_u8; HANDSHAKE_LEN];
        let mut echo_len = FIRST_ECHO_LEN;

        loop {
            let n = self
                .timed("read handshake", stream.read(&mut buf))
                .await?;

            if n == 0 {
                return Err(Error::communication(
                    "read handshake",
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by box during handshake",
                    ),
                ));
            }
            if n >= HANDSHAKE_LEN {
                tracing::trace!("Handshake complete");
                return Ok(());
            }

            let echo = buf.get(..n.min(echo_len)).unwrap_or_default();
            tracing::trace!(read = n, echo = echo.len(), "Handshake echo");
            self.timed("write handshake", stream.write_all(echo)).await?;
            echo_len = 1;
        }
    }

    /// Applies the socket timeout to one I/O step.
    async fn timed<T>(
        &self,
        context: &str,
        fut: impl Future<Output = io::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::communication(context, e)),
            Err(_) => Err(Error::communication(
                context,
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timed out after {:?}", self.timeout),
                ),
            )),
        }
    }
}

/// Presses one button on the box at `host` using the default port.
///
/// # Errors
///
/// See [`SkyRemote::send_command`].
pub async fn press_remote(host: &str, command: RemoteCommand) -> Result<()> {
    SkyRemote::new(host).press(command).await
}
