//! `Status` - background websocket listener publishing the standby flag.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::instrument;
use url::Url;

use super::payload::standby_from_payload;
use crate::constants::{REST_PORT, REST_STATUS_PATH};
use crate::error::{Error, Result};

/// Default wait for a message before pinging.
const DEFAULT_WS_TIMEOUT: Duration = Duration::from_secs(20);

/// Default wait for any traffic after a ping.
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause before reconnecting.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings copied into the listener task.
#[derive(Debug, Clone)]
struct ListenerConfig {
    url: Url,
    ws_timeout: Duration,
    ping_timeout: Duration,
    reconnect_delay: Duration,
}

/// A running listener task.
#[derive(Debug)]
struct Listener {
    shutdown: watch::Sender<bool>,
    /// Cleared by `stop()`; the task only publishes while it is set.
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

/// Tracks whether the box is in standby.
///
/// The flag starts as `false` and is updated by a listener task once
/// [`start`](Self::start) is called. After [`stop`](Self::stop) the flag no
/// longer changes.
#[derive(Debug)]
pub struct Status {
    config: ListenerConfig,
    standby: Arc<watch::Sender<bool>>,
    listener: Mutex<Option<Listener>>,
}

/// Builder for `Status`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct StatusBuilder {
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    ws_timeout: Option<Duration>,
    ping_timeout: Option<Duration>,
    reconnect_delay: Option<Duration>,
}

impl StatusBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            host: None,
            port: None,
            path: None,
            ws_timeout: None,
            ping_timeout: None,
            reconnect_delay: None,
        }
    }

    /// Sets the box host name or address (required).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the websocket port (default: 9006).
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the websocket path (default: `/as/system/status`).
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets how long to wait for a message before pinging (default: 20s).
    #[must_use]
    pub const fn ws_timeout(mut self, timeout: Duration) -> Self {
        self.ws_timeout = Some(timeout);
        self
    }

    /// Sets how long to wait for traffic after a ping (default: 10s).
    #[must_use]
    pub const fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = Some(timeout);
        self
    }

    /// Sets the pause between reconnect attempts (default: 1s).
    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Builds the status tracker. No connection is made until `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `host` is missing or the resulting
    /// websocket URL is invalid.
    pub fn build(self) -> Result<Status> {
        let host = self
            .host
            .ok_or_else(|| Error::InvalidInput(String::from("status host is required")))?;
        let port = self.port.unwrap_or(REST_PORT);
        let path = self.path.as_deref().unwrap_or(REST_STATUS_PATH);
        let url = Url::parse(&format!("ws://{host}:{port}{path}"))
            .map_err(|e| Error::InvalidInput(format!("status url for {host}:{port}: {e}")))?;

        let (standby, _) = watch::channel(false);

        Ok(Status {
            config: ListenerConfig {
                url,
                ws_timeout: self.ws_timeout.unwrap_or(DEFAULT_WS_TIMEOUT),
                ping_timeout: self.ping_timeout.unwrap_or(DEFAULT_PING_TIMEOUT),
                reconnect_delay: self.reconnect_delay.unwrap_or(DEFAULT_RECONNECT_DELAY),
            },
            standby: Arc::new(standby),
            listener: Mutex::new(None),
        })
    }
}

impl Status {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> StatusBuilder {
        StatusBuilder::new()
    }

    /// Websocket URL the listener connects to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.config.url
    }

    /// Current standby flag.
    #[must_use]
    pub fn is_standby(&self) -> bool {
        *self.standby.borrow()
    }

    /// Returns a receiver that observes every change of the standby flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.standby.subscribe()
    }

    /// `true` while a listener task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_listener().is_some()
    }

    /// Spawns the listener task on `handle`. Does nothing if already running.
    pub fn start(&self, handle: &Handle) {
        let mut slot = self.lock_listener();
        if slot.is_some() {
            tracing::debug!(url = %self.config.url, "Status listener already running");
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let gate = Arc::new(Mutex::new(true));
        let task = handle.spawn(run_listener(
            self.config.clone(),
            Arc::clone(&self.standby),
            Arc::clone(&gate),
            shutdown_rx,
        ));

        tracing::info!(url = %self.config.url, "Status listener started");
        *slot = Some(Listener {
            shutdown,
            gate,
            task,
        });
    }

    /// Stops the listener task. Does nothing if not running.
    ///
    /// Once this returns the standby flag no longer changes.
    pub fn stop(&self) {
        let Some(listener) = self.lock_listener().take() else {
            return;
        };
        *listener.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        if listener.shutdown.send(true).is_err() {
            tracing::trace!("Status listener task already exited");
        }
        listener.task.abort();
        tracing::info!(url = %self.config.url, "Status listener stopped");
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<Listener>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Status {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Publishes `standby` unless the listener has been stopped.
fn publish(standby: &watch::Sender<bool>, gate: &Mutex<bool>, value: bool) {
    let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
    if !*open {
        return;
    }
    let changed = standby.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
    if changed {
        tracing::info!(standby = value, "Box status changed");
    }
}

/// Handles one text payload, ignoring malformed ones.
fn handle_payload(text: &str, standby: &watch::Sender<bool>, gate: &Mutex<bool>) {
    match standby_from_payload(text) {
        Ok(value) => publish(standby, gate, value),
        Err(e) => tracing::warn!(error = %e, "Ignoring malformed status payload"),
    }
}

/// Connect/read/reconnect loop; runs until `shutdown` fires.
#[instrument(skip_all, fields(url = %config.url))]
async fn run_listener(
    config: ListenerConfig,
    standby: Arc<watch::Sender<bool>>,
    gate: Arc<Mutex<bool>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = connect_async(config.url.as_str()) => match result {
                Ok((ws, _)) => {
                    tracing::debug!("Status websocket connected");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        () = pump(ws, &config, &standby, &gate) => {}
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Could not connect to status websocket, retrying");
                }
            },
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            () = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
    tracing::debug!("Status listener exiting");
}

/// Reads messages until the connection fails or goes silent.
async fn pump(
    mut ws: WsStream,
    config: &ListenerConfig,
    standby: &watch::Sender<bool>,
    gate: &Mutex<bool>,
) {
    loop {
        let next = match tokio::time::timeout(config.ws_timeout, ws.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::debug!("No status traffic, sending ping");
                if let Err(e) = ws.send(Message::Ping(Default::default())).await {
                    tracing::debug!(error = %e, "Ping failed, reconnecting");
                    return;
                }
                if let Ok(next) = tokio::time::timeout(config.ping_timeout, ws.next()).await {
                    next
                } else {
                    tracing::warn!("Status websocket unresponsive, reconnecting");
                    return;
                }
            }
        };

        match next {
            Some(Ok(Message::Text(text))) => handle_payload(text.as_str(), standby, gate),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_payload(text, standby, gate),
                Err(e) => tracing::warn!(error = %e, "Ignoring non-UTF-8 status payload"),
            },
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(?frame, "Status websocket closed by box");
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Status websocket error, reconnecting");
                return;
            }
            None => {
                tracing::debug!("Status websocket stream ended");
                return;
            }
        }
    }
}
