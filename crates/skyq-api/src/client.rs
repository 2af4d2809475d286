//! `SkyQ` - synchronous facade over the remote, status and EPG components.
//!
//! Every call is driven on the client's own [`AsyncThread`], so callers need
//! no async runtime. Calling a blocking method from inside an async runtime
//! returns [`Error::Runtime`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use url::Url;

use crate::constants::{
    DEFAULT_EPG_CACHE_DIR, REMOTE_PORT, REMOTE_TIMEOUT, REST_PORT, REST_TIMEOUT,
};
use crate::epg::{Channel, Epg, Programme, SkyQRestClient, XmltvListing};
use crate::error::{Error, Result};
use crate::remote::{RemoteCommand, SkyRemote};
use crate::runtime::{AsyncThread, CronScheduler, JobId, Schedule};
use crate::status::Status;

/// Builder for [`SkyQ`].
#[derive(Debug, Default)]
pub struct SkyQBuilder {
    host: Option<String>,
    remote_port: Option<u16>,
    rest_port: Option<u16>,
    rest_base_url: Option<Url>,
    cache_dir: Option<PathBuf>,
    icon_base: Option<Url>,
    remote_timeout: Option<Duration>,
    rest_timeout: Option<Duration>,
}

impl SkyQBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            host: None,
            remote_port: None,
            rest_port: None,
            rest_base_url: None,
            cache_dir: None,
            icon_base: None,
            remote_timeout: None,
            rest_timeout: None,
        }
    }

    /// Sets the box host name or address (required).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the remote-control port. Defaults to [`REMOTE_PORT`].
    #[must_use]
    pub const fn remote_port(mut self, port: u16) -> Self {
        self.remote_port = Some(port);
        self
    }

    /// Sets the REST and status websocket port. Defaults to [`REST_PORT`].
    #[must_use]
    pub const fn rest_port(mut self, port: u16) -> Self {
        self.rest_port = Some(port);
        self
    }

    /// Overrides the REST base URL derived from host and port.
    #[must_use]
    pub fn rest_base_url(mut self, url: Url) -> Self {
        self.rest_base_url = Some(url);
        self
    }

    /// Sets the directory XMLTV listings are cached in.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the base URL relative channel icons are resolved against.
    #[must_use]
    pub fn icon_base(mut self, url: Url) -> Self {
        self.icon_base = Some(url);
        self
    }

    /// Sets the per-step remote-control timeout.
    #[must_use]
    pub const fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }

    /// Sets the total timeout for box REST requests.
    #[must_use]
    pub const fn rest_timeout(mut self, timeout: Duration) -> Self {
        self.rest_timeout = Some(timeout);
        self
    }

    /// Builds the client and starts its background thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no host was given or the host does
    /// not form a valid URL, and [`Error::Runtime`] if the background thread
    /// cannot be started.
    pub fn build(self) -> Result<SkyQ> {
        let host = self
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput(String::from("SkyQ requires a host")))?;
        let rest_port = self.rest_port.unwrap_or(REST_PORT);

        let remote = SkyRemote::new(host.clone())
            .with_port(self.remote_port.unwrap_or(REMOTE_PORT))
            .with_timeout(self.remote_timeout.unwrap_or(REMOTE_TIMEOUT));

        let mut rest = SkyQRestClient::builder()
            .host(host.clone())
            .port(rest_port)
            .timeout(self.rest_timeout.unwrap_or(REST_TIMEOUT));
        if let Some(url) = self.rest_base_url {
            rest = rest.base_url(url);
        }
        let rest = rest.build()?;

        let status = Status::builder().host(host.clone()).port(rest_port).build()?;
        let runtime = AsyncThread::new()?;

        tracing::debug!(%host, "SkyQ client ready");
        Ok(SkyQ {
            host,
            cache_dir: self
                .cache_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EPG_CACHE_DIR)),
            icon_base: self.icon_base,
            remote,
            status,
            epg: Arc::new(AsyncMutex::new(Epg::new(rest))),
            scheduler: Mutex::new(None),
            runtime,
        })
    }
}

/// Synchronous client for one Sky Q box.
///
/// Owns a background [`AsyncThread`] that every operation runs on, plus the
/// remote, status listener, EPG and (once a refresh is scheduled) a
/// [`CronScheduler`].
///
/// # Example
///
/// ```no_run
/// use skyq_api::{RemoteCommand, SkyQ};
///
/// let skyq = SkyQ::builder().host("192.168.1.20").build()?;
/// skyq.press(RemoteCommand::Play)?;
/// skyq.load_channel_data()?;
/// let bbc = skyq.get_channel("2002")?;
/// # Ok::<(), skyq_api::Error>(())
/// ```
#[derive(Debug)]
pub struct SkyQ {
    host: String,
    cache_dir: PathBuf,
    icon_base: Option<Url>,
    remote: SkyRemote,
    status: Status,
    epg: Arc<AsyncMutex<Epg>>,
    scheduler: Mutex<Option<CronScheduler>>,
    runtime: AsyncThread,
}

impl SkyQ {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> SkyQBuilder {
        SkyQBuilder::new()
    }

    /// Host this client talks to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Sends a raw remote-control code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if the box cannot be reached or the
    /// handshake fails, and [`Error::Runtime`] if the client is shut down.
    pub fn send_command(&self, code: u8) -> Result<()> {
        let remote = self.remote.clone();
        self.runtime
            .block_on(async move { remote.send_command(code).await })?
    }

    /// Presses a remote-control button.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn press(&self, command: RemoteCommand) -> Result<()> {
        self.send_command(command.code())
    }

    /// Starts the status websocket listener. Starting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the client is shut down.
    pub fn start_status_listener(&self) -> Result<()> {
        if !self.runtime.is_running() {
            return Err(Error::Runtime(String::from("SkyQ client is shut down")));
        }
        self.status.start(self.runtime.handle());
        Ok(())
    }

    /// `true` if the box last reported standby.
    #[must_use]
    pub fn is_standby(&self) -> bool {
        self.status.is_standby()
    }

    /// Receiver notified on every standby change.
    #[must_use]
    pub fn subscribe_status(&self) -> tokio::sync::watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Stops the status listener. The standby flag is frozen afterwards.
    pub fn stop_status_listener(&self) {
        self.status.stop();
    }

    /// Loads (or reloads) the channel list from the box.
    ///
    /// Returns the number of channels loaded. On failure the previous channel
    /// data is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if the box cannot be reached or
    /// answers with malformed data.
    pub fn load_channel_data(&self) -> Result<usize> {
        let epg = Arc::clone(&self.epg);
        self.runtime
            .block_on(async move { epg.lock().await.load_channel_data().await })?
    }

    /// Returns a copy of the channel with service id `sid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such channel is loaded.
    pub fn get_channel(&self, sid: impl std::fmt::Display) -> Result<Channel> {
        let sid = sid.to_string();
        let epg = Arc::clone(&self.epg);
        self.runtime
            .block_on(async move { epg.lock().await.get_channel(sid).cloned() })?
    }

    /// Returns copies of all loaded channels, ordered by sid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the client is shut down.
    pub fn channels(&self) -> Result<Vec<Channel>> {
        let epg = Arc::clone(&self.epg);
        self.runtime
            .block_on(async move { epg.lock().await.channels().cloned().collect() })
    }

    /// Returns copies of the programmes scheduled on channel `sid`, in start
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such channel is loaded.
    pub fn programmes(&self, sid: impl std::fmt::Display) -> Result<Vec<Programme>> {
        let sid = sid.to_string();
        let epg = Arc::clone(&self.epg);
        self.runtime.block_on(async move {
            epg.lock()
                .await
                .programmes(sid)
                .map(|list| list.into_iter().cloned().collect())
        })?
    }

    /// Downloads the XMLTV feed at `url` into the cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a bad URL, [`Error::Communication`]
    /// if the download fails and [`Error::Io`] if the cache cannot be written.
    pub fn fetch_listing(&self, url: &str) -> Result<XmltvListing> {
        let mut listing = self.listing(url)?;
        self.runtime.block_on(async move {
            listing.fetch().await?;
            Ok::<_, Error>(listing)
        })?
    }

    /// Merges a downloaded listing into the loaded channels.
    ///
    /// Returns the number of channels that matched the feed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if the listing was not downloaded,
    /// [`Error::Io`] if the cache file cannot be read and [`Error::Parse`]
    /// if it is not valid XMLTV.
    pub fn apply_listing(&self, listing: &XmltvListing) -> Result<usize> {
        let data = listing.parse()?;
        let epg = Arc::clone(&self.epg);
        self.runtime
            .block_on(async move { epg.lock().await.apply_xmltv_data(data) })
    }

    /// Re-downloads and re-applies the feed at `url` on `schedule`.
    ///
    /// Refreshes run on the background thread, one at a time; a failed
    /// refresh is logged and leaves the channels untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a bad URL and [`Error::Runtime`]
    /// if the client is shut down.
    pub fn schedule_listing_refresh(&self, url: &str, schedule: Schedule) -> Result<JobId> {
        let listing = Arc::new(AsyncMutex::new(self.listing(url)?));
        let epg = Arc::clone(&self.epg);

        let mut scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.runtime.is_running() {
            return Err(Error::Runtime(String::from("SkyQ client is shut down")));
        }
        let scheduler = scheduler.get_or_insert_with(|| CronScheduler::start(self.runtime.handle()));

        scheduler.add(schedule, move || {
            let listing = Arc::clone(&listing);
            let epg = Arc::clone(&epg);
            async move { refresh_listing(&listing, &epg).await }
        })
    }

    /// Cancels a refresh registered with
    /// [`schedule_listing_refresh`](Self::schedule_listing_refresh).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the scheduler has been stopped.
    pub fn cancel_listing_refresh(&self, id: JobId) -> Result<()> {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        scheduler.as_ref().map_or(Ok(()), |s| s.remove(id))
    }

    /// Stops the listener and scheduler, then the background thread.
    /// Safe to call more than once; later calls to blocking methods fail with
    /// [`Error::Runtime`].
    pub fn shutdown(&self) {
        self.status.stop();
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.stop();
        }
        if self.runtime.is_running() {
            tracing::debug!(host = %self.host, "Shutting down SkyQ client");
        }
        self.runtime.shutdown();
    }

    fn listing(&self, url: &str) -> Result<XmltvListing> {
        let mut builder = XmltvListing::builder()
            .url(url)
            .cache_dir(self.cache_dir.clone());
        if let Some(base) = &self.icon_base {
            builder = builder.icon_base(base.clone());
        }
        builder.build()
    }
}

impl Drop for SkyQ {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn refresh_listing(listing: &AsyncMutex<XmltvListing>, epg: &AsyncMutex<Epg>) {
    let mut listing = listing.lock().await;
    if let Err(e) = listing.fetch().await {
        tracing::warn!(url = %listing.url(), error = %e, "Listing refresh failed");
        return;
    }
    match listing.parse_async().await {
        Ok(data) => {
            let matched = epg.lock().await.apply_xmltv_data(data);
            tracing::info!(url = %listing.url(), matched, "Listing refreshed");
        }
        Err(e) => tracing::warn!(url = %listing.url(), error = %e, "Listing refresh failed"),
    }
}
