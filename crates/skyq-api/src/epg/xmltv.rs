//! `XmltvListing` - download, cache and parse an XMLTV feed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use reqwest::header::{ACCEPT_ENCODING, CONTENT_RANGE, LAST_MODIFIED, RANGE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use url::Url;

use super::channel::Channel;
use super::programme::{Programme, parse_xmltv_time};
use crate::constants::{DEFAULT_EPG_CACHE_DIR, REST_TIMEOUT, XMLTV_BASE_URL};
use crate::error::{Error, Result};

/// Default size of each range request.
pub const DEFAULT_RANGE_SIZE: u64 = 256 * 1024;

/// User-Agent sent to feed servers.
const USER_AGENT: &str = concat!("skyq-api/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// XML document types
// ---------------------------------------------------------------------------

/// `<tv>` root element.
#[derive(Debug, Deserialize)]
struct TvDocument {
    #[serde(rename = "channel", default)]
    channels: Vec<XmlChannel>,
    #[serde(rename = "programme", default)]
    programmes: Vec<XmlProgramme>,
}

/// `<channel id="...">`.
#[derive(Debug, Deserialize)]
struct XmlChannel {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "display-name", default)]
    display_names: Vec<XmlText>,
    #[serde(rename = "icon", default)]
    icons: Vec<XmlIcon>,
}

/// Text element with an optional `lang` attribute.
#[derive(Debug, Deserialize)]
struct XmlText {
    #[serde(rename = "@lang", default)]
    lang: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

/// `<icon src="..."/>`.
#[derive(Debug, Deserialize)]
struct XmlIcon {
    #[serde(rename = "@src")]
    src: String,
}

/// `<episode-num system="...">`.
#[derive(Debug, Deserialize)]
struct XmlEpisodeNum {
    #[serde(rename = "@system", default)]
    system: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

/// `<programme start=".." stop=".." channel="..">`.
#[derive(Debug, Deserialize)]
struct XmlProgramme {
    #[serde(rename = "@start")]
    start: String,
    #[serde(rename = "@stop")]
    stop: String,
    #[serde(rename = "@channel")]
    channel: String,
    #[serde(rename = "title", default)]
    titles: Vec<XmlText>,
    #[serde(rename = "desc", default)]
    descs: Vec<XmlText>,
    #[serde(rename = "episode-num", default)]
    episode_nums: Vec<XmlEpisodeNum>,
}

/// Channels and programmes parsed from one feed.
#[derive(Debug, Clone, Default)]
pub struct XmltvData {
    /// Feed channels, built with [`Channel::from_xmltv`].
    pub channels: Vec<Channel>,
    /// Feed programmes in document order.
    pub programmes: Vec<Programme>,
}

/// Parses an XMLTV document.
///
/// Relative icon paths are resolved against `icon_base`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the document or a timestamp is malformed.
pub fn parse_xmltv(xml: &str, icon_base: &Url) -> Result<XmltvData> {
    let doc: TvDocument = quick_xml::de::from_str(xml).map_err(|e| {
        let preview: String = xml.chars().take(200).collect();
        Error::parse(
            format!("XMLTV decoding failed (len={})", xml.len()),
            format!("{e}: {preview}"),
        )
    })?;

    let channels = doc
        .channels
        .into_iter()
        .map(|ch| {
            let display_name = ch
                .display_names
                .into_iter()
                .next()
                .map(|t| String::from(t.text.trim()));
            let icon = ch.icons.first().map(|i| i.src.as_str());
            Channel::from_xmltv(ch.id, display_name, icon, icon_base)
        })
        .collect::<Result<Vec<_>>>()
        .map_err(|e| Error::parse("XMLTV channel", e))?;

    let programmes = doc
        .programmes
        .into_iter()
        .map(programme_from_xml)
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        channels = channels.len(),
        programmes = programmes.len(),
        "Parsed XMLTV document"
    );

    Ok(XmltvData {
        channels,
        programmes,
    })
}

fn programme_from_xml(p: XmlProgramme) -> Result<Programme> {
    let start = parse_xmltv_time(&p.start)?;
    let stop = parse_xmltv_time(&p.stop)?;
    let (title, title_lang) = p
        .titles
        .into_iter()
        .next()
        .map_or_else(|| (String::new(), None), |t| (t.text, t.lang));
    let (desc, desc_lang) = p
        .descs
        .into_iter()
        .next()
        .map_or((None, None), |d| (Some(d.text), d.lang));
    let (episode_num, episode_num_system) = p
        .episode_nums
        .into_iter()
        .next()
        .map_or((None, None), |e| (Some(e.text), e.system));

    Ok(Programme {
        title,
        title_lang,
        desc,
        desc_lang,
        start,
        stop,
        channel_xmltv_id: p.channel,
        episode_num,
        episode_num_system,
    })
}

/// Parses an HTTP `Last-Modified` value (RFC 2822 / IMF-fixdate).
///
/// # Errors
///
/// Returns [`Error::Parse`] if the value is not a valid HTTP date.
pub fn parse_http_date(raw: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .map_err(|e| Error::parse(format!("http date {raw:?}"), e))
}

/// Extracts the total length from a `Content-Range: bytes a-b/total` header.
fn parse_content_range_total(raw: &str) -> Result<u64> {
    raw.rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            Error::communication(
                "xmltv download",
                format!("unusable Content-Range header: {raw:?}"),
            )
        })
}

// ---------------------------------------------------------------------------
// XmltvListing
// ---------------------------------------------------------------------------

/// One XMLTV feed, cached on disk as `<sha256(url)>.xml`.
///
/// Listings are identified by URL: equality and hashing ignore download
/// state.
#[derive(Debug)]
pub struct XmltvListing {
    url: Url,
    icon_base: Url,
    file_path: PathBuf,
    range_size: u64,
    http_client: Client,
    last_modified: Option<DateTime<FixedOffset>>,
    downloaded: bool,
    downloading: bool,
}

/// Builder for `XmltvListing`.
#[derive(Debug)]
pub struct XmltvListingBuilder {
    url: Option<String>,
    cache_dir: Option<PathBuf>,
    icon_base: Option<Url>,
    range_size: Option<u64>,
    timeout: Option<Duration>,
}

impl XmltvListingBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            url: None,
            cache_dir: None,
            icon_base: None,
            range_size: None,
            timeout: None,
        }
    }

    /// Sets the feed URL (required).
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the cache directory (default: `.epg_data`).
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the base URL for relative icon paths (default: `http://www.xmltv.co.uk/`).
    #[must_use]
    pub fn icon_base(mut self, url: Url) -> Self {
        self.icon_base = Some(url);
        self
    }

    /// Sets the size of each range request in bytes (default: 256 KiB).
    #[must_use]
    pub const fn range_size(mut self, size: u64) -> Self {
        self.range_size = Some(size);
        self
    }

    /// Sets the per-request timeout (default: 60s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the listing. Nothing is downloaded yet.
    ///
    /// # Errors
    ///
    /// - `url` is missing or not a valid URL.
    /// - `range_size` is zero.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<XmltvListing> {
        let raw = self
            .url
            .ok_or_else(|| Error::InvalidInput(String::from("xmltv url is required")))?;
        let url = Url::parse(&raw)
            .map_err(|e| Error::InvalidInput(format!("xmltv url {raw:?}: {e}")))?;

        let icon_base = match self.icon_base {
            Some(base) => base,
            None => Url::parse(XMLTV_BASE_URL)
                .map_err(|e| Error::InvalidInput(format!("invalid default icon base: {e}")))?,
        };

        let range_size = self.range_size.unwrap_or(DEFAULT_RANGE_SIZE);
        if range_size == 0 {
            return Err(Error::InvalidInput(String::from(
                "range_size must be greater than zero",
            )));
        }

        let cache_dir = self
            .cache_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EPG_CACHE_DIR));
        let file_path = cache_dir.join(cache_file_name(&url));

        // Content-Range offsets count encoded bytes, so ranges stay uncompressed.
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .gzip(false)
            .timeout(self.timeout.unwrap_or(REST_TIMEOUT))
            .build()
            .map_err(|e| Error::communication("failed to build HTTP client", e))?;

        Ok(XmltvListing {
            url,
            icon_base,
            file_path,
            range_size,
            http_client,
            last_modified: None,
            downloaded: false,
            downloading: false,
        })
    }
}

/// `<sha256 hex of url>.xml`.
fn cache_file_name(url: &Url) -> String {
    format!("{:x}.xml", Sha256::digest(url.as_str().as_bytes()))
}

impl XmltvListing {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> XmltvListingBuilder {
        XmltvListingBuilder::new()
    }

    /// Feed URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Location of the cached XML file, whether or not it exists yet.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// `Last-Modified` of the last download, if the server sent one.
    #[must_use]
    pub const fn last_modified(&self) -> Option<DateTime<FixedOffset>> {
        self.last_modified
    }

    /// `true` once a download has completed.
    #[must_use]
    pub const fn downloaded(&self) -> bool {
        self.downloaded
    }

    /// `true` while a download is in flight.
    #[must_use]
    pub const fn downloading(&self) -> bool {
        self.downloading
    }

    /// Downloads the feed into the cache.
    ///
    /// Uses `Range` requests of `range_size` bytes. A `206` response is
    /// followed by further ranges until the `Content-Range` total is reached;
    /// a `200` response is taken as the whole document. The body is written to
    /// a `.tmp` file and renamed into place on success.
    ///
    /// # Errors
    ///
    /// - [`Error::Communication`] on HTTP failures, `416` or any other
    ///   unexpected status.
    /// - [`Error::Io`] if the cache file cannot be written.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn fetch(&mut self) -> Result<()> {
        self.downloading = true;
        let result = self.fetch_inner().await;
        self.downloading = false;
        match result {
            Ok(bytes) => {
                self.downloaded = true;
                tracing::info!(
                    bytes,
                    path = %self.file_path.display(),
                    "XMLTV listing downloaded"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "XMLTV download failed");
                Err(e)
            }
        }
    }

    async fn fetch_inner(&mut self) -> Result<u64> {
        let tmp_path = self.file_path.with_extension("tmp");
        if let Some(dir) = self.file_path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::io(format!("create cache dir {}", dir.display()), e))?;
        }

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| Error::io(format!("create {}", tmp_path.display()), e))?;

        let written = match self.download_to(&mut file).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&tmp_path).await {
                    tracing::debug!(error = %rm, "Failed to remove partial download");
                }
                return Err(e);
            }
        };

        file.flush()
            .await
            .map_err(|e| Error::io(format!("flush {}", tmp_path.display()), e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.file_path)
            .await
            .map_err(|e| Error::io(format!("rename into {}", self.file_path.display()), e))?;

        Ok(written)
    }

    /// Runs the range-request loop, returning the number of bytes written.
    async fn download_to(&mut self, file: &mut tokio::fs::File) -> Result<u64> {
        let mut start: u64 = 0;

        loop {
            let end = start.saturating_add(self.range_size).saturating_sub(1);
            tracing::debug!(start, end, "Requesting byte range");

            let response = self
                .http_client
                .get(self.url.clone())
                .header(RANGE, format!("bytes={start}-{end}"))
                .header(ACCEPT_ENCODING, "identity")
                .send()
                .await
                .map_err(|e| Error::communication("xmltv request failed", e))?;

            let status = response.status();
            let headers = response.headers().clone();
            tracing::debug!(%status, "Feed server responded");

            if let Some(raw) = headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok()) {
                match parse_http_date(raw) {
                    Ok(lm) => self.last_modified = Some(lm),
                    Err(e) => tracing::warn!(error = %e, "Ignoring unparsable Last-Modified"),
                }
            }

            match status {
                StatusCode::PARTIAL_CONTENT => {
                    let total = headers
                        .get(CONTENT_RANGE)
                        .and_then(|v| v.to_str().ok())
                        .ok_or_else(|| {
                            Error::communication("xmltv download", "206 without Content-Range")
                        })
                        .and_then(parse_content_range_total)?;

                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| Error::communication("failed to read xmltv chunk", e))?;
                    if body.is_empty() {
                        return Err(Error::communication(
                            "xmltv download",
                            "server returned an empty range",
                        ));
                    }
                    file.write_all(&body)
                        .await
                        .map_err(|e| Error::io("write xmltv chunk", e))?;

                    start = start.saturating_add(u64::try_from(body.len()).unwrap_or(u64::MAX));
                    if start >= total {
                        return Ok(start);
                    }
                }
                StatusCode::OK => {
                    tracing::info!("Server ignored the range request; taking full body");
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| Error::communication("failed to read xmltv body", e))?;
                    file.write_all(&body)
                        .await
                        .map_err(|e| Error::io("write xmltv body", e))?;
                    return Ok(u64::try_from(body.len()).unwrap_or(u64::MAX));
                }
                other => {
                    return Err(Error::communication(
                        "xmltv download",
                        format!("unexpected HTTP status {other}"),
                    ));
                }
            }
        }
    }

    /// Reads and parses the cached file.
    ///
    /// # Errors
    ///
    /// - [`Error::Communication`] if the listing has not been downloaded or a
    ///   download is in flight.
    /// - [`Error::Io`] if the cache file cannot be read.
    /// - [`Error::Parse`] if the document is malformed.
    pub fn parse(&self) -> Result<XmltvData> {
        self.ensure_downloaded()?;
        let xml = std::fs::read_to_string(&self.file_path)
            .map_err(|e| Error::io(format!("read {}", self.file_path.display()), e))?;
        parse_xmltv(&xml, &self.icon_base)
    }

    /// Like [`parse`](Self::parse), but reads the cache file without blocking
    /// the runtime.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse).
    pub async fn parse_async(&self) -> Result<XmltvData> {
        self.ensure_downloaded()?;
        let xml = tokio::fs::read_to_string(&self.file_path)
            .await
            .map_err(|e| Error::io(format!("read {}", self.file_path.display()), e))?;
        parse_xmltv(&xml, &self.icon_base)
    }

    fn ensure_downloaded(&self) -> Result<()> {
        if !self.downloaded || self.downloading {
            return Err(Error::communication(
                "listing not downloaded",
                format!("{} has not been fetched", self.url),
            ));
        }
        Ok(())
    }
}

impl PartialEq for XmltvListing {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for XmltvListing {}

impl Hash for XmltvListing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl fmt::Display for XmltvListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<XmltvListing: url='{}', file='{}'>",
            self.url,
            self.file_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use chrono::{Datelike, Timelike};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const LISTING: &str = include_str!("../../../../fixtures/xmltv/listing.xml");

    fn listing_for(server: &MockServer, dir: &Path, range_size: u64) -> XmltvListing {
        XmltvListing::builder()
            .url(format!("{}/listing.xml", server.uri()))
            .cache_dir(dir)
            .range_size(range_size)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_fixture() {
        // Arrange
        let base = Url::parse(XMLTV_BASE_URL).unwrap();

        // Act
        let data = parse_xmltv(LISTING, &base).unwrap();

        // Assert
        assert_eq!(data.channels.len(), 3);
        assert_eq!(data.programmes.len(), 3);
        let bbc = &data.channels[0];
        assert_eq!(bbc.xmltv_id(), Some("f3932e75f691561adbe3b609369e487b"));
        assert_eq!(bbc.xmltv_display_name(), Some("BBC One Lon"));
        assert_eq!(
            bbc.xmltv_icon_url().unwrap().as_str(),
            "http://www.xmltv.co.uk/images/channels/f3932e75f691561adbe3b609369e487b.png"
        );
        assert!(data.channels[2].xmltv_icon_url().is_none());

        let rip_off = &data.programmes[1];
        assert_eq!(rip_off.title, "Rip Off Britain: Live");
        assert_eq!(rip_off.title_lang.as_deref(), Some("en"));
        assert_eq!(rip_off.episode_num.as_deref(), Some("3.4."));
        assert_eq!(rip_off.episode_num_system.as_deref(), Some("xmltv_ns"));
        assert_eq!(rip_off.start.hour(), 9);
        assert_eq!(rip_off.stop.minute(), 0);
    }

    #[test]
    fn test_parse_malformed_is_parse_error() {
        // Arrange
        let base = Url::parse(XMLTV_BASE_URL).unwrap();

        // Act
        let err = parse_xmltv("<tv><channel id=\"x\"></tv>", &base).unwrap_err();

        // Assert
        assert!(err.is_parse());
    }

    #[test]
    fn test_parse_bad_timestamp_is_parse_error() {
        // Arrange
        let base = Url::parse(XMLTV_BASE_URL).unwrap();
        let xml = r#"<tv><programme start="soon" stop="later" channel="x"><title>T</title></programme></tv>"#;

        // Act
        let err = parse_xmltv(xml, &base).unwrap_err();

        // Assert
        assert!(err.is_parse());
    }

    #[test]
    fn test_parse_http_date() {
        // Arrange & Act
        let lm = parse_http_date("Mon, 08 Oct 2018 06:00:00 GMT").unwrap();

        // Assert
        assert_eq!(lm.year(), 2018);
        assert_eq!(lm.month(), 10);
        assert_eq!(lm.hour(), 6);
    }

    #[test]
    fn test_content_range_total() {
        // Arrange & Act & Assert
        assert_eq!(
            parse_content_range_total("bytes 0-1023/16380313").unwrap(),
            16_380_313
        );
        assert!(parse_content_range_total("bytes 0-1023/*").is_err());
    }

    #[test]
    fn test_builder_requires_url() {
        // Arrange & Act
        let result = XmltvListing::builder().build();

        // Assert
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        // Arrange & Act
        let result = XmltvListing::builder().url("not a url").build();

        // Assert
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_cache_file_is_named_by_url_hash() {
        // Arrange
        let a = XmltvListing::builder()
            .url("http://example.com/a.xml")
            .cache_dir("cache")
            .build()
            .unwrap();
        let a_again = XmltvListing::builder()
            .url("http://example.com/a.xml")
            .cache_dir("elsewhere")
            .build()
            .unwrap();
        let b = XmltvListing::builder()
            .url("http://example.com/b.xml")
            .cache_dir("cache")
            .build()
            .unwrap();

        // Act
        let name = a.file_path().file_name().unwrap().to_str().unwrap();

        // Assert
        assert_eq!(name.len(), 64 + ".xml".len());
        assert!(name.ends_with(".xml"));
        assert!(a.file_path().starts_with("cache"));
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_ne!(a.file_path().file_name(), b.file_path().file_name());
    }

    #[tokio::test]
    async fn test_parse_before_fetch_is_communication_error() {
        // Arrange
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let listing = listing_for(&server, dir.path(), DEFAULT_RANGE_SIZE);

        // Act
        let err = listing.parse().unwrap_err();

        // Assert
        assert!(err.is_communication());
        assert!(!listing.downloaded());
    }

    #[tokio::test]
    async fn test_fetch_reassembles_partial_content() {
        // Arrange
        let server = MockServer::start().await;
        let body = LISTING.as_bytes();
        let total = body.len();
        let range_size = 512_usize;
        for start in (0..total).step_by(range_size) {
            let requested_end = start + range_size - 1;
            let end = requested_end.min(total - 1);
            Mock::given(method("GET"))
                .and(path("/listing.xml"))
                .and(header("Range", format!("bytes={start}-{requested_end}").as_str()))
                .respond_with(
                    ResponseTemplate::new(206)
                        .insert_header("Content-Range", format!("bytes {start}-{end}/{total}").as_str())
                        .set_body_bytes(body[start..=end].to_vec()),
                )
                .expect(1)
                .mount(&server)
                .await;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut listing = listing_for(&server, dir.path(), 512);

        // Act
        listing.fetch().await.unwrap();

        // Assert
        assert!(listing.downloaded());
        assert!(!listing.downloading());
        let cached = std::fs::read_to_string(listing.file_path()).unwrap();
        assert_eq!(cached, LISTING);
        assert!(!listing.file_path().with_extension("tmp").exists());
        assert_eq!(listing.parse().unwrap().channels.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_requests_identity_encoding() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing.xml"))
            .and(header("Accept-Encoding", "identity"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let mut listing = listing_for(&server, dir.path(), DEFAULT_RANGE_SIZE);

        // Act
        listing.fetch().await.unwrap();

        // Assert
        assert_eq!(std::fs::read_to_string(listing.file_path()).unwrap(), LISTING);
    }

    #[tokio::test]
    async fn test_fetch_accepts_full_body() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Mon, 08 Oct 2018 06:00:00 GMT")
                    .set_body_string(LISTING),
            )
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let mut listing = listing_for(&server, dir.path(), 64);

        // Act
        listing.fetch().await.unwrap();

        // Assert
        assert!(listing.downloaded());
        let lm = listing.last_modified().unwrap();
        assert_eq!(lm.to_rfc3339(), "2018-10-08T06:00:00+00:00");
        assert_eq!(listing.parse().unwrap().programmes.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_range_not_satisfiable_fails() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing.xml"))
            .respond_with(ResponseTemplate::new(416))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let mut listing = listing_for(&server, dir.path(), DEFAULT_RANGE_SIZE);

        // Act
        let err = listing.fetch().await.unwrap_err();

        // Assert
        assert!(err.is_communication());
        assert!(!listing.downloaded());
        assert!(!listing.downloading());
        assert!(!listing.file_path().exists());
        assert!(!listing.file_path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_parse_malformed_download_is_parse_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<tv><channel></tv>"))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let mut listing = listing_for(&server, dir.path(), DEFAULT_RANGE_SIZE);
        listing.fetch().await.unwrap();

        // Act
        let err = listing.parse().unwrap_err();

        // Assert
        assert!(err.is_parse());
    }
}
