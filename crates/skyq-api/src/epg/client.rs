//! `SkyQRestClient` - HTTP client for the box's `/as/services` endpoints.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::api::SkyQRestApi;
use super::types::{ServiceDetailResponse, ServicesResponse};
use crate::constants::{
    DEFAULT_HOST, REST_PORT, REST_SERVICE_DETAIL_PATH_PREFIX, REST_SERVICES_PATH, REST_TIMEOUT,
};
use crate::error::{Error, Result};

/// User-Agent sent to the box.
const USER_AGENT: &str = concat!("skyq-api/", env!("CARGO_PKG_VERSION"));

/// Box REST client.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct SkyQRestClient {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// `http://<host>:<port>/`.
    base_url: Url,
}

/// Builder for `SkyQRestClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SkyQRestClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    base_url: Option<Url>,
    timeout: Option<Duration>,
}

impl SkyQRestClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            host: None,
            port: None,
            base_url: None,
            timeout: None,
        }
    }

    /// Sets the box host name or address (default: `skyq`).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the REST port (default: 9006).
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Overrides the base URL (for wiremock in tests). Takes precedence over
    /// `host` and `port`.
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the total request timeout (default: 60s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - The host/port do not form a valid URL.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<SkyQRestClient> {
        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
            let port = self.port.unwrap_or(REST_PORT);
            Url::parse(&format!("http://{host}:{port}/"))
                .map_err(|e| Error::InvalidInput(format!("box address {host}:{port}: {e}")))?
        };

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .timeout(self.timeout.unwrap_or(REST_TIMEOUT))
            .build()
            .map_err(|e| Error::communication("failed to build HTTP client", e))?;

        Ok(SkyQRestClient {
            http_client,
            base_url,
        })
    }
}

impl SkyQRestClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> SkyQRestClientBuilder {
        SkyQRestClientBuilder::new()
    }

    /// Returns the base URL requests are made against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GETs `path` and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, command: &str, path: &str) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("{command} path {path:?}: {e}")))?;

        tracing::debug!(%command, %url, "Requesting box endpoint");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::communication(format!("{command} request failed"), e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::communication(format!("failed to read {command} response"), e))?;

        tracing::debug!(%command, %status, body_len = body.len(), "Response body received");
        tracing::trace!(%command, body_preview = &body[..body.floor_char_boundary(500)], "Response body preview");

        serde_json::from_str(&body)
            .map_err(|e| Error::communication(format!("{command} JSON decoding failed"), e))
    }
}

impl SkyQRestApi for SkyQRestClient {
    #[instrument(skip_all)]
    async fn fetch_services(&self) -> Result<ServicesResponse> {
        self.get_json("services", REST_SERVICES_PATH).await
    }

    #[instrument(skip_all, fields(sid = %sid))]
    async fn fetch_service_detail(&self, sid: &str) -> Result<ServiceDetailResponse> {
        let path = format!("{REST_SERVICE_DETAIL_PATH_PREFIX}{sid}");
        self.get_json("service detail", &path).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client_for(server: &MockServer) -> SkyQRestClient {
        SkyQRestClient::builder()
            .base_url(Url::parse(&server.uri()).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults_to_skyq_host() {
        // Arrange & Act
        let client = SkyQRestClient::builder().build().unwrap();

        // Assert
        assert_eq!(client.base_url().as_str(), "http://skyq:9006/");
    }

    #[test]
    fn test_builder_with_host_and_port() {
        // Arrange & Act
        let client = SkyQRestClient::builder()
            .host("192.168.0.9")
            .port(8080)
            .build()
            .unwrap();

        // Assert
        assert_eq!(client.base_url().as_str(), "http://192.168.0.9:8080/");
    }

    #[test]
    fn test_builder_rejects_bad_host() {
        // Arrange & Act
        let result = SkyQRestClient::builder().host("bad host/").build();

        // Assert
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_services() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/as/services"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("../../../../fixtures/skyq/services.json")),
            )
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        // Act
        let resp = client.fetch_services().await.unwrap();

        // Assert
        assert_eq!(resp.services.len(), 2);
        assert_eq!(resp.services[1].t, "UCB Ireland");
    }

    #[tokio::test]
    async fn test_fetch_service_detail() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/as/services/details/2862"))
            .respond_with(ResponseTemplate::new(200).set_body_string(include_str!(
                "../../../../fixtures/skyq/service_detail_2862.json"
            )))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        // Act
        let resp = client.fetch_service_detail("2862").await.unwrap();

        // Assert
        assert_eq!(resp.sid, "2862");
        assert_eq!(
            resp.details.upgrade_message.as_deref(),
            Some("A channel for God's Peace.")
        );
    }

    #[tokio::test]
    async fn test_http_error_is_communication_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/as/services"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        // Act
        let err = client.fetch_services().await.unwrap_err();

        // Assert
        assert!(err.is_communication());
    }

    #[tokio::test]
    async fn test_malformed_json_is_communication_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/as/services"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        // Act
        let err = client.fetch_services().await.unwrap_err();

        // Assert
        assert!(err.is_communication());
        assert!(err.to_string().contains("JSON decoding failed"));
    }
}
