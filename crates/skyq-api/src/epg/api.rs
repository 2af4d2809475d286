//! `SkyQRestApi` trait definition.
#![allow(clippy::future_not_send)]

use super::types::{ServiceDetailResponse, ServicesResponse};
use crate::error::Result;

/// Box REST API trait.
///
/// Abstracts the `/as/services` endpoints so the EPG can be driven by a mock
/// in tests. Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(SkyQRestApi: Send)]
pub trait LocalSkyQRestApi {
    /// Fetches the channel summary list from `/as/services`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`](crate::Error::Communication) if the
    /// HTTP request fails or the body is not valid JSON.
    async fn fetch_services(&self) -> Result<ServicesResponse>;

    /// Fetches one channel's detail record from `/as/services/details/<sid>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`](crate::Error::Communication) if the
    /// HTTP request fails or the body is not valid JSON.
    async fn fetch_service_detail(&self, sid: &str) -> Result<ServiceDetailResponse>;
}
