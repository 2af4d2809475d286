//! EPG module.
//!
//! Loads channel data from the box's `/as/services` REST endpoints and merges
//! in channel metadata and programme schedules from XMLTV feeds.

mod api;
mod channel;
mod client;
#[allow(clippy::module_inception)]
mod epg;
mod programme;
pub mod types;
mod xmltv;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalSkyQRestApi, SkyQRestApi};
pub use channel::{Channel, ChannelSources, Quality, merge_channels};
pub use client::{SkyQRestClient, SkyQRestClientBuilder};
pub use epg::Epg;
pub use programme::{Programme, parse_xmltv_time};
pub use xmltv::{
    DEFAULT_RANGE_SIZE, XmltvData, XmltvListing, XmltvListingBuilder, parse_http_date, parse_xmltv,
};
