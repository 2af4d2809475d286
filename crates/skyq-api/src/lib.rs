//! Client library for the Sky Q set-top box local network API.
//!
//! Provides remote-control button presses, online/standby status tracking and
//! EPG channel data loaded from the box and merged with an XMLTV feed. All
//! network I/O runs on a dedicated background thread; [`SkyQ`] exposes it
//! through a synchronous interface.

/// Synchronous client facade.
pub mod client;
/// Port numbers and endpoint paths used by the box.
pub mod constants;
/// Channel, EPG and XMLTV listing data.
pub mod epg;
/// Library error type.
pub mod error;
/// Remote-control button presses.
pub mod remote;
/// Background thread and serial scheduler.
pub mod runtime;
/// Online/standby status listener.
pub mod status;

pub use client::{SkyQ, SkyQBuilder};
pub use epg::{
    Channel, ChannelSources, Epg, LocalSkyQRestApi, Programme, Quality, SkyQRestApi,
    SkyQRestClient, XmltvListing, merge_channels,
};
pub use error::{Error, Result};
pub use remote::{RemoteCommand, SkyRemote, press_remote};
pub use runtime::{AsyncThread, CronScheduler, JobId, Schedule};
pub use status::{Status, StatusBuilder};
