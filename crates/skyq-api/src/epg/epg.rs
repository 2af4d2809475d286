//! `Epg` - channel store loaded from the box and enriched from XMLTV feeds.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::instrument;

use super::api::SkyQRestApi;
use super::channel::Channel;
use super::client::SkyQRestClient;
use super::programme::Programme;
use super::xmltv::{XmltvData, XmltvListing};
use crate::error::{Error, Result};

/// Maximum number of detail requests in flight during a load.
const MAX_CONCURRENT_DETAIL_REQUESTS: usize = 8;

/// Normalises a channel name for matching against XMLTV display names.
fn match_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Electronic programme guide for one box.
///
/// Holds channels keyed by sid and programme schedules keyed by XMLTV
/// channel id. There is no shared state between instances.
#[derive(Debug)]
pub struct Epg<A = SkyQRestClient> {
    api: A,
    channels: BTreeMap<String, Channel>,
    schedule: BTreeMap<String, BTreeSet<Programme>>,
}

impl<A> Epg<A> {
    /// Creates an empty EPG backed by `api`.
    pub const fn new(api: A) -> Self {
        Self {
            api,
            channels: BTreeMap::new(),
            schedule: BTreeMap::new(),
        }
    }

    /// Returns the REST API the EPG loads from.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Looks up a channel by sid. Accepts `2002` as well as `"2002"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no channel has that sid.
    pub fn get_channel(&self, sid: impl Display) -> Result<&Channel> {
        let sid = sid.to_string();
        self.channels.get(&sid).ok_or(Error::NotFound { sid })
    }

    /// Iterates channels in sid order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Number of loaded channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// `true` if no channels are loaded.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns the sorted schedule for a channel.
    ///
    /// Empty if the channel has no XMLTV id or the feed listed no programmes
    /// for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no channel has that sid.
    pub fn programmes(&self, sid: impl Display) -> Result<Vec<&Programme>> {
        let channel = self.get_channel(sid)?;
        Ok(channel
            .xmltv_id()
            .and_then(|id| self.schedule.get(id))
            .map(|set| set.iter().collect())
            .unwrap_or_default())
    }

    /// Merges a fetched listing into the loaded channels.
    ///
    /// Returns the number of channels matched.
    ///
    /// # Errors
    ///
    /// - [`Error::Communication`] if the listing has not been downloaded.
    /// - [`Error::Parse`] if the cached document is malformed.
    #[instrument(skip_all, fields(url = %listing.url()))]
    pub fn apply_listing(&mut self, listing: &XmltvListing) -> Result<usize> {
        let data = listing.parse()?;
        let matched = self.apply_xmltv_data(data);
        tracing::info!(matched, channels = self.channels.len(), "Applied XMLTV listing");
        Ok(matched)
    }

    /// Merges parsed feed data into the loaded channels.
    ///
    /// A channel that already carries an XMLTV id matches the feed channel
    /// with that id; otherwise it matches the feed channel whose display name
    /// equals its name, ignoring case and surrounding whitespace. Matched
    /// channels gain the feed's id, display name and icon. Each feed channel
    /// that lists programmes has its schedule replaced by the feed's; other
    /// schedules are left alone.
    pub fn apply_xmltv_data(&mut self, data: XmltvData) -> usize {
        let mut by_id: HashMap<&str, &Channel> = HashMap::new();
        let mut by_name: HashMap<String, &Channel> = HashMap::new();
        for feed in &data.channels {
            if let Some(id) = feed.xmltv_id() {
                by_id.entry(id).or_insert(feed);
            }
            if let Some(name) = feed.xmltv_display_name() {
                by_name.entry(match_key(name)).or_insert(feed);
            }
        }

        let mut matched: usize = 0;
        for channel in self.channels.values_mut() {
            let feed = match channel.xmltv_id() {
                Some(id) => by_id.get(id),
                None => channel.name().and_then(|n| by_name.get(&match_key(n))),
            };
            if let Some(feed) = feed {
                *channel = channel.with_xmltv(feed);
                matched = matched.saturating_add(1);
            }
        }

        let mut incoming: BTreeMap<String, BTreeSet<Programme>> = BTreeMap::new();
        for programme in data.programmes {
            incoming
                .entry(programme.channel_xmltv_id.clone())
                .or_default()
                .replace(programme);
        }
        tracing::debug!(schedules = incoming.len(), "Replacing programme schedules");
        self.schedule.extend(incoming);

        matched
    }
}

impl<A: SkyQRestApi + Sync> Epg<A> {
    /// Loads every channel from the box.
    ///
    /// Fetches the summary list, then each channel's detail record with at
    /// most eight requests in flight. The new channel map replaces the old
    /// one only if every request succeeds. Returns the number of channels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if any request fails or returns
    /// malformed JSON; the previously loaded channels are kept.
    #[instrument(skip_all)]
    pub async fn load_channel_data(&mut self) -> Result<usize> {
        let summary = self.api.fetch_services().await?;
        tracing::debug!(services = summary.services.len(), "Fetched service summary");

        let mut loaded: BTreeMap<String, Channel> = BTreeMap::new();
        for service in &summary.services {
            match loaded.entry(service.sid.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!(sid = %service.sid, name = %service.t, "Duplicate sid in service summary, keeping first");
                }
                Entry::Vacant(slot) => {
                    slot.insert(Channel::from_service_summary(service));
                }
            }
        }

        let api = &self.api;
        let requests: Vec<_> = loaded
            .keys()
            .cloned()
            .map(|sid| async move {
                api.fetch_service_detail(&sid)
                    .await
                    .map(|detail| (sid, detail))
            })
            .collect();
        let details: Vec<_> = stream::iter(requests)
            .buffer_unordered(MAX_CONCURRENT_DETAIL_REQUESTS)
            .try_collect()
            .await?;

        for (sid, detail) in details {
            if let Some(channel) = loaded.get_mut(&sid) {
                *channel = channel.with_service_detail(&detail);
            }
        }

        let count = loaded.len();
        self.channels = loaded;
        tracing::info!(channels = count, "Channel data loaded");
        Ok(count)
    }
}
