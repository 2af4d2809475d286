//! `Channel` - immutable channel record merged from box and XMLTV data.

use std::fmt;
use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use url::Url;

use super::types::{ServiceDetailResponse, ServiceSummary, StreamingProfile};
use crate::error::{Error, Result};

/// Type tag written into channel JSON.
const CHANNEL_JSON_TYPE: &str = "__channel__";

bitflags! {
    /// Which data sources have been applied to a [`Channel`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelSources: u8 {
        /// Loaded from `/as/services`.
        const SKYQ_SUMMARY = 1;
        /// Loaded from `/as/services/details/<sid>`.
        const SKYQ_DETAIL = 1 << 1;
        /// Merged from an XMLTV feed.
        const XMLTV = 1 << 2;
    }
}

/// Picture format reported by the box (`sf`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Quality {
    /// High definition.
    Hd,
    /// Standard definition.
    Sd,
    /// Audio-only (radio).
    Au,
    /// Any other value the box reports.
    Other(String),
}

impl From<String> for Quality {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "hd" => Self::Hd,
            "sd" => Self::Sd,
            "au" => Self::Au,
            _ => Self::Other(s),
        }
    }
}

impl From<Quality> for String {
    fn from(q: Quality) -> Self {
        match q {
            Quality::Hd => Self::from("hd"),
            Quality::Sd => Self::from("sd"),
            Quality::Au => Self::from("au"),
            Quality::Other(s) => s,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hd => f.write_str("HD"),
            Self::Sd => f.write_str("SD"),
            Self::Au => f.write_str("Audio"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// A TV or radio channel.
///
/// Channels are immutable: every `with_*` method and [`merge_channels`]
/// returns a new value. Equality compares every field; hashing uses only the
/// `sid`, so two equal channels always hash alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    quality: Option<Quality>,
    #[serde(default)]
    service_type: Option<String>,
    #[serde(default)]
    dvb_triplet: Option<String>,
    #[serde(default)]
    sk: Option<u32>,
    #[serde(default)]
    sg: Option<u32>,
    #[serde(default)]
    xsg: Option<u32>,
    #[serde(default)]
    schedule: Option<bool>,
    #[serde(default)]
    timeshifted: Option<bool>,
    #[serde(default)]
    adult: Option<bool>,
    #[serde(default)]
    is_broadcasting: Option<bool>,
    #[serde(default)]
    streaming_profiles: Vec<StreamingProfile>,
    #[serde(default)]
    xmltv_id: Option<String>,
    #[serde(default)]
    xmltv_display_name: Option<String>,
    #[serde(default)]
    xmltv_icon_url: Option<Url>,
    #[serde(skip)]
    sources: ChannelSources,
}

/// JSON envelope used by [`Channel::to_json`].
#[derive(Serialize)]
struct ChannelEnvelopeRef<'a> {
    #[serde(rename = "__type__")]
    kind: &'static str,
    attributes: &'a Channel,
    sources: Vec<&'static str>,
}

/// JSON envelope accepted by [`Channel::from_json`].
#[derive(Deserialize)]
struct ChannelEnvelope {
    #[serde(rename = "__type__", default)]
    kind: Option<String>,
    #[serde(default)]
    attributes: Option<serde_json::Value>,
    #[serde(default)]
    sources: Vec<String>,
}

impl Channel {
    /// Creates a channel from a `/as/services` summary entry.
    #[must_use]
    pub fn from_service_summary(summary: &ServiceSummary) -> Self {
        Self {
            sid: Some(summary.sid.clone()),
            number: Some(summary.c.clone()),
            name: Some(summary.t.clone()),
            quality: summary.sf.clone().map(Quality::from),
            service_type: summary.servicetype.clone(),
            dvb_triplet: summary.dvbtriplet.clone(),
            sk: summary.sk,
            sg: summary.sg,
            xsg: summary.xsg,
            schedule: summary.schedule,
            timeshifted: summary.timeshifted,
            adult: summary.adult,
            sources: ChannelSources::SKYQ_SUMMARY,
            ..Self::default()
        }
    }

    /// Creates a channel carrying only XMLTV metadata.
    ///
    /// `icon_src` may be relative; it is resolved against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `icon_src` cannot be joined to `base_url`.
    pub fn from_xmltv(
        xmltv_id: impl Into<String>,
        display_name: Option<String>,
        icon_src: Option<&str>,
        base_url: &Url,
    ) -> Result<Self> {
        let xmltv_icon_url = icon_src
            .map(|src| {
                base_url
                    .join(src)
                    .map_err(|e| Error::InvalidInput(format!("icon url {src:?}: {e}")))
            })
            .transpose()?;

        Ok(Self {
            xmltv_id: Some(xmltv_id.into()),
            xmltv_display_name: display_name,
            xmltv_icon_url,
            sources: ChannelSources::XMLTV,
            ..Self::default()
        })
    }

    /// Returns a copy with the `/as/services/details/<sid>` data applied.
    #[must_use]
    pub fn with_service_detail(&self, detail: &ServiceDetailResponse) -> Self {
        let mut next = self.clone();
        let details = &detail.details;
        if details.upgrade_message.is_some() {
            next.description.clone_from(&details.upgrade_message);
        }
        if details.dvbtriplet.is_some() {
            next.dvb_triplet.clone_from(&details.dvbtriplet);
        }
        if details.is_broadcasting.is_some() {
            next.is_broadcasting = details.is_broadcasting;
        }
        next.streaming_profiles.clone_from(&detail.streaming_profiles);
        next.sources |= ChannelSources::SKYQ_DETAIL;
        next
    }

    /// Returns a copy enriched with the XMLTV fields of `feed`.
    ///
    /// Identity fields (`sid`, `number`, `name`) and a box-provided
    /// description are never overwritten.
    #[must_use]
    pub fn with_xmltv(&self, feed: &Self) -> Self {
        let mut next = self.clone();
        if feed.xmltv_id.is_some() {
            next.xmltv_id.clone_from(&feed.xmltv_id);
        }
        if feed.xmltv_display_name.is_some() {
            next.xmltv_display_name.clone_from(&feed.xmltv_display_name);
        }
        if feed.xmltv_icon_url.is_some() {
            next.xmltv_icon_url.clone_from(&feed.xmltv_icon_url);
        }
        if next.description.is_none() {
            next.description.clone_from(&feed.description);
        }
        next.sources |= ChannelSources::XMLTV;
        next
    }

    /// Serializes to the `{"__type__": "__channel__", ...}` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let envelope = ChannelEnvelopeRef {
            kind: CHANNEL_JSON_TYPE,
            attributes: self,
            sources: self.sources.iter_names().map(|(name, _)| name).collect(),
        };
        serde_json::to_string_pretty(&envelope).map_err(|e| Error::parse("channel json", e))
    }

    /// Parses a channel from the envelope written by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the JSON is malformed, the `__type__` tag is
    /// missing or wrong, or a source flag is unknown.
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: ChannelEnvelope =
            serde_json::from_str(json).map_err(|e| Error::parse("channel json", e))?;

        match envelope.kind.as_deref() {
            Some(CHANNEL_JSON_TYPE) => {}
            other => {
                return Err(Error::parse(
                    "channel json",
                    format!("incorrect type metadata: {other:?}"),
                ));
            }
        }

        let attributes = envelope
            .attributes
            .ok_or_else(|| Error::parse("channel json", "missing attributes"))?;
        let mut channel: Self =
            serde_json::from_value(attributes).map_err(|e| Error::parse("channel json", e))?;

        for name in &envelope.sources {
            let flag = ChannelSources::from_name(name).ok_or_else(|| {
                Error::parse("channel json", format!("unknown source flag: {name}"))
            })?;
            channel.sources |= flag;
        }
        Ok(channel)
    }
}

impl Channel {
    /// Channel id, the primary key. `None` for feed-only channels.
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    /// Channel number (box `c`).
    #[must_use]
    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    /// Channel name (box `t`).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Short description (box `upgradeMessage`).
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Picture format.
    #[must_use]
    pub const fn quality(&self) -> Option<&Quality> {
        self.quality.as_ref()
    }

    /// Delivery type, e.g. `DSAT`.
    #[must_use]
    pub fn service_type(&self) -> Option<&str> {
        self.service_type.as_deref()
    }

    /// DVB triplet.
    #[must_use]
    pub fn dvb_triplet(&self) -> Option<&str> {
        self.dvb_triplet.as_deref()
    }

    /// Numeric sid.
    #[must_use]
    pub const fn sk(&self) -> Option<u32> {
        self.sk
    }

    /// Service group.
    #[must_use]
    pub const fn sg(&self) -> Option<u32> {
        self.sg
    }

    /// Extended service group.
    #[must_use]
    pub const fn xsg(&self) -> Option<u32> {
        self.xsg
    }

    /// Whether the channel carries a schedule. `None` means unknown.
    #[must_use]
    pub const fn schedule(&self) -> Option<bool> {
        self.schedule
    }

    /// Whether this is a `+1` style channel. `None` means unknown.
    #[must_use]
    pub const fn timeshifted(&self) -> Option<bool> {
        self.timeshifted
    }

    /// Whether this is an adult channel. `None` means unknown.
    #[must_use]
    pub const fn adult(&self) -> Option<bool> {
        self.adult
    }

    /// Whether the channel is on air. `None` means unknown.
    #[must_use]
    pub const fn is_broadcasting(&self) -> Option<bool> {
        self.is_broadcasting
    }

    /// Streaming endpoints.
    #[must_use]
    pub fn streaming_profiles(&self) -> &[StreamingProfile] {
        &self.streaming_profiles
    }

    /// XMLTV channel id.
    #[must_use]
    pub fn xmltv_id(&self) -> Option<&str> {
        self.xmltv_id.as_deref()
    }

    /// XMLTV display name.
    #[must_use]
    pub fn xmltv_display_name(&self) -> Option<&str> {
        self.xmltv_display_name.as_deref()
    }

    /// Absolute logo URL from the XMLTV feed.
    #[must_use]
    pub const fn xmltv_icon_url(&self) -> Option<&Url> {
        self.xmltv_icon_url.as_ref()
    }

    /// Sources applied to this channel.
    #[must_use]
    pub const fn sources(&self) -> ChannelSources {
        self.sources
    }

    /// Returns `true` if box summary data is present.
    #[must_use]
    pub const fn is_box_sourced(&self) -> bool {
        self.sources.contains(ChannelSources::SKYQ_SUMMARY)
    }
}

impl Hash for Channel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sid.hash(state);
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Channel: sources={:?}, sid={}, xmltv_id={}, number={}, name={}>",
            self.sources,
            self.sid.as_deref().unwrap_or("-"),
            self.xmltv_id.as_deref().unwrap_or("-"),
            self.number.as_deref().unwrap_or("-"),
            self.name.as_deref().unwrap_or("-"),
        )
    }
}

/// Picks `preferred` if set, otherwise `fallback`.
fn pick<T: Clone>(preferred: &Option<T>, fallback: &Option<T>) -> Option<T> {
    preferred.as_ref().or(fallback.as_ref()).cloned()
}

/// Merges two channels into a new one.
///
/// Populated fields of `b` override those of `a`. Identity fields (`sid`,
/// `number`, `name`) come from whichever side has them, preferring the
/// box-sourced channel when both do; `xmltv_id` likewise prefers the
/// feed-sourced side. `sources` is the union of both. No check is made that
/// the two channels describe the same real channel.
#[must_use]
pub fn merge_channels(a: &Channel, b: &Channel) -> Channel {
    let (id_primary, id_fallback) = if a.is_box_sourced() && !b.is_box_sourced() {
        (a, b)
    } else {
        (b, a)
    };
    let (feed_primary, feed_fallback) = if a.sources.contains(ChannelSources::XMLTV)
        && !b.sources.contains(ChannelSources::XMLTV)
    {
        (a, b)
    } else {
        (b, a)
    };

    Channel {
        sid: pick(&id_primary.sid, &id_fallback.sid),
        number: pick(&id_primary.number, &id_fallback.number),
        name: pick(&id_primary.name, &id_fallback.name),
        description: pick(&b.description, &a.description),
        quality: pick(&b.quality, &a.quality),
        service_type: pick(&b.service_type, &a.service_type),
        dvb_triplet: pick(&b.dvb_triplet, &a.dvb_triplet),
        sk: b.sk.or(a.sk),
        sg: b.sg.or(a.sg),
        xsg: b.xsg.or(a.xsg),
        schedule: b.schedule.or(a.schedule),
        timeshifted: b.timeshifted.or(a.timeshifted),
        adult: b.adult.or(a.adult),
        is_broadcasting: b.is_broadcasting.or(a.is_broadcasting),
        streaming_profiles: if b.streaming_profiles.is_empty() {
            a.streaming_profiles.clone()
        } else {
            b.streaming_profiles.clone()
        },
        xmltv_id: pick(&feed_primary.xmltv_id, &feed_fallback.xmltv_id),
        xmltv_display_name: pick(&b.xmltv_display_name, &a.xmltv_display_name),
        xmltv_icon_url: pick(&b.xmltv_icon_url, &a.xmltv_icon_url),
        sources: a.sources | b.sources,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::collections::HashSet;

    use super::*;
    use crate::constants::XMLTV_BASE_URL;
    use crate::epg::types::ServicesResponse;

    fn box_channels() -> Vec<Channel> {
        let resp: ServicesResponse =
            serde_json::from_str(include_str!("../../../../fixtures/skyq/services.json")).unwrap();
        resp.services
            .iter()
            .map(Channel::from_service_summary)
            .collect()
    }

    fn bbc_detail() -> ServiceDetailResponse {
        serde_json::from_str(include_str!(
            "../../../../fixtures/skyq/service_detail_2002.json"
        ))
        .unwrap()
    }

    fn bbc_feed() -> Channel {
        let base = Url::parse(XMLTV_BASE_URL).unwrap();
        Channel::from_xmltv(
            "f3932e75f691561adbe3b609369e487b",
            Some(String::from("BBC One Lon")),
            Some("/images/channels/f3932e75f691561adbe3b609369e487b.png"),
            &base,
        )
        .unwrap()
    }

    #[test]
    fn test_from_service_summary_maps_fields() {
        // Arrange & Act
        let channels = box_channels();
        let bbc = &channels[0];

        // Assert
        assert_eq!(bbc.sid(), Some("2002"));
        assert_eq!(bbc.number(), Some("101"));
        assert_eq!(bbc.name(), Some("BBC One Lon"));
        assert_eq!(bbc.quality(), Some(&Quality::Sd));
        assert_eq!(bbc.service_type(), Some("DSAT"));
        assert_eq!(bbc.sk(), Some(2002));
        assert_eq!(bbc.schedule(), Some(true));
        assert_eq!(bbc.adult(), None);
        assert_eq!(bbc.sources(), ChannelSources::SKYQ_SUMMARY);
        assert_eq!(channels[1].quality(), Some(&Quality::Au));
    }

    #[test]
    fn test_with_service_detail_adds_description() {
        // Arrange
        let bbc = box_channels().remove(0);

        // Act
        let detailed = bbc.with_service_detail(&bbc_detail());

        // Assert
        assert!(
            detailed
                .description()
                .unwrap()
                .starts_with("BBC ONE for Greater London")
        );
        assert_eq!(detailed.is_broadcasting(), Some(true));
        assert_eq!(detailed.streaming_profiles().len(), 1);
        assert!(detailed.sources().contains(ChannelSources::SKYQ_DETAIL));
        // original untouched
        assert_eq!(bbc.description(), None);
    }

    #[test]
    fn test_from_xmltv_resolves_relative_icon() {
        // Arrange & Act
        let feed = bbc_feed();

        // Assert
        assert_eq!(feed.sid(), None);
        assert_eq!(feed.xmltv_display_name(), Some("BBC One Lon"));
        assert_eq!(
            feed.xmltv_icon_url().unwrap().as_str(),
            "http://www.xmltv.co.uk/images/channels/f3932e75f691561adbe3b609369e487b.png"
        );
        assert_eq!(feed.sources(), ChannelSources::XMLTV);
    }

    #[test]
    fn test_with_xmltv_keeps_identity_and_description() {
        // Arrange
        let bbc = box_channels().remove(0).with_service_detail(&bbc_detail());

        // Act
        let merged = bbc.with_xmltv(&bbc_feed());

        // Assert
        assert_eq!(merged.sid(), Some("2002"));
        assert_eq!(merged.number(), Some("101"));
        assert_eq!(merged.name(), Some("BBC One Lon"));
        assert_eq!(merged.description(), bbc.description());
        assert_eq!(merged.xmltv_id(), Some("f3932e75f691561adbe3b609369e487b"));
        assert!(merged.xmltv_icon_url().is_some());
        assert!(merged.sources().contains(ChannelSources::XMLTV));
    }

    #[test]
    fn test_merge_channels_prefers_box_identity() {
        // Arrange
        let bbc = box_channels().remove(0);
        let feed = bbc_feed();

        // Act
        let forward = merge_channels(&bbc, &feed);
        let backward = merge_channels(&feed, &bbc);

        // Assert
        for merged in [&forward, &backward] {
            assert_eq!(merged.sid(), Some("2002"));
            assert_eq!(merged.name(), Some("BBC One Lon"));
            assert_eq!(merged.xmltv_id(), Some("f3932e75f691561adbe3b609369e487b"));
            assert_eq!(
                merged.sources(),
                ChannelSources::SKYQ_SUMMARY | ChannelSources::XMLTV
            );
        }
    }

    #[test]
    fn test_merge_channels_b_overrides_descriptive_fields() {
        // Arrange
        let plain = box_channels().remove(0);
        let detailed = plain.with_service_detail(&bbc_detail());

        // Act
        let merged = merge_channels(&detailed, &plain);

        // Assert: plain has no description, so detailed's survives
        assert_eq!(merged.description(), detailed.description());
        assert_eq!(merged.is_broadcasting(), Some(true));
    }

    #[test]
    fn test_hash_uses_sid_only() {
        // Arrange
        let bbc = box_channels().remove(0);
        let detailed = bbc.with_service_detail(&bbc_detail());

        // Act
        let mut set = HashSet::new();
        set.insert(bbc.clone());
        set.insert(bbc.clone());
        set.insert(detailed.clone());

        // Assert: equal values collapse, differing values with the same sid coexist
        assert_ne!(bbc, detailed);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_json_round_trip() {
        // Arrange
        let channel = box_channels()
            .remove(0)
            .with_service_detail(&bbc_detail())
            .with_xmltv(&bbc_feed());

        // Act
        let json = channel.to_json().unwrap();
        let back = Channel::from_json(&json).unwrap();

        // Assert
        assert!(json.contains("\"__type__\": \"__channel__\""));
        assert_eq!(back, channel);
    }

    #[test]
    fn test_from_json_rejects_wrong_type() {
        // Arrange
        let json = r#"{"__type__": "__programme__", "attributes": {"sid": "2002"}}"#;

        // Act
        let err = Channel::from_json(json).unwrap_err();

        // Assert
        assert!(err.is_parse());
        assert!(err.to_string().contains("incorrect type metadata"));
    }

    #[test]
    fn test_from_json_rejects_missing_type() {
        // Arrange & Act
        let err = Channel::from_json(r#"{"attributes": {}}"#).unwrap_err();

        // Assert
        assert!(err.is_parse());
    }

    #[test]
    fn test_quality_parses_unknown_value() {
        // Arrange & Act
        let q = Quality::from(String::from("uhd"));

        // Assert
        assert_eq!(q, Quality::Other(String::from("uhd")));
        assert_eq!(String::from(Quality::Hd), "hd");
    }
}
