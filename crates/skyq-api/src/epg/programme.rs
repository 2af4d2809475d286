//! `Programme` - one scheduled programme from an XMLTV feed.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::error::{Error, Result};

/// XMLTV timestamp format, e.g. `20181008060000 +0100`.
const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Offset-less forms, read as UTC.
const XMLTV_NAIVE_FORMATS: [&str; 2] = ["%Y%m%d%H%M%S", "%Y%m%d%H%M"];

/// Parses an XMLTV `start`/`stop` attribute.
///
/// Accepts `YYYYMMDDhhmmss ±zzzz`, and `YYYYMMDDhhmmss` or `YYYYMMDDhhmm`
/// without an offset, which XMLTV defines as UTC.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `raw` is in none of those forms.
pub fn parse_xmltv_time(raw: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    let offset_err = match DateTime::parse_from_str(trimmed, XMLTV_TIME_FORMAT) {
        Ok(t) => return Ok(t),
        Err(e) => e,
    };
    XMLTV_NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| Error::parse(format!("xmltv timestamp {raw:?}"), offset_err))
}

/// A TV programme.
///
/// Two programmes are the same programme when their title, channel and start
/// time match; the remaining fields may be refined by later feed fetches.
/// Programmes sort by start time, then channel, then title.
#[derive(Debug, Clone)]
pub struct Programme {
    /// Title.
    pub title: String,
    /// Language of the title.
    pub title_lang: Option<String>,
    /// Description.
    pub desc: Option<String>,
    /// Language of the description.
    pub desc_lang: Option<String>,
    /// Start time.
    pub start: DateTime<FixedOffset>,
    /// End time.
    pub stop: DateTime<FixedOffset>,
    /// XMLTV id of the channel; matches [`Channel::xmltv_id`](super::Channel::xmltv_id).
    pub channel_xmltv_id: String,
    /// Series/episode information.
    pub episode_num: Option<String>,
    /// Numbering scheme of `episode_num`, e.g. `xmltv_ns`.
    pub episode_num_system: Option<String>,
}

impl Programme {
    /// Duration between start and stop.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.stop.signed_duration_since(self.start)
    }

    fn identity(&self) -> (&DateTime<FixedOffset>, &str, &str) {
        (&self.start, &self.channel_xmltv_id, &self.title)
    }
}

impl PartialEq for Programme {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Programme {}

impl PartialOrd for Programme {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Programme {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for Programme {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Programme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.stop.format("%H:%M"),
            self.title
        )?;
        if let Some(ep) = &self.episode_num {
            write!(f, " [{ep}]")?;
        }
        Ok(())
    }
}
