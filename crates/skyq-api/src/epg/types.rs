//! JSON response types for the box's `/as/services` endpoints.

use serde::{Deserialize, Serialize};

/// `GET /as/services` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesResponse {
    /// Document revision reported by the box.
    #[serde(rename = "documentId", default)]
    pub document_id: Option<String>,
    /// Channel summaries in box order.
    #[serde(default)]
    pub services: Vec<ServiceSummary>,
    /// Schema version.
    #[serde(default)]
    pub version: Option<u32>,
}

/// One entry of the `/as/services` summary list.
///
/// Flags such as `timeshifted` and `adult` are only present when true.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceSummary {
    /// Channel id (primary key).
    pub sid: String,
    /// Channel number, e.g. `"101"`.
    pub c: String,
    /// Channel name, e.g. `"BBC One Lon"`.
    pub t: String,
    /// Picture format: `hd`, `sd` or `au`.
    #[serde(default)]
    pub sf: Option<String>,
    /// Delivery type, e.g. `DSAT`.
    #[serde(default)]
    pub servicetype: Option<String>,
    /// DVB triplet `onid.tsid.sid`.
    #[serde(default)]
    pub dvbtriplet: Option<String>,
    /// Numeric form of the sid.
    #[serde(default)]
    pub sk: Option<u32>,
    /// Service group.
    #[serde(default)]
    pub sg: Option<u32>,
    /// Extended service group.
    #[serde(default)]
    pub xsg: Option<u32>,
    /// Whether the channel carries a schedule.
    #[serde(default)]
    pub schedule: Option<bool>,
    /// `+1` style channel.
    #[serde(default)]
    pub timeshifted: Option<bool>,
    /// Adult channel.
    #[serde(default)]
    pub adult: Option<bool>,
}

/// `GET /as/services/details/<sid>` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceDetailResponse {
    /// Channel id the detail belongs to.
    pub sid: String,
    /// Detail record.
    #[serde(default)]
    pub details: ServiceDetails,
    /// Streaming endpoints offered by the box.
    #[serde(rename = "streamingprofiles", default)]
    pub streaming_profiles: Vec<StreamingProfile>,
}

/// Body of a detail response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceDetails {
    /// DVB triplet `onid.tsid.sid`.
    #[serde(default)]
    pub dvbtriplet: Option<String>,
    /// Whether the channel is on air.
    #[serde(rename = "isbroadcasting", default)]
    pub is_broadcasting: Option<bool>,
    /// Short channel description.
    #[serde(rename = "upgradeMessage", default)]
    pub upgrade_message: Option<String>,
}

/// A streaming endpoint for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamingProfile {
    /// Profile name.
    pub name: String,
    /// Stream URI.
    #[serde(default)]
    pub uri: Option<String>,
    /// Subtitle stream URI.
    #[serde(default)]
    pub suri: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    #[test]
    fn test_services_response_parses_fixture() {
        // Arrange
        let json = include_str!("../../../../fixtures/skyq/services.json");

        // Act
        let resp: ServicesResponse = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(resp.document_id.as_deref(), Some("683"));
        assert_eq!(resp.version, Some(3));
        assert_eq!(resp.services.len(), 2);
        assert_eq!(resp.services[0].sid, "2002");
        assert_eq!(resp.services[0].c, "101");
        assert_eq!(resp.services[0].schedule, Some(true));
        assert_eq!(resp.services[1].schedule, None);
        assert_eq!(resp.services[1].sf.as_deref(), Some("au"));
    }

    #[test]
    fn test_service_detail_parses_fixture() {
        // Arrange
        let json = include_str!("../../../../fixtures/skyq/service_detail_2002.json");

        // Act
        let resp: ServiceDetailResponse = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(resp.sid, "2002");
        assert_eq!(resp.details.is_broadcasting, Some(true));
        assert!(
            resp.details
                .upgrade_message
                .as_deref()
                .unwrap()
                .starts_with("BBC ONE for Greater London")
        );
        assert_eq!(resp.streaming_profiles.len(), 1);
        assert_eq!(resp.streaming_profiles[0].name, "AnExample");
    }
}
