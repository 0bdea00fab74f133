//! Hub membership and peer-info records

use serde::{Deserialize, Serialize};

/// Item of a hub's membership stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttendantEvent {
    /// Full roster, sent once when the subscription starts
    State { pubkeys: Vec<String> },
    Joined { pubkey: String },
    Left { pubkey: String },
}

/// Self-description a hub returns from `hub.metadata`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
}

impl HubMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.admin.is_none()
    }
}

/// A peer newly seen at a hub, for whoever decides what to dial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEvent {
    /// Tunnel multiaddr reaching the attendant through the hub
    pub multiaddr: String,
    pub attendant_pubkey: String,
    pub hub_pubkey: String,
    pub hub_name: Option<String>,
}

/// Partial record merged into the peer-info store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_count: Option<usize>,
}

impl InfoPatch {
    /// Marks a multiaddr as a hub link, carrying whatever the hub announced
    pub fn hub(metadata: &HubMetadata) -> Self {
        Self {
            kind: Some("hub".to_string()),
            name: metadata.name.clone(),
            admin: metadata.admin.clone(),
            online_count: None,
        }
    }

    pub fn online_count(count: usize) -> Self {
        Self {
            online_count: Some(count),
            ..Default::default()
        }
    }

    /// Overlay the fields set in `other` onto this record
    pub fn merge(&mut self, other: &InfoPatch) {
        if other.kind.is_some() {
            self.kind = other.kind.clone();
        }
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.admin.is_some() {
            self.admin = other.admin.clone();
        }
        if other.online_count.is_some() {
            self.online_count = other.online_count;
        }
    }
}

/// Connection statistics the network keeps per peer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerStats {
    #[serde(default)]
    pub failure: Option<u32>,
}

/// What the network knows about one peer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(default)]
    pub stats: Option<PeerStats>,
    #[serde(flatten)]
    pub info: InfoPatch,
}

impl PeerInfo {
    pub fn with_failures(failure: u32) -> Self {
        Self {
            stats: Some(PeerStats {
                failure: Some(failure),
            }),
            info: InfoPatch::default(),
        }
    }

    /// Failure count, if the network recorded one
    pub fn failure(&self) -> Option<u32> {
        self.stats.as_ref().and_then(|s| s.failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendant_event_wire_format() {
        let event: AttendantEvent =
            serde_json::from_str(r#"{"type":"state","pubkeys":["A","B"]}"#).unwrap();
        assert_eq!(
            event,
            AttendantEvent::State {
                pubkeys: vec!["A".to_string(), "B".to_string()]
            }
        );

        let event: AttendantEvent = serde_json::from_str(r#"{"type":"left","pubkey":"A"}"#).unwrap();
        assert_eq!(event, AttendantEvent::Left { pubkey: "A".to_string() });
    }

    #[test]
    fn test_hub_info_patch() {
        let meta = HubMetadata {
            name: Some("Town Square".to_string()),
            admin: None,
        };
        let value = serde_json::to_value(InfoPatch::hub(&meta)).unwrap();
        assert_eq!(value, serde_json::json!({"type": "hub", "name": "Town Square"}));

        let value = serde_json::to_value(InfoPatch::online_count(2)).unwrap();
        assert_eq!(value, serde_json::json!({"onlineCount": 2}));
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut record = InfoPatch::hub(&HubMetadata {
            name: Some("hub".to_string()),
            admin: Some("alice".to_string()),
        });
        record.merge(&InfoPatch::online_count(3));
        assert_eq!(record.kind.as_deref(), Some("hub"));
        assert_eq!(record.admin.as_deref(), Some("alice"));
        assert_eq!(record.online_count, Some(3));
    }

    #[test]
    fn test_empty_metadata() {
        assert!(HubMetadata::default().is_empty());
        let meta: HubMetadata = serde_json::from_str(r#"{"admin":"bob"}"#).unwrap();
        assert!(!meta.is_empty());
    }
}
