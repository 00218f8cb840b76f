//! Wire messages published by DEA hosts on the message bus.
//!
//! Payloads are JSON. Decoding validates required fields here so the pool
//! only ever handles typed, well-formed messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Subject on which DEAs broadcast their capacity.
pub const ADVERTISE_SUBJECT: &str = "dea.advertise";

/// Subject on which DEAs announce they are going away.
pub const SHUTDOWN_SUBJECT: &str = "dea.shutdown";

/// Zone name used when a DEA (or a placement request) names none.
pub const DEFAULT_ZONE: &str = "default";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Topology hints attached to an advertisement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementProperties {
    /// Legacy single-zone field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

/// A `dea.advertise` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertiseMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default)]
    pub stacks: Vec<String>,
    pub available_memory: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_disk: Option<u64>,
    #[serde(default)]
    pub app_id_to_count: HashMap<String, u32>,
    #[serde(default)]
    pub placement_properties: PlacementProperties,
}

impl AdvertiseMessage {
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let msg: AdvertiseMessage = serde_json::from_slice(payload)?;
        if msg.id.trim().is_empty() {
            return Err(MessageError::MissingField("id"));
        }
        Ok(msg)
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Advertised zones, `["default"]` when none were configured.
    pub fn zones(&self) -> Vec<String> {
        match &self.placement_properties.zones {
            Some(zones) if !zones.is_empty() => zones.clone(),
            _ => vec![DEFAULT_ZONE.to_string()],
        }
    }

    /// Free disk in MB. A DEA that does not report disk is treated as unbounded.
    pub fn available_disk(&self) -> u64 {
        self.available_disk.unwrap_or(u64::MAX)
    }
}

/// A `dea.shutdown` payload. Only `id` matters to the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default)]
    pub app_id_to_count: HashMap<String, u32>,
}

impl ShutdownMessage {
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let msg: ShutdownMessage = serde_json::from_slice(payload)?;
        if msg.id.trim().is_empty() {
            return Err(MessageError::MissingField("id"));
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_advertisement() {
        let payload = br#"{
            "id": "dea-1",
            "ip": "10.0.0.1",
            "stacks": ["lucid64", "cflinuxfs2"],
            "available_memory": 2048,
            "available_disk": 10240,
            "app_id_to_count": {"app-a": 2},
            "placement_properties": {
                "zone": "z1",
                "zones": ["z1", "z2"],
                "availability_zone": "az-1"
            }
        }"#;

        let msg = AdvertiseMessage::decode(payload).unwrap();
        assert_eq!(msg.id, "dea-1");
        assert_eq!(msg.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(msg.stacks, vec!["lucid64", "cflinuxfs2"]);
        assert_eq!(msg.available_memory, 2048);
        assert_eq!(msg.available_disk(), 10240);
        assert_eq!(msg.app_id_to_count.get("app-a"), Some(&2));
        assert_eq!(msg.zones(), vec!["z1", "z2"]);
        assert_eq!(
            msg.placement_properties.availability_zone.as_deref(),
            Some("az-1")
        );
    }

    #[test]
    fn minimal_advertisement_takes_defaults() {
        let msg = AdvertiseMessage::decode(br#"{"id":"dea-1","available_memory":512}"#).unwrap();

        assert!(msg.stacks.is_empty());
        assert!(msg.app_id_to_count.is_empty());
        assert_eq!(msg.available_disk(), u64::MAX);
        assert_eq!(msg.zones(), vec!["default"]);
        assert_eq!(msg.placement_properties.zone, None);
    }

    #[test]
    fn empty_zones_list_falls_back_to_default() {
        let msg = AdvertiseMessage::decode(
            br#"{"id":"dea-1","available_memory":512,"placement_properties":{"zones":[]}}"#,
        )
        .unwrap();
        assert_eq!(msg.zones(), vec!["default"]);
    }

    #[test]
    fn rejects_missing_memory() {
        let err = AdvertiseMessage::decode(br#"{"id":"dea-1"}"#).unwrap_err();
        assert!(matches!(err, MessageError::Json(_)));
    }

    #[test]
    fn rejects_blank_id() {
        let err = AdvertiseMessage::decode(br#"{"id":"  ","available_memory":1}"#).unwrap_err();
        assert!(matches!(err, MessageError::MissingField("id")));

        let err = ShutdownMessage::decode(br#"{"id":""}"#).unwrap_err();
        assert!(matches!(err, MessageError::MissingField("id")));
    }

    #[test]
    fn rejects_garbage() {
        assert!(AdvertiseMessage::decode(b"not json").is_err());
        assert!(ShutdownMessage::decode(b"{").is_err());
    }

    #[test]
    fn shutdown_ignores_extra_fields() {
        let msg = ShutdownMessage::decode(
            br#"{"id":"dea-9","ip":"10.0.0.9","version":"0.0.1","app_id_to_count":{"a":1}}"#,
        )
        .unwrap();
        assert_eq!(msg.id, "dea-9");
        assert_eq!(msg.ip.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn encoded_advertisement_decodes_back() {
        let msg = AdvertiseMessage::decode(
            br#"{"id":"dea-1","available_memory":64,"placement_properties":{"zone":"z9"}}"#,
        )
        .unwrap();
        let bytes = msg.encode().unwrap();
        assert_eq!(AdvertiseMessage::decode(&bytes).unwrap(), msg);
    }
}
