use serde::{Deserialize, Serialize};

use dea_core::DEFAULT_ZONE;

/// What a caller needs from a DEA to start one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementCriteria {
    pub app_id: String,
    /// Memory per instance in MB.
    pub mem: u64,
    /// Disk per instance in MB; 0 means no disk requirement.
    #[serde(default)]
    pub disk: u64,
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl PlacementCriteria {
    pub fn new(app_id: &str, mem: u64, stack: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            mem,
            disk: 0,
            stack: stack.to_string(),
            zone: None,
        }
    }

    pub fn with_disk(mut self, disk: u64) -> Self {
        self.disk = disk;
        self
    }

    pub fn with_zone(mut self, zone: &str) -> Self {
        self.zone = Some(zone.to_string());
        self
    }

    /// Requested zone, `"default"` when unset or blank.
    pub fn requested_zone(&self) -> &str {
        match self.zone.as_deref().map(str::trim) {
            Some(zone) if !zone.is_empty() => zone,
            _ => DEFAULT_ZONE,
        }
    }
}
