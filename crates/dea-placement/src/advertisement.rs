//! A single DEA's advertised capacity and topology.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use dea_core::DEFAULT_ZONE;

/// Snapshot of one DEA host, valid until `expires_at` (forever when `None`).
///
/// Only `available_memory` and `app_id_to_count` change after creation,
/// and only through the owning pool's lock.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub dea_id: String,
    pub ip: Option<String>,
    /// MB remaining. Signed: reservations are not floor-checked.
    pub available_memory: i64,
    /// MB remaining. `u64::MAX` when the DEA does not report disk.
    pub available_disk: u64,
    pub stacks: BTreeSet<String>,
    /// Legacy single-zone field.
    pub zone: Option<String>,
    pub zones: Vec<String>,
    pub availability_zone: Option<String>,
    pub app_id_to_count: HashMap<String, u32>,
    pub expires_at: Option<Instant>,
}

impl Advertisement {
    pub fn has_sufficient_disk(&self, minimum_disk: u64) -> bool {
        minimum_disk == 0 || self.available_disk >= minimum_disk
    }

    pub fn has_sufficient_memory(&self, mem: u64) -> bool {
        i64::try_from(mem).is_ok_and(|mem| self.available_memory >= mem)
    }

    pub fn has_stack(&self, stack: &str) -> bool {
        self.stacks.contains(stack)
    }

    pub fn meets_needs(&self, mem: u64, stack: &str) -> bool {
        self.has_sufficient_memory(mem) && self.has_stack(stack)
    }

    pub fn num_instances_of(&self, app_id: &str) -> u32 {
        self.app_id_to_count.get(app_id).copied().unwrap_or(0)
    }

    pub fn increment_instance_count(&mut self, app_id: &str) {
        *self.app_id_to_count.entry(app_id.to_string()).or_insert(0) += 1;
    }

    /// Reserve `amount` MB. May drive `available_memory` negative.
    pub fn decrement_memory(&mut self, amount: u64) {
        let amount = i64::try_from(amount).unwrap_or(i64::MAX);
        self.available_memory = self.available_memory.saturating_sub(amount);
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// The legacy `zone` field counts only when `zones` was never configured.
    pub fn legacy_zone(&self) -> Option<&str> {
        if self.zones.len() == 1 && self.zones[0] == DEFAULT_ZONE {
            self.zone.as_deref()
        } else {
            None
        }
    }

    pub fn in_zone(&self, zone: &str) -> bool {
        self.legacy_zone() == Some(zone) || self.zones.iter().any(|z| z == zone)
    }

    /// Every zone this DEA serves: configured `zones` plus a legacy `zone`.
    pub fn effective_zones(&self) -> Vec<&str> {
        let mut zones: Vec<&str> = self.zones.iter().map(String::as_str).collect();
        if let Some(legacy) = self.legacy_zone() {
            if !zones.contains(&legacy) {
                zones.push(legacy);
            }
        }
        zones
    }

    pub fn availability_zone(&self) -> &str {
        self.availability_zone.as_deref().unwrap_or(DEFAULT_ZONE)
    }
}
