//! Type conversions from wire messages to placement types.
//!
//! Bridges `dea_core::AdvertiseMessage` to [`Advertisement`].

use std::time::{Duration, Instant};

use dea_core::AdvertiseMessage;

use crate::advertisement::Advertisement;

/// Expiry for an advertisement received at `received_at`.
///
/// `None` when the TTL reaches past what the clock can represent; such an
/// advertisement never goes stale.
pub fn expiry_for(received_at: Instant, ttl: Duration) -> Option<Instant> {
    received_at.checked_add(ttl)
}

/// Convert a decoded [`AdvertiseMessage`] to an [`Advertisement`].
pub fn advertisement_from_message(
    msg: AdvertiseMessage,
    expires_at: Option<Instant>,
) -> Advertisement {
    let zones = msg.zones();
    let available_disk = msg.available_disk();
    Advertisement {
        dea_id: msg.id,
        ip: msg.ip,
        available_memory: msg.available_memory,
        available_disk,
        stacks: msg.stacks.into_iter().collect(),
        zone: msg.placement_properties.zone,
        zones,
        availability_zone: msg.placement_properties.availability_zone,
        app_id_to_count: msg.app_id_to_count,
        expires_at,
    }
}
