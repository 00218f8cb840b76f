//! DEA pool — the authoritative in-memory set of live advertisements.
//!
//! Every read that needs a consistent view and every write takes the same
//! mutex for its whole critical section. Nothing inside a critical section
//! blocks on I/O; payloads are decoded before the lock is taken.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use dea_core::{
    ADVERTISE_SUBJECT, AdvertiseMessage, DEFAULT_ZONE, PoolConfig, SHUTDOWN_SUBJECT,
    ShutdownMessage,
};
use dea_placement::{
    Advertisement, PlacementCriteria, advertisement_from_message, expiry_for, select_dea,
};

use crate::bus::MessageBus;
use crate::error::{PoolError, PoolResult};

/// Zone name → distinct DEA IPs in that zone.
pub type ZoneMap = BTreeMap<String, Vec<String>>;

pub struct DeaPool {
    /// How long an advertisement stays live after receipt.
    advertisement_ttl: Duration,
    /// At most one entry per `dea_id`.
    advertisements: Mutex<Vec<Advertisement>>,
}

impl DeaPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            advertisement_ttl: config.advertisement_ttl(),
            advertisements: Mutex::new(Vec::new()),
        }
    }

    pub fn advertisement_ttl(&self) -> Duration {
        self.advertisement_ttl
    }

    /// Wire `dea.advertise` and `dea.shutdown` on `bus` to this pool.
    ///
    /// Undecodable payloads are logged and dropped.
    pub fn register_subscriptions(self: &Arc<Self>, bus: &dyn MessageBus) {
        let pool = Arc::clone(self);
        bus.subscribe(
            ADVERTISE_SUBJECT,
            Arc::new(move |payload: &[u8]| match AdvertiseMessage::decode(payload) {
                Ok(msg) => pool.process_advertise_message(msg),
                Err(e) => warn!(subject = ADVERTISE_SUBJECT, error = %e, "dropping message"),
            }),
        );

        let pool = Arc::clone(self);
        bus.subscribe(
            SHUTDOWN_SUBJECT,
            Arc::new(move |payload: &[u8]| match ShutdownMessage::decode(payload) {
                Ok(msg) => pool.process_shutdown_message(msg),
                Err(e) => warn!(subject = SHUTDOWN_SUBJECT, error = %e, "dropping message"),
            }),
        );

        info!("subscribed to dea advertisements");
    }

    /// Record an advertisement, replacing any earlier one for the same DEA.
    pub fn process_advertise_message(&self, msg: AdvertiseMessage) {
        let expires_at = expiry_for(Instant::now(), self.advertisement_ttl);
        let advertisement = advertisement_from_message(msg, expires_at);

        let mut ads = self.lock();
        ads.retain(|ad| ad.dea_id != advertisement.dea_id);
        debug!(
            dea_id = %advertisement.dea_id,
            available_memory = advertisement.available_memory,
            "dea advertised"
        );
        ads.push(advertisement);
    }

    pub fn process_shutdown_message(&self, msg: ShutdownMessage) {
        let mut ads = self.lock();
        let before = ads.len();
        ads.retain(|ad| ad.dea_id != msg.id);

        if ads.len() < before {
            info!(dea_id = %msg.id, "dea shut down");
        } else {
            debug!(dea_id = %msg.id, "shutdown for unknown dea");
        }
    }

    /// Pick a DEA for one instance matching `criteria`, or `None`.
    pub fn find_dea(&self, criteria: &PlacementCriteria) -> Option<String> {
        self.find_dea_with_rng(criteria, &mut rand::thread_rng())
    }

    /// [`find_dea`](Self::find_dea) with a caller-supplied random source.
    pub fn find_dea_with_rng<R: Rng + ?Sized>(
        &self,
        criteria: &PlacementCriteria,
        rng: &mut R,
    ) -> Option<String> {
        let mut ads = self.lock();
        prune_stale(&mut ads, Instant::now());

        let chosen = select_dea(ads.iter(), criteria, rng).map(|ad| ad.dea_id.clone());
        match &chosen {
            Some(dea_id) => info!(
                app_id = %criteria.app_id,
                %dea_id,
                mem = criteria.mem,
                "dea selected"
            ),
            None => info!(
                app_id = %criteria.app_id,
                mem = criteria.mem,
                stack = %criteria.stack,
                zone = criteria.requested_zone(),
                live = ads.len(),
                "no eligible dea"
            ),
        }
        chosen
    }

    /// Count one more instance of `app_id` on `dea_id`.
    pub fn mark_app_started(&self, dea_id: &str, app_id: &str) -> PoolResult<()> {
        self.with_advertisement(dea_id, |ad| ad.increment_instance_count(app_id))?;
        debug!(%dea_id, %app_id, "app instance marked started");
        Ok(())
    }

    /// Subtract `app_memory` MB from `dea_id`'s free memory.
    pub fn reserve_app_memory(&self, dea_id: &str, app_memory: u64) -> PoolResult<()> {
        self.with_advertisement(dea_id, |ad| ad.decrement_memory(app_memory))?;
        debug!(%dea_id, app_memory, "app memory reserved");
        Ok(())
    }

    /// Prune stale entries and return a copy of the live advertisements.
    pub fn get_active_deas(&self) -> Vec<Advertisement> {
        let mut ads = self.lock();
        prune_stale(&mut ads, Instant::now());
        ads.clone()
    }

    /// Zone → DEA IPs, honouring the legacy single-zone field.
    pub fn get_dea_zones(&self) -> ZoneMap {
        self.zone_map(|ad| ad.effective_zones().into_iter().map(str::to_string).collect())
    }

    /// Availability zone → DEA IPs.
    pub fn get_dea_availability_zones(&self) -> ZoneMap {
        self.zone_map(|ad| vec![ad.availability_zone().to_string()])
    }

    /// Number of stored advertisements, stale ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Advertisement>> {
        self.advertisements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_advertisement(
        &self,
        dea_id: &str,
        f: impl FnOnce(&mut Advertisement),
    ) -> PoolResult<()> {
        let mut ads = self.lock();
        match ads.iter_mut().find(|ad| ad.dea_id == dea_id) {
            Some(ad) => {
                f(ad);
                Ok(())
            }
            None => {
                warn!(%dea_id, "dea no longer in pool");
                Err(PoolError::DeaNotFound(dea_id.to_string()))
            }
        }
    }

    /// Read-only: expired entries are skipped, not removed.
    fn zone_map(&self, zones_of: impl Fn(&Advertisement) -> Vec<String>) -> ZoneMap {
        let now = Instant::now();
        let ads = self.lock();

        let mut map = ZoneMap::new();
        map.insert(DEFAULT_ZONE.to_string(), Vec::new());

        for ad in ads.iter().filter(|ad| !ad.is_expired(now)) {
            let Some(ip) = ad.ip.as_deref() else { continue };
            for zone in zones_of(ad) {
                let ips = map.entry(zone).or_default();
                if !ips.iter().any(|existing| existing == ip) {
                    ips.push(ip.to_string());
                }
            }
        }
        map
    }
}

fn prune_stale(ads: &mut Vec<Advertisement>, now: Instant) {
    ads.retain(|ad| {
        let expired = ad.is_expired(now);
        if expired {
            debug!(dea_id = %ad.dea_id, "pruned stale advertisement");
        }
        !expired
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pool() -> DeaPool {
        DeaPool::new(&PoolConfig::with_timeout_secs(60))
    }

    fn advertise(id: &str, mem: i64) -> AdvertiseMessage {
        AdvertiseMessage::decode(
            format!(r#"{{"id":"{id}","ip":"10.0.0.1","stacks":["lucid64"],"available_memory":{mem}}}"#)
                .as_bytes(),
        )
        .unwrap()
    }

    fn shutdown(id: &str) -> ShutdownMessage {
        ShutdownMessage {
            id: id.to_string(),
            ip: None,
            app_id_to_count: Default::default(),
        }
    }

    #[test]
    fn advertise_replaces_existing_entry() {
        let pool = pool();
        pool.process_advertise_message(advertise("dea-1", 1024));
        pool.process_advertise_message(advertise("dea-1", 2048));

        let active = pool.get_active_deas();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].available_memory, 2048);
    }

    #[test]
    fn shutdown_removes_entry() {
        let pool = pool();
        pool.process_advertise_message(advertise("dea-1", 1024));
        pool.process_advertise_message(advertise("dea-2", 1024));
        pool.process_shutdown_message(shutdown("dea-1"));

        let ids: Vec<String> = pool.get_active_deas().into_iter().map(|ad| ad.dea_id).collect();
        assert_eq!(ids, vec!["dea-2"]);
    }

    #[test]
    fn shutdown_of_unknown_dea_is_harmless() {
        let pool = pool();
        pool.process_advertise_message(advertise("dea-1", 1024));
        pool.process_shutdown_message(shutdown("dea-x"));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn zero_ttl_advertisement_is_pruned_on_next_lookup() {
        let pool = DeaPool::new(&PoolConfig::with_timeout_secs(0));
        pool.process_advertise_message(advertise("dea-1", 1024));
        assert_eq!(pool.len(), 1);

        let criteria = PlacementCriteria::new("app", 128, "lucid64");
        assert_eq!(pool.find_dea(&criteria), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn find_dea_uses_injected_rng() {
        let pool = pool();
        pool.process_advertise_message(advertise("dea-1", 1024));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let criteria = PlacementCriteria::new("app", 128, "lucid64");
        assert_eq!(
            pool.find_dea_with_rng(&criteria, &mut rng).as_deref(),
            Some("dea-1")
        );
    }

    #[test]
    fn bookkeeping_mutates_selected_dea() {
        let pool = pool();
        pool.process_advertise_message(advertise("dea-1", 1024));

        pool.mark_app_started("dea-1", "app").unwrap();
        pool.reserve_app_memory("dea-1", 256).unwrap();

        let ad = &pool.get_active_deas()[0];
        assert_eq!(ad.num_instances_of("app"), 1);
        assert_eq!(ad.available_memory, 768);
    }

    #[test]
    fn bookkeeping_on_missing_dea_is_an_error() {
        let pool = pool();
        assert!(matches!(
            pool.mark_app_started("gone", "app"),
            Err(PoolError::DeaNotFound(id)) if id == "gone"
        ));
        assert!(matches!(
            pool.reserve_app_memory("gone", 1),
            Err(PoolError::DeaNotFound(_))
        ));
    }

    #[test]
    fn active_deas_is_a_copy() {
        let pool = pool();
        pool.process_advertise_message(advertise("dea-1", 1024));

        let mut copy = pool.get_active_deas();
        copy[0].available_memory = 0;
        copy.clear();

        assert_eq!(pool.get_active_deas()[0].available_memory, 1024);
    }

    #[test]
    fn zone_maps_always_have_default_key() {
        let pool = pool();
        assert_eq!(pool.get_dea_zones().get("default"), Some(&Vec::new()));
        assert_eq!(
            pool.get_dea_availability_zones().get("default"),
            Some(&Vec::new())
        );
    }
}
