//! Eligibility filter chain for placement decisions.
//!
//! Narrows a snapshot of advertisements to a single DEA in a fixed order:
//!
//! 1. **Disk** — enough free disk for the instance
//! 2. **Needs** — enough free memory and the requested stack
//! 3. **Zone** — serves the requested placement zone
//! 4. **AZ spread** — availability zone hosting the fewest instances of the app
//! 5. **Host spread** — hosts running the fewest instances of the app
//! 6. **Memory** — upper half of the survivors by free memory
//! 7. **Sample** — uniform random pick among what is left
//!
//! Every stage is a hard filter over borrowed advertisements; none of them
//! mutate pool state. An empty set simply flows through to `sample`.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::trace;

use crate::advertisement::Advertisement;
use crate::criteria::PlacementCriteria;

/// The candidate set as it moves through the chain.
#[derive(Debug, Clone)]
pub struct EligibleDeas<'a> {
    deas: Vec<&'a Advertisement>,
}

impl<'a> EligibleDeas<'a> {
    pub fn new(deas: impl IntoIterator<Item = &'a Advertisement>) -> Self {
        Self {
            deas: deas.into_iter().collect(),
        }
    }

    pub fn only_with_disk(mut self, minimum_disk: u64) -> Self {
        self.deas.retain(|ad| ad.has_sufficient_disk(minimum_disk));
        self
    }

    pub fn only_meets_needs(mut self, mem: u64, stack: &str) -> Self {
        self.deas.retain(|ad| ad.meets_needs(mem, stack));
        self
    }

    pub fn only_from_zone(mut self, zone: &str) -> Self {
        self.deas.retain(|ad| ad.in_zone(zone));
        self
    }

    /// Keep hosts in the availability zone(s) with the lowest total count
    /// of `app_id`. Tied zones are all kept.
    pub fn az_with_fewest_instances_of_app(mut self, app_id: &str) -> Self {
        let mut per_az: HashMap<&str, u64> = HashMap::new();
        for ad in &self.deas {
            *per_az.entry(ad.availability_zone()).or_insert(0) +=
                u64::from(ad.num_instances_of(app_id));
        }

        if let Some(&fewest) = per_az.values().min() {
            self.deas
                .retain(|ad| per_az.get(ad.availability_zone()) == Some(&fewest));
        }
        self
    }

    pub fn only_fewest_instances_of_app(mut self, app_id: &str) -> Self {
        if let Some(fewest) = self.deas.iter().map(|ad| ad.num_instances_of(app_id)).min() {
            self.deas.retain(|ad| ad.num_instances_of(app_id) == fewest);
        }
        self
    }

    /// Keep hosts with at least the memory of the host at index `len / 2`
    /// of the ascending-by-memory ordering.
    pub fn upper_half_by_memory(mut self) -> Self {
        if self.deas.is_empty() {
            return self;
        }

        let mut by_memory: Vec<i64> = self.deas.iter().map(|ad| ad.available_memory).collect();
        by_memory.sort_unstable();
        let cutoff = by_memory[by_memory.len() / 2];

        self.deas.retain(|ad| ad.available_memory >= cutoff);
        self
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&'a Advertisement> {
        self.deas.choose(rng).copied()
    }

    pub fn len(&self) -> usize {
        self.deas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deas.is_empty()
    }

    pub fn ids(&self) -> Vec<&'a str> {
        self.deas.iter().map(|ad| ad.dea_id.as_str()).collect()
    }

    pub fn into_vec(self) -> Vec<&'a Advertisement> {
        self.deas
    }
}

/// Run the whole chain for `criteria` and pick one DEA.
pub fn select_dea<'a, R: Rng + ?Sized>(
    deas: impl IntoIterator<Item = &'a Advertisement>,
    criteria: &PlacementCriteria,
    rng: &mut R,
) -> Option<&'a Advertisement> {
    let eligible = EligibleDeas::new(deas)
        .only_with_disk(criteria.disk)
        .only_meets_needs(criteria.mem, &criteria.stack)
        .only_from_zone(criteria.requested_zone())
        .az_with_fewest_instances_of_app(&criteria.app_id)
        .only_fewest_instances_of_app(&criteria.app_id)
        .upper_half_by_memory();

    trace!(
        app_id = %criteria.app_id,
        candidates = eligible.len(),
        "eligibility filters applied"
    );

    eligible.sample(rng)
}
