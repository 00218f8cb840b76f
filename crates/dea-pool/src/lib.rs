//! dea-pool — the live set of DEA advertisements and placement.
//!
//! Tracks execution hosts from their `dea.advertise` / `dea.shutdown`
//! broadcasts and picks a host for each new application instance.
//!
//! # Architecture
//!
//! ```text
//! MessageBus
//!   ├── dea.advertise → decode → DeaPool::process_advertise_message
//!   └── dea.shutdown  → decode → DeaPool::process_shutdown_message
//!
//! DeaPool (one Mutex over the whole advertisement list)
//!   ├── find_dea(criteria) → prune stale → filter chain → sample
//!   ├── mark_app_started / reserve_app_memory
//!   └── get_active_deas / get_dea_zones / get_dea_availability_zones
//! ```
//!
//! Stale advertisements are pruned lazily, only when a caller asks to
//! place work or list hosts. There is no background sweeper.

pub mod bus;
pub mod error;
pub mod pool;

pub use bus::{InMemoryBus, MessageBus, MessageHandler};
pub use error::{PoolError, PoolResult};
pub use pool::{DeaPool, ZoneMap};
