pub mod config;
pub mod message;

pub use config::{Config, LogFormat, LoggingConfig, PoolConfig};
pub use message::{
    ADVERTISE_SUBJECT, AdvertiseMessage, DEFAULT_ZONE, MessageError, PlacementProperties,
    SHUTDOWN_SUBJECT, ShutdownMessage,
};
