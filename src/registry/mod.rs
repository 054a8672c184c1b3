//! Registry module
//!
//! This module contains the service registry adapter split into logical components:
//! - `types`: Service record, options and key layout
//! - `error`: Registry error type
//! - `traits`: `Registry` and `Watcher` abstractions
//! - `etcd`: Registry implementation over a coordination store
//! - `watcher`: Watcher turning store events into service events

pub mod error;
pub mod etcd;
pub mod traits;
pub mod types;
pub mod watcher;

// Re-export public types for easier access
pub use error::RegistryError;
pub use etcd::{ETCD_REGISTRY_TYPE, EtcdRegistry};
pub use traits::{Registry, Watcher};
pub use types::{
    DEFAULT_PREFIX, DEFAULT_TTL, RegistryOptions, Service, ServiceAction, ServiceEvent,
    ServiceListing, ServiceOption, service_key,
};
pub use watcher::EtcdWatcher;
