pub mod config;
pub mod registry;
pub mod store;

pub use registry::{EtcdRegistry, Registry, RegistryError, RegistryOptions, Service};
pub use store::{KvStore, MemoryStore, StoreError};
