//! EnvStore - registry of independently addressable backend environments
//!
//! Each environment is one account/region pair with its own credentials
//! reference. The registry is the single source of truth for which backends
//! exist, which of them are active, and which one is the default.
//!
//! # Architecture
//!
//! ```text
//! EnvironmentRegistry ──save/load──▶ dyn EnvironmentStore
//!                                     ├── JsonFileStore  (environments.json)
//!                                     └── MemoryStore    (tests, embedding)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use envstore::{Environment, EnvironmentRegistry, JsonFileStore};
//!
//! let store = Arc::new(JsonFileStore::new("environments.json"));
//! let mut registry = EnvironmentRegistry::open(store);
//! registry.add(Environment::new("prod-eu", "Production EU", "eu-frankfurt-1"))?;
//! registry.set_default("prod-eu")?;
//! ```

mod environment;
mod error;
mod registry;
mod store;

pub use environment::{
    AuthType, DEFAULT_CONFIG_PROFILE, DEFAULT_NAMESPACE, DEFAULT_REGION, Environment, EnvironmentPatch,
    generate_id,
};
pub use error::{RegistryError, StoreError};
pub use registry::{EnvironmentRegistry, RegistrySnapshot};
pub use store::{EnvironmentStore, JsonFileStore, MemoryStore, StoreLock};

/// Id given to the environment created when nothing is configured
pub const BOOTSTRAP_ENVIRONMENT_ID: &str = "default";
