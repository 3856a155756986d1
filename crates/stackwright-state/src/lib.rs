//! Stackwright-State: record persistence for applications and environments
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: durable, idempotent storage of the records the provisioning
//! workflow produces.
//!
//! ## Key Components
//!
//! - `SurrealHandle`: Manages the SurrealDB connection
//! - `Environment` / `Application`: stored record shapes
//! - `EnvironmentStore` / `ApplicationStore`: backend-agnostic traits

mod error;
pub mod fakes;
mod handle;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::SurrealHandle;
pub use schema::{
    application_key, environment_key, sort_environments, AdjustVpc, Application, CustomizeEnv,
    Environment, ImportVpc,
};
pub use storage_traits::{ApplicationStore, ConfigStore, EnvironmentStore, StorageResult};
pub use surreal_store::SurrealConfigStore;

/// Result type for stackwright-state connection operations
pub type Result<T> = std::result::Result<T, StateError>;
