//! Storage trait definitions for Stackwright
//!
//! These traits define the record store abstractions:
//! - `ApplicationStore`: application records
//! - `EnvironmentStore`: environment records keyed by `(app, name)`
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{Application, Environment};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Application record store.
///
/// Semantics:
/// - `create_application` is a no-op when the application already exists.
/// - `get_application` fails with `StorageError::ApplicationNotFound`.
/// - `list_applications` is ordered by name.
/// - `delete_application` succeeds when the record is absent.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn create_application(&self, app: &Application) -> StorageResult<()>;

    async fn get_application(&self, name: &str) -> StorageResult<Application>;

    async fn list_applications(&self) -> StorageResult<Vec<Application>>;

    async fn delete_application(&self, name: &str) -> StorageResult<()>;
}

/// Environment record store.
///
/// Guarantees:
/// - `create_environment` verifies the owning application exists, then
///   writes the record. If a record already exists for `(app, name)` it
///   returns `Ok(())` and leaves the first record untouched (first write wins).
/// - `get_environment` fails with `StorageError::EnvironmentNotFound`.
/// - `list_environments` orders non-production environments first, then
///   alphabetically within each group.
/// - `delete_environment` succeeds when the record is absent.
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    async fn create_environment(&self, env: &Environment) -> StorageResult<()>;

    async fn get_environment(&self, app: &str, name: &str) -> StorageResult<Environment>;

    async fn list_environments(&self, app: &str) -> StorageResult<Vec<Environment>>;

    async fn delete_environment(&self, app: &str, name: &str) -> StorageResult<()>;
}

/// A store holding both record kinds.
pub trait ConfigStore: ApplicationStore + EnvironmentStore {}

impl<T: ApplicationStore + EnvironmentStore> ConfigStore for T {}
