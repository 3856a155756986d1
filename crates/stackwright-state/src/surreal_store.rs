use std::sync::Arc;

use async_trait::async_trait;

use crate::schema::{Application, Environment};
use crate::storage_traits::{ApplicationStore, EnvironmentStore, StorageResult};
use crate::SurrealHandle;

/// SurrealDB-backed implementation of the record store traits.
#[derive(Clone)]
pub struct SurrealConfigStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealConfigStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl ApplicationStore for SurrealConfigStore {
    async fn create_application(&self, app: &Application) -> StorageResult<()> {
        self.handle.create_application(app).await
    }

    async fn get_application(&self, name: &str) -> StorageResult<Application> {
        self.handle.get_application(name).await
    }

    async fn list_applications(&self) -> StorageResult<Vec<Application>> {
        self.handle.list_applications().await
    }

    async fn delete_application(&self, name: &str) -> StorageResult<()> {
        self.handle.delete_application(name).await
    }
}

#[async_trait]
impl EnvironmentStore for SurrealConfigStore {
    async fn create_environment(&self, env: &Environment) -> StorageResult<()> {
        self.handle.create_environment(env).await
    }

    async fn get_environment(&self, app: &str, name: &str) -> StorageResult<Environment> {
        self.handle.get_environment(app, name).await
    }

    async fn list_environments(&self, app: &str) -> StorageResult<Vec<Environment>> {
        self.handle.list_environments(app).await
    }

    async fn delete_environment(&self, app: &str, name: &str) -> StorageResult<()> {
        self.handle.delete_environment(app, name).await
    }
}
