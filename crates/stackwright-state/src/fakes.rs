//! In-memory storage for tests and for sandbox runs that record nothing
//!
//! Provides `MemoryConfigStore`, which satisfies the `ApplicationStore` and
//! `EnvironmentStore` contracts without any external dependencies.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{sort_environments, Application, Environment};
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Records {
    apps: BTreeMap<String, Application>,
    envs: HashMap<(String, String), Environment>,
    /// When set, environment writes fail with this message.
    env_write_failure: Option<String>,
}

/// In-memory record store keyed the same way as the persistent backend.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    records: Mutex<Records>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_environment` fail with a backend error.
    pub fn fail_environment_writes(&self, message: impl Into<String>) {
        if let Ok(mut records) = self.records.lock() {
            records.env_write_failure = Some(message.into());
        }
    }

    /// Number of environment records currently stored.
    pub fn environment_count(&self) -> usize {
        self.records.lock().map(|r| r.envs.len()).unwrap_or(0)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|e| StorageError::Backend(format!("store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ApplicationStore for MemoryConfigStore {
    async fn create_application(&self, app: &Application) -> StorageResult<()> {
        let mut records = self.lock()?;
        records
            .apps
            .entry(app.name.clone())
            .or_insert_with(|| app.clone());
        Ok(())
    }

    async fn get_application(&self, name: &str) -> StorageResult<Application> {
        let records = self.lock()?;
        records
            .apps
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::ApplicationNotFound {
                name: name.to_string(),
            })
    }

    async fn list_applications(&self) -> StorageResult<Vec<Application>> {
        let records = self.lock()?;
        Ok(records.apps.values().cloned().collect())
    }

    async fn delete_application(&self, name: &str) -> StorageResult<()> {
        let mut records = self.lock()?;
        records.apps.remove(name);
        records.envs.retain(|(app, _), _| app != name);
        Ok(())
    }
}

#[async_trait]
impl EnvironmentStore for MemoryConfigStore {
    async fn create_environment(&self, env: &Environment) -> StorageResult<()> {
        let mut records = self.lock()?;
        if !records.apps.contains_key(&env.app) {
            return Err(StorageError::ApplicationNotFound {
                name: env.app.clone(),
            });
        }
        if let Some(message) = &records.env_write_failure {
            return Err(StorageError::Backend(message.clone()));
        }
        records
            .envs
            .entry((env.app.clone(), env.name.clone()))
            .or_insert_with(|| env.clone());
        Ok(())
    }

    async fn get_environment(&self, app: &str, name: &str) -> StorageResult<Environment> {
        let records = self.lock()?;
        records
            .envs
            .get(&(app.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::EnvironmentNotFound {
                app: app.to_string(),
                env: name.to_string(),
            })
    }

    async fn list_environments(&self, app: &str) -> StorageResult<Vec<Environment>> {
        let records = self.lock()?;
        let mut envs: Vec<Environment> = records
            .envs
            .values()
            .filter(|e| e.app == app)
            .cloned()
            .collect();
        sort_environments(&mut envs);
        Ok(envs)
    }

    async fn delete_environment(&self, app: &str, name: &str) -> StorageResult<()> {
        let mut records = self.lock()?;
        records.envs.remove(&(app.to_string(), name.to_string()));
        Ok(())
    }
}
