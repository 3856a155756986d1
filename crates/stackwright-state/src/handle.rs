//! SurrealDB Handle - Connection and Operations
//!
//! Manages the connection and provides record operations for applications
//! and environments. Supports in-memory and embedded on-disk stores, or any
//! URL the `any` engine accepts.

use std::path::Path;

use crate::error::{StateError, StorageError};
use crate::schema::{
    application_key, environment_key, sort_environments, Application, Environment,
};
use crate::storage_traits::StorageResult;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

const DEFAULT_NAMESPACE: &str = "stackwright";
const DEFAULT_DATABASE: &str = "main";

/// SurrealDB connection handle for Stackwright records
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

/// Stored row. The record itself is kept as a JSON document so the stored
/// field names stay exactly those of the serde model.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbRecordRow {
    key: String,
    app: String,
    name: String,
    prod: bool,
    document: String,
    created_at: SurrealDatetime,
}

fn encode<T: Serialize>(what: &str, value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        what: what.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: for<'de> Deserialize<'de>>(what: &str, row: &DbRecordRow) -> StorageResult<T> {
    serde_json::from_str(&row.document).map_err(|e| StorageError::Deserialization {
        what: what.to_string(),
        message: e.to_string(),
    })
}

fn backend(e: surrealdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect_url("mem://").await
    }

    /// Open an embedded on-disk database under `path`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn setup_local(path: &Path) -> Result<Self> {
        info!("Opening local SurrealKV store");
        Self::connect_url(&format!("surrealkv://{}", path.display())).await
    }

    async fn connect_url(url: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(DEFAULT_NAMESPACE)
            .use_db(DEFAULT_DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;
        Ok(handle)
    }

    /// Open the store named by `SURREALDB_URL`, falling back to the local
    /// store at `local_path`.
    #[instrument(skip_all)]
    pub async fn setup_from_env(local_path: &Path) -> Result<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            info!("SURREALDB_URL found, connecting to {}", url);
            return Self::connect_url(&url).await;
        }

        Self::setup_local(local_path).await
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("Initializing Stackwright schema");

        let schema = r#"
            DEFINE TABLE IF NOT EXISTS applications SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS key ON applications TYPE string;
            DEFINE FIELD IF NOT EXISTS app ON applications TYPE string;
            DEFINE FIELD IF NOT EXISTS name ON applications TYPE string;
            DEFINE FIELD IF NOT EXISTS prod ON applications TYPE bool;
            DEFINE FIELD IF NOT EXISTS document ON applications TYPE string;
            DEFINE FIELD IF NOT EXISTS created_at ON applications TYPE datetime;

            DEFINE TABLE IF NOT EXISTS environments SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS key ON environments TYPE string;
            DEFINE FIELD IF NOT EXISTS app ON environments TYPE string;
            DEFINE FIELD IF NOT EXISTS name ON environments TYPE string;
            DEFINE FIELD IF NOT EXISTS prod ON environments TYPE bool;
            DEFINE FIELD IF NOT EXISTS document ON environments TYPE string;
            DEFINE FIELD IF NOT EXISTS created_at ON environments TYPE datetime;
            DEFINE INDEX IF NOT EXISTS idx_environment_app ON environments FIELDS app;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    // ========== Application Operations ==========

    #[instrument(skip(self, app), fields(app = %app.name))]
    pub async fn create_application(&self, app: &Application) -> StorageResult<()> {
        let key = application_key(&app.name);
        let existing: Option<DbRecordRow> = self
            .db
            .select(("applications", key.clone()))
            .await
            .map_err(backend)?;
        if existing.is_some() {
            debug!("application already exists");
            return Ok(());
        }

        let row = DbRecordRow {
            key: key.clone(),
            app: app.name.clone(),
            name: app.name.clone(),
            prod: false,
            document: encode("application", app)?,
            created_at: SurrealDatetime::from(Utc::now()),
        };
        let _: Option<DbRecordRow> = self
            .db
            .create(("applications", key))
            .content(row)
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_application(&self, name: &str) -> StorageResult<Application> {
        let row: Option<DbRecordRow> = self
            .db
            .select(("applications", application_key(name)))
            .await
            .map_err(backend)?;
        match row {
            Some(row) => decode(&format!("application {}", name), &row),
            None => Err(StorageError::ApplicationNotFound {
                name: name.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_applications(&self) -> StorageResult<Vec<Application>> {
        let mut result = self
            .db
            .query("SELECT * FROM applications ORDER BY name ASC")
            .await
            .map_err(backend)?;
        let rows: Vec<DbRecordRow> = result.take(0).map_err(backend)?;
        rows.iter()
            .map(|row| decode(&format!("application {}", row.name), row))
            .collect()
    }

    /// Delete an application and every environment record under it.
    #[instrument(skip(self))]
    pub async fn delete_application(&self, name: &str) -> StorageResult<()> {
        self.db
            .query("DELETE environments WHERE app = $app")
            .bind(("app", name.to_string()))
            .await
            .map_err(backend)?;
        let _: Option<DbRecordRow> = self
            .db
            .delete(("applications", application_key(name)))
            .await
            .map_err(backend)?;
        Ok(())
    }

    // ========== Environment Operations ==========

    #[instrument(skip(self, env), fields(app = %env.app, env = %env.name))]
    pub async fn create_environment(&self, env: &Environment) -> StorageResult<()> {
        self.get_application(&env.app).await?;

        let key = environment_key(&env.app, &env.name);
        let existing: Option<DbRecordRow> = self
            .db
            .select(("environments", key.clone()))
            .await
            .map_err(backend)?;
        if existing.is_some() {
            debug!("environment already exists, keeping first record");
            return Ok(());
        }

        let row = DbRecordRow {
            key: key.clone(),
            app: env.app.clone(),
            name: env.name.clone(),
            prod: env.prod,
            document: encode(&format!("environment {}", env.name), env)?,
            created_at: SurrealDatetime::from(Utc::now()),
        };
        let _: Option<DbRecordRow> = self
            .db
            .create(("environments", key))
            .content(row)
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_environment(&self, app: &str, name: &str) -> StorageResult<Environment> {
        let row: Option<DbRecordRow> = self
            .db
            .select(("environments", environment_key(app, name)))
            .await
            .map_err(backend)?;
        match row {
            Some(row) => decode(&format!("environment {}", name), &row),
            None => Err(StorageError::EnvironmentNotFound {
                app: app.to_string(),
                env: name.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_environments(&self, app: &str) -> StorageResult<Vec<Environment>> {
        let mut result = self
            .db
            .query("SELECT * FROM environments WHERE app = $app")
            .bind(("app", app.to_string()))
            .await
            .map_err(backend)?;
        let rows: Vec<DbRecordRow> = result.take(0).map_err(backend)?;
        let mut envs = rows
            .iter()
            .map(|row| decode(&format!("environment {}", row.name), row))
            .collect::<StorageResult<Vec<Environment>>>()?;
        sort_environments(&mut envs);
        Ok(envs)
    }

    #[instrument(skip(self))]
    pub async fn delete_environment(&self, app: &str, name: &str) -> StorageResult<()> {
        let _: Option<DbRecordRow> = self
            .db
            .delete(("environments", environment_key(app, name)))
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_surreal_connection_and_schema_creation() {
        let handle = SurrealHandle::setup_db().await;
        assert!(handle.is_ok(), "failed to connect: {:?}", handle.err());
    }

    #[tokio::test]
    async fn test_local_store_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");

        {
            let handle = SurrealHandle::setup_local(&path).await.unwrap();
            handle
                .create_application(&Application::new("demo", "111111111111"))
                .await
                .unwrap();
        }

        let handle = SurrealHandle::setup_local(&path).await.unwrap();
        let app = handle.get_application("demo").await.unwrap();
        assert_eq!(app.account_id, "111111111111");
    }
}
