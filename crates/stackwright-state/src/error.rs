//! Error types for stackwright-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the state backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the record store traits.
///
/// Not-found conditions are their own variants so callers can branch on
/// them, e.g. a duplicate check treats `EnvironmentNotFound` as "safe to
/// proceed".
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("couldn't find an application named {name}")]
    ApplicationNotFound { name: String },

    #[error("couldn't find environment {env} in the application {app}")]
    EnvironmentNotFound { app: String, env: String },

    #[error("serialize {what}: {message}")]
    Serialization { what: String, message: String },

    #[error("read configuration for {what}: {message}")]
    Deserialization { what: String, message: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for both application and environment not-found conditions.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ApplicationNotFound { .. } | StorageError::EnvironmentNotFound { .. }
        )
    }
}
