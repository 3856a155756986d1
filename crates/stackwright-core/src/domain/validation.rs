//! Input checks that run before any external call.

use std::sync::OnceLock;

use regex::Regex;
use stackwright_state::{EnvironmentStore, StorageError};
use tracing::error;

use super::error::{ProvisionError, Result};

const MAX_NAME_LEN: usize = 255;

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").ok())
        .as_ref()
}

/// Environment names become part of stack and role names.
pub fn validate_environment_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| ProvisionError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("value must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("value must not exceed 255 characters"));
    }
    if !name_pattern().is_some_and(|re| re.is_match(name)) {
        return Err(invalid(
            "value must start with a letter, contain only lower-case letters, numbers, and hyphens",
        ));
    }
    if name.contains("--") {
        return Err(invalid("value must not contain consecutive hyphens"));
    }
    Ok(())
}

/// Fails if `(app, name)` is already recorded. A not-found answer from the
/// store means the name is free.
pub async fn ensure_environment_absent(
    store: &dyn EnvironmentStore,
    app: &str,
    name: &str,
) -> Result<()> {
    match store.get_environment(app, name).await {
        Ok(_) => {
            error!(
                app = %app,
                env = %name,
                "environment already exists; delete it with `stackwright env delete --name {}` before running init again",
                name
            );
            Err(ProvisionError::EnvironmentExists {
                name: name.to_string(),
            })
        }
        Err(StorageError::EnvironmentNotFound { .. }) => Ok(()),
        Err(e) => Err(ProvisionError::Storage(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwright_state::fakes::MemoryConfigStore;
    use stackwright_state::{Application, ApplicationStore, Environment, StorageResult};

    struct UnreachableStore;

    #[async_trait::async_trait]
    impl EnvironmentStore for UnreachableStore {
        async fn create_environment(&self, _env: &Environment) -> StorageResult<()> {
            Err(StorageError::Backend("connection refused".to_string()))
        }

        async fn get_environment(&self, _app: &str, _name: &str) -> StorageResult<Environment> {
            Err(StorageError::Backend("connection refused".to_string()))
        }

        async fn list_environments(&self, _app: &str) -> StorageResult<Vec<Environment>> {
            Err(StorageError::Backend("connection refused".to_string()))
        }

        async fn delete_environment(&self, _app: &str, _name: &str) -> StorageResult<()> {
            Err(StorageError::Backend("connection refused".to_string()))
        }
    }

    #[test]
    fn accepts_simple_names() {
        for name in ["test", "prod-1", "a", "dev2"] {
            assert!(validate_environment_name(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "1test", "Test", "te_st", "te--st", "-test"] {
            assert!(
                matches!(
                    validate_environment_name(name),
                    Err(ProvisionError::InvalidName { .. })
                ),
                "{}",
                name
            );
        }
        assert!(validate_environment_name(&"a".repeat(256)).is_err());
    }

    #[tokio::test]
    async fn duplicate_check_branches_on_not_found() {
        let store = MemoryConfigStore::new();
        store
            .create_application(&Application::new("demo", "111111111111"))
            .await
            .unwrap();
        assert!(ensure_environment_absent(&store, "demo", "test").await.is_ok());

        store
            .create_environment(&Environment {
                app: "demo".to_string(),
                name: "test".to_string(),
                region: "us-west-2".to_string(),
                account_id: "111111111111".to_string(),
                prod: false,
                registry_url: String::new(),
                execution_role_arn: String::new(),
                manager_role_arn: String::new(),
                custom_config: None,
            })
            .await
            .unwrap();
        let err = ensure_environment_absent(&store, "demo", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::EnvironmentExists { ref name } if name == "test"));
    }

    #[tokio::test]
    async fn duplicate_check_surfaces_store_failures() {
        let err = ensure_environment_absent(&UnreachableStore, "demo", "test")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Storage(StorageError::Backend(ref m)) if m == "connection refused"
        ));
    }
}
