//! Domain-level error taxonomy for provisioning.

use stackwright_state::StorageError;
use stackwright_template::TemplateError;

use crate::provision::RoleCleanup;

/// Errors reported by external cloud collaborators.
///
/// `AlreadyExists` and `StackAlreadyExists` carry idempotent-success
/// signals; callers decide whether to suppress them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    #[error("stack {stack_name} already exists")]
    StackAlreadyExists { stack_name: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{operation}: {message}")]
    Api { operation: String, message: String },
}

impl CloudError {
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}

/// Errors packaging or storing custom resource functions.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("package custom resources: {0}")]
    Package(#[from] TemplateError),

    #[error("upload {name}: {source}")]
    Store {
        name: String,
        #[source]
        source: CloudError,
    },
}

/// Errors produced while resolving, validating or provisioning an
/// environment.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid environment name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid CIDR {value:?}: {reason}")]
    InvalidCidr { value: String, reason: String },

    #[error("environment {name} already exists")]
    EnvironmentExists { name: String },

    #[error("no existing VPCs were found")]
    VpcNotFound,

    #[error("no existing subnets were found in VPC {vpc_id}")]
    SubnetsNotFound { vpc_id: String },

    #[error("VPC {vpc_id} has no DNS support enabled")]
    NoDnsSupport { vpc_id: String },

    #[error("select {kind} subnets: at least {min} {kind} subnets must be selected")]
    InsufficientSubnets { kind: &'static str, min: usize },

    #[error("requires at least {min} availability zones ({available}) in region {region}")]
    InsufficientZones {
        min: usize,
        available: String,
        region: String,
    },

    #[error("prompt: {0}")]
    Prompt(String),

    #[error("{context}: {source}")]
    Cloud {
        context: String,
        #[source]
        source: CloudError,
    },

    #[error("upload custom resources to bucket {bucket}: {source}")]
    Upload {
        bucket: String,
        #[source]
        source: UploadError,
    },

    #[error("deploy env {env} to application {app}: {source}")]
    StackSet {
        app: String,
        env: String,
        #[source]
        source: CloudError,
    },

    #[error("deploy environment stack {stack_name}: {source}")]
    Deploy {
        stack_name: String,
        #[source]
        source: CloudError,
        /// Roles removed (or left alone) after the failed create.
        role_cleanups: Vec<RoleCleanup>,
    },

    #[error("store environment: {0}")]
    Store(#[source] StorageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl ProvisionError {
    /// Wrap a collaborator failure with what was being attempted.
    pub fn cloud(context: impl Into<String>, source: CloudError) -> Self {
        Self::Cloud {
            context: context.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_error_display() {
        let err = CloudError::StackAlreadyExists {
            stack_name: "demo-test".to_string(),
        };
        assert_eq!(err.to_string(), "stack demo-test already exists");

        let err = CloudError::api("CreateRole", "access denied");
        assert_eq!(err.to_string(), "CreateRole: access denied");
        assert!(!err.is_not_found());
    }

    #[test]
    fn upload_error_names_bucket() {
        let err = ProvisionError::Upload {
            bucket: "demo-us-west-2-bucket".to_string(),
            source: UploadError::Store {
                name: "DNSDelegationFunction".to_string(),
                source: CloudError::api("PutObject", "timeout"),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("demo-us-west-2-bucket"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn zone_error_names_minimum() {
        let err = ProvisionError::InsufficientZones {
            min: 2,
            available: "us-west-2a".to_string(),
            region: "us-west-2".to_string(),
        };
        assert!(err.to_string().contains("at least 2 availability zones"));
    }

    #[test]
    fn storage_not_found_passes_through() {
        let err: ProvisionError = StorageError::ApplicationNotFound {
            name: "demo".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "couldn't find an application named demo");
    }
}
