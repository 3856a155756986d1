//! Contracts for the cloud collaborators the workflow drives.
//!
//! Each trait is injected as `Arc<dyn _>` so a scripted double can stand in
//! for the real client. Every call returns [`CloudError`]; idempotent
//! successes arrive as `AlreadyExists` / `StackAlreadyExists` and are
//! interpreted by the caller.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackwright_state::{Application, Environment};
use stackwright_template::PackageFile;

use crate::domain::{CloudError, NetworkCustomization};
use crate::progress::Progress;

/// Environment template version new stacks are created with.
pub const LATEST_ENV_TEMPLATE_VERSION: &str = "v1.0.0";

pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// The principal behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub account: String,
    pub root_user_arn: String,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn caller(&self) -> CloudResult<Caller>;
}

/// Application linkage passed to the environment stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInformation {
    pub name: String,
    pub dns_name: String,
    pub account_principal_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEnvironmentInput {
    pub name: String,
    pub app: AppInformation,
    pub prod: bool,
    pub additional_tags: BTreeMap<String, String>,
    /// Custom resource function name to uploaded object URL.
    pub custom_resources_urls: BTreeMap<String, String>,
    pub network: NetworkCustomization,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddEnvToAppOpts {
    pub app: Application,
    pub env_name: String,
    pub env_region: String,
    pub env_account_id: String,
}

/// Per-region resources owned by the application's stack set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRegionalResources {
    pub region: String,
    pub s3_bucket: String,
}

#[async_trait]
pub trait Deployer: Send + Sync {
    /// Create the environment stack and stream its events to `progress`.
    async fn deploy_and_render_environment(
        &self,
        progress: &dyn Progress,
        input: &CreateEnvironmentInput,
    ) -> CloudResult<()>;

    /// Add the environment's account and region to the application stack set.
    async fn add_env_to_app(&self, opts: &AddEnvToAppOpts) -> CloudResult<()>;

    async fn delegate_dns_permissions(&self, app: &Application, account_id: &str)
        -> CloudResult<()>;

    /// Describe a deployed environment from its stack outputs.
    async fn get_environment(&self, app: &str, name: &str) -> CloudResult<Environment>;

    async fn get_app_resources_by_region(
        &self,
        app: &Application,
        region: &str,
    ) -> CloudResult<AppRegionalResources>;
}

#[async_trait]
pub trait RoleManager: Send + Sync {
    async fn create_ecs_service_linked_role(&self) -> CloudResult<()>;
    async fn list_role_tags(&self, role_name: &str) -> CloudResult<BTreeMap<String, String>>;
    async fn delete_role(&self, role_name: &str) -> CloudResult<()>;
}

#[async_trait]
pub trait StackInspector: Send + Sync {
    async fn stack_exists(&self, stack_name: &str) -> CloudResult<bool>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Compress `files` into one archive, store it under `bucket/key` and
    /// return its URL.
    async fn zip_and_upload(
        &self,
        bucket: &str,
        key: &str,
        files: &[PackageFile],
    ) -> CloudResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vpc {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub name: String,
}

/// Read-only network lookups in the environment's account and region.
#[async_trait]
pub trait NetworkInspector: Send + Sync {
    async fn has_dns_support(&self, vpc_id: &str) -> CloudResult<bool>;
    async fn list_azs(&self) -> CloudResult<Vec<String>>;
    async fn list_vpcs(&self) -> CloudResult<Vec<Vpc>>;
    async fn list_subnets(&self, vpc_id: &str, public: bool) -> CloudResult<Vec<Subnet>>;
}
