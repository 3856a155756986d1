//! Stackwright Core Library
//!
//! Provisions application environments: resolves credentials and network
//! configuration, uploads the environment's helper functions, deploys the
//! environment stack and records the result.

pub mod cloud;
pub mod domain;
pub mod metrics;
pub mod obs;
pub mod progress;
pub mod prompt;
pub mod provision;
pub mod sandbox;
pub mod session;
pub mod telemetry;
pub mod uploader;
pub mod vpc;

pub use cloud::{
    AddEnvToAppOpts, AppInformation, AppRegionalResources, Caller, CloudResult,
    CreateEnvironmentInput, Deployer, IdentityService, NetworkInspector, ObjectStorage,
    RoleManager, StackInspector, Subnet, Vpc, LATEST_ENV_TEMPLATE_VERSION,
};

pub use domain::{
    ensure_environment_absent, validate_environment_name, AdjustVpcFields, Cidr, CloudError,
    EnvStackNames, ImportVpcFields, NetworkCustomization, NetworkFlags, ProvisionError, Result,
    UploadError,
};

pub use metrics::METRICS;
pub use progress::{Progress, ProgressEvent, ProgressStatus, RecordingProgress, TerminalProgress};
pub use prompt::Prompter;
pub use provision::{
    Advisory, ProvisionDeps, ProvisionOutcome, ProvisionRequest, Provisioner, RoleCleanup,
};
pub use session::{
    CredentialFlags, CredentialSource, CredsSelector, ProfileCredsSelector, Session,
    SessionProvider, SessionResolver, DEFAULT_REGION,
};
pub use telemetry::init_tracing;
pub use uploader::{BucketUpload, CompressAndUpload, CustomResourceUploader};
pub use vpc::{VpcResolution, VpcResolver, VpcSelector};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
