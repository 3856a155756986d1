//! Data handed to workload documents.
//!
//! Everything here is plain data. Per-field invariants (an autoscaling block
//! needs at least one scaling dimension, and so on) are checked by whoever
//! builds the value, not by the composer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Public IP assignment values for awsvpc networking.
pub const ENABLE_PUBLIC_IP: &str = "ENABLED";
pub const DISABLE_PUBLIC_IP: &str = "DISABLED";

/// Subnet placement values.
pub const PUBLIC_SUBNETS_PLACEMENT: &str = "PublicSubnets";
pub const PRIVATE_SUBNETS_PLACEMENT: &str = "PrivateSubnets";

pub const OS_LINUX: &str = "LINUX";
pub const OS_WINDOWS_SERVER_FULL: &str = "WINDOWS_SERVER_2019_FULL";
pub const OS_WINDOWS_SERVER_CORE: &str = "WINDOWS_SERVER_2019_CORE";

pub const ARCH_X86: &str = "X86_64";
pub const ARCH_ARM: &str = "ARM";
pub const ARCH_ARM64: &str = "ARM64";

/// Workload type names as they appear in manifests.
pub const LB_WEB_SERVICE_TYPE: &str = "Load Balanced Web Service";
pub const RD_WEB_SERVICE_TYPE: &str = "Request-Driven Web Service";
pub const BACKEND_SERVICE_TYPE: &str = "Backend Service";
pub const WORKER_SERVICE_TYPE: &str = "Worker Service";
pub const SCHEDULED_JOB_TYPE: &str = "Scheduled Job";

/// Operating systems that pin the Fargate platform version.
const OS_FAMILIES_FOR_PV100: [&str; 2] = [OS_WINDOWS_SERVER_FULL, OS_WINDOWS_SERVER_CORE];

const SNS_ARN_SERVICE: &str = "sns";

/// Optional data that enables features in a workload stack document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadOpts {
    // Common to all workload documents.
    pub variables: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, String>,
    pub aliases: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub nested_stack: Option<NestedStackOpts>,
    pub addons_extra_params: String,
    pub sidecars: Vec<SidecarOpts>,
    pub log_config: Option<LogConfigOpts>,
    pub autoscaling: Option<AutoscalingOpts>,
    pub capacity_providers: Vec<CapacityProviderStrategy>,
    pub desired_count_on_spot: Option<u32>,
    pub storage: Option<StorageOpts>,
    pub network: NetworkOpts,
    pub execute_command: Option<ExecuteCommandOpts>,
    pub platform: RuntimePlatformOpts,
    pub entry_point: Vec<String>,
    pub command: Vec<String>,
    pub domain_alias: String,
    pub docker_labels: BTreeMap<String, String>,
    pub depends_on: BTreeMap<String, String>,
    pub publish: Option<PublishOpts>,
    pub service_discovery_endpoint: String,
    pub http_version: Option<String>,

    // Services.
    pub workload_type: String,
    pub health_check: Option<ContainerHealthCheck>,
    pub http_health_check: HttpHealthCheckOpts,
    pub deregistration_delay: Option<i64>,
    pub allowed_source_ips: Vec<String>,
    pub nlb: Option<NetworkLoadBalancer>,

    // Lambda-backed custom resources.
    pub rule_priority_lambda: String,
    pub desired_count_lambda: String,
    pub env_controller_lambda: String,
    pub credentials_parameter: String,
    pub backlog_per_task_calculator_lambda: String,
    pub nlb_cert_manager_function_lambda: String,

    // Jobs.
    pub schedule_expression: String,
    pub state_machine: Option<StateMachineOpts>,

    // Request-driven web services.
    pub start_command: Option<String>,
    pub enable_health_check: bool,
    pub alias: Option<String>,
    pub script_bucket_name: Option<String>,
    pub custom_domain_lambda: Option<String>,
    pub aws_sdk_layer: Option<String>,
    pub app_dns_delegation_role: Option<String>,
    pub app_dns_name: Option<String>,

    // Worker services.
    pub subscribe: Option<SubscribeOpts>,

    /// Unreleased features switched on for testing.
    pub feature_flags: Vec<String>,
}

/// Outputs of a nested stack such as the addons stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestedStackOpts {
    pub stack_name: String,
    pub variable_outputs: Vec<String>,
    pub secret_outputs: Vec<String>,
    pub policy_outputs: Vec<String>,
    pub security_group_outputs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarOpts {
    pub name: Option<String>,
    pub image: Option<String>,
    pub essential: Option<bool>,
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub creds_param: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, String>,
    pub storage: SidecarStorageOpts,
    pub docker_labels: BTreeMap<String, String>,
    pub depends_on: BTreeMap<String, String>,
    pub entry_point: Vec<String>,
    pub command: Vec<String>,
    pub health_check: Option<ContainerHealthCheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarStorageOpts {
    pub mount_points: Vec<MountPoint>,
}

/// Volumes and mount points for the task definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOpts {
    pub ephemeral: Option<u32>,
    pub volumes: Vec<Volume>,
    pub mount_points: Vec<MountPoint>,
    pub efs_perms: Vec<EfsPermission>,
    /// Set when the platform should create the access point on a managed
    /// filesystem.
    pub managed_volume_info: Option<ManagedVolumeCreationInfo>,
}

impl StorageOpts {
    pub fn requires_efs_creation(&self) -> bool {
        self.managed_volume_info.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfsPermission {
    pub filesystem_id: Option<String>,
    pub write: bool,
    pub access_point_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountPoint {
    pub container_path: Option<String>,
    pub read_only: Option<bool>,
    pub source_volume: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub name: Option<String>,
    pub efs: Option<EfsVolumeConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedVolumeCreationInfo {
    pub name: Option<String>,
    pub dir_name: Option<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

/// An externally managed filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfsVolumeConfiguration {
    pub filesystem: Option<String>,
    /// "/" and empty are equivalent.
    pub root_directory: Option<String>,
    pub access_point_id: Option<String>,
    /// ENABLED or DISABLED
    pub iam: Option<String>,
}

/// Firelens log routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfigOpts {
    pub image: Option<String>,
    pub destination: BTreeMap<String, String>,
    pub enable_metadata: Option<String>,
    pub secret_options: BTreeMap<String, String>,
    pub config_file: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpHealthCheckOpts {
    pub health_check_path: String,
    pub success_codes: String,
    pub healthy_threshold: Option<i64>,
    pub unhealthy_threshold: Option<i64>,
    pub interval: Option<i64>,
    pub timeout: Option<i64>,
    pub deregistration_delay: Option<i64>,
    pub grace_period: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkLoadBalancerListener {
    pub port: String,
    pub protocol: String,
    pub target_container: String,
    pub target_port: String,
    pub ssl_policy: Option<String>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkLoadBalancer {
    pub public_subnet_cidrs: Vec<String>,
    pub listener: NetworkLoadBalancerListener,
    pub main_container_port: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerHealthCheck {
    pub command: Vec<String>,
    pub interval: Option<i64>,
    pub retries: Option<i64>,
    pub start_period: Option<i64>,
    pub timeout: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityProviderStrategy {
    pub base: Option<u32>,
    pub weight: Option<u32>,
    pub capacity_provider: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalingOpts {
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub requests: Option<f64>,
    pub response_time: Option<f64>,
    pub queue_delay: Option<AutoscalingQueueDelayOpts>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalingQueueDelayOpts {
    pub acceptable_backlog_per_task: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteCommandOpts {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachineOpts {
    pub timeout: Option<u32>,
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOpts {
    pub topics: Vec<Topic>,
}

/// An SNS topic published by a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topic {
    pub name: Option<String>,
    pub region: String,
    pub partition: String,
    pub account_id: String,
    pub app: String,
    pub env: String,
    pub svc: String,
}

impl Topic {
    pub fn arn(&self) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}-{}-{}-{}",
            self.partition,
            SNS_ARN_SERVICE,
            self.region,
            self.account_id,
            self.app,
            self.env,
            self.svc,
            self.name.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeOpts {
    pub topics: Vec<TopicSubscription>,
    pub queue: Option<SqsQueue>,
}

impl SubscribeOpts {
    /// True if any individual subscription has a dedicated queue.
    pub fn has_topic_queues(&self) -> bool {
        self.topics.iter().any(|t| t.queue.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSubscription {
    pub name: Option<String>,
    pub service: Option<String>,
    pub queue: Option<SqsQueue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqsQueue {
    pub retention: Option<i64>,
    pub delay: Option<i64>,
    pub timeout: Option<i64>,
    pub dead_letter: Option<DeadLetterQueue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadLetterQueue {
    pub tries: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOpts {
    pub assign_public_ip: String,
    pub subnets_type: String,
    pub security_groups: Vec<String>,
}

/// Operating system and CPU architecture for the task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimePlatformOpts {
    pub os: String,
    pub arch: String,
}

impl RuntimePlatformOpts {
    /// True when the platform matches the default image platform linux/amd64
    /// and no override needs to be rendered.
    pub fn is_default(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        self.os == OS_LINUX && self.arch == ARCH_X86
    }

    /// Fargate platform version for the selected OS family.
    pub fn version(&self) -> &'static str {
        if OS_FAMILIES_FOR_PV100.contains(&self.os.as_str()) {
            "1.0.0"
        } else {
            "LATEST"
        }
    }

    fn is_empty(&self) -> bool {
        self.os.is_empty() && self.arch.is_empty()
    }
}

/// Serialized form of the platform with its derived values, so documents
/// can branch on them without calling back into Rust.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PlatformView<'a> {
    pub os: &'a str,
    pub arch: &'a str,
    pub is_default: bool,
    pub version: &'static str,
}

impl<'a> From<&'a RuntimePlatformOpts> for PlatformView<'a> {
    fn from(p: &'a RuntimePlatformOpts) -> Self {
        Self {
            os: &p.os,
            arch: &p.arch,
            is_default: p.is_default(),
            version: p.version(),
        }
    }
}
