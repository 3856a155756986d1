//! Domain types shared by the resolvers and the provisioning workflow.

pub mod error;
pub mod naming;
pub mod network;
pub mod validation;

pub use error::{CloudError, ProvisionError, Result, UploadError};
pub use naming::{EnvStackNames, APP_TAG_KEY, ENV_TAG_KEY};
pub use network::{
    parse_cidr_list, AdjustVpcFields, Cidr, ImportVpcFields, NetworkCustomization, NetworkFlags,
    DEFAULT_PRIVATE_SUBNET_CIDRS, DEFAULT_PUBLIC_SUBNET_CIDRS, DEFAULT_VPC_CIDR, MIN_AZS,
    MIN_SUBNETS,
};
pub use validation::{ensure_environment_absent, validate_environment_name};
