//! Resolves the network configuration for a new environment.
//!
//! Flags that were given are never asked for again, and a VPC whose DNS
//! support was already confirmed is not checked twice, so resolving fully
//! populated fields makes no prompts and no network calls.

use std::sync::Arc;

use tracing::{error, warn};

use crate::cloud::NetworkInspector;
use crate::domain::{
    parse_cidr_list, AdjustVpcFields, CloudError, ImportVpcFields, NetworkCustomization,
    NetworkFlags, ProvisionError, Result, DEFAULT_PRIVATE_SUBNET_CIDRS,
    DEFAULT_PUBLIC_SUBNET_CIDRS, DEFAULT_VPC_CIDR, MIN_AZS, MIN_SUBNETS,
};
use crate::prompt::Prompter;

pub const DEFAULT_CONFIG_OPTION: &str = "Yes, use default.";
pub const ADJUST_RESOURCES_OPTION: &str =
    "Yes, but I'd like configure the default resources (CIDR ranges, AZs).";
pub const IMPORT_RESOURCES_OPTION: &str =
    "No, I'd like to import existing resources (VPC, subnets).";

const DEFAULT_CONFIG_PROMPT: &str = "Would you like to use the default configuration for a new environment?";
const VPC_SELECT_PROMPT: &str = "Which VPC would you like to use?";
const PUBLIC_SUBNETS_PROMPT: &str = "Which public subnets would you like to use?\nYou may press 'Enter' to skip this step if the services and/or jobs you'll deploy to this environment are not internet-facing.";
const PRIVATE_SUBNETS_PROMPT: &str = "Which private subnets would you like to use?";
const VPC_CIDR_PROMPT: &str = "What VPC CIDR would you like to use?";
const VPC_CIDR_HELP: &str = "CIDR used for your VPC. For example: 10.1.0.0/16";
const AZ_PROMPT: &str = "Which availability zones would you like to use?";
const AZ_HELP: &str = "Availability zone names that span your resources. For example: us-east-1a,us-east-1b,us-east-1c";
const PUBLIC_CIDR_PROMPT: &str = "What CIDR would you like to use for your public subnets?";
const PUBLIC_CIDR_HELP: &str = "CIDRs used for your public subnets. For example: 10.1.0.0/24,10.1.1.0/24";
const PRIVATE_CIDR_PROMPT: &str = "What CIDR would you like to use for your private subnets?";
const PRIVATE_CIDR_HELP: &str = "CIDRs used for your private subnets. For example: 10.1.2.0/24,10.1.3.0/24";

/// Picks a VPC and its subnets from what the account actually has.
pub struct VpcSelector {
    prompt: Arc<dyn Prompter>,
    network: Arc<dyn NetworkInspector>,
}

impl VpcSelector {
    pub fn new(prompt: Arc<dyn Prompter>, network: Arc<dyn NetworkInspector>) -> Self {
        Self { prompt, network }
    }

    /// `VpcNotFound` when the account has none.
    pub async fn vpc(&self, message: &str) -> Result<String> {
        let vpcs = self
            .network
            .list_vpcs()
            .await
            .map_err(|e| ProvisionError::cloud("list VPCs", e))?;
        if vpcs.is_empty() {
            return Err(ProvisionError::VpcNotFound);
        }
        let options: Vec<String> = vpcs.iter().map(|v| describe(&v.id, &v.name)).collect();
        let choice = self.prompt.select_one(message, "", &options)?;
        Ok(strip_description(&choice))
    }

    /// `SubnetsNotFound` when the VPC has none of the requested kind.
    pub async fn subnets(&self, message: &str, vpc_id: &str, public: bool) -> Result<Vec<String>> {
        let subnets = self
            .network
            .list_subnets(vpc_id, public)
            .await
            .map_err(|e| ProvisionError::cloud(format!("list subnets of VPC {}", vpc_id), e))?;
        if subnets.is_empty() {
            return Err(ProvisionError::SubnetsNotFound {
                vpc_id: vpc_id.to_string(),
            });
        }
        let options: Vec<String> = subnets.iter().map(|s| describe(&s.id, &s.name)).collect();
        let chosen = self.prompt.multi_select(message, "", &options, &[])?;
        Ok(chosen.iter().map(|c| strip_description(c)).collect())
    }
}

fn describe(id: &str, name: &str) -> String {
    if name.is_empty() {
        id.to_string()
    } else {
        format!("{} ({})", id, name)
    }
}

fn strip_description(choice: &str) -> String {
    choice
        .split_once(' ')
        .map_or(choice, |(id, _)| id)
        .to_string()
}

/// Network configuration plus anything the user should know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcResolution {
    pub customization: NetworkCustomization,
    pub warnings: Vec<String>,
}

pub struct VpcResolver {
    prompt: Arc<dyn Prompter>,
    selector: VpcSelector,
    network: Arc<dyn NetworkInspector>,
    region: String,
}

impl VpcResolver {
    pub fn new(
        prompt: Arc<dyn Prompter>,
        network: Arc<dyn NetworkInspector>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            selector: VpcSelector::new(prompt.clone(), network.clone()),
            prompt,
            network,
            region: region.into(),
        }
    }

    /// Validate `flags`, ask for whatever is missing and fill it in place.
    pub async fn resolve(&self, flags: &mut NetworkFlags) -> Result<VpcResolution> {
        flags.validate()?;
        if flags.default_config {
            return Ok(defaults());
        }
        if flags.import.is_set() {
            return self.resolve_import(&mut flags.import).await;
        }
        if flags.adjust.is_set() {
            return self.resolve_adjust(&mut flags.adjust).await;
        }

        let options = [
            DEFAULT_CONFIG_OPTION,
            ADJUST_RESOURCES_OPTION,
            IMPORT_RESOURCES_OPTION,
        ]
        .map(String::from);
        let choice = self.prompt.select_one(DEFAULT_CONFIG_PROMPT, "", &options)?;
        match choice.as_str() {
            IMPORT_RESOURCES_OPTION => self.resolve_import(&mut flags.import).await,
            ADJUST_RESOURCES_OPTION => self.resolve_adjust(&mut flags.adjust).await,
            _ => {
                flags.default_config = true;
                Ok(defaults())
            }
        }
    }

    pub async fn resolve_import(&self, fields: &mut ImportVpcFields) -> Result<VpcResolution> {
        let mut warnings = Vec::new();

        let vpc_id = match &fields.id {
            Some(id) => id.clone(),
            None => {
                let id = self.selector.vpc(VPC_SELECT_PROMPT).await.inspect_err(|e| {
                    if matches!(e, ProvisionError::VpcNotFound) {
                        error!("No existing VPCs were found. Create a VPC first and import it, or use the default environment configuration.");
                    }
                })?;
                fields.id = Some(id.clone());
                id
            }
        };

        if !fields.dns_verified {
            let dns = self.network.has_dns_support(&vpc_id).await.map_err(|e| {
                ProvisionError::cloud(format!("check if VPC {} has DNS support enabled", vpc_id), e)
            })?;
            if !dns {
                error!(vpc_id = %vpc_id, "services and jobs cannot run in a VPC without DNS support; enable DNS support on the VPC first");
                return Err(ProvisionError::NoDnsSupport { vpc_id });
            }
            fields.dns_verified = true;
        }

        if fields.public_subnet_ids.is_none() {
            let public = match self
                .selector
                .subnets(PUBLIC_SUBNETS_PROMPT, &vpc_id, true)
                .await
            {
                Ok(ids) => ids,
                Err(ProvisionError::SubnetsNotFound { .. }) => {
                    let msg = format!(
                        "No existing public subnets were found in VPC {}. Without at least two public subnets, Load Balanced Web Services cannot be deployed in this environment.",
                        vpc_id
                    );
                    warn!("{}", msg);
                    warnings.push(msg);
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            if public.len() == 1 {
                return Err(ProvisionError::InsufficientSubnets {
                    kind: "public",
                    min: MIN_SUBNETS,
                });
            }
            fields.public_subnet_ids = Some(public);
        }

        if fields.private_subnet_ids.is_none() {
            let private = self
                .selector
                .subnets(PRIVATE_SUBNETS_PROMPT, &vpc_id, false)
                .await
                .inspect_err(|e| {
                    if matches!(e, ProvisionError::SubnetsNotFound { .. }) {
                        error!(vpc_id = %vpc_id, "No existing private subnets were found. Create private subnets first and import them, or use the default environment configuration.");
                    }
                })?;
            if private.len() < MIN_SUBNETS {
                return Err(ProvisionError::InsufficientSubnets {
                    kind: "private",
                    min: MIN_SUBNETS,
                });
            }
            fields.private_subnet_ids = Some(private);
        }

        Ok(VpcResolution {
            customization: NetworkCustomization::from_import(fields)?,
            warnings,
        })
    }

    pub async fn resolve_adjust(&self, fields: &mut AdjustVpcFields) -> Result<VpcResolution> {
        if fields.cidr.is_none() {
            let input = self
                .prompt
                .get(VPC_CIDR_PROMPT, VPC_CIDR_HELP, Some(DEFAULT_VPC_CIDR))?;
            fields.cidr = Some(input.parse()?);
        }

        if fields.azs.is_none() {
            fields.azs = Some(self.ask_azs().await?);
        }

        if fields.public_subnet_cidrs.is_none() {
            let input = self.prompt.get(
                PUBLIC_CIDR_PROMPT,
                PUBLIC_CIDR_HELP,
                Some(DEFAULT_PUBLIC_SUBNET_CIDRS),
            )?;
            fields.public_subnet_cidrs = Some(parse_cidr_list(&input)?);
        }

        if fields.private_subnet_cidrs.is_none() {
            let input = self.prompt.get(
                PRIVATE_CIDR_PROMPT,
                PRIVATE_CIDR_HELP,
                Some(DEFAULT_PRIVATE_SUBNET_CIDRS),
            )?;
            fields.private_subnet_cidrs = Some(parse_cidr_list(&input)?);
        }

        fields.check_sizes()?;
        Ok(VpcResolution {
            customization: NetworkCustomization::from_adjust(fields)?,
            warnings: Vec::new(),
        })
    }

    async fn ask_azs(&self) -> Result<Vec<String>> {
        let zones = self.network.list_azs().await.map_err(|e: CloudError| {
            ProvisionError::cloud(
                format!("list availability zones for region {}", self.region),
                e,
            )
        })?;
        if zones.len() < MIN_AZS {
            return Err(ProvisionError::InsufficientZones {
                min: MIN_AZS,
                available: zones.join(", "),
                region: self.region.clone(),
            });
        }
        let defaults: Vec<String> = zones.iter().take(MIN_AZS).cloned().collect();
        let selected = self
            .prompt
            .multi_select(AZ_PROMPT, AZ_HELP, &zones, &defaults)?;
        if selected.len() < MIN_AZS {
            return Err(ProvisionError::config(format!(
                "select availability zones: at least {} availability zones must be selected",
                MIN_AZS
            )));
        }
        Ok(selected)
    }
}

fn defaults() -> VpcResolution {
    VpcResolution {
        customization: NetworkCustomization::Default,
        warnings: Vec::new(),
    }
}
