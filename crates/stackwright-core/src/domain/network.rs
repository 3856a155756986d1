//! Network customization for a new environment.
//!
//! User input arrives as three independently optional flag groups. It is
//! validated once into [`NetworkCustomization`], which holds exactly one of
//! default, import or adjust.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use stackwright_state::{AdjustVpc, CustomizeEnv, ImportVpc};

use super::error::{ProvisionError, Result};

pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_PUBLIC_SUBNET_CIDRS: &str = "10.0.0.0/24,10.0.1.0/24";
pub const DEFAULT_PRIVATE_SUBNET_CIDRS: &str = "10.0.2.0/24,10.0.3.0/24";

/// Minimum availability zones an environment spans.
pub const MIN_AZS: usize = 2;
/// Minimum subnets of one kind an imported VPC must contribute.
pub const MIN_SUBNETS: usize = 2;

/// An IPv4 block, normalised to its network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl FromStr for Cidr {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| ProvisionError::InvalidCidr {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(|| invalid("missing prefix length"))?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid("not an IPv4 address"))?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid("prefix length is not a number"))?;
        if prefix > 32 {
            return Err(invalid("prefix length must be at most 32"));
        }
        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        };
        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask),
            prefix,
        })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Parse a comma-separated CIDR list such as `10.0.0.0/24,10.0.1.0/24`.
pub fn parse_cidr_list(s: &str) -> Result<Vec<Cidr>> {
    s.split(',').map(str::parse).collect()
}

/// Import flags as given. `None` means "not given, ask".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportVpcFields {
    pub id: Option<String>,
    pub public_subnet_ids: Option<Vec<String>>,
    pub private_subnet_ids: Option<Vec<String>>,
    pub(crate) dns_verified: bool,
}

impl ImportVpcFields {
    /// Fields as given on the command line. DNS support is always rechecked.
    pub fn new(
        id: Option<String>,
        public_subnet_ids: Option<Vec<String>>,
        private_subnet_ids: Option<Vec<String>>,
    ) -> Self {
        Self {
            id,
            public_subnet_ids,
            private_subnet_ids,
            dns_verified: false,
        }
    }

    pub fn is_set(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
            || self.public_subnet_ids.as_ref().is_some_and(|s| !s.is_empty())
            || self.private_subnet_ids.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// True once the VPC's DNS support has been confirmed.
    pub fn dns_verified(&self) -> bool {
        self.dns_verified
    }

    fn complete(&self) -> Option<ImportVpc> {
        Some(ImportVpc {
            id: self.id.clone()?,
            public_subnet_ids: self.public_subnet_ids.clone()?,
            private_subnet_ids: self.private_subnet_ids.clone()?,
        })
    }
}

/// Adjust flags as given. `None` means "not given, ask".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjustVpcFields {
    pub cidr: Option<Cidr>,
    pub azs: Option<Vec<String>>,
    pub public_subnet_cidrs: Option<Vec<Cidr>>,
    pub private_subnet_cidrs: Option<Vec<Cidr>>,
}

impl AdjustVpcFields {
    pub fn is_set(&self) -> bool {
        self.cidr.is_some()
            || self.azs.as_ref().is_some_and(|s| !s.is_empty())
            || self.public_subnet_cidrs.as_ref().is_some_and(|s| !s.is_empty())
            || self.private_subnet_cidrs.as_ref().is_some_and(|s| !s.is_empty())
    }

    fn complete(&self) -> Option<AdjustVpc> {
        let render = |cidrs: &[Cidr]| cidrs.iter().map(Cidr::to_string).collect();
        Some(AdjustVpc {
            cidr: self.cidr?.to_string(),
            azs: self.azs.clone()?,
            public_subnet_cidrs: render(self.public_subnet_cidrs.as_deref()?),
            private_subnet_cidrs: render(self.private_subnet_cidrs.as_deref()?),
        })
    }

    /// Subnet lists, where given, must match the zone count.
    pub(crate) fn check_sizes(&self) -> Result<()> {
        let Some(azs) = &self.azs else {
            return Ok(());
        };
        for (kind, cidrs) in [
            ("public", &self.public_subnet_cidrs),
            ("private", &self.private_subnet_cidrs),
        ] {
            if let Some(cidrs) = cidrs {
                if cidrs.len() != azs.len() {
                    return Err(ProvisionError::config(format!(
                        "{} {} subnet CIDRs given for {} availability zones",
                        cidrs.len(),
                        kind,
                        azs.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// All network flags of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkFlags {
    pub default_config: bool,
    pub import: ImportVpcFields,
    pub adjust: AdjustVpcFields,
}

impl NetworkFlags {
    /// Checks that need no network call.
    pub fn validate(&self) -> Result<()> {
        let import = self.import.is_set();
        let adjust = self.adjust.is_set();
        if import && adjust {
            return Err(ProvisionError::config(
                "cannot specify both import vpc flags and configure vpc flags",
            ));
        }
        if self.default_config && (import || adjust) {
            return Err(ProvisionError::config(
                "cannot import or configure vpc if --default-config is set",
            ));
        }
        if import {
            if self.import.public_subnet_ids.as_ref().is_some_and(|s| s.len() == 1) {
                return Err(ProvisionError::config(
                    "at least two public subnets must be imported to enable Load Balancing",
                ));
            }
            if self.import.private_subnet_ids.as_ref().is_some_and(|s| s.len() == 1) {
                return Err(ProvisionError::config(
                    "at least two private subnets must be imported",
                ));
            }
        }
        if adjust {
            if self.adjust.azs.as_ref().is_some_and(|s| s.len() == 1) {
                return Err(ProvisionError::config(
                    "at least two availability zones must be provided to enable Load Balancing",
                ));
            }
            self.adjust.check_sizes()?;
        }
        Ok(())
    }
}

/// The network configuration requested for an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NetworkCustomization {
    #[default]
    Default,
    Import(ImportVpc),
    Adjust(AdjustVpc),
}

impl NetworkCustomization {
    /// Build from separately resolved parts, rejecting both at once.
    pub fn from_parts(import: Option<ImportVpc>, adjust: Option<AdjustVpc>) -> Result<Self> {
        match (import, adjust) {
            (Some(_), Some(_)) => Err(ProvisionError::config(
                "an environment cannot both import and adjust its VPC",
            )),
            (Some(i), None) => Ok(Self::Import(i)),
            (None, Some(a)) => Ok(Self::Adjust(a)),
            (None, None) => Ok(Self::Default),
        }
    }

    pub(crate) fn from_import(fields: &ImportVpcFields) -> Result<Self> {
        fields
            .complete()
            .map(Self::Import)
            .ok_or_else(|| ProvisionError::config("import configuration is incomplete"))
    }

    pub(crate) fn from_adjust(fields: &AdjustVpcFields) -> Result<Self> {
        fields
            .complete()
            .map(Self::Adjust)
            .ok_or_else(|| ProvisionError::config("adjust configuration is incomplete"))
    }

    pub fn import(&self) -> Option<&ImportVpc> {
        match self {
            Self::Import(i) => Some(i),
            _ => None,
        }
    }

    pub fn adjust(&self) -> Option<&AdjustVpc> {
        match self {
            Self::Adjust(a) => Some(a),
            _ => None,
        }
    }

    /// The stored form. Defaults store nothing.
    pub fn to_custom_config(&self) -> Option<CustomizeEnv> {
        match self {
            Self::Default => None,
            Self::Import(i) => Some(CustomizeEnv::ImportVpc(i.clone())),
            Self::Adjust(a) => Some(CustomizeEnv::AdjustVpc(a.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Option<Vec<String>> {
        Some(v.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn cidr_normalises_to_network_address() {
        let c: Cidr = "10.1.2.3/16".parse().unwrap();
        assert_eq!(c.to_string(), "10.1.0.0/16");
        assert_eq!(c.prefix(), 16);

        let all: Cidr = "1.2.3.4/0".parse().unwrap();
        assert_eq!(all.to_string(), "0.0.0.0/0");

        assert!("10.0.0.0".parse::<Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Cidr>().is_err());
        assert!("300.0.0.0/8".parse::<Cidr>().is_err());
    }

    #[test]
    fn cidr_list_parses_every_entry() {
        let list = parse_cidr_list(DEFAULT_PUBLIC_SUBNET_CIDRS).unwrap();
        assert_eq!(list.len(), 2);
        assert!(parse_cidr_list("10.0.0.0/24,").is_err());
    }

    #[test]
    fn import_and_adjust_are_exclusive() {
        let flags = NetworkFlags {
            import: ImportVpcFields {
                id: Some("vpc-1".to_string()),
                ..Default::default()
            },
            adjust: AdjustVpcFields {
                cidr: Some("10.0.0.0/16".parse().unwrap()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(flags.validate(), Err(ProvisionError::Config(_))));
    }

    #[test]
    fn default_config_excludes_customization() {
        let flags = NetworkFlags {
            default_config: true,
            import: ImportVpcFields {
                id: Some("vpc-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = flags.validate().unwrap_err();
        assert!(err.to_string().contains("--default-config"));
    }

    #[test]
    fn single_subnet_or_zone_flags_rejected() {
        let flags = NetworkFlags {
            import: ImportVpcFields {
                public_subnet_ids: ids(&["subnet-1"]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(flags.validate().is_err());

        let flags = NetworkFlags {
            import: ImportVpcFields {
                private_subnet_ids: ids(&["subnet-1"]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(flags.validate().is_err());

        let flags = NetworkFlags {
            adjust: AdjustVpcFields {
                azs: ids(&["us-west-2a"]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(flags.validate().is_err());
    }

    #[test]
    fn subnet_cidrs_must_match_zone_count() {
        let flags = NetworkFlags {
            adjust: AdjustVpcFields {
                azs: ids(&["us-west-2a", "us-west-2b", "us-west-2c"]),
                public_subnet_cidrs: Some(parse_cidr_list(DEFAULT_PUBLIC_SUBNET_CIDRS).unwrap()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(flags.validate().is_err());
    }

    #[test]
    fn both_parts_never_build_a_customization() {
        let err = NetworkCustomization::from_parts(
            Some(ImportVpc::default()),
            Some(AdjustVpc::default()),
        );
        assert!(err.is_err());
        assert_eq!(
            NetworkCustomization::from_parts(None, None).unwrap(),
            NetworkCustomization::Default
        );
        assert!(NetworkCustomization::Default.to_custom_config().is_none());
    }

    #[test]
    fn adjust_renders_normalised_cidrs() {
        let fields = AdjustVpcFields {
            cidr: Some("10.1.5.0/16".parse().unwrap()),
            azs: ids(&["a", "b"]),
            public_subnet_cidrs: Some(parse_cidr_list("10.1.0.0/24,10.1.1.0/24").unwrap()),
            private_subnet_cidrs: Some(parse_cidr_list("10.1.2.0/24,10.1.3.0/24").unwrap()),
        };
        let custom = NetworkCustomization::from_adjust(&fields).unwrap();
        let adjust = custom.adjust().unwrap();
        assert_eq!(adjust.cidr, "10.1.0.0/16");
        assert_eq!(adjust.private_subnet_cidrs, vec!["10.1.2.0/24", "10.1.3.0/24"]);
    }
}
