//! Record shapes persisted by the store.
//!
//! Records are JSON documents with a fixed field set. Field names are part of
//! the stored format, so the serde renames below must not change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const KEY_PREFIX: &str = "/stackwright/applications";

/// Storage key for an application record.
pub fn application_key(app: &str) -> String {
    format!("{}/{}", KEY_PREFIX, app)
}

/// Storage key for an environment record, derived only from `(app, env)`.
pub fn environment_key(app: &str, env: &str) -> String {
    format!("{}/{}/environments/{}", KEY_PREFIX, app, env)
}

/// An application groups environments and owns the cross-account stack set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    #[serde(rename = "account")]
    pub account_id: String,
    /// Hosted zone delegated to the application's environments, if any.
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub version: String,
}

impl Application {
    pub fn new(name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_id: account_id.into(),
            domain: String::new(),
            tags: BTreeMap::new(),
            version: String::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Environments need DNS permissions shared with them when the
    /// application owns a domain.
    pub fn requires_dns_delegation(&self) -> bool {
        !self.domain.is_empty()
    }
}

/// A deployment environment within an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Name of the application this environment belongs to.
    pub app: String,
    /// Unique within the application.
    pub name: String,
    pub region: String,
    #[serde(rename = "accountID")]
    pub account_id: String,
    /// Production environments retain resources after deletion.
    pub prod: bool,
    #[serde(rename = "registryURL")]
    pub registry_url: String,
    /// Role the infra deployer assumes to modify the environment stack.
    #[serde(rename = "executionRoleARN")]
    pub execution_role_arn: String,
    /// Role assumed to manipulate the environment and its workloads.
    #[serde(rename = "managerRoleARN")]
    pub manager_role_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<CustomizeEnv>,
}

/// Custom network configuration chosen at creation time.
///
/// Exactly one shape exists per value; an environment on platform defaults
/// stores no `customConfig` at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomizeEnv {
    #[serde(rename = "importVPC")]
    ImportVpc(ImportVpc),
    #[serde(rename = "adjustVPC")]
    AdjustVpc(AdjustVpc),
}

/// Existing network resources to place the environment in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportVpc {
    pub id: String,
    #[serde(rename = "publicSubnetIDs", default)]
    pub public_subnet_ids: Vec<String>,
    #[serde(rename = "privateSubnetIDs", default)]
    pub private_subnet_ids: Vec<String>,
}

/// Parameters for the network resources generated with the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustVpc {
    pub cidr: String,
    #[serde(rename = "availabilityZoneNames", default)]
    pub azs: Vec<String>,
    #[serde(rename = "publicSubnetCIDRs", default)]
    pub public_subnet_cidrs: Vec<String>,
    #[serde(rename = "privateSubnetCIDRs", default)]
    pub private_subnet_cidrs: Vec<String>,
}

/// Order environments for display: non-production first, then by name.
pub fn sort_environments(envs: &mut [Environment]) {
    envs.sort_by(|a, b| a.prod.cmp(&b.prod).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str, prod: bool) -> Environment {
        Environment {
            app: "demo".to_string(),
            name: name.to_string(),
            region: "us-west-2".to_string(),
            account_id: "111111111111".to_string(),
            prod,
            registry_url: String::new(),
            execution_role_arn: String::new(),
            manager_role_arn: String::new(),
            custom_config: None,
        }
    }

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(
            environment_key("demo", "test"),
            "/stackwright/applications/demo/environments/test"
        );
        assert_eq!(application_key("demo"), "/stackwright/applications/demo");
    }

    #[test]
    fn environment_json_uses_stored_field_names() {
        let mut e = env("test", false);
        e.custom_config = Some(CustomizeEnv::ImportVpc(ImportVpc {
            id: "vpc-1".to_string(),
            public_subnet_ids: vec!["subnet-a".to_string(), "subnet-b".to_string()],
            private_subnet_ids: vec!["subnet-c".to_string(), "subnet-d".to_string()],
        }));

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["accountID"], "111111111111");
        assert_eq!(json["registryURL"], "");
        assert_eq!(json["executionRoleARN"], "");
        assert_eq!(json["customConfig"]["importVPC"]["id"], "vpc-1");
        assert_eq!(
            json["customConfig"]["importVPC"]["privateSubnetIDs"][1],
            "subnet-d"
        );
        assert!(json["customConfig"].get("adjustVPC").is_none());
    }

    #[test]
    fn default_config_omits_custom_config() {
        let json = serde_json::to_value(env("test", false)).unwrap();
        assert!(json.get("customConfig").is_none());
    }

    #[test]
    fn custom_config_with_both_shapes_is_rejected() {
        let raw = r#"{"importVPC":{"id":"vpc-1"},"adjustVPC":{"cidr":"10.0.0.0/16"}}"#;
        assert!(serde_json::from_str::<CustomizeEnv>(raw).is_err());
    }

    #[test]
    fn sort_puts_non_prod_first_then_alphabetical() {
        let mut envs = vec![
            env("prod-iad", true),
            env("test", false),
            env("prod-dub", true),
            env("dev", false),
        ];
        sort_environments(&mut envs);
        let names: Vec<_> = envs.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dev", "test", "prod-dub", "prod-iad"]);
    }

    #[test]
    fn dns_delegation_follows_domain() {
        let app = Application::new("demo", "111111111111");
        assert!(!app.requires_dns_delegation());
        assert!(app.with_domain("example.com").requires_dns_delegation());
    }
}
