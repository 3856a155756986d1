use std::sync::Arc;

use stackwright_core::domain::{ImportVpcFields, NetworkFlags, ProvisionError};
use stackwright_core::sandbox::{CloudCall, SandboxCloud, SandboxVpc, ScriptedPrompter};
use stackwright_core::vpc::{
    VpcResolver, ADJUST_RESOURCES_OPTION, DEFAULT_CONFIG_OPTION, IMPORT_RESOURCES_OPTION,
};
use stackwright_core::NetworkCustomization;
use stackwright_state::CustomizeEnv;

fn vpc(id: &str, public: &[&str], private: &[&str]) -> SandboxVpc {
    SandboxVpc {
        id: id.to_string(),
        name: "main".to_string(),
        dns_support: true,
        public_subnets: public.iter().map(|s| s.to_string()).collect(),
        private_subnets: private.iter().map(|s| s.to_string()).collect(),
    }
}

fn resolver(prompt: ScriptedPrompter, cloud: &Arc<SandboxCloud>) -> VpcResolver {
    VpcResolver::new(Arc::new(prompt), cloud.clone(), "us-west-2")
}

#[tokio::test]
async fn default_config_flag_needs_no_prompt() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2"));
    let mut flags = NetworkFlags {
        default_config: true,
        ..Default::default()
    };
    let res = resolver(ScriptedPrompter::new(), &cloud)
        .resolve(&mut flags)
        .await
        .unwrap();
    assert_eq!(res.customization, NetworkCustomization::Default);
    assert!(res.customization.to_custom_config().is_none());
    assert!(cloud.journal().is_empty());
}

#[tokio::test]
async fn choosing_default_records_the_choice() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2"));
    let mut flags = NetworkFlags::default();
    let res = resolver(ScriptedPrompter::new().choice(DEFAULT_CONFIG_OPTION), &cloud)
        .resolve(&mut flags)
        .await
        .unwrap();
    assert_eq!(res.customization, NetworkCustomization::Default);
    assert!(flags.default_config);
}

#[tokio::test]
async fn import_prompts_for_everything_missing() {
    let cloud = Arc::new(
        SandboxCloud::new("111111111111", "us-west-2").with_vpc(vpc(
            "vpc-1",
            &["subnet-p1", "subnet-p2"],
            &["subnet-q1", "subnet-q2"],
        )),
    );
    let prompt = ScriptedPrompter::new()
        .choice(IMPORT_RESOURCES_OPTION)
        .choice("vpc-1")
        .choices(&["subnet-p1", "subnet-p2"])
        .choices(&["subnet-q1", "subnet-q2"]);
    let mut flags = NetworkFlags::default();
    let res = resolver(prompt, &cloud).resolve(&mut flags).await.unwrap();

    let import = res.customization.import().unwrap();
    assert_eq!(import.id, "vpc-1");
    assert_eq!(import.public_subnet_ids, vec!["subnet-p1", "subnet-p2"]);
    assert_eq!(import.private_subnet_ids, vec!["subnet-q1", "subnet-q2"]);
    assert!(res.warnings.is_empty());
    assert!(flags.import.dns_verified());
    assert!(matches!(
        res.customization.to_custom_config(),
        Some(CustomizeEnv::ImportVpc(_))
    ));
}

#[tokio::test]
async fn resolved_import_is_not_asked_or_checked_again() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2").with_vpc(vpc(
        "vpc-1",
        &["subnet-p1", "subnet-p2"],
        &["subnet-q1", "subnet-q2"],
    )));
    let mut fields = ImportVpcFields::new(Some("vpc-1".to_string()), None, None);
    let first = resolver(
        ScriptedPrompter::new()
            .choices(&["subnet-p1", "subnet-p2"])
            .choices(&["subnet-q1", "subnet-q2"]),
        &cloud,
    )
    .resolve_import(&mut fields)
    .await
    .unwrap();
    let calls = cloud.journal().len();

    let prompt = Arc::new(ScriptedPrompter::new());
    let again = VpcResolver::new(prompt.clone(), cloud.clone(), "us-west-2")
        .resolve_import(&mut fields)
        .await
        .unwrap();
    assert_eq!(first, again);
    assert!(prompt.asked().is_empty());
    assert_eq!(cloud.journal().len(), calls);
}

#[tokio::test]
async fn import_without_dns_support_fails() {
    let mut no_dns = vpc("vpc-1", &[], &["subnet-q1", "subnet-q2"]);
    no_dns.dns_support = false;
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2").with_vpc(no_dns));
    let mut fields = ImportVpcFields::new(Some("vpc-1".to_string()), None, None);
    let err = resolver(ScriptedPrompter::new(), &cloud)
        .resolve_import(&mut fields)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::NoDnsSupport { ref vpc_id } if vpc_id == "vpc-1"));
    assert!(!fields.dns_verified());
}

#[tokio::test]
async fn no_vpcs_in_account() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2"));
    let mut fields = ImportVpcFields::default();
    let err = resolver(ScriptedPrompter::new(), &cloud)
        .resolve_import(&mut fields)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::VpcNotFound));
}

#[tokio::test]
async fn single_public_subnet_is_rejected() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2").with_vpc(vpc(
        "vpc-1",
        &["subnet-p1", "subnet-p2"],
        &["subnet-q1", "subnet-q2"],
    )));
    let mut fields = ImportVpcFields::new(Some("vpc-1".to_string()), None, None);
    let err = resolver(ScriptedPrompter::new().choices(&["subnet-p1"]), &cloud)
        .resolve_import(&mut fields)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::InsufficientSubnets { kind: "public", min: 2 }
    ));
}

#[tokio::test]
async fn no_public_subnets_only_warns() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2").with_vpc(vpc(
        "vpc-1",
        &[],
        &["subnet-q1", "subnet-q2"],
    )));
    let mut fields = ImportVpcFields::new(Some("vpc-1".to_string()), None, None);
    let res = resolver(
        ScriptedPrompter::new().choices(&["subnet-q1", "subnet-q2"]),
        &cloud,
    )
    .resolve_import(&mut fields)
    .await
    .unwrap();
    assert_eq!(res.warnings.len(), 1);
    assert!(res.warnings[0].contains("vpc-1"));
    assert!(res.customization.import().unwrap().public_subnet_ids.is_empty());
}

#[tokio::test]
async fn private_subnets_are_required() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2").with_vpc(vpc(
        "vpc-1",
        &["subnet-p1", "subnet-p2"],
        &[],
    )));
    let mut fields = ImportVpcFields::new(
        Some("vpc-1".to_string()),
        Some(vec!["subnet-p1".to_string(), "subnet-p2".to_string()]),
        None,
    );
    let err = resolver(ScriptedPrompter::new(), &cloud)
        .resolve_import(&mut fields)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::SubnetsNotFound { .. }));

    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2").with_vpc(vpc(
        "vpc-1",
        &["subnet-p1", "subnet-p2"],
        &["subnet-q1", "subnet-q2"],
    )));
    let err = resolver(ScriptedPrompter::new().choices(&["subnet-q1"]), &cloud)
        .resolve_import(&mut fields)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::InsufficientSubnets { kind: "private", min: 2 }
    ));
}

#[tokio::test]
async fn adjust_with_prompted_defaults() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2"));
    let prompt = ScriptedPrompter::new()
        .choice(ADJUST_RESOURCES_OPTION)
        .accept_default()
        .accept_default()
        .accept_default()
        .accept_default();
    let mut flags = NetworkFlags::default();
    let res = resolver(prompt, &cloud).resolve(&mut flags).await.unwrap();

    let adjust = res.customization.adjust().unwrap();
    assert_eq!(adjust.cidr, "10.0.0.0/16");
    assert_eq!(adjust.azs, vec!["us-west-2a", "us-west-2b"]);
    assert_eq!(adjust.public_subnet_cidrs, vec!["10.0.0.0/24", "10.0.1.0/24"]);
    assert_eq!(adjust.private_subnet_cidrs, vec!["10.0.2.0/24", "10.0.3.0/24"]);
    assert_eq!(cloud.count(|c| *c == CloudCall::ListAzs), 1);
}

#[tokio::test]
async fn adjust_in_single_zone_region_fails() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2").with_azs(&["us-west-2a"]));
    let mut flags = NetworkFlags::default();
    flags.adjust.cidr = Some("10.1.0.0/16".parse().unwrap());
    let err = resolver(ScriptedPrompter::new(), &cloud)
        .resolve(&mut flags)
        .await
        .unwrap_err();
    match &err {
        ProvisionError::InsufficientZones { min, region, .. } => {
            assert_eq!(*min, 2);
            assert_eq!(region, "us-west-2");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("at least 2 availability zones"));
}

#[tokio::test]
async fn adjust_subnet_count_must_match_zones() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2"));
    let mut flags = NetworkFlags::default();
    flags.adjust.azs = Some(vec!["us-west-2a".to_string(), "us-west-2b".to_string()]);
    let prompt = ScriptedPrompter::new()
        .accept_default()
        .text("10.0.0.0/24")
        .accept_default();
    let err = resolver(prompt, &cloud).resolve(&mut flags).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Config(_)));
}

#[tokio::test]
async fn conflicting_flags_fail_before_any_call() {
    let cloud = Arc::new(SandboxCloud::new("111111111111", "us-west-2"));
    let mut flags = NetworkFlags {
        default_config: true,
        ..Default::default()
    };
    flags.import.id = Some("vpc-1".to_string());
    let err = resolver(ScriptedPrompter::new(), &cloud)
        .resolve(&mut flags)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("--default-config"));
    assert!(cloud.journal().is_empty());
}
