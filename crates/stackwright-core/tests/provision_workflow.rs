use std::sync::Arc;

use stackwright_core::domain::{CloudError, EnvStackNames, APP_TAG_KEY, ENV_TAG_KEY};
use stackwright_core::progress::{ProgressEvent, ProgressStatus, RecordingProgress};
use stackwright_core::provision::{Advisory, ProvisionDeps, ProvisionRequest, Provisioner};
use stackwright_core::sandbox::{CloudCall, SandboxCloud, SandboxIdentity};
use stackwright_core::uploader::CustomResourceUploader;
use stackwright_core::{NetworkCustomization, ProvisionError};
use stackwright_state::fakes::MemoryConfigStore;
use stackwright_state::{Application, ApplicationStore, CustomizeEnv, EnvironmentStore, ImportVpc};

const APP_ACCOUNT: &str = "111111111111";
const ENV_ACCOUNT: &str = "222222222222";
const REGION: &str = "us-west-2";

struct Harness {
    cloud: Arc<SandboxCloud>,
    store: Arc<MemoryConfigStore>,
    progress: Arc<RecordingProgress>,
    provisioner: Provisioner,
}

/// The environment is created in `cloud`'s account for an application
/// owned by `APP_ACCOUNT`.
async fn harness_in(app: Option<Application>, cloud: SandboxCloud) -> Harness {
    let cloud = Arc::new(cloud);
    let store = Arc::new(MemoryConfigStore::new());
    if let Some(app) = app {
        store.create_application(&app).await.unwrap();
    }
    let progress = Arc::new(RecordingProgress::new());
    let deps = ProvisionDeps {
        store: store.clone(),
        deployer: cloud.clone(),
        app_identity: Arc::new(SandboxIdentity::new(APP_ACCOUNT)),
        env_identity: Arc::new(cloud.identity()),
        roles: cloud.clone(),
        stacks: cloud.clone(),
        storage: cloud.clone(),
        progress: progress.clone(),
        uploader: CustomResourceUploader::default(),
    };
    Harness {
        cloud,
        store,
        progress,
        provisioner: Provisioner::new(deps),
    }
}

async fn harness() -> Harness {
    harness_in(
        Some(Application::new("demo", APP_ACCOUNT)),
        SandboxCloud::new(APP_ACCOUNT, REGION),
    )
    .await
}

fn request() -> ProvisionRequest {
    ProvisionRequest {
        app: "demo".to_string(),
        env: "test".to_string(),
        region: REGION.to_string(),
        prod: false,
        network: NetworkCustomization::Default,
    }
}

fn position(journal: &[CloudCall], pred: impl Fn(&CloudCall) -> bool) -> usize {
    journal
        .iter()
        .position(pred)
        .unwrap_or_else(|| panic!("call not found in {:?}", journal))
}

fn is_delete(c: &CloudCall) -> bool {
    matches!(c, CloudCall::DeleteRole { .. })
}

#[tokio::test]
async fn default_environment_end_to_end() {
    let h = harness().await;
    let outcome = h.provisioner.provision(&request()).await.unwrap();

    let env = &outcome.environment;
    assert_eq!(env.app, "demo");
    assert_eq!(env.name, "test");
    assert_eq!(env.region, REGION);
    assert_eq!(env.account_id, APP_ACCOUNT);
    assert!(!env.prod);
    assert!(env.custom_config.is_none());
    assert!(env.execution_role_arn.ends_with("role/demo-test-CFNExecutionRole"));
    assert!(env.manager_role_arn.ends_with("role/demo-test-EnvManagerRole"));

    let stored = h.store.get_environment("demo", "test").await.unwrap();
    assert_eq!(&stored, env);

    assert!(!outcome.dns_delegated);
    assert!(!outcome.stack_reused);
    assert_eq!(outcome.service_linked_role, Advisory::Done);
    assert_eq!(outcome.custom_resources_urls.len(), 3);
    for url in outcome.custom_resources_urls.values() {
        assert!(url.starts_with("https://stackwright-demo-us-west-2-infrastructure.s3."));
    }
    assert_eq!(h.cloud.object_urls().len(), 3);
    assert!(h.cloud.has_stack("demo-test"));
    assert!(h.cloud.is_linked("demo"));
    assert_eq!(h.cloud.count(|c| matches!(c, CloudCall::DelegateDns { .. })), 0);
}

#[tokio::test]
async fn stack_set_and_upload_precede_deploy() {
    let h = harness().await;
    h.provisioner.provision(&request()).await.unwrap();

    let journal = h.cloud.journal();
    let linked = position(&journal, |c| matches!(c, CloudCall::AddEnvToApp { .. }));
    let first_upload = position(&journal, |c| matches!(c, CloudCall::Upload { .. }));
    let stack_check = position(&journal, |c| matches!(c, CloudCall::StackExists { .. }));
    let deploy = position(&journal, |c| matches!(c, CloudCall::Deploy { .. }));
    let describe = position(&journal, |c| matches!(c, CloudCall::GetEnvironment { .. }));

    assert!(linked < first_upload);
    assert!(first_upload < deploy);
    assert!(stack_check < deploy);
    assert!(deploy < describe);
    assert_eq!(
        journal[deploy],
        CloudCall::Deploy {
            stack: "demo-test".to_string()
        }
    );
}

#[tokio::test]
async fn progress_reports_linking() {
    let h = harness().await;
    h.provisioner.provision(&request()).await.unwrap();

    let events = h.progress.events();
    assert!(events.contains(&ProgressEvent::Start(format!(
        "Linking account {} and region {} to application demo.",
        APP_ACCOUNT, REGION
    ))));
    assert!(events.contains(&ProgressEvent::Stop(
        ProgressStatus::Complete,
        format!(
            "Linked account {} and region {} to application demo.",
            APP_ACCOUNT, REGION
        )
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Update(l) if l.contains("demo-test"))));
}

#[tokio::test]
async fn existing_stack_is_reused_without_touching_roles() {
    let h = harness_in(
        Some(Application::new("demo", APP_ACCOUNT)),
        SandboxCloud::new(APP_ACCOUNT, REGION).with_stack("demo", "test"),
    )
    .await;
    let outcome = h.provisioner.provision(&request()).await.unwrap();

    assert!(outcome.stack_reused);
    assert!(outcome.role_cleanups.is_empty());
    assert_eq!(h.cloud.count(is_delete), 0);
    assert_eq!(h.cloud.count(|c| matches!(c, CloudCall::ListRoleTags { .. })), 0);
    assert_eq!(h.cloud.role_names().len(), 2);
    assert!(h.store.get_environment("demo", "test").await.is_ok());
}

#[tokio::test]
async fn failed_deploy_deletes_each_tagged_role_once() {
    let h = harness().await;
    h.cloud
        .fail_deploy(CloudError::api("CreateStack", "ROLLBACK_COMPLETE"));

    let err = h.provisioner.provision(&request()).await.unwrap_err();
    match &err {
        ProvisionError::Deploy {
            stack_name,
            role_cleanups,
            ..
        } => {
            assert_eq!(stack_name, "demo-test");
            assert_eq!(role_cleanups.len(), 2);
            assert!(role_cleanups.iter().all(|c| c.outcome == Advisory::Done));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let names = EnvStackNames::new("demo", "test");
    let deleted: Vec<CloudCall> = h.cloud.journal().into_iter().filter(is_delete).collect();
    assert_eq!(
        deleted,
        names
            .roles()
            .into_iter()
            .map(|role| CloudCall::DeleteRole { role })
            .collect::<Vec<_>>()
    );
    assert!(h.cloud.role_names().is_empty());
    assert_eq!(h.store.environment_count(), 0);
}

#[tokio::test]
async fn dangling_roles_are_removed_before_deploy() {
    let tags = [(APP_TAG_KEY, "demo"), (ENV_TAG_KEY, "test")];
    let h = harness_in(
        Some(Application::new("demo", APP_ACCOUNT)),
        SandboxCloud::new(APP_ACCOUNT, REGION)
            .with_role("demo-test-CFNExecutionRole", &tags)
            .with_role("demo-test-EnvManagerRole", &tags),
    )
    .await;
    let outcome = h.provisioner.provision(&request()).await.unwrap();

    assert_eq!(outcome.role_cleanups.len(), 2);
    assert!(outcome
        .role_cleanups
        .iter()
        .all(|c| c.outcome == Advisory::Done));

    let journal = h.cloud.journal();
    let last_delete = journal.iter().rposition(is_delete).unwrap();
    let deploy = position(&journal, |c| matches!(c, CloudCall::Deploy { .. }));
    assert!(last_delete < deploy);
    // Recreated by the successful deploy.
    assert_eq!(h.cloud.role_names().len(), 2);
}

#[tokio::test]
async fn roles_of_other_environments_are_left_alone() {
    let h = harness_in(
        Some(Application::new("demo", APP_ACCOUNT)),
        SandboxCloud::new(APP_ACCOUNT, REGION)
            .with_role(
                "demo-test-CFNExecutionRole",
                &[(APP_TAG_KEY, "demo"), (ENV_TAG_KEY, "prod")],
            )
            .with_role("demo-test-EnvManagerRole", &[("team", "platform")]),
    )
    .await;
    let outcome = h.provisioner.provision(&request()).await.unwrap();

    assert_eq!(h.cloud.count(is_delete), 0);
    assert!(outcome
        .role_cleanups
        .iter()
        .all(|c| matches!(c.outcome, Advisory::Skipped { .. })));
}

#[tokio::test]
async fn missing_application_makes_no_calls() {
    let h = harness_in(None, SandboxCloud::new(APP_ACCOUNT, REGION)).await;
    let err = h.provisioner.provision(&request()).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Storage(ref e) if e.is_not_found()));
    assert!(h.cloud.journal().is_empty());
    assert!(h.progress.events().is_empty());
}

#[tokio::test]
async fn stack_set_failure_aborts_before_upload() {
    let h = harness().await;
    h.cloud
        .fail_stack_set(CloudError::api("UpdateStackSet", "operation in progress"));

    let err = h.provisioner.provision(&request()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::StackSet { ref app, ref env, .. } if app == "demo" && env == "test"));
    assert!(err.to_string().starts_with("deploy env test to application demo"));

    assert!(matches!(
        h.progress.events().last(),
        Some(ProgressEvent::Stop(ProgressStatus::Failed, label)) if label.starts_with("Failed to link")
    ));
    assert_eq!(h.cloud.count(|c| matches!(c, CloudCall::Upload { .. })), 0);
    assert_eq!(h.cloud.count(|c| matches!(c, CloudCall::Deploy { .. })), 0);
    assert_eq!(h.store.environment_count(), 0);
}

#[tokio::test]
async fn upload_failure_names_the_bucket() {
    let h = harness().await;
    h.cloud.fail_upload(CloudError::api("PutObject", "access denied"));

    let err = h.provisioner.provision(&request()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Upload { .. }));
    assert!(err
        .to_string()
        .contains("stackwright-demo-us-west-2-infrastructure"));
    assert_eq!(h.cloud.count(|c| matches!(c, CloudCall::Deploy { .. })), 0);
}

#[tokio::test]
async fn cross_account_environment_gets_dns_permissions() {
    let app = Application::new("demo", APP_ACCOUNT).with_domain("example.com");
    let h = harness_in(Some(app), SandboxCloud::new(ENV_ACCOUNT, REGION)).await;
    let outcome = h.provisioner.provision(&request()).await.unwrap();

    assert!(outcome.dns_delegated);
    assert_eq!(outcome.environment.account_id, ENV_ACCOUNT);
    let journal = h.cloud.journal();
    assert_eq!(
        journal[0],
        CloudCall::DelegateDns {
            app: "demo".to_string(),
            account: ENV_ACCOUNT.to_string()
        }
    );
    assert!(h.progress.events().contains(&ProgressEvent::Stop(
        ProgressStatus::Complete,
        format!(
            "Shared DNS permissions for this application to account {}.",
            ENV_ACCOUNT
        )
    )));
}

#[tokio::test]
async fn same_account_environment_skips_dns_permissions() {
    let app = Application::new("demo", APP_ACCOUNT).with_domain("example.com");
    let h = harness_in(Some(app), SandboxCloud::new(APP_ACCOUNT, REGION)).await;
    let outcome = h.provisioner.provision(&request()).await.unwrap();

    assert!(!outcome.dns_delegated);
    assert_eq!(h.cloud.count(|c| matches!(c, CloudCall::DelegateDns { .. })), 0);
}

#[tokio::test]
async fn dns_failure_stops_provisioning() {
    let app = Application::new("demo", APP_ACCOUNT).with_domain("example.com");
    let h = harness_in(Some(app), SandboxCloud::new(ENV_ACCOUNT, REGION)).await;
    h.cloud
        .fail_dns_delegation(CloudError::api("PutRolePolicy", "access denied"));

    let err = h.provisioner.provision(&request()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Cloud { ref context, .. } if context == "granting DNS permissions"));
    assert_eq!(h.cloud.count(|c| matches!(c, CloudCall::AddEnvToApp { .. })), 0);
}

#[tokio::test]
async fn service_linked_role_failures_are_advisory() {
    let h = harness().await;
    h.cloud
        .fail_service_linked_role(CloudError::api("CreateServiceLinkedRole", "access denied"));
    let outcome = h.provisioner.provision(&request()).await.unwrap();
    assert!(matches!(outcome.service_linked_role, Advisory::Ignored { .. }));
}

#[tokio::test]
async fn reprovisioning_keeps_the_first_record() {
    let h = harness().await;
    let first = h.provisioner.provision(&request()).await.unwrap();
    assert_eq!(first.service_linked_role, Advisory::Done);

    let mut again = request();
    again.prod = true;
    let second = h.provisioner.provision(&again).await.unwrap();

    assert!(second.stack_reused);
    assert_eq!(second.service_linked_role, Advisory::AlreadySatisfied);
    let stored = h.store.get_environment("demo", "test").await.unwrap();
    assert!(!stored.prod);
    assert_eq!(h.store.environment_count(), 1);
}

#[tokio::test]
async fn imported_network_is_recorded() {
    let h = harness().await;
    let import = ImportVpc {
        id: "vpc-1".to_string(),
        public_subnet_ids: vec!["subnet-p1".to_string(), "subnet-p2".to_string()],
        private_subnet_ids: vec!["subnet-q1".to_string(), "subnet-q2".to_string()],
    };
    let mut req = request();
    req.prod = true;
    req.network = NetworkCustomization::Import(import.clone());

    h.provisioner.provision(&req).await.unwrap();
    let stored = h.store.get_environment("demo", "test").await.unwrap();
    assert!(stored.prod);
    assert_eq!(stored.custom_config, Some(CustomizeEnv::ImportVpc(import)));
}

#[tokio::test]
async fn store_failure_is_reported_after_deploy() {
    let h = harness().await;
    h.store.fail_environment_writes("disk full");

    let err = h.provisioner.provision(&request()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Store(_)));
    assert!(err.to_string().starts_with("store environment"));
    assert!(h.cloud.has_stack("demo-test"));
}
