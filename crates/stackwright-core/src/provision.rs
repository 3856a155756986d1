//! The environment provisioning workflow.
//!
//! One attempt runs strictly in sequence:
//!
//! 1. the application must exist in the record store
//! 2. DNS permissions are shared when the environment lives in another account
//! 3. the container service-linked role is created (advisory)
//! 4. the environment account and region join the application stack set
//! 5. custom resource functions are uploaded to the regional bucket
//! 6. dangling roles are cleaned up and the environment stack is deployed
//! 7. the deployed environment is recorded
//!
//! Stack set registration and the upload must both commit before the stack
//! is deployed. Nothing is persisted unless every step succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use stackwright_state::{Application, ApplicationStore, ConfigStore, Environment, EnvironmentStore};
use tracing::{debug, info};

use crate::cloud::{
    AddEnvToAppOpts, AppInformation, CreateEnvironmentInput, Deployer, IdentityService,
    ObjectStorage, RoleManager, StackInspector, LATEST_ENV_TEMPLATE_VERSION,
};
use crate::domain::{CloudError, EnvStackNames, NetworkCustomization, ProvisionError, Result};
use crate::metrics::METRICS;
use crate::obs::{
    emit_compensation, emit_provision_finished, emit_provision_stage, emit_provision_started,
    ProvisionSpan,
};
use crate::progress::{Progress, ProgressStatus};
use crate::uploader::{BucketUpload, CustomResourceUploader};

/// Result of a best-effort step. Never a `Result`, so it cannot be
/// propagated with `?`.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    Done,
    /// Nothing to do; the desired state already holds.
    AlreadySatisfied,
    Skipped { reason: String },
    /// The step failed and the failure was discarded.
    Ignored { error: String },
}

impl Advisory {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Advisory::Skipped {
            reason: reason.into(),
        }
    }
}

/// One role considered by a cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCleanup {
    pub role: String,
    pub outcome: Advisory,
}

/// What to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub app: String,
    pub env: String,
    pub region: String,
    pub prod: bool,
    pub network: NetworkCustomization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// The record as written to the store.
    pub environment: Environment,
    pub dns_delegated: bool,
    pub service_linked_role: Advisory,
    pub custom_resources_urls: BTreeMap<String, String>,
    /// The deployer reported the stack as already existing.
    pub stack_reused: bool,
    pub role_cleanups: Vec<RoleCleanup>,
}

/// Collaborators the workflow drives.
///
/// `app_identity` is the caller in the application's account;
/// `env_identity` is the caller whose credentials create the environment.
#[derive(Clone)]
pub struct ProvisionDeps {
    pub store: Arc<dyn ConfigStore>,
    pub deployer: Arc<dyn Deployer>,
    pub app_identity: Arc<dyn IdentityService>,
    pub env_identity: Arc<dyn IdentityService>,
    pub roles: Arc<dyn RoleManager>,
    pub stacks: Arc<dyn StackInspector>,
    pub storage: Arc<dyn ObjectStorage>,
    pub progress: Arc<dyn Progress>,
    pub uploader: CustomResourceUploader,
}

pub struct Provisioner {
    deps: ProvisionDeps,
}

struct DeployReport {
    stack_reused: bool,
    role_cleanups: Vec<RoleCleanup>,
}

impl Provisioner {
    pub fn new(deps: ProvisionDeps) -> Self {
        Self { deps }
    }

    pub async fn provision(&self, req: &ProvisionRequest) -> Result<ProvisionOutcome> {
        let _span = ProvisionSpan::enter(&req.app, &req.env);
        let started = Instant::now();
        emit_provision_started(&req.app, &req.env, &req.region);

        let result = self.run(req).await;
        match &result {
            Ok(_) => METRICS.inc_provisioned(),
            Err(_) => METRICS.inc_failures(),
        }
        emit_provision_finished(
            &req.app,
            &req.env,
            started.elapsed().as_millis() as u64,
            result.is_ok(),
        );
        result
    }

    async fn run(&self, req: &ProvisionRequest) -> Result<ProvisionOutcome> {
        let d = &self.deps;

        let app = d.store.get_application(&req.app).await?;
        emit_provision_stage("validated");

        let env_caller = d
            .env_identity
            .caller()
            .await
            .map_err(|e| ProvisionError::cloud("get identity", e))?;

        let mut dns_delegated = false;
        if app.requires_dns_delegation() {
            dns_delegated = self.delegate_dns(&app, &env_caller.account).await?;
            if dns_delegated {
                emit_provision_stage("dns_delegated");
            }
        }

        let service_linked_role = self.create_service_linked_role().await;
        emit_provision_stage("role_bootstrapped");

        self.add_to_stack_set(&AddEnvToAppOpts {
            app: app.clone(),
            env_name: req.env.clone(),
            env_region: req.region.clone(),
            env_account_id: env_caller.account.clone(),
        })
        .await?;
        emit_provision_stage("stack_set_registered");

        let resources = d
            .deployer
            .get_app_resources_by_region(&app, &req.region)
            .await
            .map_err(|e| ProvisionError::cloud("get app resources", e))?;
        let urls = d
            .uploader
            .upload_environment_custom_resources(&BucketUpload::new(
                d.storage.as_ref(),
                &resources.s3_bucket,
            ))
            .await
            .map_err(|source| ProvisionError::Upload {
                bucket: resources.s3_bucket.clone(),
                source,
            })?;
        emit_provision_stage("resources_uploaded");

        let report = self.deploy_env(&app, req, urls.clone()).await?;
        emit_provision_stage("stack_deployed");

        let mut environment = d
            .deployer
            .get_environment(&req.app, &req.env)
            .await
            .map_err(|e| {
                ProvisionError::cloud(format!("get environment struct for {}", req.env), e)
            })?;
        environment.prod = req.prod;
        environment.custom_config = req.network.to_custom_config();

        d.store
            .create_environment(&environment)
            .await
            .map_err(ProvisionError::Store)?;
        emit_provision_stage("record_persisted");
        info!(
            "Created environment {} in region {} under application {}.",
            environment.name, environment.region, environment.app
        );

        Ok(ProvisionOutcome {
            environment,
            dns_delegated,
            service_linked_role,
            custom_resources_urls: urls,
            stack_reused: report.stack_reused,
            role_cleanups: report.role_cleanups,
        })
    }

    /// Returns whether permissions were shared. Same-account environments
    /// need none.
    async fn delegate_dns(&self, app: &Application, account_id: &str) -> Result<bool> {
        if account_id == app.account_id {
            return Ok(false);
        }
        let progress = &self.deps.progress;
        progress.start(&format!(
            "Sharing DNS permissions for this application to account {}.",
            account_id
        ));
        if let Err(e) = self
            .deps
            .deployer
            .delegate_dns_permissions(app, account_id)
            .await
        {
            progress.stop(
                ProgressStatus::Failed,
                &format!("Failed to grant DNS permissions to account {}.", account_id),
            );
            return Err(ProvisionError::cloud("granting DNS permissions", e));
        }
        progress.stop(
            ProgressStatus::Complete,
            &format!(
                "Shared DNS permissions for this application to account {}.",
                account_id
            ),
        );
        Ok(true)
    }

    /// The role may already exist, or the caller may lack permission to
    /// create it; either way provisioning continues.
    async fn create_service_linked_role(&self) -> Advisory {
        match self.deps.roles.create_ecs_service_linked_role().await {
            Ok(()) => Advisory::Done,
            Err(CloudError::AlreadyExists { .. }) => Advisory::AlreadySatisfied,
            Err(e) => {
                debug!(error = %e, "service-linked role not created");
                Advisory::Ignored {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn add_to_stack_set(&self, opts: &AddEnvToAppOpts) -> Result<()> {
        let progress = &self.deps.progress;
        let (account, region, app) = (&opts.env_account_id, &opts.env_region, &opts.app.name);
        progress.start(&format!(
            "Linking account {} and region {} to application {}.",
            account, region, app
        ));
        if let Err(source) = self.deps.deployer.add_env_to_app(opts).await {
            progress.stop(
                ProgressStatus::Failed,
                &format!(
                    "Failed to link account {} and region {} to application {}.",
                    account, region, app
                ),
            );
            return Err(ProvisionError::StackSet {
                app: app.clone(),
                env: opts.env_name.clone(),
                source,
            });
        }
        progress.stop(
            ProgressStatus::Complete,
            &format!(
                "Linked account {} and region {} to application {}.",
                account, region, app
            ),
        );
        Ok(())
    }

    async fn deploy_env(
        &self,
        app: &Application,
        req: &ProvisionRequest,
        custom_resources_urls: BTreeMap<String, String>,
    ) -> Result<DeployReport> {
        let d = &self.deps;
        let caller = d
            .app_identity
            .caller()
            .await
            .map_err(|e| ProvisionError::cloud("get identity", e))?;
        let input = CreateEnvironmentInput {
            name: req.env.clone(),
            app: AppInformation {
                name: app.name.clone(),
                dns_name: app.domain.clone(),
                account_principal_arn: caller.root_user_arn,
            },
            prod: req.prod,
            additional_tags: app.tags.clone(),
            custom_resources_urls,
            network: req.network.clone(),
            version: LATEST_ENV_TEMPLATE_VERSION.to_string(),
        };

        let names = EnvStackNames::new(&req.app, &req.env);
        let role_cleanups = self.clean_up_dangling_roles(&names).await?;

        match d
            .deployer
            .deploy_and_render_environment(d.progress.as_ref(), &input)
            .await
        {
            Ok(()) => Ok(DeployReport {
                stack_reused: false,
                role_cleanups,
            }),
            Err(CloudError::StackAlreadyExists { stack_name }) => {
                debug!(stack = %stack_name, "environment stack already exists");
                Ok(DeployReport {
                    stack_reused: true,
                    role_cleanups,
                })
            }
            Err(source) => {
                // Roles are retained when a fresh stack fails to create.
                let role_cleanups = self.try_deleting_env_roles(&names).await;
                Err(ProvisionError::Deploy {
                    stack_name: names.stack_name().to_string(),
                    source,
                    role_cleanups,
                })
            }
        }
    }

    /// Roles left by an earlier attempt block stack creation. A live stack
    /// owns its roles, so they are only touched when no stack exists.
    async fn clean_up_dangling_roles(&self, names: &EnvStackNames) -> Result<Vec<RoleCleanup>> {
        let exists = self
            .deps
            .stacks
            .stack_exists(names.stack_name())
            .await
            .map_err(|e| {
                ProvisionError::cloud(format!("check if stack {} exists", names.stack_name()), e)
            })?;
        if exists {
            return Ok(Vec::new());
        }
        Ok(self.try_deleting_env_roles(names).await)
    }

    /// Delete each environment role that is tagged as created for this
    /// environment. Untagged or unreadable roles are left alone.
    async fn try_deleting_env_roles(&self, names: &EnvStackNames) -> Vec<RoleCleanup> {
        let roles = &self.deps.roles;
        let mut report = Vec::with_capacity(2);
        for role in names.roles() {
            let outcome = match roles.list_role_tags(&role).await {
                Err(e) => Advisory::skipped(format!("tags unavailable: {}", e)),
                Ok(tags) if !names.owns(&tags) => Advisory::skipped("not tagged for this environment"),
                Ok(_) => {
                    METRICS.inc_role_cleanups();
                    match roles.delete_role(&role).await {
                        Ok(()) => Advisory::Done,
                        Err(e) => Advisory::Ignored {
                            error: e.to_string(),
                        },
                    }
                }
            };
            if matches!(outcome, Advisory::Done | Advisory::Ignored { .. }) {
                emit_compensation(&role, if outcome == Advisory::Done { "deleted" } else { "failed" });
            }
            report.push(RoleCleanup { role, outcome });
        }
        report
    }
}
