use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use stackwright_state::{Application, Environment};
use stackwright_template::PackageFile;

use crate::cloud::{
    AddEnvToAppOpts, AppRegionalResources, Caller, CloudResult, CreateEnvironmentInput, Deployer,
    IdentityService, NetworkInspector, ObjectStorage, RoleManager, StackInspector, Subnet, Vpc,
};
use crate::domain::{CloudError, EnvStackNames};
use crate::progress::Progress;
use crate::session::{CredentialSource, Session, SessionProvider};

/// Every collaborator call the sandbox served, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    DelegateDns { app: String, account: String },
    CreateServiceLinkedRole,
    AddEnvToApp { app: String, env: String, account: String, region: String },
    GetAppResources { app: String, region: String },
    Upload { bucket: String, key: String },
    StackExists { stack: String },
    ListRoleTags { role: String },
    DeleteRole { role: String },
    Deploy { stack: String },
    GetEnvironment { app: String, env: String },
    HasDnsSupport { vpc: String },
    ListAzs,
    ListVpcs,
    ListSubnets { vpc: String, public: bool },
    FromProfile { profile: String },
    FromStaticCreds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxVpc {
    pub id: String,
    pub name: String,
    pub dns_support: bool,
    pub public_subnets: Vec<String>,
    pub private_subnets: Vec<String>,
}

#[derive(Default)]
struct Failures {
    deploy: Option<CloudError>,
    stack_set: Option<CloudError>,
    upload: Option<CloudError>,
    dns: Option<CloudError>,
    service_linked_role: Option<CloudError>,
}

#[derive(Default)]
struct State {
    stacks: BTreeMap<String, Environment>,
    roles: BTreeMap<String, BTreeMap<String, String>>,
    service_linked_role: bool,
    stack_set_instances: BTreeSet<(String, String, String)>,
    dns_delegations: BTreeSet<(String, String)>,
    objects: BTreeMap<String, Vec<u8>>,
    /// Objects under this URL prefix live outside the sandbox.
    external_objects: Option<String>,
    vpcs: Vec<SandboxVpc>,
    azs: Vec<String>,
    profiles: BTreeMap<String, (String, Option<String>)>,
    journal: Vec<CloudCall>,
    failures: Failures,
}

/// One simulated account in one region.
pub struct SandboxCloud {
    account: String,
    region: String,
    state: Mutex<State>,
}

impl SandboxCloud {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        let state = State {
            azs: ["a", "b", "c"]
                .iter()
                .map(|z| format!("{}{}", region, z))
                .collect(),
            ..Default::default()
        };
        Self {
            account: account.into(),
            region,
            state: Mutex::new(state),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn lock(&self) -> CloudResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| CloudError::api("sandbox", "state lock poisoned"))
    }

    fn with_state(&self, f: impl FnOnce(&mut State)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn record(&self, call: CloudCall) -> CloudResult<MutexGuard<'_, State>> {
        let mut state = self.lock()?;
        state.journal.push(call);
        Ok(state)
    }

    // ── seeding ─────────────────────────────────────────────────────────

    pub fn with_vpc(self, vpc: SandboxVpc) -> Self {
        self.with_state(|s| s.vpcs.push(vpc));
        self
    }

    pub fn with_azs(self, azs: &[&str]) -> Self {
        self.with_state(|s| s.azs = azs.iter().map(|z| z.to_string()).collect());
        self
    }

    /// A named profile resolving to `account`, optionally with a default
    /// region.
    pub fn with_profile(self, name: &str, account: &str, region: Option<&str>) -> Self {
        self.with_state(|s| {
            s.profiles.insert(
                name.to_string(),
                (account.to_string(), region.map(str::to_string)),
            );
        });
        self
    }

    /// Treat objects under `endpoint` as present, for uploads that go to a
    /// real object store.
    pub fn with_object_store(self, endpoint: &str) -> Self {
        self.with_state(|s| s.external_objects = Some(endpoint.to_string()));
        self
    }

    pub fn with_role(self, role: &str, tags: &[(&str, &str)]) -> Self {
        self.with_state(|s| {
            s.roles.insert(
                role.to_string(),
                tags.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        });
        self
    }

    /// An environment stack left by an earlier attempt, with its roles.
    pub fn with_stack(self, app: &str, env: &str) -> Self {
        let names = EnvStackNames::new(app, env);
        let descriptor = self.describe(app, env);
        self.with_state(|s| {
            s.stacks.insert(names.stack_name().to_string(), descriptor);
            for role in names.roles() {
                s.roles.insert(role, names.tags().into_iter().collect());
            }
        });
        self
    }

    // ── failure knobs ───────────────────────────────────────────────────

    pub fn fail_deploy(&self, err: CloudError) {
        self.with_state(|s| s.failures.deploy = Some(err));
    }

    pub fn fail_stack_set(&self, err: CloudError) {
        self.with_state(|s| s.failures.stack_set = Some(err));
    }

    pub fn fail_upload(&self, err: CloudError) {
        self.with_state(|s| s.failures.upload = Some(err));
    }

    pub fn fail_dns_delegation(&self, err: CloudError) {
        self.with_state(|s| s.failures.dns = Some(err));
    }

    pub fn fail_service_linked_role(&self, err: CloudError) {
        self.with_state(|s| s.failures.service_linked_role = Some(err));
    }

    // ── inspection ──────────────────────────────────────────────────────

    pub fn journal(&self) -> Vec<CloudCall> {
        self.lock().map(|s| s.journal.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&CloudCall) -> bool) -> usize {
        self.journal().iter().filter(|c| pred(c)).count()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.roles.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object_urls(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_stack(&self, stack_name: &str) -> bool {
        self.lock()
            .map(|s| s.stacks.contains_key(stack_name))
            .unwrap_or(false)
    }

    pub fn is_linked(&self, app: &str) -> bool {
        self.lock()
            .map(|s| {
                s.stack_set_instances.contains(&(
                    app.to_string(),
                    self.account.clone(),
                    self.region.clone(),
                ))
            })
            .unwrap_or(false)
    }

    /// Identity for the sandbox account.
    pub fn identity(&self) -> SandboxIdentity {
        SandboxIdentity::new(&self.account)
    }

    fn describe(&self, app: &str, env: &str) -> Environment {
        let names = EnvStackNames::new(app, env);
        Environment {
            app: app.to_string(),
            name: env.to_string(),
            region: self.region.clone(),
            account_id: self.account.clone(),
            prod: false,
            registry_url: format!(
                "{}.dkr.ecr.{}.amazonaws.com/{}",
                self.account, self.region, app
            ),
            execution_role_arn: format!(
                "arn:aws:iam::{}:role/{}",
                self.account,
                names.execution_role()
            ),
            manager_role_arn: format!(
                "arn:aws:iam::{}:role/{}",
                self.account,
                names.manager_role()
            ),
            custom_config: None,
        }
    }

    fn bucket_for(app: &str, region: &str) -> String {
        format!("stackwright-{}-{}-infrastructure", app, region)
    }
}

#[async_trait]
impl Deployer for SandboxCloud {
    async fn deploy_and_render_environment(
        &self,
        progress: &dyn Progress,
        input: &CreateEnvironmentInput,
    ) -> CloudResult<()> {
        let names = EnvStackNames::new(&input.app.name, &input.name);
        let stack_name = names.stack_name().to_string();
        let descriptor = self.describe(&input.app.name, &input.name);

        let mut state = self.record(CloudCall::Deploy {
            stack: stack_name.clone(),
        })?;
        if state.stacks.contains_key(&stack_name) {
            return Err(CloudError::StackAlreadyExists { stack_name });
        }
        let member = (
            input.app.name.clone(),
            self.account.clone(),
            self.region.clone(),
        );
        if !state.stack_set_instances.contains(&member) {
            return Err(CloudError::api(
                "CreateStack",
                format!(
                    "account {} and region {} are not linked to application {}",
                    self.account, self.region, input.app.name
                ),
            ));
        }
        let external = state.external_objects.as_deref();
        if let Some(missing) = input.custom_resources_urls.values().find(|url| {
            !state.objects.contains_key(*url) && !external.is_some_and(|p| url.starts_with(p))
        })
        {
            return Err(CloudError::api(
                "CreateStack",
                format!("template references missing object {}", missing),
            ));
        }

        progress.update(&format!("Creating stack {}", stack_name));
        // Roles are created first and retained if the stack fails.
        for role in names.roles() {
            state.roles.insert(role, names.tags().into_iter().collect());
        }
        if let Some(err) = state.failures.deploy.clone() {
            return Err(err);
        }
        state.stacks.insert(stack_name, descriptor);
        Ok(())
    }

    async fn add_env_to_app(&self, opts: &AddEnvToAppOpts) -> CloudResult<()> {
        let mut state = self.record(CloudCall::AddEnvToApp {
            app: opts.app.name.clone(),
            env: opts.env_name.clone(),
            account: opts.env_account_id.clone(),
            region: opts.env_region.clone(),
        })?;
        if let Some(err) = state.failures.stack_set.clone() {
            return Err(err);
        }
        state.stack_set_instances.insert((
            opts.app.name.clone(),
            opts.env_account_id.clone(),
            opts.env_region.clone(),
        ));
        Ok(())
    }

    async fn delegate_dns_permissions(
        &self,
        app: &Application,
        account_id: &str,
    ) -> CloudResult<()> {
        let mut state = self.record(CloudCall::DelegateDns {
            app: app.name.clone(),
            account: account_id.to_string(),
        })?;
        if let Some(err) = state.failures.dns.clone() {
            return Err(err);
        }
        state
            .dns_delegations
            .insert((app.name.clone(), account_id.to_string()));
        Ok(())
    }

    async fn get_environment(&self, app: &str, name: &str) -> CloudResult<Environment> {
        let state = self.record(CloudCall::GetEnvironment {
            app: app.to_string(),
            env: name.to_string(),
        })?;
        state
            .stacks
            .get(EnvStackNames::new(app, name).stack_name())
            .cloned()
            .ok_or_else(|| CloudError::NotFound {
                resource: format!("environment stack for {}", name),
            })
    }

    async fn get_app_resources_by_region(
        &self,
        app: &Application,
        region: &str,
    ) -> CloudResult<AppRegionalResources> {
        let state = self.record(CloudCall::GetAppResources {
            app: app.name.clone(),
            region: region.to_string(),
        })?;
        let linked = state
            .stack_set_instances
            .iter()
            .any(|(a, _, r)| *a == app.name && r == region);
        if !linked {
            return Err(CloudError::NotFound {
                resource: format!("regional resources for {} in {}", app.name, region),
            });
        }
        Ok(AppRegionalResources {
            region: region.to_string(),
            s3_bucket: Self::bucket_for(&app.name, region),
        })
    }
}

#[async_trait]
impl RoleManager for SandboxCloud {
    async fn create_ecs_service_linked_role(&self) -> CloudResult<()> {
        let mut state = self.record(CloudCall::CreateServiceLinkedRole)?;
        if let Some(err) = state.failures.service_linked_role.clone() {
            return Err(err);
        }
        if state.service_linked_role {
            return Err(CloudError::AlreadyExists {
                resource: "service-linked role AWSServiceRoleForECS".to_string(),
            });
        }
        state.service_linked_role = true;
        Ok(())
    }

    async fn list_role_tags(&self, role_name: &str) -> CloudResult<BTreeMap<String, String>> {
        let state = self.record(CloudCall::ListRoleTags {
            role: role_name.to_string(),
        })?;
        state
            .roles
            .get(role_name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound {
                resource: format!("role {}", role_name),
            })
    }

    async fn delete_role(&self, role_name: &str) -> CloudResult<()> {
        let mut state = self.record(CloudCall::DeleteRole {
            role: role_name.to_string(),
        })?;
        state
            .roles
            .remove(role_name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound {
                resource: format!("role {}", role_name),
            })
    }
}

#[async_trait]
impl StackInspector for SandboxCloud {
    async fn stack_exists(&self, stack_name: &str) -> CloudResult<bool> {
        let state = self.record(CloudCall::StackExists {
            stack: stack_name.to_string(),
        })?;
        Ok(state.stacks.contains_key(stack_name))
    }
}

#[async_trait]
impl ObjectStorage for SandboxCloud {
    async fn zip_and_upload(
        &self,
        bucket: &str,
        key: &str,
        files: &[PackageFile],
    ) -> CloudResult<String> {
        let mut state = self.record(CloudCall::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        if let Some(err) = state.failures.upload.clone() {
            return Err(err);
        }
        let url = format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key);
        let archive = files.iter().flat_map(|f| f.content.clone()).collect();
        state.objects.insert(url.clone(), archive);
        Ok(url)
    }
}

#[async_trait]
impl NetworkInspector for SandboxCloud {
    async fn has_dns_support(&self, vpc_id: &str) -> CloudResult<bool> {
        let state = self.record(CloudCall::HasDnsSupport {
            vpc: vpc_id.to_string(),
        })?;
        state
            .vpcs
            .iter()
            .find(|v| v.id == vpc_id)
            .map(|v| v.dns_support)
            .ok_or_else(|| CloudError::NotFound {
                resource: format!("VPC {}", vpc_id),
            })
    }

    async fn list_azs(&self) -> CloudResult<Vec<String>> {
        let state = self.record(CloudCall::ListAzs)?;
        Ok(state.azs.clone())
    }

    async fn list_vpcs(&self) -> CloudResult<Vec<Vpc>> {
        let state = self.record(CloudCall::ListVpcs)?;
        Ok(state
            .vpcs
            .iter()
            .map(|v| Vpc {
                id: v.id.clone(),
                name: v.name.clone(),
            })
            .collect())
    }

    async fn list_subnets(&self, vpc_id: &str, public: bool) -> CloudResult<Vec<Subnet>> {
        let state = self.record(CloudCall::ListSubnets {
            vpc: vpc_id.to_string(),
            public,
        })?;
        let vpc = state
            .vpcs
            .iter()
            .find(|v| v.id == vpc_id)
            .ok_or_else(|| CloudError::NotFound {
                resource: format!("VPC {}", vpc_id),
            })?;
        let ids = if public {
            &vpc.public_subnets
        } else {
            &vpc.private_subnets
        };
        Ok(ids
            .iter()
            .map(|id| Subnet {
                id: id.clone(),
                name: String::new(),
            })
            .collect())
    }
}

#[async_trait]
impl SessionProvider for SandboxCloud {
    async fn from_profile(&self, profile: &str) -> CloudResult<Session> {
        let state = self.record(CloudCall::FromProfile {
            profile: profile.to_string(),
        })?;
        let (account, region) =
            state
                .profiles
                .get(profile)
                .cloned()
                .ok_or_else(|| CloudError::NotFound {
                    resource: format!("profile {}", profile),
                })?;
        Ok(Session {
            source: CredentialSource::Profile(profile.to_string()),
            account_id: account,
            region,
        })
    }

    async fn from_static_creds(
        &self,
        access_key_id: &str,
        _secret_access_key: &str,
        _session_token: Option<&str>,
    ) -> CloudResult<Session> {
        let _state = self.record(CloudCall::FromStaticCreds)?;
        Ok(Session {
            source: CredentialSource::StaticCredentials {
                access_key_id: access_key_id.to_string(),
            },
            account_id: self.account.clone(),
            region: None,
        })
    }
}

/// The caller in one account.
#[derive(Debug, Clone)]
pub struct SandboxIdentity {
    account: String,
}

impl SandboxIdentity {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }
}

#[async_trait]
impl IdentityService for SandboxIdentity {
    async fn caller(&self) -> CloudResult<Caller> {
        Ok(Caller {
            account: self.account.clone(),
            root_user_arn: format!("arn:aws:iam::{}:root", self.account),
        })
    }
}
