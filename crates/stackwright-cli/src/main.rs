//! Stackwright - environment provisioning for containerized applications
//!
//! ## Commands
//!
//! - `app init` / `app ls`: register and list applications
//! - `env init`: provision a new environment for an application
//! - `env ls` / `env show` / `env delete`: inspect recorded environments
//! - `svc render`: render a workload's infrastructure document

mod prompt;
mod storage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use stackwright_core::obs::emit_template_rendered;
use stackwright_core::sandbox::{SandboxCloud, SandboxIdentity, SandboxVpc};
use stackwright_core::{
    ensure_environment_absent, validate_environment_name, Cidr, CredentialFlags,
    CustomResourceUploader, NetworkFlags, ObjectStorage, ProfileCredsSelector, Prompter,
    ProvisionDeps, ProvisionRequest, Provisioner, SessionResolver, TerminalProgress, VpcResolver,
    DEFAULT_REGION, METRICS,
};
use stackwright_state::fakes::MemoryConfigStore;
use stackwright_state::{
    Application, ApplicationStore, EnvironmentStore, SurrealConfigStore, SurrealHandle,
};
use stackwright_template::{Composer, DirSource, WorkloadOpts};
use tracing::{info, Level};

use crate::prompt::TerminalPrompter;
use crate::storage::HttpObjectStorage;

const DEFAULT_PROFILE: &str = "default";

#[derive(Parser)]
#[command(name = "stackwright")]
#[command(author = "Stackwright Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision environments and render workload documents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the local record store
    #[arg(
        long,
        global = true,
        env = "STACKWRIGHT_STATE_DIR",
        default_value = ".stackwright"
    )]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage applications
    App {
        #[command(subcommand)]
        action: AppAction,
    },

    /// Manage environments
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Work with services and jobs
    Svc {
        #[command(subcommand)]
        action: SvcAction,
    },
}

#[derive(Subcommand)]
enum AppAction {
    /// Register an application
    Init {
        /// Application name
        #[arg(short, long, env = "STACKWRIGHT_APP")]
        name: String,

        /// Account that owns the application
        #[arg(long)]
        account: String,

        /// Domain the application's services are published under
        #[arg(long)]
        domain: Option<String>,
    },
    /// List applications
    Ls,
}

#[derive(Subcommand)]
enum EnvAction {
    /// Create a new environment
    Init(EnvInitArgs),
    /// List the environments of an application
    Ls {
        #[arg(short, long, env = "STACKWRIGHT_APP")]
        app: String,

        /// Print the records as JSON
        #[arg(long = "json-output")]
        json_output: bool,
    },
    /// Show one environment as JSON
    Show {
        #[arg(short, long, env = "STACKWRIGHT_APP")]
        app: String,

        #[arg(short, long)]
        name: String,
    },
    /// Delete an environment record
    Delete {
        #[arg(short, long, env = "STACKWRIGHT_APP")]
        app: String,

        #[arg(short, long)]
        name: String,
    },
}

#[derive(clap::Args)]
struct EnvInitArgs {
    /// Application the environment belongs to
    #[arg(short, long, env = "STACKWRIGHT_APP")]
    app: String,

    /// Environment name
    #[arg(short, long)]
    name: String,

    /// Named profile to create the environment with
    #[arg(long, env = "STACKWRIGHT_PROFILE")]
    profile: Option<String>,

    #[arg(long)]
    aws_access_key_id: Option<String>,

    #[arg(long)]
    aws_secret_access_key: Option<String>,

    #[arg(long)]
    aws_session_token: Option<String>,

    /// Region to create the environment in
    #[arg(long, env = "STACKWRIGHT_REGION")]
    region: Option<String>,

    /// Mark the environment as production
    #[arg(long)]
    prod: bool,

    /// Provision against an in-process cloud. The environment is not recorded.
    #[arg(long)]
    sandbox: bool,

    /// Use the default network configuration without asking
    #[arg(long)]
    default_config: bool,

    /// Existing VPC to import
    #[arg(long)]
    import_vpc_id: Option<String>,

    /// Public subnet ids to import, comma separated
    #[arg(long, value_delimiter = ',')]
    import_public_subnets: Vec<String>,

    /// Private subnet ids to import, comma separated
    #[arg(long, value_delimiter = ',')]
    import_private_subnets: Vec<String>,

    /// CIDR of the VPC to create
    #[arg(long)]
    override_vpc_cidr: Option<String>,

    /// Availability zones to span, comma separated
    #[arg(long, value_delimiter = ',')]
    override_az_names: Vec<String>,

    /// Public subnet CIDRs, comma separated
    #[arg(long, value_delimiter = ',')]
    override_public_cidrs: Vec<String>,

    /// Private subnet CIDRs, comma separated
    #[arg(long, value_delimiter = ',')]
    override_private_cidrs: Vec<String>,
}

#[derive(Subcommand)]
enum SvcAction {
    /// Render the infrastructure document of a workload
    Render {
        #[arg(short, long, value_enum)]
        kind: WorkloadKind,

        /// Workload data as JSON
        #[arg(long)]
        opts: PathBuf,

        /// Read documents from this directory instead of the built-in set
        #[arg(long)]
        templates_dir: Option<PathBuf>,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum WorkloadKind {
    LbWeb,
    RdWeb,
    Backend,
    Worker,
    ScheduledJob,
}

impl WorkloadKind {
    fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::LbWeb => "lb-web",
            WorkloadKind::RdWeb => "rd-web",
            WorkloadKind::Backend => "backend",
            WorkloadKind::Worker => "worker",
            WorkloadKind::ScheduledJob => "scheduled-job",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    stackwright_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Svc { action } => match action {
            SvcAction::Render {
                kind,
                opts,
                templates_dir,
                output,
            } => cmd_svc_render(kind, &opts, templates_dir.as_deref(), output.as_deref()),
        },
        Commands::App { action } => {
            let store = open_store(&cli.state_dir).await?;
            match action {
                AppAction::Init {
                    name,
                    account,
                    domain,
                } => cmd_app_init(&store, &name, &account, domain.as_deref()).await,
                AppAction::Ls => cmd_app_ls(&store).await,
            }
        }
        Commands::Env { action } => {
            let store = open_store(&cli.state_dir).await?;
            match action {
                EnvAction::Init(args) => cmd_env_init(store, args).await,
                EnvAction::Ls { app, json_output } => cmd_env_ls(&store, &app, json_output).await,
                EnvAction::Show { app, name } => cmd_env_show(&store, &app, &name).await,
                EnvAction::Delete { app, name } => cmd_env_delete(&store, &app, &name).await,
            }
        }
    };

    METRICS.flush();
    result
}

async fn open_store(state_dir: &Path) -> Result<Arc<SurrealConfigStore>> {
    let handle = SurrealHandle::setup_from_env(&state_dir.join("db"))
        .await
        .context("Failed to open the Stackwright record store")?;
    Ok(Arc::new(SurrealConfigStore::new(Arc::new(handle))))
}

/// Register an application
async fn cmd_app_init(
    store: &SurrealConfigStore,
    name: &str,
    account: &str,
    domain: Option<&str>,
) -> Result<()> {
    let mut app = Application::new(name, account);
    if let Some(domain) = domain {
        app = app.with_domain(domain);
    }
    store
        .create_application(&app)
        .await
        .context(format!("Failed to create application '{}'", name))?;

    println!("Created application '{}' in account {}", name, account);
    Ok(())
}

async fn cmd_app_ls(store: &SurrealConfigStore) -> Result<()> {
    let apps = store.list_applications().await?;
    if apps.is_empty() {
        println!("No applications found. Run 'stackwright app init' first.");
        return Ok(());
    }
    for app in apps {
        if app.domain.is_empty() {
            println!("{}", app.name);
        } else {
            println!("{} ({})", app.name, app.domain);
        }
    }
    Ok(())
}

/// Create a new environment.
///
/// Only `--sandbox` runs are supported: cloud calls are served by an
/// in-process account and the record is never persisted. Uploads go to
/// `STACKWRIGHT_OBJECT_STORE_URL` when it is set.
async fn cmd_env_init(store: Arc<SurrealConfigStore>, args: EnvInitArgs) -> Result<()> {
    if !args.sandbox {
        bail!(
            "no cloud deployer is configured; pass --sandbox to simulate provisioning \
             without recording the environment"
        );
    }
    validate_environment_name(&args.name)?;
    let app = store
        .get_application(&args.app)
        .await
        .context(format!("Failed to read application '{}'", args.app))?;
    ensure_environment_absent(store.as_ref(), &args.app, &args.name).await?;

    let prompt: Arc<dyn Prompter> = Arc::new(TerminalPrompter);

    let creds = CredentialFlags {
        profile: args.profile.clone(),
        access_key_id: args.aws_access_key_id.clone(),
        secret_access_key: args.aws_secret_access_key.clone(),
        session_token: args.aws_session_token.clone(),
    };
    let mut accounts = SandboxCloud::new(&app.account_id, DEFAULT_REGION).with_profile(
        DEFAULT_PROFILE,
        &app.account_id,
        None,
    );
    if let Some(profile) = args.profile.as_deref() {
        accounts = accounts.with_profile(profile, &app.account_id, None);
    }
    let accounts = Arc::new(accounts);
    let selector = Arc::new(ProfileCredsSelector::new(
        prompt.clone(),
        accounts.clone(),
        vec![DEFAULT_PROFILE.to_string()],
    ));
    let session = SessionResolver::new(accounts, selector, prompt.clone())
        .resolve(&creds, &args.name, args.region.as_deref())
        .await?;
    let region = session
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let uploads = HttpObjectStorage::from_env()?;
    let mut cloud = SandboxCloud::new(&session.account_id, &region).with_vpc(sandbox_vpc(&region));
    if let Some(http) = &uploads {
        cloud = cloud.with_object_store(http.endpoint());
    }
    let cloud = Arc::new(cloud);

    let mut network = network_flags(&args)?;
    let resolution = VpcResolver::new(prompt.clone(), cloud.clone(), &region)
        .resolve(&mut network)
        .await?;
    for warning in &resolution.warnings {
        eprintln!("Note: {}", warning);
    }

    let storage: Arc<dyn ObjectStorage> = match uploads {
        Some(http) => Arc::new(http),
        None => cloud.clone(),
    };
    // Sandbox resources die with this process, so its records stay in memory.
    let scratch = Arc::new(MemoryConfigStore::new());
    scratch
        .create_application(&app)
        .await
        .context("Failed to stage the application record")?;
    let deps = ProvisionDeps {
        store: scratch,
        deployer: cloud.clone(),
        app_identity: Arc::new(SandboxIdentity::new(&app.account_id)),
        env_identity: Arc::new(cloud.identity()),
        roles: cloud.clone(),
        stacks: cloud.clone(),
        storage,
        progress: Arc::new(TerminalProgress),
        uploader: CustomResourceUploader::default(),
    };
    let request = ProvisionRequest {
        app: args.app.clone(),
        env: args.name.clone(),
        region,
        prod: args.prod,
        network: resolution.customization,
    };
    let outcome = Provisioner::new(deps).provision(&request).await?;

    let env = &outcome.environment;
    println!(
        "Simulated environment {} in region {} under application {}. Nothing was recorded.",
        env.name, env.region, env.app
    );
    Ok(())
}

/// The VPC every sandbox account starts with.
fn sandbox_vpc(region: &str) -> SandboxVpc {
    SandboxVpc {
        id: "vpc-0sandbox".to_string(),
        name: format!("sandbox-{}", region),
        dns_support: true,
        public_subnets: vec!["subnet-0public1".to_string(), "subnet-0public2".to_string()],
        private_subnets: vec![
            "subnet-0private1".to_string(),
            "subnet-0private2".to_string(),
        ],
    }
}

fn some_list(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn cidr_list(values: &[String]) -> Result<Option<Vec<Cidr>>> {
    if values.is_empty() {
        return Ok(None);
    }
    let cidrs = values
        .iter()
        .map(|v| v.parse::<Cidr>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Some(cidrs))
}

fn network_flags(args: &EnvInitArgs) -> Result<NetworkFlags> {
    let mut flags = NetworkFlags {
        default_config: args.default_config,
        ..Default::default()
    };
    flags.import.id = args.import_vpc_id.clone().filter(|id| !id.is_empty());
    flags.import.public_subnet_ids = some_list(&args.import_public_subnets);
    flags.import.private_subnet_ids = some_list(&args.import_private_subnets);
    flags.adjust.cidr = args
        .override_vpc_cidr
        .as_deref()
        .map(str::parse::<Cidr>)
        .transpose()?;
    flags.adjust.azs = some_list(&args.override_az_names);
    flags.adjust.public_subnet_cidrs = cidr_list(&args.override_public_cidrs)?;
    flags.adjust.private_subnet_cidrs = cidr_list(&args.override_private_cidrs)?;
    Ok(flags)
}

async fn cmd_env_ls(store: &SurrealConfigStore, app: &str, json: bool) -> Result<()> {
    store
        .get_application(app)
        .await
        .context(format!("Failed to read application '{}'", app))?;
    let envs = store.list_environments(app).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&envs)?);
        return Ok(());
    }
    if envs.is_empty() {
        println!("No environments found for application '{}'.", app);
        return Ok(());
    }
    for env in envs {
        let marker = if env.prod { " (prod)" } else { "" };
        println!("{}{}", env.name, marker);
    }
    Ok(())
}

async fn cmd_env_show(store: &SurrealConfigStore, app: &str, name: &str) -> Result<()> {
    let env = store
        .get_environment(app, name)
        .await
        .context(format!("Failed to read environment '{}'", name))?;
    println!("{}", serde_json::to_string_pretty(&env)?);
    Ok(())
}

async fn cmd_env_delete(store: &SurrealConfigStore, app: &str, name: &str) -> Result<()> {
    store
        .get_environment(app, name)
        .await
        .context(format!("Failed to read environment '{}'", name))?;
    store
        .delete_environment(app, name)
        .await
        .context(format!("Failed to delete environment '{}'", name))?;

    println!("Deleted environment '{}' from application '{}'", name, app);
    Ok(())
}

/// Render a workload document
fn cmd_svc_render(
    kind: WorkloadKind,
    opts: &Path,
    templates_dir: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let raw = std::fs::read_to_string(opts)
        .context(format!("Failed to read workload data {:?}", opts))?;
    let data: WorkloadOpts =
        serde_json::from_str(&raw).context(format!("Failed to parse workload data {:?}", opts))?;

    let composer = match templates_dir {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("templates directory {:?} does not exist", dir);
            }
            Composer::new(Arc::new(DirSource::new(dir)))
        }
        None => Composer::embedded(),
    };
    let content = match kind {
        WorkloadKind::LbWeb => composer.parse_load_balanced_web_service(&data),
        WorkloadKind::RdWeb => composer.parse_request_driven_web_service(&data),
        WorkloadKind::Backend => composer.parse_backend_service(&data),
        WorkloadKind::Worker => composer.parse_worker_service(&data),
        WorkloadKind::ScheduledJob => composer.parse_scheduled_job(&data),
    }
    .context(format!("Failed to render {} document", kind.as_str()))?;

    METRICS.inc_rendered();
    emit_template_rendered(kind.as_str(), content.len());

    match output {
        Some(path) => {
            std::fs::write(path, content.as_bytes())
                .context(format!("Failed to write {:?}", path))?;
            info!("Wrote {} document to {:?}", kind.as_str(), path);
        }
        None => print!("{}", content),
    }
    Ok(())
}
