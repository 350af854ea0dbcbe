use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use workbench_core::Settings;
use workbench_provisioner::aws::AwsClientFactory;
use workbench_provisioner::audit::AuditObserver;
use workbench_provisioner::egress::IamEgressStoreCleanup;
use workbench_provisioner::workflows::{PROVISION_ENVIRONMENT, TERMINATE_ENVIRONMENT};
use workbench_provisioner::{
    Payload, PluginBus, Services, TickOutcome, WorkflowPersistence, WorkflowRunner, WorkflowState,
};

mod catalog;

use catalog::FileCatalog;

#[derive(Parser)]
#[command(name = "workbench-worker", version, about = "Drive environment provisioning workflows")]
struct Cli {
    /// Environment-management role in the main account
    #[arg(long, env = "WORKBENCH_ENV_MGMT_ROLE_ARN", global = true)]
    env_mgmt_role_arn: Option<String>,

    /// Clean up the main-account egress-store role on termination
    #[arg(long, env = "WORKBENCH_ENABLE_EGRESS_STORE", global = true)]
    enable_egress_store: bool,

    #[arg(long, env = "AWS_REGION", global = true, default_value = "us-east-1")]
    region: String,

    /// Egress-store role name template
    #[arg(long, global = true)]
    egress_store_role_name: Option<String>,

    #[arg(long, global = true)]
    session_prefix: Option<String>,

    /// JSON file with environment types and their configs
    #[arg(long, env = "WORKBENCH_CATALOG", global = true, default_value = "catalog.json")]
    catalog: PathBuf,

    /// Bucket that holds workflow state; local-only when unset
    #[arg(long, env = "WORKBENCH_STATE_BUCKET", global = true)]
    state_bucket: Option<String>,

    #[arg(long, env = "WORKBENCH_STATE_DIR", global = true, default_value = ".workbench")]
    state_dir: PathBuf,

    /// Emit JSON logs
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a workflow from an input payload and run it
    Start {
        #[arg(long, value_enum)]
        workflow: WorkflowKind,
        /// Defaults to a fresh UUID
        #[arg(long)]
        workflow_id: Option<String>,
        /// JSON object with the workflow's input keys
        #[arg(long)]
        input: PathBuf,
        /// Keep ticking until the workflow finishes
        #[arg(long)]
        follow: bool,
    },
    /// Resume a persisted workflow
    Tick {
        #[arg(long)]
        workflow_id: String,
        #[arg(long)]
        follow: bool,
    },
    /// Print a persisted workflow's state
    Show {
        #[arg(long)]
        workflow_id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WorkflowKind {
    Provision,
    Terminate,
}

impl WorkflowKind {
    fn name(self) -> &'static str {
        match self {
            WorkflowKind::Provision => PROVISION_ENVIRONMENT,
            WorkflowKind::Terminate => TERMINATE_ENVIRONMENT,
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(cli.region.clone()))
        .load()
        .await;

    let persistence = WorkflowPersistence::new(
        cli.state_bucket
            .as_ref()
            .map(|_| workbench_storage::client::from_config(&sdk_config)),
        cli.state_bucket.clone().unwrap_or_default(),
        cli.state_dir.clone(),
    );

    match &cli.cmd {
        Cmd::Show { workflow_id } => {
            let state = load(&persistence, workflow_id).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Cmd::Start {
            workflow,
            workflow_id,
            input,
            follow,
        } => {
            let raw = std::fs::read_to_string(input)
                .wrap_err_with(|| format!("reading input {}", input.display()))?;
            let payload = Payload::from_value(serde_json::from_str(&raw)?)?;
            let workflow_id = workflow_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            if persistence.load(&workflow_id).await?.is_some() {
                eyre::bail!("workflow {workflow_id} already exists; use `tick` to resume it");
            }

            let runner = build_runner(&cli, sdk_config).await?;
            let state = WorkflowState::new(&workflow_id, workflow.name(), payload, now_ms());
            persistence.flush(&state).await?;
            tracing::info!(workflow_id = %workflow_id, workflow = workflow.name(), "workflow created");

            drive(&runner, &persistence, state, *follow).await
        }
        Cmd::Tick {
            workflow_id,
            follow,
        } => {
            let state = load(&persistence, workflow_id).await?;
            let runner = build_runner(&cli, sdk_config).await?;
            drive(&runner, &persistence, state, *follow).await
        }
    }
}

fn now_ms() -> i64 {
    jiff::Timestamp::now().as_millisecond()
}

async fn load(persistence: &WorkflowPersistence, workflow_id: &str) -> eyre::Result<WorkflowState> {
    persistence
        .load(workflow_id)
        .await?
        .ok_or_else(|| eyre::eyre!("workflow {workflow_id} not found"))
}

async fn build_runner(cli: &Cli, sdk_config: aws_config::SdkConfig) -> eyre::Result<WorkflowRunner> {
    let env_mgmt_role_arn = cli.env_mgmt_role_arn.as_deref().ok_or_else(|| {
        eyre::eyre!("--env-mgmt-role-arn (or WORKBENCH_ENV_MGMT_ROLE_ARN) is required")
    })?;

    let mut settings = Settings::new(env_mgmt_role_arn, &cli.region)
        .with_egress_store(cli.enable_egress_store);
    if let Some(name) = &cli.egress_store_role_name {
        settings.egress_store_role_name = name.clone();
    }
    if let Some(prefix) = &cli.session_prefix {
        settings.session_prefix = prefix.clone();
    }

    let factory =
        AwsClientFactory::from_caller(sdk_config, &settings.region, &settings.session_prefix)
            .await?;
    let plugins = PluginBus::new().with(Arc::new(AuditObserver::new(factory.session_name())));
    let clients = Arc::new(factory);
    let catalog = Arc::new(FileCatalog::load(&cli.catalog)?);

    let services = Services {
        data_egress: Arc::new(IamEgressStoreCleanup::new(clients.clone(), settings.clone())),
        settings,
        clients,
        env_types: catalog.clone(),
        env_type_configs: catalog,
        plugins,
    };
    Ok(WorkflowRunner::new(services))
}

/// Tick until the workflow finishes or, without `follow`, until it first waits.
async fn drive(
    runner: &WorkflowRunner,
    persistence: &WorkflowPersistence,
    mut state: WorkflowState,
    follow: bool,
) -> eyre::Result<()> {
    loop {
        let result = runner.tick(&mut state, now_ms()).await;
        persistence.flush(&state).await?;

        match result? {
            TickOutcome::Completed => {
                tracing::info!(workflow_id = %state.workflow_id, "workflow completed");
                println!("{}", serde_json::to_string_pretty(&state.payload)?);
                return Ok(());
            }
            TickOutcome::Waiting { next_check_at_ms } if follow => {
                let wait = u64::try_from(next_check_at_ms - now_ms()).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
            TickOutcome::Waiting { next_check_at_ms } => {
                tracing::info!(
                    workflow_id = %state.workflow_id,
                    next_check_at_ms,
                    "workflow waiting; run `tick` to resume"
                );
                return Ok(());
            }
        }
    }
}
