use clap::{Args, Parser, Subcommand};
use podmender_core::{load_pod_manifest, PodSnapshot};
use podmender_runtime::{
    ApiClient, BackoffPolicy, Classification, Classifier, ControllerConfig, LabelRequirement,
    PodWatcher, PodWatcherConfig, Reconciler, ReconcilerConfig, RepairController, RepairPolicy,
    TracingObserver,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "podmender",
    about = "Repairs mesh pods stuck on a failed validation init container"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch pods and delete the broken ones so they are recreated
    Run {
        #[command(flatten)]
        policy: PolicyArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Classify a single pod manifest and print the result as JSON
    Classify {
        /// Path to a Pod manifest (YAML or JSON)
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        policy: PolicyArgs,
    },
}

/// Which pods are managed and what counts as broken
#[derive(Args, Debug)]
struct PolicyArgs {
    /// Name of the validation init container
    #[arg(long, env = "PODMENDER_INIT_CONTAINER", default_value = podmender_runtime::policy::DEFAULT_INIT_CONTAINER_NAME)]
    init_container: String,
    /// Annotation key present on mesh-managed pods
    #[arg(long, env = "PODMENDER_ANNOTATION", default_value = podmender_runtime::policy::DEFAULT_MANAGEMENT_ANNOTATION)]
    annotation: String,
    /// Exit code of the validation failure
    #[arg(long, env = "PODMENDER_EXIT_CODE", default_value_t = podmender_runtime::policy::DEFAULT_VALIDATION_EXIT_CODE)]
    exit_code: i32,
    /// Only treat a termination as the validation failure if its message contains this
    #[arg(long, env = "PODMENDER_TERMINATION_MESSAGE")]
    termination_message: Option<String>,
    /// Only manage pods scheduled on this node
    #[arg(long, env = "PODMENDER_NODE_NAME")]
    node_name: Option<String>,
    /// Only manage pods with this label (key=value, repeatable)
    #[arg(long = "label-selector", env = "PODMENDER_LABEL_SELECTOR", value_delimiter = ',')]
    label_selector: Vec<String>,
}

/// Controller tuning
#[derive(Args, Debug)]
struct RunArgs {
    /// API server URL
    #[arg(long, env = "PODMENDER_API_URL", default_value = "http://127.0.0.1:6443")]
    api_url: String,
    /// Deletes per pod before giving up
    #[arg(long, env = "PODMENDER_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,
    /// Delay after the first delete before the pod is considered for another
    #[arg(long, env = "PODMENDER_BACKOFF_INITIAL_SECS", default_value_t = 30)]
    backoff_initial_secs: u64,
    /// Upper bound on the delay between deletes of the same pod
    #[arg(long, env = "PODMENDER_BACKOFF_MAX_SECS", default_value_t = 300)]
    backoff_max_secs: u64,
    /// Number of worker lanes
    #[arg(long, env = "PODMENDER_WORKERS", default_value_t = 4)]
    workers: usize,
    /// Interval between pod list polls
    #[arg(long, env = "PODMENDER_POLL_INTERVAL_SECS", default_value_t = 2)]
    poll_interval_secs: u64,
    /// Timeout for a single API request
    #[arg(long, env = "PODMENDER_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { policy, run } => run_controller(&policy, &run).await,
        Commands::Classify { file, policy } => run_classify(&file, &policy),
    }
}

/// Build and validate the repair policy from CLI arguments
fn build_policy(args: &PolicyArgs) -> miette::Result<RepairPolicy> {
    let label_selector = args
        .label_selector
        .iter()
        .map(|s| s.parse::<LabelRequirement>())
        .collect::<Result<Vec<_>, _>>()?;

    let policy = RepairPolicy {
        init_container_name: args.init_container.clone(),
        management_annotation: args.annotation.clone(),
        validation_exit_code: args.exit_code,
        termination_message: args.termination_message.clone(),
        node_name: args.node_name.clone(),
        label_selector,
    };
    policy.validate()?;
    Ok(policy)
}

fn build_reconciler_config(args: &RunArgs) -> miette::Result<ReconcilerConfig> {
    let config = ReconcilerConfig {
        max_attempts: args.max_attempts,
        backoff: BackoffPolicy {
            initial: Duration::from_secs(args.backoff_initial_secs),
            max: Duration::from_secs(args.backoff_max_secs),
            ..Default::default()
        },
    };
    config.validate()?;
    Ok(config)
}

fn build_watcher_config(
    args: &RunArgs,
    node_name: Option<String>,
) -> miette::Result<PodWatcherConfig> {
    let config = PodWatcherConfig {
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        node_name,
    };
    config.validate()?;
    Ok(config)
}

/// Classify a manifest on disk
fn classify_file(path: &Path, policy: RepairPolicy) -> miette::Result<(PodSnapshot, Classification)> {
    let pod = load_pod_manifest(path)?;
    let snapshot = PodSnapshot::try_from(&pod)?;
    let classification = Classifier::new(policy).classify(&snapshot);
    Ok((snapshot, classification))
}

fn run_classify(path: &Path, args: &PolicyArgs) -> miette::Result<()> {
    let (snapshot, classification) = classify_file(path, build_policy(args)?)?;

    let output = serde_json::json!({
        "pod": snapshot.pod_name().to_string(),
        "uid": snapshot.uid,
        "classification": classification,
    });
    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| miette::miette!("Failed to render classification: {}", e))?;
    println!("{}", rendered);
    Ok(())
}

/// Run the watcher and repair controller until ctrl-c
async fn run_controller(policy_args: &PolicyArgs, args: &RunArgs) -> miette::Result<()> {
    let policy = build_policy(policy_args)?;
    let reconciler_config = build_reconciler_config(args)?;
    let watcher_config = build_watcher_config(args, policy.node_name.clone())?;

    info!(
        "Starting podmender (container: {}, annotation: {}, exit code: {}, node: {})",
        policy.init_container_name,
        policy.management_annotation,
        policy.validation_exit_code,
        policy.node_name.as_deref().unwrap_or("<all>")
    );

    let api_client = Arc::new(ApiClient::with_timeout(
        &args.api_url,
        Duration::from_secs(args.request_timeout_secs),
    )?);

    let token = CancellationToken::new();

    // 1. Pod watcher feeding the event stream
    let watcher = PodWatcher::new(api_client.clone(), watcher_config);
    let events = watcher.spawn(token.clone(), 1024);

    // 2. Repair controller consuming it
    let controller = RepairController::new(
        Classifier::new(policy),
        Reconciler::new(reconciler_config),
        api_client,
        Arc::new(TracingObserver),
        ControllerConfig {
            workers: args.workers,
            ..Default::default()
        },
    );
    let controller_token = token.clone();
    let mut controller_handle = tokio::spawn(async move {
        if let Err(e) = controller.run(controller_token, events).await {
            error!("Repair controller error: {}", e);
        }
    });

    // Wait for shutdown signal, or the controller giving up on its own
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;
        }
        _ = &mut controller_handle => {
            token.cancel();
            return Err(miette::miette!("Repair controller stopped unexpectedly"));
        }
    }

    info!("Shutting down gracefully...");
    token.cancel();

    // Let in-flight deletes finish, but not forever
    let shutdown_timeout = Duration::from_secs(5);
    if tokio::time::timeout(shutdown_timeout, controller_handle)
        .await
        .is_err()
    {
        error!("Repair controller did not stop within {:?}", shutdown_timeout);
    }

    info!("Shutdown complete");

    Ok(())
}
