//! kiln-agent - clinkerisation control decision agent
//!
//! # Usage
//!
//! ```bash
//! # Live telemetry as NDJSON on stdin
//! kiln-simulator | kiln-agent
//!
//! # Replay a capture, one reading per second, without freshness checks
//! kiln-agent --replay capture.ndjson --delay-ms 1000
//!
//! # Print the effective configuration
//! kiln-agent --print-config
//! ```
//!
//! # Environment Variables
//!
//! - `KILN_CONFIG`: path to the TOML config (default: `./kiln_agent.toml`)
//! - `ORCHESTRATOR_ENDPOINT`: decisions endpoint
//! - `ESCALATION_ENDPOINT`: alerts endpoint (derived from the orchestrator when unset)
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kiln_agent::background::{
    run_periodic, CorrectionHeartbeat, DecisionMonitor, MetricsRollup, OutcomeEvaluator,
};
use kiln_agent::config::{AgentConfig, StoreBackend};
use kiln_agent::integrations::{
    EscalationChannel, HttpEscalationChannel, HttpOrchestratorClient, OrchestratorClient,
    TelemetryWindow,
};
use kiln_agent::pipeline::{ControlAgent, ProcessingLoop, ReadingSource, ReplaySource, StdinSource};
use kiln_agent::prediction::Predictor;
use kiln_agent::storage;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "kiln-agent")]
#[command(about = "Autonomous clinkerisation control decision agent")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides KILN_CONFIG and ./kiln_agent.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Replay readings from an NDJSON file instead of stdin.
    /// Freshness checks are disabled for replays.
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Delay between replayed readings (milliseconds)
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Persist decisions and escalations with sled at this path
    #[arg(long, value_name = "PATH")]
    sled: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "KILN_JSON_LOGS")]
    json_logs: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    ReadingProcessor,
    DecisionMonitor,
    OutcomeEvaluator,
    CorrectionHeartbeat,
    MetricsRollup,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::ReadingProcessor => write!(f, "ReadingProcessor"),
            TaskName::DecisionMonitor => write!(f, "DecisionMonitor"),
            TaskName::OutcomeEvaluator => write!(f, "OutcomeEvaluator"),
            TaskName::CorrectionHeartbeat => write!(f, "CorrectionHeartbeat"),
            TaskName::MetricsRollup => write!(f, "MetricsRollup"),
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn load_config(args: &CliArgs) -> Result<AgentConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let mut cfg = AgentConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            cfg.endpoints.apply_env_overrides();
            cfg
        }
        None => AgentConfig::load(),
    };
    if let Some(path) = &args.sled {
        cfg.storage.backend = StoreBackend::Sled;
        cfg.storage.path = path.clone();
    }
    Ok(cfg)
}

fn build_agent(
    cfg: &AgentConfig,
    telemetry: Arc<TelemetryWindow>,
    live_clock: bool,
    cancel_token: CancellationToken,
) -> Result<ControlAgent> {
    let store = storage::open_store(&cfg.storage).context("Failed to open decision store")?;
    info!("💾 Store: {}", store.backend_name());

    // Model loading is handled outside the agent; without one the fallback runs
    let predictor = Arc::new(Predictor::from_model(None, cfg.predictor.clone()));

    let timeout = Duration::from_secs(cfg.endpoints.timeout_secs);
    let mut builder = ControlAgent::builder(cfg.clone(), predictor)
        .context(Arc::clone(&telemetry) as _)
        .telemetry(telemetry as _)
        .store(store)
        .cancel_token(cancel_token)
        .live_clock(live_clock);

    match &cfg.endpoints.orchestrator {
        Some(url) => {
            let client = HttpOrchestratorClient::new(url, timeout)
                .context("Failed to build orchestrator client")?;
            info!("📤 Orchestrator: {}", client.endpoint());
            builder = builder.orchestrator(Arc::new(client));
        }
        None => warn!("📤 Orchestrator: not configured, decisions are logged only"),
    }

    match cfg.endpoints.alerts_url() {
        Some(url) => {
            let channel = HttpEscalationChannel::new(&url, timeout)
                .context("Failed to build escalation channel")?;
            info!("🚨 Escalations: {}", channel.endpoint());
            builder = builder.escalation_channel(Arc::new(channel));
        }
        None => warn!("🚨 Escalations: no alerts endpoint, escalations are logged and stored only"),
    }

    Ok(builder.build())
}

/// Run the supervisor loop: monitor tasks, escalate and cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    agent: &ControlAgent,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(TaskName::ReadingProcessor)) => {
                // Ingestion ended: stop the monitors too
                info!("🔒 Supervisor: Task ReadingProcessor completed, stopping monitors");
                cancel_token.cancel();
            }
            Ok(Ok(task_name)) => {
                info!("🔒 Supervisor: Task {} completed normally", task_name);
            }
            Ok(Err(e)) => {
                error!("🔒 Supervisor: Task failed with error: {}", e);
                agent.escalate_critical(&format!("task failed: {e:#}")).await;
                cancel_token.cancel();
                return Err(e);
            }
            Err(e) => {
                error!("🔒 Supervisor: Task panicked: {}", e);
                agent.escalate_critical(&format!("task panicked: {e}")).await;
                cancel_token.cancel();
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }

    info!("🔒 Supervisor: All tasks completed");
    Ok(())
}

async fn run_agent<S: ReadingSource>(
    mut source: S,
    cfg: AgentConfig,
    live_clock: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    let telemetry = Arc::new(TelemetryWindow::default());
    let agent = Arc::new(build_agent(&cfg, Arc::clone(&telemetry), live_clock, cancel_token.clone())?);

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: ingestion
    let proc_agent = Arc::clone(&agent);
    let proc_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[ReadingProcessor] Task starting");
        let processing_loop = ProcessingLoop::new(Arc::clone(&proc_agent), proc_cancel);
        let _stats = processing_loop.run(&mut source).await;
        proc_agent.mark_stopped().await;
        Ok(TaskName::ReadingProcessor)
    });

    // Task 2-3: decision monitor feeding the outcome evaluator
    let (trigger, evaluator) =
        OutcomeEvaluator::new(telemetry, cfg.thresholds.clone(), &cfg.monitors);
    let monitor = DecisionMonitor::new(agent.state(), trigger, &cfg.monitors);
    let token = cancel_token.clone();
    task_set.spawn(async move {
        evaluator.run(token).await;
        Ok(TaskName::OutcomeEvaluator)
    });
    let token = cancel_token.clone();
    task_set.spawn(async move {
        run_periodic(monitor, token).await;
        Ok(TaskName::DecisionMonitor)
    });

    // Task 4: self-correction heartbeat
    let heartbeat = CorrectionHeartbeat::new(Arc::clone(&agent), cfg.monitors.clone());
    let token = cancel_token.clone();
    task_set.spawn(async move {
        run_periodic(heartbeat, token).await;
        Ok(TaskName::CorrectionHeartbeat)
    });

    // Task 5: metrics rollup
    let rollup = MetricsRollup::new(agent.state(), &cfg.monitors);
    let token = cancel_token.clone();
    task_set.spawn(async move {
        run_periodic(rollup, token).await;
        Ok(TaskName::MetricsRollup)
    });

    run_supervisor(&mut task_set, &agent, cancel_token).await?;

    let status = agent.get_status().await;
    info!(
        "Final status: {} | processed {} | decisions {} | corrections {} | escalations {}",
        status.status,
        status.metrics.messages_processed,
        status.metrics.decisions_made,
        status.metrics.corrections_attempted,
        status.metrics.escalations
    );
    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let cfg = load_config(&args)?;
    if args.print_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Kiln Agent v{}", env!("CARGO_PKG_VERSION"));
    info!("  Agent: {}", cfg.agent.agent_id);
    info!(
        "  Flame band {:.0}-{:.0}°C | free CaO ≤ {:.1}% | O2 {:.1}-{:.1}%",
        cfg.thresholds.min_flame_temp,
        cfg.thresholds.max_flame_temp,
        cfg.thresholds.max_free_cao,
        cfg.thresholds.min_o2,
        cfg.thresholds.max_o2
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if let Some(path) = &args.replay {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        let source = ReplaySource::from_ndjson(&contents, args.delay_ms);
        info!("📥 Input: replay {} ({}ms between readings)", path.display(), args.delay_ms);
        run_agent(source, cfg, false, cancel_token).await?;
    } else {
        info!("📥 Input: stdin (NDJSON kiln readings)");
        run_agent(StdinSource::new(), cfg, true, cancel_token).await?;
    }

    info!("✓ Kiln agent shutdown complete");
    Ok(())
}
