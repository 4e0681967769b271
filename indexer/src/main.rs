//! Agent feedback indexer CLI.
//!
//! Entry point for the indexer binary. Provides subcommands for:
//! - `run` - Start ingestion, verification, and metadata fetching
//! - `migrate` - Run database migrations
//! - `backfill` - Run a one-shot backfill and exit
//! - `verify-once` - Run a single verification cycle and exit
//! - `version` - Print version information

use std::sync::Arc;
use std::time::Duration;

use agent_feedback_indexer::abi::Decoder;
use agent_feedback_indexer::config::Settings;
use agent_feedback_indexer::error::{DomainError, InfraError, Result};
use agent_feedback_indexer::handlers::{AgentHandler, FeedbackHandler};
use agent_feedback_indexer::indexer::{
    BufferConfig, CheckpointManager, EventBuffer, EventRouter, Poller, PollerConfig, Verifier,
};
use agent_feedback_indexer::ports::SystemClock;
use agent_feedback_indexer::store::PostgresStore;
use agent_feedback_indexer::types::LedgerEvent;
use agent_feedback_indexer::types::primitives::Pubkey;
use agent_feedback_indexer::uri_worker::{GatewayConfig, UriWorker, WorkerConfig};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use ledger_client::{JsonRpcLedgerClient, RawTransaction};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "agent-feedback-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Environment name, selects `config/{name}.toml` as an overlay.
    #[arg(short, long, default_value = "development", env = "APP_ENV")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run ingestion, verification, and the URI-metadata worker until
    /// interrupted.
    Run,

    /// Apply pending database migrations and exit.
    Migrate,

    /// Run backfill to the current chain head, then exit without starting
    /// live-tail or verification.
    Backfill,

    /// Run a single verification cycle and exit.
    VerifyOnce,

    /// Print version information.
    Version,
}

/// Stand-in for the real transaction decoder.
///
/// Turning raw instruction bytes into [`LedgerEvent`]s is an external
/// collaborator's responsibility — this crate only defines the [`Decoder`]
/// port it calls through. Running this binary without wiring a real
/// decoder means the pipeline advances its cursor over every matching
/// transaction without ever emitting an event; `run` logs a warning once
/// so this is never mistaken for a healthy decode path.
struct NoopDecoder;

#[async_trait]
impl Decoder for NoopDecoder {
    async fn decode(&self, _tx: &RawTransaction) -> Result<Vec<LedgerEvent>> {
        Ok(Vec::new())
    }
}

fn init_logging(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.logging.level.clone()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.pretty().init();
    }
}

fn install_metrics_exporter(settings: &Settings) {
    if !settings.metrics.enabled {
        return;
    }
    let addr = settings.metrics.socket_addr();
    let socket_addr: std::net::SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            warn!(error = %err, addr, "invalid metrics socket address, metrics exporter disabled");
            return;
        }
    };
    if let Err(err) = PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .install()
    {
        warn!(error = %err, addr, "failed to install prometheus exporter");
    } else {
        info!(addr, "prometheus metrics exporter listening");
    }
}

async fn connect_pool(settings: &Settings) -> Result<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(settings.database.connect_timeout())
        .idle_timeout(settings.database.idle_timeout())
        .connect(&settings.database.url)
        .await
        .map_err(|e| InfraError::Database(e).into())
}

fn program_id(settings: &Settings) -> Result<Pubkey> {
    Pubkey::from_base58(&settings.program.program_id)
        .map_err(|e| DomainError::InvalidPubkey(e.to_string()).into())
}

fn new_ledger_client(settings: &Settings) -> JsonRpcLedgerClient {
    JsonRpcLedgerClient::new(settings.rpc.url.clone(), settings.rpc.request_timeout())
}

fn build_uri_worker(settings: &Settings, store: &Arc<PostgresStore>) -> Arc<UriWorker<PostgresStore, PostgresStore>> {
    Arc::new(UriWorker::new(
        Arc::clone(store),
        Arc::clone(store),
        WorkerConfig {
            max_concurrent: 10,
            dispatch_interval: Duration::from_millis(100),
            fetch_timeout: settings.metadata.timeout(),
            max_body_bytes: settings.metadata.metadata_max_bytes as u64,
            gateways: GatewayConfig {
                allow_http: settings.metadata.allow_insecure_uri,
                ..Default::default()
            },
        },
    ))
}

fn build_poller(
    settings: &Settings,
    store: &Arc<PostgresStore>,
    uri_worker: &Arc<UriWorker<PostgresStore, PostgresStore>>,
    program_id: Pubkey,
) -> Poller<
    JsonRpcLedgerClient,
    NoopDecoder,
    AgentHandler<PostgresStore, PostgresStore, PostgresStore, UriWorker<PostgresStore, PostgresStore>>,
    FeedbackHandler<PostgresStore, PostgresStore, PostgresStore, PostgresStore>,
    PostgresStore,
    PostgresStore,
    SystemClock,
> {
    let agent_handler = AgentHandler::new(
        Arc::clone(store),
        Arc::clone(store),
        Arc::clone(store),
        Arc::clone(uri_worker),
    );
    let feedback_handler = FeedbackHandler::new(
        Arc::clone(store),
        Arc::clone(store),
        Arc::clone(store),
        Arc::clone(store),
    );
    let router = EventRouter::new(agent_handler, feedback_handler);
    let buffer = EventBuffer::new(
        router,
        (**store).clone(),
        (**store).clone(),
        SystemClock,
        BufferConfig::default(),
    );
    let checkpoint = CheckpointManager::new((**store).clone());

    Poller::new(
        new_ledger_client(settings),
        NoopDecoder,
        buffer,
        checkpoint,
        program_id.to_string(),
        PollerConfig {
            polling_interval: settings.indexer.polling_interval(),
            batch_size: settings.indexer.batch_size as usize,
        },
    )
}

fn build_verifier(
    settings: &Settings,
    store: &Arc<PostgresStore>,
    program_id: Pubkey,
) -> Verifier<JsonRpcLedgerClient, PostgresStore, PostgresStore, PostgresStore, PostgresStore> {
    Verifier::new(
        new_ledger_client(settings),
        (**store).clone(),
        (**store).clone(),
        (**store).clone(),
        (**store).clone(),
        program_id,
        settings.indexer.verify_safety_margin_slots,
        settings.indexer.verify_batch_size as u32,
        settings.indexer.verify_max_retries,
    )
}

async fn run(settings: Settings) -> Result<()> {
    install_metrics_exporter(&settings);

    let pool = connect_pool(&settings).await?;
    let store = Arc::new(PostgresStore::new(pool));
    store.run_migrations().await?;

    warn!("using no-op decoder; the pipeline will advance its cursor without emitting events until a real decoder is wired in");

    let program_id = program_id(&settings)?;
    let cancel = CancellationToken::new();

    let uri_worker = build_uri_worker(&settings, &store);
    let poller = Arc::new(build_poller(&settings, &store, &uri_worker, program_id));
    let verifier = Arc::new(build_verifier(&settings, &store, program_id));

    let mut tasks = tokio::task::JoinSet::new();

    if settings.metadata.enabled() {
        let worker = Arc::clone(&uri_worker);
        let worker_cancel = cancel.clone();
        tasks.spawn(async move {
            worker.run(worker_cancel).await;
        });
    }

    if settings.indexer.verification_enabled {
        let verifier = Arc::clone(&verifier);
        let verify_cancel = cancel.clone();
        let interval = settings.indexer.verify_interval();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    () = verify_cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                if let Err(err) = verifier.run_cycle().await {
                    error!(error = %err, "verification cycle failed");
                }
            }
        });
    }

    {
        let poller = Arc::clone(&poller);
        let poller_cancel = cancel.clone();
        tasks.spawn(async move {
            if let Err(err) = poller.run(poller_cancel).await {
                error!(error = %err, "poller stopped with error");
            }
        });
    }

    shutdown_signal().await;
    info!("shutdown signal received, draining in order: uri worker, verifier, poller");
    cancel.cancel();

    while tasks.join_next().await.is_some() {}

    store.pool().close().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => warn!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn migrate(settings: &Settings) -> Result<()> {
    let pool = connect_pool(settings).await?;
    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    info!("migrations applied");
    Ok(())
}

async fn backfill(settings: Settings) -> Result<()> {
    let pool = connect_pool(&settings).await?;
    let store = Arc::new(PostgresStore::new(pool));
    let program_id = program_id(&settings)?;

    let uri_worker = build_uri_worker(&settings, &store);
    let poller = build_poller(&settings, &store, &uri_worker, program_id);

    let cancel = CancellationToken::new();
    poller.run(cancel).await?;
    info!("backfill complete");
    Ok(())
}

async fn verify_once(settings: Settings) -> Result<()> {
    let pool = connect_pool(&settings).await?;
    let store = Arc::new(PostgresStore::new(pool));
    let program_id = program_id(&settings)?;

    let verifier = build_verifier(&settings, &store, program_id);
    verifier.run_cycle().await?;
    info!("verification cycle complete");
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.environment) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Err(errors) = settings.validate() {
        for e in &errors {
            eprintln!("configuration error: {e}");
        }
        return std::process::ExitCode::FAILURE;
    }

    init_logging(&settings);
    info!(
        version = agent_feedback_indexer::VERSION,
        environment = %cli.environment,
        "starting agent feedback indexer"
    );

    let result = match cli.command {
        Commands::Run => run(settings).await,
        Commands::Migrate => migrate(&settings).await,
        Commands::Backfill => backfill(settings).await,
        Commands::VerifyOnce => verify_once(settings).await,
        Commands::Version => {
            println!("agent-feedback-indexer {}", agent_feedback_indexer::VERSION);
            Ok(())
        }
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            std::process::ExitCode::FAILURE
        }
    }
}
