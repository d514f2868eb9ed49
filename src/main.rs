use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ranklog::{
    config::Config,
    engine::{
        dispatch::Dispatcher,
        payment::PaymentHandler,
        ranking::RankingHandler,
        traits::{LogNotifier, NullGateway},
    },
    persist::sqlite::SqliteStore,
    runtime::{
        consumer::{Consumer, ConsumerConfig},
        wakeup::WakeUp,
    },
    types::QueueKind,
};

const ALLOWED_DURATIONS: [u64; 10] = [1, 2, 5, 7, 10, 15, 20, 30, 45, 60];

/// Processes queued ranking or payment mutations for a bounded time.
#[derive(Parser, Debug)]
#[command(name = "ranklog-worker", author, version, about, long_about = None)]
struct Args {
    /// Minutes to stay active (1, 2, 5, 7, 10, 15, 20, 30, 45 or 60)
    #[arg(value_parser = parse_duration)]
    duration: u64,

    /// Read the duration as seconds and skip most of the settle time
    #[arg(long)]
    quick: bool,

    /// Queue to drain
    #[arg(long, value_parser = parse_queue, default_value = "ranking")]
    queue: QueueKind,

    /// SQLite database path
    #[arg(long, default_value = "ranklog.db")]
    database: PathBuf,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_duration(s: &str) -> Result<u64, String> {
    let value: u64 = s.parse().map_err(|_| format!("{s:?} is not a number"))?;
    if ALLOWED_DURATIONS.contains(&value) {
        Ok(value)
    } else {
        Err(format!("duration must be one of {ALLOWED_DURATIONS:?}"))
    }
}

fn parse_queue(s: &str) -> Result<QueueKind, String> {
    QueueKind::from_name(s).ok_or_else(|| format!("queue must be \"ranking\" or \"payment\", not {s:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ranklog={},ranklog_worker={}", args.log_level, args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    let queue = args.queue;
    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("opening database {}", args.database.display()))?;
    let log = Arc::new(store.mutation_log(queue));
    let repo = Arc::new(store);
    let notifier = Arc::new(LogNotifier);

    let dispatcher = match queue {
        QueueKind::Ranking => Dispatcher::new().with_handler(RankingHandler::new(repo, notifier)),
        QueueKind::Payment => Dispatcher::new().with_handler(PaymentHandler::new(
            repo,
            Arc::new(NullGateway),
            notifier,
        )),
    };

    let wakeup = WakeUp::new(queue);
    if let Some(port) = config.worker.wakeup_port {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        if let Err(err) = wakeup.listen_udp(addr).await {
            warn!(%addr, %err, "ping listener unavailable, relying on polling");
        }
    }

    let consumer_config = ConsumerConfig::from_worker(&config.worker, args.duration, args.quick);
    info!(
        %queue,
        duration = args.duration,
        quick = args.quick,
        database = %args.database.display(),
        "worker starting"
    );
    let handle = Consumer::new(log, dispatcher, wakeup, consumer_config).spawn();

    let stop = handle.stop_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, stopping");
            stop.cancel();
        }
    });

    match handle.join().await {
        Ok(report) => info!(
            processed = report.processed,
            skipped = report.skipped,
            high_water = report.high_water,
            "worker done"
        ),
        // storage trouble ends this run; the next scheduled worker retries
        Err(err) => error!(error = ?err, "worker aborted"),
    }
    Ok(())
}
