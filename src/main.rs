//! Synthetic Trade Ingestor CLI

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use trade_ingestor::config::AppConfig;
use trade_ingestor::db::Database;
use trade_ingestor::generator::{GeneratorConfig, TradeGenerator};
use trade_ingestor::ingest::{IngestEvent, IngestionOrchestrator, LoggingListener, ProgressListener};
use trade_ingestor::sink::{InfluxWriter, MemorySink, Point, SinkWriter};

/// Synthetic trade ingestion CLI.
#[derive(Parser)]
#[command(name = "trade-ingestor")]
#[command(about = "Generate synthetic trades and stream them into InfluxDB", long_about = None)]
struct Cli {
    /// Run ledger database URL
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:./trade_ingestor.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the configured number of trades and write them to the sink
    Run {
        /// Override the total number of trades
        #[arg(long)]
        total: Option<u64>,

        /// Override the batch size
        #[arg(long)]
        batch: Option<usize>,

        /// Seed the generator for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Generate and count batches without writing to InfluxDB
        #[arg(long)]
        dry_run: bool,
    },

    /// Print generated trades without writing them anywhere
    Sample {
        /// Number of trades to print
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Seed the generator
        #[arg(long)]
        seed: Option<u64>,

        /// Print JSON instead of line protocol
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration
    Config,

    /// Show past ingestion runs
    History {
        /// Maximum number of runs to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            total,
            batch,
            seed,
            dry_run,
        } => {
            let mut generator_config = cli.config.generator_config()?;
            if let Some(total) = total {
                generator_config.total_trades = total;
            }
            if let Some(batch) = batch {
                generator_config.batch_size = batch;
            }
            let seed = seed.or(cli.config.rng_seed);

            let db = Database::new(&cli.database).await?;
            let generator = build_generator(generator_config, seed)?;

            if dry_run {
                run_ingestion(&db, generator, MemorySink::counting(), "dry run (no writes)").await?;
            } else {
                let influx = cli.config.influx_config();
                let target = format!("{} / {}", influx.url, influx.bucket);
                let writer = InfluxWriter::new(influx)?;
                run_ingestion(&db, generator, writer, &target).await?;
            }
        }

        Commands::Sample { count, seed, json } => {
            let generator_config = cli.config.generator_config()?;
            let mut generator = build_generator(generator_config, seed.or(cli.config.rng_seed))?;

            for trade in generator.generate_batch(count)? {
                if json {
                    println!("{}", serde_json::to_string(&trade)?);
                } else {
                    println!("{}", Point::from_trade(&trade).to_line_protocol());
                }
            }
        }

        Commands::Config => {
            let generator = cli.config.generator_config()?;
            let influx = cli.config.influx_config();

            println!("\n=== Generator Configuration ===\n");
            println!("  Total Trades:     {}", generator.total_trades);
            println!("  Batch Size:       {}", generator.batch_size);
            println!("  Symbols:          {}", generator.symbols.join(", "));
            println!("  Start Date:       {}", generator.start_date.format("%Y-%m-%d"));
            println!("  End Date:         {}", generator.end_date.format("%Y-%m-%d"));
            println!(
                "  RNG Seed:         {}",
                cli.config
                    .rng_seed
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "entropy".to_string())
            );

            println!("\n=== InfluxDB Sink ===\n");
            println!("  URL:              {}", influx.url);
            println!("  Org:              {}", influx.org);
            println!("  Bucket:           {}", influx.bucket);
            println!(
                "  Token:            {}",
                if influx.token.is_empty() { "(not set)" } else { "(set)" }
            );
            println!("  Points/Request:   {}", influx.max_points_per_request);
            println!("  Request Timeout:  {}s", influx.request_timeout.as_secs());
            println!("  Max Retry Window: {}s", influx.max_retry_elapsed.as_secs());

            println!("\n=== Run Ledger ===\n");
            println!("  Database:         {}", cli.database);
        }

        Commands::History { limit } => {
            let db = Database::new(&cli.database).await?;
            let runs = db.recent_runs(limit).await?;

            if runs.is_empty() {
                println!("No ingestion runs recorded. Use 'trade-ingestor run' to start one.");
                return Ok(());
            }

            println!(
                "\n{:<38} {:<12} {:>12} {:>12} {:<24} {}",
                "RUN", "STATUS", "PROCESSED", "TOTAL", "STARTED", "ERROR"
            );
            println!("{}", "-".repeat(120));

            for run in &runs {
                println!(
                    "{:<38} {:<12} {:>12} {:>12} {:<24} {}",
                    run.id,
                    run.status,
                    run.processed,
                    run.total,
                    truncate(&run.started_at, 23),
                    truncate(run.error_message.as_deref().unwrap_or(""), 30)
                );
            }

            let stats = db.run_stats().await?;
            println!(
                "\nCompleted: {}  Stopped: {}  Failed: {}  Interrupted: {}",
                stats.completed, stats.stopped, stats.failed, stats.interrupted
            );
        }
    }

    Ok(())
}

fn build_generator(config: GeneratorConfig, seed: Option<u64>) -> Result<TradeGenerator> {
    match seed {
        Some(seed) => {
            info!(seed, "Using seeded generator");
            TradeGenerator::with_seed(config, seed)
        }
        None => TradeGenerator::new(config),
    }
}

/// Drive one run against the given writer, recording it in the ledger.
async fn run_ingestion<W: SinkWriter>(
    db: &Database,
    generator: TradeGenerator,
    writer: W,
    target: &str,
) -> Result<()> {
    let interrupted = db.mark_interrupted_runs().await?;
    if interrupted > 0 {
        warn!(count = interrupted, "Marked runs left over from a previous crash as interrupted");
    }

    let orchestrator = IngestionOrchestrator::new(generator, writer);
    orchestrator.subscribe(LoggingListener);
    orchestrator.subscribe(console_progress());

    // Ctrl+C requests a cooperative stop at the next batch boundary
    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            stop.stop();
        }
    });

    let run_id = Uuid::new_v4();
    db.record_run_started(
        &run_id,
        orchestrator.total_target(),
        orchestrator.recommended_batch_size(),
    )
    .await?;

    println!("\n=== Synthetic Trade Ingestion ===");
    println!("Run:          {}", run_id);
    println!("Target:       {}", target);
    println!("Total trades: {}", orchestrator.total_target());
    println!("Batch size:   {}", orchestrator.recommended_batch_size());
    println!("\nPress Ctrl+C to stop.\n");

    let result = orchestrator.start_with_id(run_id).await;

    let status = orchestrator.status();
    db.record_run_finished(
        &run_id,
        status.state.as_str(),
        status.processed,
        status.last_error.as_deref(),
    )
    .await?;

    if let Err(e) = orchestrator.close().await {
        warn!(error = %e, "Failed to close sink writer");
    }

    let summary = result.context("Ingestion run failed")?;

    println!("\n=== Run Summary ===");
    println!("Status:       {}", summary.state);
    println!("Processed:    {} / {}", summary.processed, summary.total);
    println!("Elapsed:      {:.2}s", summary.elapsed().as_secs_f64());
    println!("Throughput:   {:.0} trades/s", summary.trades_per_second());

    Ok(())
}

/// Prints a status line each time progress crosses another 10%.
fn console_progress() -> impl ProgressListener {
    let last_decile = AtomicU64::new(0);

    move |event: &IngestEvent| {
        if let IngestEvent::Progress(p) = event {
            let decile = (p.percentage / 10.0).floor() as u64;
            if decile > last_decile.swap(decile, Ordering::Relaxed) {
                println!(
                    "[{}] {:>5.1}% | {}/{} trades | {:.0} trades/s | ETA {:.1}s",
                    chrono::Local::now().format("%H:%M:%S"),
                    p.percentage,
                    p.processed,
                    p.total,
                    p.trades_per_second,
                    p.estimated_remaining_ms as f64 / 1000.0
                );
            }
        }
    }
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
