//! mssql-schema-collector CLI - SQL Server catalog harvester.

use clap::{Parser, Subcommand};
use mssql_schema_collector::{
    CatalogSource, CollectorError, Config, CycleOutcome, CycleReport, MssqlSource,
    NdjsonSubmitter, SchemaCollector, Submitter,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mssql-schema-collector")]
#[command(about = "Incremental SQL Server schema collector")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "collector.yaml")]
    config: PathBuf,

    /// Output JSON reports instead of text summaries
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run collection cycles on the configured interval
    Collect {
        /// Discover databases, collect once and exit
        #[arg(long)]
        once: bool,

        /// Stop after this many cycles (the discovery cycle included)
        #[arg(long)]
        cycles: Option<u32>,

        /// Override collection interval in seconds
        #[arg(long)]
        interval: Option<f64>,

        /// Write export documents to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the databases a cycle would collect
    Databases,

    /// Test the source connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), CollectorError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(CollectorError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Collect {
            once,
            cycles,
            interval,
            output,
        } => {
            if let Some(seconds) = interval {
                config.collection.collection_interval = seconds;
            }
            if output.is_some() {
                config.export.output = output;
            }
            config.validate()?;

            let source = MssqlSource::new(config.source.clone()).await?;
            if config.export.dbms_version.is_none() {
                let version = source.server_version().await?;
                config.export.dbms_version = version.lines().next().map(|l| l.trim().to_string());
            }

            let submitter: Arc<dyn Submitter> = match &config.export.output {
                Some(path) => Arc::new(NdjsonSubmitter::append(path).await?),
                None => Arc::new(NdjsonSubmitter::stdout()),
            };
            let reports_to_stderr = config.export.output.is_none();

            let mut collector = SchemaCollector::new(&config, Arc::new(source), submitter)?;
            let cancel_token = setup_signal_handler().await?;
            let max_cycles = if once { Some(2) } else { cycles };
            let interval = Duration::from_secs_f64(config.collection.collection_interval);

            let mut completed: u32 = 0;
            loop {
                match collector.collect_cycle().await {
                    Ok(report) => print_report(&report, cli.output_json, reports_to_stderr)?,
                    Err(e) if max_cycles.is_some() => return Err(e),
                    Err(e) => error!("Collection cycle failed: {}", e),
                }
                completed += 1;

                if max_cycles.is_some_and(|max| completed >= max) {
                    break;
                }
                // Discovery only remembers databases; collect straight after it with --once
                if once {
                    continue;
                }

                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        info!("Shutdown requested, stopping after {} cycles", completed);
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        Commands::Databases => {
            let source = MssqlSource::new(config.source.clone()).await?;
            let databases = source.list_databases().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&databases)?);
            } else {
                for database in &databases {
                    println!("{}", database);
                }
            }
        }

        Commands::HealthCheck => {
            let start = Instant::now();
            let result = match MssqlSource::new(config.source.clone()).await {
                Ok(source) => source.server_version().await.map(|v| (source, v)),
                Err(e) => Err(e),
            };
            let latency_ms = start.elapsed().as_millis() as u64;

            let (healthy, version, error) = match &result {
                Ok((_, version)) => (true, Some(version.lines().next().unwrap_or("").trim()), None),
                Err(e) => (false, None, Some(e.to_string())),
            };

            if cli.output_json {
                let value = serde_json::json!({
                    "healthy": healthy,
                    "host": config.source.host,
                    "latency_ms": latency_ms,
                    "server_version": version,
                    "error": error,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MSSQL {}:{}): {} ({}ms)",
                    config.source.host,
                    config.source.port,
                    if healthy { "OK" } else { "FAILED" },
                    latency_ms
                );
                if let Some(version) = version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = error {
                    println!("    Error: {}", err);
                }
            }

            if let Err(e) = result {
                return Err(e);
            }
        }
    }

    Ok(())
}

fn print_report(report: &CycleReport, json: bool, to_stderr: bool) -> Result<(), CollectorError> {
    let text = if json {
        report.to_json()?
    } else {
        summarize(report)
    };
    if to_stderr {
        eprintln!("{}", text);
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn summarize(report: &CycleReport) -> String {
    if report.outcome == CycleOutcome::Discovered {
        return format!(
            "Discovery cycle {}: {} databases found",
            report.run_id, report.databases_total
        );
    }

    let mut lines = vec![
        format!("Collection cycle {} completed!", report.run_id),
        format!("  Duration: {:.2}s", report.duration_seconds),
        format!(
            "  Databases: {}/{}",
            report.databases_collected, report.databases_total
        ),
        format!("  Schemas: {}", report.schemas),
        format!("  Tables: {}", report.tables),
        format!("  Columns: {}", report.columns),
        format!("  Documents: {}", report.submissions),
    ];
    if report.drift_detected {
        lines.push("  Database list drift detected".to_string());
    }
    for point in &report.truncations {
        lines.push(format!(
            "  Truncated at {}.{} (column limit)",
            point.database, point.schema
        ));
    }
    for failure in &report.databases_failed {
        lines.push(format!("  Failed {}: {}", failure.database, failure.error));
    }
    lines.join("\n")
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays free for export documents
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for shutdown between cycles.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<CancellationToken, CollectorError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Stopping after the current cycle...");
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Stopping after the current cycle...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<CancellationToken, CollectorError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current cycle...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
