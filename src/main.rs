use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use metricwatch::report::{export_json, render_line, Summary};
use metricwatch::{logging, App, Persisted, Settings};
use metricwatch_cache::{AdapterFetcher, MetricsCache, MetricSnapshot};
use metricwatch_types::{MetricConfig, MetricConfigPatch, RefreshInterval};

#[derive(Parser, Debug)]
#[command(name = "metricwatch")]
#[command(about = "Threshold monitoring for operational metrics")]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "metricwatch_cache=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh on the configured interval until interrupted
    Watch,
    /// Refresh every metric once and print the result
    Once,
    /// Refresh every metric once and write the result as JSON
    Export { path: PathBuf },
    /// List metric definitions
    List,
    /// Add a metric from a JSON definition
    Add { file: PathBuf },
    /// Apply a partial JSON update to a metric
    Update { id: String, file: PathBuf },
    /// Delete a metric
    Delete { id: String },
    /// Delete every metric
    Clear,
    /// Show the refresh interval, or set it in milliseconds
    Interval { millis: Option<u64> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    let directive = args.log_level.as_deref().or(settings.log_level.as_deref());
    logging::init_logging(directive);

    let adapter = settings
        .adapter()
        .context("Failed to build data source adapter")?;
    let store = settings
        .config_store()
        .context("Failed to build configuration store")?;
    let app = App::new(store, MetricsCache::new(AdapterFetcher::new(adapter)));
    app.load().await.context("Failed to load metric configuration")?;

    match args.command {
        Command::Watch => watch(&app).await,
        Command::Once => {
            print_snapshots(&app.refresh_now().await);
            Ok(())
        }
        Command::Export { path } => export_to_file(&app, &path).await,
        Command::List => {
            list(&app);
            Ok(())
        }
        Command::Add { file } => {
            let metric: MetricConfig = read_json(&file)?;
            let persisted = app.add_metric(metric).await?;
            report_persisted(&persisted, &format!("Added metric {}", persisted.value));
            Ok(())
        }
        Command::Update { id, file } => {
            let patch: MetricConfigPatch = read_json(&file)?;
            let persisted = app.update_metric(&id, patch).await?;
            report_persisted(&persisted, &format!("Updated metric {id}"));
            Ok(())
        }
        Command::Delete { id } => {
            let persisted = app.delete_metric(&id).await?;
            report_persisted(&persisted, &format!("Deleted metric {id}"));
            Ok(())
        }
        Command::Clear => {
            let persisted = app.clear_metrics().await?;
            report_persisted(&persisted, "Cleared all metrics");
            Ok(())
        }
        Command::Interval { millis: None } => {
            println!("{}", app.refresh_interval());
            Ok(())
        }
        Command::Interval { millis: Some(ms) } => {
            let persisted = app
                .set_refresh_interval(RefreshInterval::from_millis(ms))
                .await?;
            report_persisted(&persisted, &format!("Refresh interval set to {}", persisted.value));
            Ok(())
        }
    }
}

async fn watch(app: &App) -> Result<()> {
    let mut updates = app.updates();
    app.start();
    info!(interval = %app.refresh_interval(), "Watching {} metrics", app.metrics().len());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshots = updates.borrow_and_update().clone();
                print_snapshots(&snapshots);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    app.stop();
    Ok(())
}

fn print_snapshots(snapshots: &[std::sync::Arc<MetricSnapshot>]) {
    for snapshot in snapshots {
        println!("{}", render_line(snapshot));
    }
    let summary = Summary::of(snapshots);
    println!(
        "-- {} metrics: {} normal, {} warning, {} critical, {} unavailable",
        summary.total, summary.normal, summary.warning, summary.critical, summary.errors
    );
}

fn list(app: &App) {
    for metric in app.metrics() {
        let source = &metric.data_source;
        println!(
            "{:<38} {:<28} {:<12} every {}  {}",
            metric.id,
            metric.name,
            source.kind.type_name(),
            source.refresh_interval,
            source.kind.query().unwrap_or("")
        );
    }
}

/// Refresh once and write the JSON export.
async fn export_to_file(app: &App, export_path: &Path) -> Result<()> {
    use std::io::Write;

    let snapshots = app.refresh_now().await;
    let export = export_json(&snapshots).context("Failed to serialize export")?;

    let mut file = fs::File::create(export_path)
        .with_context(|| format!("Failed to create {}", export_path.display()))?;
    serde_json::to_writer_pretty(&mut file, &export)?;
    writeln!(file)?;

    println!("Exported {} metrics to {}", snapshots.len(), export_path.display());
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn report_persisted<T>(persisted: &Persisted<T>, message: &str) {
    match &persisted.warning {
        Some(warning) => println!("{message} ({warning})"),
        None => println!("{message}"),
    }
}
