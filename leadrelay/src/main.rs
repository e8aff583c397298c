//! leadrelay - diagnostics and replay CLI for the capture pipeline
//!
//! The CLI is a thin consumer of the public capture surface: it inspects the
//! locally queued fallback data, exports it, replays it, and can send test
//! events through the configured sink chain.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Fallback log: $XDG_DATA_HOME/leadrelay/fallback.jsonl
//! - Logs: $XDG_STATE_HOME/leadrelay/leadrelay.log
//! - Config: $XDG_CONFIG_HOME/leadrelay/config.toml

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};

use leadrelay_core::store::FallbackRecord;
use leadrelay_core::{Config, Dispatcher};

#[derive(Parser)]
#[command(name = "leadrelay")]
#[command(about = "Inspect, export, and replay locally queued capture data")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show configured sinks and pending fallback records
    Status,
    /// Export the fallback queue
    Export {
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay the fallback queue through the configured sinks
    Retry,
    /// Send a test analytics event through the sink chain
    Send {
        /// Event name
        #[arg(default_value = "cli_test_event")]
        event: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = leadrelay_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!("leadrelay starting");

    let dispatcher = Dispatcher::from_config(&config).context("failed to build dispatcher")?;

    match args.command {
        Command::Status => status(&config, &dispatcher),
        Command::Export { format, output } => export(&dispatcher, format, output),
        Command::Retry => retry(&dispatcher).await,
        Command::Send { event } => send(&dispatcher, &event).await,
    }
}

fn status(config: &Config, dispatcher: &Dispatcher) -> Result<()> {
    println!("Session: {}", dispatcher.session_id());
    println!("Fallback log: {}", dispatcher.store().path().display());
    println!("Pending records: {}", dispatcher.store().len()?);
    println!("Configured sinks:");
    println!("  database:      {}", configured(config.sinks.database.is_some()));
    println!("  google_sheets: {}", configured(config.sinks.sheets.is_some()));
    println!("  webhook:       {}", configured(config.sinks.webhook.is_some()));
    println!("  formspree:     {}", configured(config.sinks.formspree.is_some()));
    println!("  netlify_forms: {}", configured(config.sinks.netlify.is_some()));
    Ok(())
}

fn configured(yes: bool) -> &'static str {
    if yes {
        "configured"
    } else {
        "not configured"
    }
}

fn export(dispatcher: &Dispatcher, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    let records = dispatcher.fallback_data()?;
    let rendered = match format {
        ExportFormat::Csv => render_csv(&records),
        ExportFormat::Json => serde_json::to_string_pretty(&records)?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported {} record(s) to {}", records.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{rendered}")?;
        }
    }
    Ok(())
}

fn render_csv(records: &[FallbackRecord]) -> String {
    let mut rows = vec![vec![
        "Type".to_string(),
        "Session".to_string(),
        "Captured At".to_string(),
        "Persisted At".to_string(),
        "Data".to_string(),
    ]];

    for record in records {
        rows.push(vec![
            record.envelope.payload.kind().to_string(),
            record.envelope.session_id.clone(),
            format_ms(record.envelope.timestamp),
            format_ms(record.persisted_at),
            record.envelope.payload.data_json().to_string(),
        ]);
    }

    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

async fn retry(dispatcher: &Dispatcher) -> Result<()> {
    let report = dispatcher.retry_failed_submissions().await?;
    println!(
        "Replay complete: {} attempted, {} delivered, {} retained",
        report.attempted, report.delivered, report.retained
    );
    Ok(())
}

async fn send(dispatcher: &Dispatcher, event: &str) -> Result<()> {
    match dispatcher
        .capture_analytics_event(event, Default::default())
        .await
    {
        Ok(value) => {
            println!("Accepted: {value}");
            Ok(())
        }
        Err(e) => {
            println!("All sinks failed; event queued locally");
            println!("  {e}");
            Ok(())
        }
    }
}
