// Command-line entry point for pixelshift.
// The lib.rs file holds everything else; this file only parses flags and prints results.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pixelshift::commands::{
    clear_history, convert_images, delete_history, list_history, show_history, ConvertRequest,
};
use pixelshift::history::{DateRange, HistoryFilters, HistoryRecord};
use pixelshift::processing::{ConvertOutcome, DownloadAllOutcome};
use pixelshift::utils::format_file_size;
use pixelshift::{AppState, Config, OutputFormat, StatusTag};

#[derive(Debug, Parser)]
#[command(name = "pixelshift", version, about = "Convert images between JPEG, PNG, WebP and BMP")]
struct Cli {
    /// Config file (defaults to <config dir>/pixelshift/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the history store location
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// Debug logging (PIXELSHIFT_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert files and save the results
    Convert {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output format: jpeg, png, webp or bmp
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Quality 1-100; only lossy formats use it
        #[arg(short, long)]
        quality: Option<u8>,

        /// Directory to write converted files into
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Reuse the settings of a history record
        #[arg(long, value_name = "ID")]
        reuse: Option<String>,
    },
    /// Browse and manage the conversion history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// List the supported output formats
    Formats,
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    /// Newest first, optionally filtered
    List {
        #[arg(long)]
        format: Option<OutputFormat>,
        /// Case-insensitive substring of the original file name
        #[arg(long)]
        search: Option<String>,
        /// RFC 3339 lower bound, inclusive
        #[arg(long, requires = "until")]
        since: Option<DateTime<Utc>>,
        /// RFC 3339 upper bound, inclusive
        #[arg(long, requires = "since")]
        until: Option<DateTime<Utc>>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    Show {
        id: String,
    },
    Delete {
        id: String,
    },
    Clear,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "pixelshift=debug" } else { "pixelshift=info" };
    let filter = EnvFilter::try_from_env("PIXELSHIFT_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(path) = cli.history {
        config.history_path = path;
    }
    if let Command::Convert { out_dir: Some(dir), .. } = &cli.command {
        config.output_dir = dir.clone();
    }
    debug!("Effective config: {:?}", config);

    let state = AppState::from_config(config);

    match cli.command {
        Command::Convert {
            paths,
            format,
            quality,
            reuse,
            ..
        } => run_convert(&state, ConvertRequest { paths, format, quality, reuse }).await,
        Command::History { action } => run_history(&state, action).await,
        Command::Formats => {
            for format in OutputFormat::ALL {
                let note = if format.is_lossy() { "lossy" } else { "lossless" };
                println!("{:<5} {:<6} {:<11} {}", format.tag(), format.label(), format.media_type(), note);
            }
            Ok(())
        }
    }
}

async fn run_convert(state: &AppState, request: ConvertRequest) -> anyhow::Result<()> {
    let report = convert_images(state, request).await?;

    for rejected in &report.rejected {
        println!("skipped  {}  ({})", rejected.path.display(), rejected.reason);
    }
    for item in &report.items {
        match item.status {
            StatusTag::Converted => println!(
                "ok       {}  {} -> {} ({})",
                item.name,
                format_file_size(item.source_size),
                format_file_size(item.result_size.unwrap_or_default()),
                item.result_format.tag(),
            ),
            StatusTag::Error => println!(
                "failed   {}  ({})",
                item.name,
                item.error.as_deref().unwrap_or("unknown error")
            ),
            _ => println!("pending  {}", item.name),
        }
    }
    if let DownloadAllOutcome::Downloaded { saved, .. } = &report.downloads {
        for path in saved {
            println!("saved    {}", path.display());
        }
    }

    match report.outcome {
        ConvertOutcome::NothingToConvert => {
            info!("Nothing to convert");
            Ok(())
        }
        ConvertOutcome::Converted { succeeded, failed } => {
            info!("{} converted, {} failed", succeeded, failed);
            if succeeded == 0 && failed > 0 {
                anyhow::bail!("all {failed} conversions failed");
            }
            Ok(())
        }
    }
}

async fn run_history(state: &AppState, action: HistoryAction) -> anyhow::Result<()> {
    match action {
        HistoryAction::List {
            format,
            search,
            since,
            until,
            json,
        } => {
            let filters = HistoryFilters {
                format,
                date_range: since.zip(until).map(|(start, end)| DateRange { start, end }),
                search,
            };
            let records = list_history(state, &filters).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No conversion history");
            } else {
                for record in &records {
                    print_record(record);
                }
            }
        }
        HistoryAction::Show { id } => {
            let record = show_history(state, &id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        HistoryAction::Delete { id } => {
            delete_history(state, &id).await?;
            println!("Deleted record {id}");
        }
        HistoryAction::Clear => {
            let count = clear_history(state).await?;
            println!("Cleared {count} records");
        }
    }
    Ok(())
}

fn print_record(record: &HistoryRecord) {
    println!(
        "{:>4}  {}  {:<32} {:<4} q{:<3} {} -> {}",
        record.id,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.original_name,
        record.output_format.tag(),
        record.quality,
        format_file_size(record.original_size),
        format_file_size(record.converted_size),
    );
}
