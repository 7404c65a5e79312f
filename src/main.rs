//! swiftfile - Concurrent directory listing and file transfers.
//!
//! Usage:
//!   swiftfile list [PATH]                 List a directory
//!   swiftfile copy SOURCE DEST            Copy SOURCE into directory DEST
//!   swiftfile move SOURCE DEST            Move SOURCE into directory DEST
//!   swiftfile delete PATH...              Delete files or directory trees
//!   swiftfile import SOURCE... --to DIR   Copy several sources into DIR
//!   swiftfile --help                      Show help

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use swiftfile_core::{EngineConfig, Entry, WorkerPool};
use swiftfile_ops::{JobHandle, JobId, JobState, JobUpdate, TransferEngine};
use swiftfile_scan::DirectoryLister;

#[derive(Parser)]
#[command(
    name = "swiftfile",
    version,
    about = "Concurrent directory listing and file transfers",
    long_about = "swiftfile lists directories and copies, moves or deletes files \
                  on a bounded pool of workers. Transfers touching the same paths \
                  run one after another; everything else runs in parallel."
)]
struct Cli {
    /// Number of worker threads for listings and transfers
    #[arg(short, long, global = true, default_value_t = swiftfile_core::DEFAULT_WORKERS)]
    workers: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the entries of a directory
    List {
        /// Directory to list
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only show sub-directories
        #[arg(short, long)]
        dirs_only: bool,

        /// Hide entries starting with a dot
        #[arg(long)]
        no_hidden: bool,

        /// Only show entries whose name contains TEXT (case-insensitive)
        #[arg(long, value_name = "TEXT")]
        filter: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Copy a file or directory into a destination directory
    Copy {
        /// File or directory to copy
        source: PathBuf,

        /// Directory receiving the copy
        dest: PathBuf,

        /// List the destination once the copy finished
        #[arg(short, long)]
        list: bool,
    },

    /// Move a file or directory into a destination directory
    Move {
        /// File or directory to move
        source: PathBuf,

        /// Directory receiving the entry
        dest: PathBuf,

        /// List the destination once the move finished
        #[arg(short, long)]
        list: bool,
    },

    /// Delete files or directory trees
    Delete {
        /// Paths to delete
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Copy several files or directories into one directory
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Directory receiving the imports
        #[arg(short, long)]
        to: PathBuf,

        /// List the destination once every import finished
        #[arg(short, long)]
        list: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Command::List {
            path,
            dirs_only,
            no_hidden,
            filter,
            format,
        } => {
            let config = EngineConfig::builder()
                .workers(cli.workers)
                .directories_only(dirs_only)
                .include_hidden(!no_hidden)
                .build()?;
            run_list(&path, config, format, filter.as_deref()).await?;
        }
        Command::Copy { source, dest, list } => {
            let config = engine_config(cli.workers)?;
            let engine = new_engine(&config)?;
            let updates = engine.subscribe();
            let job = engine.copy(&source, &dest);
            run_transfers(updates, vec![job]).await?;
            if list {
                run_list(&dest, config, OutputFormat::Text, None).await?;
            }
        }
        Command::Move { source, dest, list } => {
            let config = engine_config(cli.workers)?;
            let engine = new_engine(&config)?;
            let updates = engine.subscribe();
            let job = engine.move_to(&source, &dest);
            run_transfers(updates, vec![job]).await?;
            if list {
                run_list(&dest, config, OutputFormat::Text, None).await?;
            }
        }
        Command::Delete { paths } => {
            let config = engine_config(cli.workers)?;
            let engine = new_engine(&config)?;
            let updates = engine.subscribe();
            let jobs = paths.iter().map(|path| engine.delete(path)).collect();
            run_transfers(updates, jobs).await?;
        }
        Command::Import { sources, to, list } => {
            let config = engine_config(cli.workers)?;
            let engine = new_engine(&config)?;
            let updates = engine.subscribe();
            let jobs = engine.import(&sources, &to);
            run_transfers(updates, jobs).await?;
            if list {
                run_list(&to, config, OutputFormat::Text, None).await?;
            }
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "swiftfile={level},swiftfile_core={level},swiftfile_scan={level},swiftfile_ops={level}"
        ))?,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {e}"))
}

fn engine_config(workers: usize) -> Result<EngineConfig> {
    Ok(EngineConfig::builder().workers(workers).build()?)
}

fn new_engine(config: &EngineConfig) -> Result<TransferEngine> {
    let pool = WorkerPool::from_config(config).context("Failed to start worker pool")?;
    Ok(TransferEngine::new(pool, config.clone()))
}

/// List one directory and print its entries.
async fn run_list(
    path: &Path,
    config: EngineConfig,
    format: OutputFormat,
    filter: Option<&str>,
) -> Result<()> {
    let pool = WorkerPool::from_config(&config).context("Failed to start worker pool")?;
    let lister = DirectoryLister::new(pool, config);
    let mut results = lister.subscribe();

    let handle = lister.list(path);
    let mut result = results
        .recv()
        .await
        .ok_or_else(|| eyre!("Listing of {} was dropped", path.display()))?;

    if let Some(failure) = result.error {
        bail!("Cannot list {}: {}", handle.target().display(), failure);
    }
    if let Some(keyword) = filter {
        filter_entries(&mut result.entries, keyword);
    }

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" {} ({} entries)", result.target.display(), result.entries.len());
            println!("{}", "─".repeat(70));
            for entry in &result.entries {
                print_entry(entry);
            }
            println!();
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.entries)?);
        }
    }

    Ok(())
}

fn print_entry(entry: &Entry) {
    if entry.is_dir() {
        println!(" ▸ {}/", truncate(&entry.name, 60));
    } else if entry.is_file() {
        println!(
            "   {:<40} {:>10}  {}",
            truncate(&entry.name, 40),
            format_size(entry.size),
            entry.modified.map(format_time).unwrap_or_default()
        );
    } else {
        println!("   {} (?)", truncate(&entry.name, 60));
    }
}

/// Keep the entries whose name contains `keyword`, ignoring case.
fn filter_entries(entries: &mut Vec<Entry>, keyword: &str) {
    let keyword = keyword.to_lowercase();
    entries.retain(|entry| entry.name.to_lowercase().contains(&keyword));
}

/// Report updates until every job in `jobs` is terminal.
///
/// `updates` must be subscribed before the jobs are submitted so that no
/// terminal update is missed.
async fn run_transfers(
    mut updates: UnboundedReceiver<JobUpdate>,
    jobs: Vec<JobHandle>,
) -> Result<()> {
    let mut pending: HashSet<JobId> = jobs.iter().map(JobHandle::id).collect();
    let mut failed = 0;

    while !pending.is_empty() {
        let Some(update) = updates.recv().await else {
            bail!("Transfer engine stopped with {} job(s) pending", pending.len());
        };
        print_update(&update);
        if update.state.is_terminal() && pending.remove(&update.id) {
            if let JobState::Failed(failure) = &update.state {
                tracing::warn!(job = %update.id, path = %failure.path.display(), "transfer failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

fn print_update(update: &JobUpdate) {
    let progress = &update.progress;
    match &update.state {
        JobState::Running if progress.files_total > 0 => {
            eprintln!(
                "[{}] {} {:>5.1}%  {}/{} files, {}",
                update.id,
                update.action,
                progress.percentage(),
                progress.files_completed,
                progress.files_total,
                format_size(progress.bytes_processed)
            );
        }
        JobState::Succeeded => {
            eprintln!(
                "[{}] {} done: {} files, {}",
                update.id,
                update.action,
                progress.files_completed,
                format_size(progress.bytes_processed)
            );
        }
        state => eprintln!("[{}] {} {}", update.id, update.action, state),
    }
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_time(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max_len - 1).collect();
        cut.push('…');
        cut
    }
}
