mod config;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use cmdvcs_core::{
    AdapterError, ChangeKind, ChangedFile, CmdlineVcs, Configurable, RevisionId, VcsBackend,
};
use cmdvcs_logging::LogFormat;

use crate::config::ProjectConfig;

/// Exit code when `root` finds no checkout
const EXIT_NO_ROOT: i32 = 1;
/// Exit code after Ctrl+C, as shells report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "cmdvcs",
    about = "Query a command-line VCS tool",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the external VCS tool
    #[arg(long, global = true)]
    tool: Option<PathBuf>,

    /// Timeout for each tool invocation (e.g. "30s", "2m")
    #[arg(long, global = true, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List changed files and the revision each is based on
    Changes {
        /// Directories to scan, merged in order (default: working directory)
        dirs: Vec<PathBuf>,
    },
    /// Write the base content of a file at a revision to stdout
    Show { file: PathBuf, revision: String },
    /// Print the VCS root containing a directory
    Root {
        /// Directory to resolve (default: working directory)
        dir: Option<PathBuf>,
    },
    /// Check whether each directory is a VCS root
    IsRoot {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Show the effective adapter settings
    Settings,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Serialize)]
struct ChangeReport {
    path: PathBuf,
    base_revision: RevisionId,
    kind: ChangeKind,
}

impl From<ChangedFile> for ChangeReport {
    fn from(file: ChangedFile) -> Self {
        let kind = file.kind();
        Self {
            path: file.path,
            base_revision: file.base_revision,
            kind,
        }
    }
}

#[derive(Serialize)]
struct RootReport<'a> {
    dir: &'a Path,
    root: Option<&'a Path>,
}

#[derive(Serialize)]
struct IsRootReport<'a> {
    dir: &'a Path,
    is_root: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    cmdvcs_logging::init_tracing(&cli.log_level, cli.log_format.into());

    // Determine working directory
    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let project = ProjectConfig::discover(&working_dir)?;
    let adapter_config = project.adapter_config(cli.tool.clone(), cli.timeout);
    debug!(
        tool = %adapter_config.tool_path.display(),
        timeout_ms = adapter_config.timeout.as_millis(),
        "Loaded configuration"
    );

    let root_cache = Arc::new(adapter_config.new_root_cache());
    let vcs = CmdlineVcs::new(adapter_config, root_cache);

    // Handle Ctrl+C by cancelling the running listing
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupt_handle = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let code = match &cli.command {
        Command::Changes { dirs } => {
            let dirs: Vec<PathBuf> = if dirs.is_empty() {
                vec![working_dir.clone()]
            } else {
                dirs.iter()
                    .map(|d| resolve_dir(&working_dir, Some(d.as_path())))
                    .collect()
            };
            run_changes(&vcs, &dirs, &interrupted, cli.json)?
        }
        Command::Show { file, revision } => {
            let file = resolve_dir(&working_dir, Some(file.as_path()));
            run_show(&vcs, &file, revision)?
        }
        Command::Root { dir } => {
            let dir = resolve_dir(&working_dir, dir.as_deref());
            run_root(&vcs, &dir, cli.json)?
        }
        Command::IsRoot { dirs } => {
            let dirs: Vec<PathBuf> = dirs
                .iter()
                .map(|d| resolve_dir(&working_dir, Some(d.as_path())))
                .collect();
            run_is_root(&vcs, &dirs, cli.json)?
        }
        Command::Settings => run_settings(&vcs, cli.json)?,
    };

    std::process::exit(code);
}

/// Make `path` absolute against the working directory
fn resolve_dir(working_dir: &Path, path: Option<&Path>) -> PathBuf {
    match path {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => working_dir.join(p),
        None => working_dir.to_path_buf(),
    }
}

fn run_changes(
    vcs: &CmdlineVcs,
    dirs: &[PathBuf],
    interrupted: &AtomicBool,
    json: bool,
) -> Result<i32> {
    let files = match vcs.list_changed_files_in_scope(dirs, interrupted) {
        Ok(files) => files,
        Err(AdapterError::Cancelled) => {
            eprintln!("Interrupted.");
            return Ok(EXIT_INTERRUPTED);
        }
        Err(e) => return Err(e).context("Failed to list changes"),
    };

    let reports: Vec<ChangeReport> = files
        .into_iter()
        .map(|(path, revision)| ChangedFile::new(path, revision).into())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(0);
    }

    for report in &reports {
        let kind = match report.kind {
            ChangeKind::Added => report.kind.as_str().green(),
            ChangeKind::Modified => report.kind.as_str().yellow(),
            ChangeKind::Deleted => report.kind.as_str().red(),
        };
        println!(
            "{}\t{}\t{}",
            kind,
            report.base_revision,
            report.path.display()
        );
    }

    Ok(0)
}

fn run_show(vcs: &CmdlineVcs, file: &Path, revision: &str) -> Result<i32> {
    let content = vcs
        .base_content(file, &RevisionId::parse(revision))
        .with_context(|| format!("Failed to load {} at {}", file.display(), revision))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;

    Ok(0)
}

fn run_root(vcs: &CmdlineVcs, dir: &Path, json: bool) -> Result<i32> {
    let root = vcs.resolve_root(dir);

    if json {
        let report = RootReport {
            dir,
            root: root.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(ref root) = root {
        println!("{}", root.display());
    } else {
        eprintln!("{} is not under version control", dir.display());
    }

    Ok(if root.is_some() { 0 } else { EXIT_NO_ROOT })
}

fn run_is_root(vcs: &CmdlineVcs, dirs: &[PathBuf], json: bool) -> Result<i32> {
    let reports: Vec<IsRootReport> = dirs
        .iter()
        .map(|dir| IsRootReport {
            dir: dir.as_path(),
            is_root: vcs.is_root(dir),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}\t{}", report.is_root, report.dir.display());
        }
    }

    Ok(0)
}

fn run_settings(vcs: &CmdlineVcs, json: bool) -> Result<i32> {
    let Some(configurable): Option<&dyn Configurable> = vcs.configurable() else {
        return Ok(0);
    };
    let settings = configurable.settings();

    if json {
        let map: serde_json::Map<String, serde_json::Value> = settings
            .into_iter()
            .map(|(key, value)| (key, serde_json::Value::String(value)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        println!("{}", configurable.display_name().bold());
        for (key, value) in settings {
            println!("  {} = {}", key, value);
        }
    }

    Ok(0)
}
