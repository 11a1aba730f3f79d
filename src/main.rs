//! dirstat - directory statistics: size, file count, age and extension rollups.
//!
//! Usage:
//!   dirstat [PATH]          Print the directory tree with totals
//!   dirstat json [PATH]     Print the tree as JSON for later re-use
//!   dirstat --help          Show help
//!
//! PATH may also be a JSON file written by `dirstat json`.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use dirstat_analyze::{Measured, RankConfig, Ranker, Row, SortKey};
use dirstat_core::{
    FileEntry, FileTree, Tree, WalkConfig, WalkError, WalkWarning, path_segments,
};
use dirstat_scan::{ProgressTotals, Walker};

/// Depth used for a walked directory when `--depth` is not given.
const DEFAULT_DEPTH: usize = 2;

#[derive(Parser)]
#[command(
    name = "dirstat",
    version,
    about = "Analyze file statistics of a directory tree",
    long_about = "dirstat walks a directory and reports size, file count, latest \
                  modification and per-extension totals for every directory.\n\n\
                  Deeper files are always counted; `--depth` only limits how many \
                  levels are listed individually."
)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    /// Sort by one of [size, count, age, name]
    #[arg(short, long, default_value = "size")]
    sort: SortKey,

    /// Show entries until this fraction of the total is reached, then
    /// collapse the rest (size and count sorting only)
    #[arg(short, long, default_value_t = 1.0)]
    cutoff: f64,

    /// Also list files by extension below each directory
    #[arg(short = 'x', long)]
    extensions: bool,

    /// Do not list individual files
    #[arg(long)]
    only_dirs: bool,

    /// Log level for diagnostics on stderr
    #[arg(long, value_enum, default_value_t = LogLevel::Silent)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Where the tree comes from and how much of it is kept.
#[derive(Args, Clone)]
struct SourceArgs {
    /// Directory to analyze, or a JSON file from `dirstat json`
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Depth of the listed tree; -1 for unlimited.
    /// Defaults to 2 for directories and unlimited for JSON input
    #[arg(short, long, allow_negative_numbers = true)]
    depth: Option<i64>,

    /// Glob patterns of file or directory names to skip (repeatable)
    #[arg(short, long = "exclude", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Sub-path to focus on, relative to PATH (e.g. `src/core`)
    #[arg(long)]
    select: Option<String>,

    /// Abort on unreadable directories instead of counting them as empty
    #[arg(long)]
    strict: bool,

    /// Threads for reading directories (0 = automatic, 1 = serial)
    #[arg(short = 'j', long, default_value_t = 0)]
    threads: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tree as JSON for later re-use
    Json {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    #[default]
    Silent,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_tracing(cli.log_level);

    match &cli.command {
        Some(Command::Json { source }) => {
            let tree = load(source)?;
            println!("{}", tree.to_json_pretty().context("Failed to encode tree")?);
        }
        None => {
            let ranker = Ranker::new(
                RankConfig::builder()
                    .key(cli.sort)
                    .cutoff(cli.cutoff)
                    .build()
                    .context("Invalid sort options")?,
            );
            let tree = load(&cli.source)?;
            let printer = TreePrinter {
                ranker,
                extensions: cli.extensions,
                only_dirs: cli.only_dirs,
            };
            print!("{}", printer.print(tree.root()));

            if let Some(summary) = warning_summary(tree.warnings()) {
                eprintln!("{summary}");
            }
        }
    }

    Ok(())
}

/// One-line note about entries the walk had to skip, if any.
fn warning_summary(warnings: &[WalkWarning]) -> Option<String> {
    match warnings.len() {
        0 => None,
        1 => Some("1 entry could not be read".to_string()),
        n => Some(format!("{n} entries could not be read")),
    }
}

fn setup_tracing(level: LogLevel) {
    if let Some(level) = level.to_tracing_level() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .without_time()
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Walk or decode the source, then narrow it to the selected sub-path.
fn load(args: &SourceArgs) -> Result<FileTree> {
    let segments = args
        .select
        .as_deref()
        .map(path_segments)
        .unwrap_or_default();

    let is_dir = args.path.is_dir();
    let depth = match args.depth {
        Some(d) if d < 0 => None,
        Some(d) => Some(d as usize),
        None if is_dir => Some(DEFAULT_DEPTH),
        None => None,
    };

    let config = WalkConfig::builder()
        .root(args.path.clone())
        .exclude(args.exclude.clone())
        .max_depth(depth.map(|d| d + segments.len()))
        .threads(args.threads)
        .strict(args.strict)
        .build()
        .context("Invalid walk options")?;

    let tree = if is_dir {
        walk_with_progress(config)?
    } else {
        dirstat_scan::open(&config).with_context(|| describe(&args.path))?
    };

    for warning in tree.warnings() {
        debug!(path = %warning.path.display(), kind = ?warning.kind, "{}", warning.message);
    }

    if segments.is_empty() {
        return Ok(tree);
    }
    tree.into_subtree(&segments)
        .with_context(|| format!("Cannot select '{}'", args.select.as_deref().unwrap_or_default()))
}

fn describe(path: &Path) -> String {
    format!("Failed to analyze {}", path.display())
}

/// Run the walk in the background while reporting progress on stderr.
fn walk_with_progress(config: WalkConfig) -> Result<FileTree> {
    let path = config.root.clone();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let result = runtime.block_on(async move {
        let walker = Walker::new(config);
        let mut progress_rx = walker.subscribe();
        let mut handle = walker.spawn();

        let show = std::io::stderr().is_terminal();
        let mut totals = ProgressTotals::new();
        let mut progress_open = true;

        let result = loop {
            tokio::select! {
                result = &mut handle.done => {
                    break result.unwrap_or(Err(WalkError::Interrupted));
                }
                delta = progress_rx.recv(), if progress_open => match delta {
                    Ok(delta) => {
                        totals.apply(delta);
                        if show {
                            eprint!(
                                "\r{} files, {} ({:.0} files/s)",
                                totals.files,
                                format_size(totals.bytes),
                                totals.files_per_second()
                            );
                        }
                    }
                    Err(RecvError::Lagged(missed)) => warn!(missed, "progress events dropped"),
                    Err(RecvError::Closed) => progress_open = false,
                },
            }
        };

        if show && totals.files > 0 {
            eprint!("\r\x1b[K");
        }
        debug!(elapsed_ms = totals.elapsed().as_millis() as u64, "walk done");
        result
    });

    result.with_context(|| describe(&path))
}

/// Plain-text tree rendering.
struct TreePrinter {
    ranker: Ranker,
    extensions: bool,
    only_dirs: bool,
}

impl TreePrinter {
    fn print(&self, root: &Tree<FileEntry>) -> String {
        let mut out = String::new();
        out.push_str(&format_line("", root));
        self.print_children(root, "", &mut out);
        out
    }

    fn print_children(&self, node: &Tree<FileEntry>, prefix: &str, out: &mut String) {
        let children: Vec<&Tree<FileEntry>> = node
            .children
            .iter()
            .filter(|c| !self.only_dirs || c.value.is_dir)
            .collect();
        let rows = self.ranker.rank(children);

        let ext_rows = match (&node.value.extensions, self.extensions) {
            (Some(ext), true) => self.ranker.rank(ext.values()),
            _ => Vec::new(),
        };

        let total = rows.len() + ext_rows.len();
        for (i, row) in rows.iter().enumerate() {
            let last = i + 1 == total;
            out.push_str(&format_line(&branch(prefix, last), row));
            if let Row::Item(child) = row {
                self.print_children(child, &indent(prefix, last), out);
            }
        }
        for (i, row) in ext_rows.iter().enumerate() {
            let last = rows.len() + i + 1 == total;
            out.push_str(&format_line(&branch(prefix, last), row));
        }
    }
}

fn branch(prefix: &str, last: bool) -> String {
    format!("{prefix}{}", if last { "└─ " } else { "├─ " })
}

fn indent(prefix: &str, last: bool) -> String {
    format!("{prefix}{}", if last { "   " } else { "│  " })
}

fn format_line(prefix: &str, item: &impl Measured) -> String {
    format!(
        "{:<48} {:>10} {:>8}  {}\n",
        truncate(&format!("{prefix}{}", item.name()), 48),
        format_size(item.size()),
        item.count(),
        format_time(item.modified()),
    )
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
