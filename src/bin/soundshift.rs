//! CLI binary for soundshift.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, stages the given files and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use soundshift::{
    human_size, messages, resolve_paths, summarize, AdmissionReport, BatchProgressCallback,
    BatchResult, ConversionOptions, ConvertedFile, Converter, ConverterConfig, DisplayModel,
    DownloadAll, FileError, LimitsResolver, LimitsStatus, ProgressCallback, ProgressEvent,
    SelectionSet, ServerLimits, UnreadableInput,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn shorten(msg: &str, max: usize) -> String {
    let first_line = msg.lines().next().unwrap_or("");
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        first_line.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar that follows the run's percentage plus
/// one log line per finished file.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} file(s)…"))
        ));
    }

    fn on_progress(&self, event: &ProgressEvent) {
        self.bar.set_position(event.percent.round() as u64);
        match event.current_file {
            Some(ref name) => self
                .bar
                .set_message(format!("{}/{}  {}", event.completed, event.total, name)),
            None => self.bar.set_message(""),
        }
    }

    fn on_file_complete(&self, index: usize, total: usize, file: &ConvertedFile) {
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {}  →  {}  {}",
            green("✓"),
            index + 1,
            total,
            file.original_name,
            file.output_name,
            dim(&human_size(file.size)),
        ));
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &FileError) {
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&shorten(&error.to_string(), 80)),
        ));
    }

    fn on_batch_complete(&self, _total: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert two files with the default quality (192k) into ./converted
  soundshift intro.wav outro.flac

  # Ask the service for MP3 at 320k
  soundshift --format mp3 --quality 320k session/*.wav

  # Talk to a remote deployment; limits are read from {base}/config
  soundshift --base-url https://convert.example.com take1.aiff

  # Only show which files would be staged
  soundshift --dry-run ~/Music/raw/*

  # Machine-readable report
  soundshift --json a.ogg b.ogg > report.json

LIMITS:
  Until the server answers, uploads are assumed to be capped at 50 MB.
  Files over the active limit are listed and skipped before anything is sent.
  At most 15 files are staged per run.

ENVIRONMENT VARIABLES:
  SOUNDSHIFT_BASE_URL         Base URL of the conversion service
  SOUNDSHIFT_ENDPOINT         Override the conversion endpoint
  SOUNDSHIFT_CONFIG_ENDPOINT  Override the limits endpoint
  SOUNDSHIFT_FORMAT           Target format sent to the service
  SOUNDSHIFT_QUALITY          Quality string sent to the service
  SOUNDSHIFT_OUTPUT_DIR       Where converted files are written
  RUST_LOG                    Override log filtering (e.g. soundshift=debug)
"#;

/// Convert a batch of audio files with a remote conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "soundshift",
    version,
    about = "Convert a batch of audio files with a remote conversion service",
    long_about = "Stage up to 15 audio files, check them against the upload limits the \
server declares, send each one to the conversion service and save the results.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Audio files to convert.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Base URL of the service; sets both the convert and config endpoints.
    #[arg(long, env = "SOUNDSHIFT_BASE_URL")]
    base_url: Option<String>,

    /// Conversion endpoint (overrides --base-url).
    #[arg(long, env = "SOUNDSHIFT_ENDPOINT")]
    endpoint: Option<String>,

    /// Limits endpoint (overrides --base-url).
    #[arg(long, env = "SOUNDSHIFT_CONFIG_ENDPOINT")]
    config_endpoint: Option<String>,

    /// Target format, e.g. mp3, m4a, ogg. The service default when unset.
    #[arg(short, long, env = "SOUNDSHIFT_FORMAT")]
    format: Option<String>,

    /// Quality string passed to the service.
    #[arg(long, env = "SOUNDSHIFT_QUALITY", default_value = "192k")]
    quality: String,

    /// Directory for converted files.
    #[arg(short, long, env = "SOUNDSHIFT_OUTPUT_DIR", default_value = "converted")]
    output_dir: PathBuf,

    /// Files in flight at once. 1 keeps strict per-file progress.
    #[arg(short, long, env = "SOUNDSHIFT_CONCURRENCY", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=8))]
    concurrency: u16,

    /// Per-upload timeout in seconds.
    #[arg(long, env = "SOUNDSHIFT_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Print a JSON report instead of the human summary.
    #[arg(long, env = "SOUNDSHIFT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SOUNDSHIFT_NO_PROGRESS")]
    no_progress: bool,

    /// Stage the files and print the admission report, then stop.
    #[arg(long)]
    dry_run: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SOUNDSHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SOUNDSHIFT_QUIET")]
    quiet: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    limits: &'a ServerLimits,
    unreadable: &'a [UnreadableInput],
    admission: &'a AdmissionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a BatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display: Option<&'a DisplayModel>,
    saved: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would
    // interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dry_run;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Limits refresh races input resolution ────────────────────────────
    let mut limits_handle = LimitsResolver::from_config(&config)
        .context("Failed to set up the limits client")?
        .spawn_refresh();

    let paths = cli.files.clone();
    let inputs = tokio::task::spawn_blocking(move || resolve_paths(paths.as_slice()))
        .await
        .context("Input resolution task failed")?;
    if !cli.quiet && !cli.json {
        print_unreadable(&inputs.unreadable);
    }

    let limits = limits_handle.settled().await;

    // ── Admission ────────────────────────────────────────────────────────
    let mut selection = SelectionSet::from_config(&config);
    let report = selection
        .submit(inputs.candidates, &limits, &config.media_filter)
        .context("No files could be staged")?;

    if !cli.quiet && !cli.json {
        print_admission(&report, &selection, &limits);
    }

    if cli.dry_run {
        if cli.json {
            print_json(&JsonReport {
                limits: &limits,
                unreadable: &inputs.unreadable,
                admission: &report,
                result: None,
                display: None,
                saved: Vec::new(),
            })?;
        }
        return Ok(());
    }

    if selection.is_empty() {
        anyhow::bail!("Nothing left to convert after admission");
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let options = ConversionOptions::new(cli.quality.clone(), cli.format.clone());
    let converter = Converter::new(config).context("Failed to set up the conversion client")?;
    let result = converter
        .start(selection.files(), &limits, &options)
        .await
        .context("Conversion failed")?;

    let display = summarize(&result);
    let saved = if result.successes().is_empty() {
        Vec::new()
    } else {
        DownloadAll::run(&result, &cli.output_dir)
            .await
            .with_context(|| format!("Failed to save into {}", cli.output_dir.display()))?
    };

    if cli.json {
        print_json(&JsonReport {
            limits: &limits,
            unreadable: &inputs.unreadable,
            admission: &report,
            result: Some(&result),
            display: Some(&display),
            saved,
        })?;
    } else if !cli.quiet {
        print_display(&display, &saved);
    }

    if result.successes().is_empty() {
        if cli.quiet {
            if let Some(ref banner) = display.error_banner {
                eprintln!("{banner}");
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .concurrency(usize::from(cli.concurrency))
        .request_timeout_secs(cli.timeout);

    if let Some(ref base) = cli.base_url {
        builder = builder.base_url(base);
    }
    if let Some(ref url) = cli.endpoint {
        builder = builder.endpoint(url.clone());
    }
    if let Some(ref url) = cli.config_endpoint {
        builder = builder.config_endpoint(url.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_unreadable(unreadable: &[UnreadableInput]) {
    for input in unreadable {
        eprintln!("{} {}", yellow("⚠"), input.reason);
    }
}

fn print_admission(report: &AdmissionReport, selection: &SelectionSet, limits: &ServerLimits) {
    if report.rejected > 0 {
        eprintln!(
            "{} {} file(s) ignored: not audio",
            dim("·"),
            report.rejected
        );
    }
    if report.duplicates > 0 {
        eprintln!(
            "{} {} duplicate file(s) skipped",
            dim("·"),
            report.duplicates
        );
    }
    if !report.oversized.is_empty() {
        eprintln!(
            "{} {}",
            yellow("⚠"),
            messages::oversized_skipped(&report.oversized_names(), &report.limit_text)
        );
    }
    if report.truncated {
        eprintln!(
            "{} {}",
            yellow("⚠"),
            messages::truncated(selection.capacity(), report.added)
        );
    }
    if report.limits_status == LimitsStatus::Degraded {
        eprintln!(
            "{} Could not confirm the server limits; assuming {}.",
            yellow("⚠"),
            limits.readable_limit_text(false)
        );
    }

    eprintln!(
        "{} {} file(s) staged  {}",
        cyan("◆"),
        bold(&selection.len().to_string()),
        dim(&format!("limit {}", report.limit_text))
    );
    for file in selection.files() {
        eprintln!("    {}  {}", file.name(), dim(&human_size(file.size())));
    }
}

fn print_display(display: &DisplayModel, saved: &[PathBuf]) {
    if let Some(ref banner) = display.error_banner {
        eprintln!("{} {}", red("✘"), banner);
        return;
    }
    if let Some(ref headline) = display.headline {
        eprintln!("{} {}", green("✔"), bold(headline));
    }
    for path in saved {
        eprintln!("    {}", path.display());
    }
    if let Some(ref warning) = display.warning {
        eprintln!("{} {}", yellow("⚠"), warning);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise report")?;
    println!("{json}");
    Ok(())
}
