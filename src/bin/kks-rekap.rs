//! CLI binary for kks-rekap.
//!
//! A thin shim over the library crate: resolves inputs, maps flags onto
//! `QueueConfig`, runs the queue with a live progress bar and writes the
//! recap table.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use kks_rekap::{
    resolve_document, Aggregator, CsvAggregator, Document, ExtractionFailurePolicy, ItemId,
    ItemStatus, JsonAggregator, KksError, LlmExtractor, PdfiumRasterizer, ProgressCallback,
    QueueConfig, QueueOrchestrator, QueueProgressCallback, RunOutcome,
};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the pending documents plus a
/// log line per resolved document.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<ItemId, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, id: ItemId) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl QueueProgressCallback for CliProgressCallback {
    fn on_run_start(&self, pending: usize) {
        self.bar.set_length(pending as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {pending} document(s)…"))
        ));
    }

    fn on_item_start(&self, id: ItemId, name: &str) {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_item_done(&self, id: ItemId, name: &str) {
        let secs = self.elapsed_secs(id);
        self.bar.println(format!(
            "  {} {:<48}  {}",
            green("✓"),
            name,
            dim(&format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, id: ItemId, name: &str, error: &str) {
        let secs = self.elapsed_secs(id);
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:<48}  {}  {}",
            red("✗"),
            name,
            red(&truncate(first_line, 80)),
            dim(&format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }

    fn on_run_aborted(&self, in_flight: Option<(ItemId, &str)>) {
        self.bar.finish_and_clear();
        match in_flight {
            Some((_, name)) => eprintln!("{} Run aborted while processing {}", cyan("⚠"), name),
            None => eprintln!("{} Run aborted", cyan("⚠")),
        }
    }

    fn on_run_complete(&self, done: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} document(s) extracted",
                green("✔"),
                bold(&done.to_string())
            );
        } else {
            eprintln!(
                "{} {} extracted, {} failed",
                if done == 0 { red("✘") } else { cyan("⚠") },
                bold(&done.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every contract in a folder into ./Rekap_KKS.csv
  kks-rekap --api-key "$GEMINI_API_KEY" kontrak/*.pdf

  # Write the recap somewhere else
  kks-rekap kontrak/*.pdf -o rekap/

  # JSON to stdout
  kks-rekap --json -o - kontrak/001.pdf

  # Semicolon-separated CSV for spreadsheets with a decimal comma
  kks-rekap --delimiter ';' kontrak/*.pdf

  # Use another vision provider through edgequake-llm
  kks-rekap --provider openai --llm-model gpt-4.1 kontrak/*.pdf

INTERRUPTING:
  Ctrl-C asks for confirmation, then resets the queue. The document being
  processed is abandoned and nothing is exported.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Credential for the extraction service (required)
  PDFIUM_LIB_PATH         Directory containing libpdfium
  OPENAI_API_KEY          Used by --provider openai
  ANTHROPIC_API_KEY       Used by --provider anthropic
  EDGEQUAKE_LLM_PROVIDER  Provider picked when --provider is "auto"
  EDGEQUAKE_MODEL         Model picked together with EDGEQUAKE_LLM_PROVIDER
  RUST_LOG                Override the log filter
"#;

/// Extract KKS contract PDFs into one recap table.
#[derive(Parser, Debug)]
#[command(
    name = "kks-rekap",
    version,
    about = "Extract KKS contract PDFs into one recap table using a vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF paths or HTTP/HTTPS URLs, processed in this order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Credential for the extraction service.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Output directory or file. `-` writes to stdout. Default: current directory.
    #[arg(short, long, env = "KKS_OUTPUT")]
    output: Option<PathBuf>,

    /// Write JSON instead of CSV.
    #[arg(long)]
    json: bool,

    /// CSV field delimiter.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Gemini model ID.
    #[arg(long, env = "KKS_MODEL", default_value = kks_rekap::config::DEFAULT_MODEL)]
    model: String,

    /// Extract through an edgequake-llm provider (openai, anthropic, gemini, ollama, or "auto").
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model for --provider.
    #[arg(long, requires = "provider")]
    llm_model: Option<String>,

    /// Pages rasterised per document.
    #[arg(long, default_value_t = 8)]
    max_pages: usize,

    /// Render scale factor (0.25–4.0).
    #[arg(long, default_value_t = 1.5)]
    scale: f32,

    /// JPEG quality (1–100).
    #[arg(long, default_value_t = 80)]
    jpeg_quality: u8,

    /// Retries per extraction call on transient failures.
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Per-extraction-call timeout in seconds.
    #[arg(long, default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Record an empty row instead of marking a document failed when extraction fails.
    #[arg(long)]
    sentinel_on_failure: bool,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Credential ───────────────────────────────────────────────────────
    let credential = cli.api_key.clone().unwrap_or_default();
    if credential.trim().is_empty() {
        return Err(KksError::CredentialRequired.into());
    }

    // ── Build queue ──────────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn QueueProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;
    let queue = Arc::new(build_orchestrator(&cli, &config)?);

    // ── Resolve inputs ───────────────────────────────────────────────────
    let mut documents: Vec<Document> = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        match resolve_document(input, cli.download_timeout).await {
            Ok(doc) if doc.is_pdf() => documents.push(doc),
            Ok(doc) => warn!("Skipping {}: not a PDF ({})", doc.name(), doc.media_type()),
            Err(e) => eprintln!("{} {}", red("✗"), e),
        }
    }

    let ids = queue.enqueue(documents);
    if ids.is_empty() {
        anyhow::bail!("No PDF documents to process");
    }

    // ── Run, with Ctrl-C → confirm → reset ───────────────────────────────
    let runner = Arc::clone(&queue);
    let mut run = tokio::spawn(async move { runner.start(&credential).await });

    let outcome = loop {
        tokio::select! {
            res = &mut run => break res.context("Queue task failed")??,
            _ = tokio::signal::ctrl_c() => {
                if confirm_reset().await {
                    queue.reset();
                }
            }
        }
    };

    match outcome {
        RunOutcome::Aborted => {
            eprintln!("Queue reset; nothing exported.");
            return Ok(());
        }
        RunOutcome::AlreadyRunning | RunOutcome::NothingPending => {
            anyhow::bail!("Queue did not run ({outcome:?})");
        }
        RunOutcome::Completed(summary) => {
            if !cli.quiet && !show_progress {
                eprintln!("{} done, {} failed", summary.done, summary.failed);
            }
        }
    }

    if !cli.quiet {
        print_queue_table(&queue);
    }

    // ── Export ───────────────────────────────────────────────────────────
    if queue.results().is_empty() {
        eprintln!("{} No results to export", cyan("⚠"));
        return Ok(());
    }

    let aggregator: Box<dyn Aggregator> = if cli.json {
        Box::new(JsonAggregator)
    } else {
        let delimiter = u8::try_from(cli.delimiter)
            .context("--delimiter must be a single ASCII character")?;
        Box::new(CsvAggregator::new().delimiter(delimiter))
    };

    match cli.output.as_deref() {
        Some(p) if p == Path::new("-") => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            queue
                .export_to_writer(aggregator.as_ref(), &mut handle)
                .context("Failed to write to stdout")?;
            handle.flush().ok();
        }
        other => {
            let written = match other {
                Some(p) if !is_directory_target(p) => {
                    kks_rekap::pipeline::export::export_to_path(
                        aggregator.as_ref(),
                        &queue.records(),
                        p,
                    )
                }
                Some(dir) => queue.export(aggregator.as_ref(), dir),
                None => queue.export(aggregator.as_ref(), Path::new(".")),
            }
            .context("Export failed")?;

            if !cli.quiet {
                eprintln!(
                    "{}  {} record(s)  →  {}",
                    green("✔"),
                    queue.results().len(),
                    bold(&written.display().to_string())
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `QueueConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<QueueConfig> {
    let mut builder = QueueConfig::builder()
        .max_pages(cli.max_pages)
        .render_scale(cli.scale)
        .jpeg_quality(cli.jpeg_quality)
        .model(cli.model.clone())
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .extraction_failure(if cli.sentinel_on_failure {
            ExtractionFailurePolicy::Sentinel
        } else {
            ExtractionFailurePolicy::Surface
        });

    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Gemini by default; an edgequake-llm provider when `--provider` is set.
fn build_orchestrator(cli: &Cli, config: &QueueConfig) -> Result<QueueOrchestrator> {
    match cli.provider.as_deref() {
        None => QueueOrchestrator::from_config(config).context("Failed to set up the queue"),
        Some(name) => {
            let name = (name != "auto").then_some(name);
            let extractor = LlmExtractor::resolve(name, cli.llm_model.as_deref(), config)?;
            Ok(QueueOrchestrator::new(
                Arc::new(PdfiumRasterizer::new(config)),
                Arc::new(extractor),
                config,
            ))
        }
    }
}

/// Ask on stderr whether to reset; reads one line from stdin.
async fn confirm_reset() -> bool {
    eprint!("\nReset the queue? All items and results will be dropped. [y/N] ");
    io::stderr().flush().ok();

    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok();
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    })
    .await
    .unwrap_or(false)
}

fn print_queue_table(queue: &QueueOrchestrator) {
    eprintln!();
    eprintln!("{}", bold(&format!("{:<10}  {:<10}  {}", "ID", "STATUS", "DOCUMENT")));
    for item in queue.items() {
        let status = match item.status {
            ItemStatus::Done => green(&format!("{:<10}", item.status)),
            ItemStatus::Error => red(&format!("{:<10}", item.status)),
            _ => dim(&format!("{:<10}", item.status)),
        };
        eprintln!("{:<10}  {}  {}", item.id.short(), status, item.source_name);
        if let Some(err) = item.error {
            let first_line = err.lines().next().unwrap_or(&err);
            eprintln!("{:<10}  {:<10}  {}", "", "", dim(&truncate(first_line, 100)));
        }
    }
    eprintln!();
}

/// An existing directory, or a path spelled with a trailing separator.
fn is_directory_target(p: &Path) -> bool {
    p.is_dir() || p.as_os_str().to_string_lossy().ends_with(std::path::MAIN_SEPARATOR)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}
