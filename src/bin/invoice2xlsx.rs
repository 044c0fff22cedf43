//! CLI binary for invoice2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, picks the master-order source, and converts each
//! input with one shared converter (so the master order is fetched once).

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice2xlsx::{
    ConversionConfig, ConversionOutput, Converter, GraphWorkbookSource, LocalWorkbookSource,
    MarkerPolicy, MasterOrderPolicy, MasterSource, StaticOrder,
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one invoice; master order from SharePoint
  invoice2xlsx --token "$GRAPH_ACCESS_TOKEN" pedido.pdf

  # Several invoices into one directory
  invoice2xlsx -o salida/ facturas/*.pdf

  # Offline: master order from a local copy of the workbook
  invoice2xlsx --master-workbook "Herramienta de Aprovisionamiento.xlsx" pedido.pdf

  # No master order at all (rows keep invoice order)
  invoice2xlsx --no-master pedido.pdf

  # Keep working from the last good master order if SharePoint is down
  invoice2xlsx --on-master-failure stale facturas/*.pdf

  # Machine-readable report
  invoice2xlsx --json --no-master pedido.pdf > report.json

ENVIRONMENT VARIABLES:
  GRAPH_ACCESS_TOKEN   Bearer token for Microsoft Graph
  PDFIUM_LIB_PATH      Path to libpdfium (file or directory)
  RUST_LOG             Overrides the log filter (e.g. invoice2xlsx=debug)
"#;

/// Convert supplier invoice PDFs into Excel tables ordered by the master SKU list.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2xlsx",
    version,
    about = "Convert supplier invoice PDFs into Excel tables ordered by the master SKU list",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Invoice PDF files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the generated .xlsx files.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Bearer token for Microsoft Graph.
    #[arg(long, env = "GRAPH_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Read the master order from this local .xlsx instead of SharePoint.
    #[arg(long, conflicts_with = "no_master")]
    master_workbook: Option<PathBuf>,

    /// Skip the master order; rows keep invoice order.
    #[arg(long)]
    no_master: bool,

    /// What to do when the master order cannot be fetched.
    #[arg(long, value_enum, default_value = "fail")]
    on_master_failure: MasterFailureArg,

    /// Seconds a fetched master order stays valid.
    #[arg(long, default_value_t = 180)]
    cache_ttl: u64,

    /// Per-request timeout for Graph calls, in seconds.
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    /// SharePoint host of the master workbook.
    #[arg(long)]
    site_host: Option<String>,

    /// SharePoint site name of the master workbook.
    #[arg(long)]
    site_name: Option<String>,

    /// Path of the master workbook inside the site's document library.
    #[arg(long)]
    workbook_path: Option<String>,

    /// Sheet holding the master table.
    #[arg(long)]
    sheet: Option<String>,

    /// Name of the master table.
    #[arg(long)]
    table: Option<String>,

    /// Column of the master table holding the item codes.
    #[arg(long)]
    column: Option<String>,

    /// Path to libpdfium (file or containing directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted invoices.
    #[arg(long)]
    password: Option<String>,

    /// Which TIENDA marker an item line belongs to.
    #[arg(long, value_enum, default_value = "forward")]
    marker_policy: MarkerPolicyArg,

    /// Print a JSON report on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MasterFailureArg {
    Fail,
    Stale,
    Empty,
}

impl From<MasterFailureArg> for MasterOrderPolicy {
    fn from(v: MasterFailureArg) -> Self {
        match v {
            MasterFailureArg::Fail => MasterOrderPolicy::FailClosed,
            MasterFailureArg::Stale => MasterOrderPolicy::ServeStale,
            MasterFailureArg::Empty => MasterOrderPolicy::DegradeToEmpty,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MarkerPolicyArg {
    Forward,
    Lookback,
}

impl From<MarkerPolicyArg> for MarkerPolicy {
    fn from(v: MarkerPolicyArg) -> Self {
        match v {
            MarkerPolicyArg::Forward => MarkerPolicy::Forward,
            MarkerPolicyArg::Lookback => MarkerPolicy::Lookback,
        }
    }
}

/// One line of the `--json` report.
#[derive(Serialize)]
struct FileReport {
    input: PathBuf,
    output: Option<PathBuf>,
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversion: Option<ConversionOutput>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives the feedback that matters; keep library INFO
    // logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = build_config(&cli)?;
    let source = build_source(&cli, &config)?;
    let converter = Converter::new(config, source);
    let credential = cli.token.clone().unwrap_or_default();

    // ── Run conversions ──────────────────────────────────────────────────
    let bar = if show_progress {
        let bar = ProgressBar::new(cli.inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} invoices  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let mut reports = Vec::with_capacity(cli.inputs.len());
    let mut failures = 0usize;

    for input in &cli.inputs {
        if let Some(ref bar) = bar {
            bar.set_message(input.display().to_string());
        }

        let result = converter
            .convert_to_dir(input, &cli.output_dir, &credential)
            .await
            .with_context(|| format!("Failed to convert {}", input.display()));

        let line = match &result {
            Ok((path, output)) => {
                let warn = if output.warnings.is_empty() {
                    String::new()
                } else {
                    yellow(&format!("  {} warning(s)", output.warnings.len()))
                };
                format!(
                    "  {} {}  {}  →  {}{}",
                    green("✓"),
                    input.display(),
                    dim(&format!(
                        "{} rows, {}ms",
                        output.stats.rows_extracted, output.stats.total_duration_ms
                    )),
                    bold(&path.display().to_string()),
                    warn
                )
            }
            Err(e) => format!("  {} {}  {:#}", red("✘"), input.display(), e),
        };
        match (&bar, &result) {
            (Some(bar), _) => bar.println(line),
            (None, Err(_)) => eprintln!("{line}"),
            (None, Ok(_)) if !cli.quiet && !cli.json => eprintln!("{line}"),
            _ => {}
        }
        if let Some(ref bar) = bar {
            bar.inc(1);
        }

        match result {
            Ok((path, output)) => reports.push(FileReport {
                input: input.clone(),
                output: Some(path),
                error: None,
                conversion: Some(output),
            }),
            Err(e) => {
                failures += 1;
                reports.push(FileReport {
                    input: input.clone(),
                    output: None,
                    error: Some(format!("{e:#}")),
                    conversion: None,
                });
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise report")?;
        println!("{json}");
    }

    let total = cli.inputs.len();
    if failures > 0 {
        anyhow::bail!("{failures} of {total} invoice(s) failed");
    }
    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {} invoice(s) converted",
            green("✔"),
            bold(&total.to_string())
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let defaults = ConversionConfig::default().workbook;

    let policy = if cli.no_master {
        MasterOrderPolicy::DegradeToEmpty
    } else {
        cli.on_master_failure.into()
    };

    let mut builder = ConversionConfig::builder()
        .site(
            cli.site_host.clone().unwrap_or(defaults.site_host),
            cli.site_name.clone().unwrap_or(defaults.site_name),
        )
        .table(
            cli.sheet.clone().unwrap_or(defaults.sheet),
            cli.table.clone().unwrap_or(defaults.table),
            cli.column.clone().unwrap_or(defaults.column),
        )
        .cache_ttl_secs(cli.cache_ttl)
        .request_timeout_secs(cli.request_timeout)
        .master_policy(policy)
        .marker_policy(cli.marker_policy.into());

    if let Some(ref path) = cli.workbook_path {
        builder = builder.workbook_path(path.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }

    builder.build().context("Invalid configuration")
}

/// `--no-master` → empty static order, `--master-workbook` → local file,
/// otherwise SharePoint through Graph.
fn build_source(cli: &Cli, config: &ConversionConfig) -> Result<MasterSource> {
    if cli.no_master {
        return Ok(StaticOrder::empty().into());
    }
    if let Some(ref path) = cli.master_workbook {
        return Ok(LocalWorkbookSource::new(path, config).into());
    }
    let graph = GraphWorkbookSource::from_config(config).context("Failed to set up Graph client")?;
    Ok(graph.into())
}
