use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;

use port_sweep_rs::aggregator::ProgressHandle;
use port_sweep_rs::sink::sink_for_path;
use port_sweep_rs::types::ScanReport;
use port_sweep_rs::{logging, InFlightPolicy, PortRange, ScanConfig, Scanner};

/// port-sweep-rs: concurrent TCP connect scan of one host over a port range.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-sweep-rs",
    version,
    about = "Concurrent TCP connect scan of one host over an inclusive port range.",
    long_about = None
)]
struct Cli {
    /// Host to scan (IP address or hostname).
    #[arg(long)]
    host: String,

    /// Inclusive port range, e.g. `1-1024` or `443`.
    #[arg(long, default_value = "1-1024")]
    ports: PortRange,

    /// Number of concurrent workers (overrides the config file).
    #[arg(long)]
    workers: Option<usize>,

    /// Connect timeout per port in milliseconds (overrides the config file).
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// On Ctrl+C, drop running probes instead of letting them finish.
    #[arg(long = "abandon-in-flight", default_value_t = false)]
    abandon_in_flight: bool,

    /// JSON file with scan settings (`workers`, `timeout`, `queue_capacity`, `in_flight`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write results here; `.json` writes JSON, anything else CSV.
    #[arg(long)]
    output: Option<PathBuf>,

    /// List closed ports too, not only open ones.
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = build_config(&cli)?;
    println!("port-sweep-rs configuration:");
    println!("  host         : {}", cli.host);
    println!("  ports        : {} ({} ports)", cli.ports, cli.ports.len());
    println!("  workers      : {}", config.pool_width());
    println!("  timeout_ms   : {}", config.timeout.as_millis());
    println!(
        "  output       : {}",
        cli.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    let mut scanner = Scanner::new(cli.host.clone(), config);
    if let Some(path) = cli.output.clone() {
        scanner = scanner.with_sink(sink_for_path(path));
    }

    // Ctrl-C cancels the scan; whatever resolved so far is still reported.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let bar = progress_bar(cli.ports.len() as u64)?;
    let ticker = tokio::spawn(track_progress(scanner.progress_handle(), bar.clone()));

    let outcome = scanner
        .run_with_cancel(cli.ports, cancel)
        .await
        .with_context(|| format!("failed to scan {}", cli.host))?;
    ticker.abort();
    bar.finish_and_clear();

    print_results_table(&outcome.report, cli.all);

    if let Some(path) = cli.output.as_deref() {
        match outcome.sink_error {
            Some(e) => {
                return Err(e).with_context(|| format!("results not saved to {}", path.display()))
            }
            None => println!("Wrote results to {}", path.display()),
        }
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_json::from_str::<ScanConfig>(&raw)
                .with_context(|| format!("invalid config file: {}", path.display()))?
        }
        None => ScanConfig::default(),
    };
    if let Some(w) = cli.workers {
        config = config.with_workers(w);
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    if cli.abandon_in_flight {
        config = config.with_in_flight(InFlightPolicy::Abandon);
    }
    Ok(config)
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{elapsed_precise} {bar:36.cyan/blue} {pos:>5}/{len:5} {msg}")?
            .progress_chars("■■□"),
    );
    Ok(bar)
}

async fn track_progress(handle: ProgressHandle, bar: ProgressBar) {
    let mut tick = tokio::time::interval(Duration::from_millis(100));
    loop {
        tick.tick().await;
        let p = handle.progress();
        bar.set_position(p.scanned);
        bar.set_message(format!("open: {}", p.open));
    }
}

fn print_results_table(report: &ScanReport, all: bool) {
    println!(
        "\nOpen ports: {} (scanned: {} of {}){}",
        report.total_open,
        report.scanned(),
        report.range.len(),
        if report.interrupted { " [interrupted]" } else { "" }
    );

    let rows: Vec<_> = if all {
        report.records.iter().collect()
    } else {
        report.open_ports().collect()
    };
    if rows.is_empty() {
        return;
    }

    let port_w = 5usize;
    let status_w = "status".len();
    println!(
        "{:>port_w$}  {:<status_w$}  {}",
        "port",
        "status",
        "scanned_at",
        port_w = port_w,
        status_w = status_w
    );
    println!(
        "{:-<port_w$}  {:-<status_w$}  {:-<20}",
        "",
        "",
        "",
        port_w = port_w,
        status_w = status_w
    );
    for r in rows {
        println!(
            "{:>port_w$}  {:<status_w$}  {}",
            r.port(),
            r.status(),
            r.scanned_at().format(&Rfc3339).unwrap_or_default(),
            port_w = port_w,
            status_w = status_w
        );
    }
}
