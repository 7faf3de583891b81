use crate::backend::BackendClient;
use crate::dashboards::Feature;
use crate::model::{parse_duration, parse_duration_range, SyncConfig};
use crate::orchestrator::{process_update, Dashboards, RequestParams};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;
use time::macros::format_description;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "wfm-dash",
    version,
    about = "Workforce dashboard client with synchronized AI pipeline progress"
)]
pub struct Cli {
    /// Base URL of the workforce backend
    #[arg(long, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Print the committed result as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Stream progress and print a text summary, then exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,

    /// Dashboard to run in headless modes, and the one selected on launch in the TUI
    #[arg(long, value_enum, default_value_t = Feature::Scheduling)]
    pub feature: Feature,

    /// Employee to analyze (retention, learning paths)
    #[arg(long)]
    pub employee_id: Option<String>,

    /// Department to analyze (retention, sentiment)
    #[arg(long)]
    pub department: Option<String>,

    /// Departments to schedule
    #[arg(
        long,
        value_delimiter = ',',
        default_values = ["Sales Floor", "Customer Service", "Electronics"]
    )]
    pub departments: Vec<String>,

    /// Store locations to schedule
    #[arg(long, value_delimiter = ',', default_values = ["Store 1"])]
    pub locations: Vec<String>,

    /// Scheduling constraints to honor
    #[arg(
        long,
        value_delimiter = ',',
        default_values = ["max_hours_per_week", "min_rest_hours"]
    )]
    pub constraints: Vec<String>,

    /// Schedule window, e.g. "2024-01-01 to 2024-01-07" (default: the next 7 days)
    #[arg(long)]
    pub date_range: Option<String>,

    /// Dwell range of each stage but the last, e.g. 1200ms..2400ms
    #[arg(long, default_value = "1200ms..2400ms", value_parser = parse_duration_range)]
    pub stage_duration: Range<Duration>,

    /// Dwell range of the last stage
    #[arg(long, default_value = "600ms..1200ms", value_parser = parse_duration_range)]
    pub final_stage_duration: Range<Duration>,

    /// Pause after the last stage before results may appear
    #[arg(long, default_value = "800ms", value_parser = parse_duration)]
    pub settle_delay: Duration,

    /// How often the fact line rotates
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub fact_interval: Duration,

    /// Backend request timeout
    #[arg(long, default_value = "200s", value_parser = parse_duration)]
    pub request_timeout: Duration,

    /// Seed for stage dwell times (reproducible progress)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Export each committed result as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Start a run for --feature when the TUI launches
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub run_on_launch: bool,

    /// Write logs to this file (the TUI logs nowhere otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.silent && !args.json {
        return Err(anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }
    if args.json && args.text {
        return Err(anyhow!("--json and --text are mutually exclusive"));
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args).await;
        }
    }

    run_headless(args).await
}

/// Build a `SyncConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SyncConfig {
    SyncConfig {
        stage_duration: args.stage_duration.clone(),
        final_stage_duration: args.final_stage_duration.clone(),
        settle_delay: args.settle_delay,
        fact_interval: args.fact_interval,
        seed: args.seed,
        ..SyncConfig::default()
    }
}

/// Build the per-dashboard request inputs from CLI arguments.
pub fn request_params(args: &Cli) -> Result<RequestParams> {
    let date_range = match args.date_range.clone() {
        Some(r) => r,
        None => {
            let today = time::OffsetDateTime::now_local()
                .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
                .date();
            default_date_range(today)?
        }
    };
    Ok(RequestParams {
        date_range,
        locations: args.locations.clone(),
        departments: args.departments.clone(),
        constraints: args.constraints.clone(),
        employee_id: args.employee_id.clone(),
        department: args.department.clone(),
    })
}

/// A week starting at `today`, formatted the way the scheduling endpoint expects.
fn default_date_range(today: time::Date) -> Result<String> {
    let fmt = format_description!("[year]-[month]-[day]");
    let end = today.saturating_add(time::Duration::days(6));
    Ok(format!("{} to {}", today.format(fmt)?, end.format(fmt)?))
}

pub fn build_dashboards(args: &Cli) -> Result<Dashboards> {
    let client = BackendClient::new(&args.base_url, args.request_timeout)
        .context("failed to build HTTP client")?;
    let cfg = build_config(args);
    tracing::debug!(config = %serde_json::to_string(&cfg)?, "sync config");
    Ok(Dashboards::new(client, cfg, request_params(args)?))
}

/// Run one dashboard to completion without the TUI (`--text`, `--json`, `--silent`).
async fn run_headless(args: Cli) -> Result<()> {
    let feature = args.feature;
    let mut dashboards = build_dashboards(&args)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let stream_progress = args.text || !args.json;

    let mut status_rx = dashboards.subscribe(feature);
    let mut last = status_rx.borrow_and_update().clone();
    dashboards
        .start(feature)?
        .with_context(|| format!("{feature} did not start"))?;

    let update = loop {
        tokio::select! {
            Ok(()) = status_rx.changed(), if stream_progress => {
                let next = status_rx.borrow_and_update().clone();
                for line in crate::text_summary::progress_lines(&last, &next) {
                    let _ = out_tx.send(OutputLine::Stderr(line));
                }
                last = next;
            }
            update = dashboards.next_update() => {
                break update.with_context(|| format!("{feature} stopped without a result"))?;
            }
            _ = tokio::signal::ctrl_c() => {
                dashboards.cancel_all();
                bail!("interrupted; {feature} run cancelled");
            }
        }
    };
    if stream_progress {
        let next = status_rx.borrow_and_update().clone();
        for line in crate::text_summary::progress_lines(&last, &next) {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }

    let processed = process_update(&args, args.auto_save, &update);
    if !args.silent {
        for msg in processed.export_messages {
            let _ = out_tx.send(OutputLine::Stderr(msg));
        }
        if let Some(p) = processed.auto_saved_path {
            let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
        }
    }

    let committed_at = time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let summary = crate::text_summary::build_text_summary(&update, committed_at)?;
    if args.json {
        if let crate::dashboards::DashboardUpdate::Committed { json, .. } = &update {
            if !args.silent {
                let out = serde_json::to_string_pretty(json)?;
                let _ = out_tx.send(OutputLine::Stdout(out));
            }
        }
    } else {
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn defaults_parse() {
        let args = Cli::try_parse_from(["wfm-dash"]).unwrap();
        assert_eq!(args.feature, Feature::Scheduling);
        assert_eq!(args.departments, ["Sales Floor", "Customer Service", "Electronics"]);
        let cfg = build_config(&args);
        assert_eq!(
            cfg.stage_duration,
            Duration::from_millis(1200)..Duration::from_millis(2400)
        );
        assert_eq!(cfg.settle_delay, Duration::from_millis(800));
        assert_eq!(args.request_timeout, Duration::from_secs(200));
    }

    #[test]
    fn flags_override_config() {
        let args = Cli::try_parse_from([
            "wfm-dash",
            "--feature",
            "learning-path",
            "--employee-id",
            "emp_1",
            "--stage-duration",
            "2s",
            "--departments",
            "Bakery,Pharmacy",
            "--seed",
            "7",
        ])
        .unwrap();
        assert_eq!(args.feature, Feature::LearningPath);
        assert_eq!(args.departments, ["Bakery", "Pharmacy"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.stage_duration, Duration::from_secs(2)..Duration::from_secs(2));
        assert_eq!(cfg.seed, Some(7));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(Cli::try_parse_from(["wfm-dash", "--stage-duration", "3s..1s"]).is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(Cli::try_parse_from(["wfm-dash", "--settle-delay", "400000000000years"]).is_err());
        assert!(Cli::try_parse_from(["wfm-dash", "--fact-interval", "2days"]).is_err());
        assert!(Cli::try_parse_from(["wfm-dash", "--final-stage-duration", "1s..30days"]).is_err());
        let args = Cli::try_parse_from(["wfm-dash", "--settle-delay", "24h"]).unwrap();
        assert_eq!(build_config(&args).settle_delay, Duration::from_secs(86_400));
    }

    #[test]
    fn default_week_spans_seven_days() {
        assert_eq!(
            default_date_range(date!(2024 - 12 - 28)).unwrap(),
            "2024-12-28 to 2025-01-03"
        );
    }

    #[test]
    fn explicit_date_range_is_kept() {
        let args =
            Cli::try_parse_from(["wfm-dash", "--date-range", "2024-01-01 to 2024-01-07"]).unwrap();
        assert_eq!(
            request_params(&args).unwrap().date_range,
            "2024-01-01 to 2024-01-07"
        );
    }
}
