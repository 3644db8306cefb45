mod domain;
mod engine;

use clap::{Parser, ValueEnum};
use domain::{RunReport, RunSpec};
use env_logger::Env;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Conformance and load checks for the systemd/journald HTTP API.
#[derive(Debug, Parser)]
#[command(name = "unitcheck", version)]
struct Cli {
    /// Base address of the service under test.
    #[arg(long)]
    base_url: Option<String>,

    /// Number of concurrent virtual users.
    #[arg(long)]
    vus: Option<u32>,

    /// Iterations of the full scenario set per virtual user.
    #[arg(long)]
    iterations: Option<u64>,

    /// Per-request timeout in milliseconds (0 disables it).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Requested line count for the limited unit-logs request.
    #[arg(long)]
    lines: Option<u64>,

    /// Skip the negative-path checks (unknown unit must 404).
    #[arg(long)]
    skip_negative: bool,

    /// Load the run spec from a JSON file; flags override its fields.
    #[arg(long)]
    spec: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

fn build_spec(cli: &Cli) -> Result<RunSpec, String> {
    let mut spec = match &cli.spec {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|err| format!("Failed to read spec file `{}`: {err}", path.display()))?;
            serde_json::from_str(&content)
                .map_err(|err| format!("Failed to parse spec file `{}`: {err}", path.display()))?
        }
        None => RunSpec::default(),
    };

    if let Some(base_url) = &cli.base_url {
        spec.base_url = base_url.clone();
    }
    if let Some(vus) = cli.vus {
        spec.vus = vus;
    }
    if let Some(iterations) = cli.iterations {
        spec.iterations = iterations;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        spec.timeout_ms = timeout_ms;
    }
    if let Some(lines) = cli.lines {
        spec.lines_query = lines;
    }
    if cli.skip_negative {
        spec.include_negative_checks = false;
    }

    Ok(spec)
}

fn print_text_report(report: &RunReport) {
    let mut printed: Vec<String> = Vec::new();
    for check in &report.checks {
        let shared = printed
            .iter()
            .zip(&check.path)
            .take_while(|(a, b)| a == b)
            .count();
        for depth in shared..check.path.len() {
            println!("{}{}", "  ".repeat(depth), check.path[depth]);
        }
        printed = check.path.clone();

        let mark = if check.failed == 0 { '✓' } else { '✗' };
        println!(
            "{}{} {} ({} passed, {} failed)",
            "  ".repeat(check.path.len()),
            mark,
            check.name,
            check.passed,
            check.failed
        );
    }

    println!();
    println!(
        "checks....: {} passed, {} failed",
        report.checks_passed, report.checks_failed
    );
    println!(
        "requests..: {} ({} bytes in, avg {}ms, p95 {}ms, max {}ms)",
        report.total_requests,
        report.bytes_in,
        report.latency.avg_ms,
        report.latency.p95_ms,
        report.latency.max_ms
    );
    println!(
        "iterations: {} ({} VU x {})",
        report.iterations_completed, report.vus, report.iterations_per_vu
    );
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let spec = match build_spec(&cli) {
        Ok(spec) => spec,
        Err(message) => {
            eprintln!("{message}");
            process::exit(2);
        }
    };

    match engine::runner::execute_run(&spec).await {
        Ok(report) => {
            match cli.output {
                OutputFormat::Text => print_text_report(&report),
                OutputFormat::Json => match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        eprintln!("Failed to serialize report: {err}");
                        process::exit(2);
                    }
                },
            }
            process::exit(if report.success() { 0 } else { 1 });
        }
        Err(message) => {
            eprintln!("{message}");
            process::exit(2);
        }
    }
}
