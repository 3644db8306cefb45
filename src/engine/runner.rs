use crate::domain::{CheckResult, CheckStats, LatencyMetrics, RequestSample, RunReport, RunSpec};
use crate::engine::checks::Checks;
use crate::engine::{http, scenarios};
use hdrhistogram::Histogram;
use log::info;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

const MAX_LATENCY_MS: u64 = 60_000;

/// Everything one iteration produced, shipped from a virtual user to the
/// aggregator.
#[derive(Debug)]
struct IterationOutcome {
    results: Vec<CheckResult>,
    samples: Vec<RequestSample>,
}

#[derive(Default)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count as f64 - 1.0)).sqrt()
    }
}

fn round_to_3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn validate_spec(spec: &RunSpec) -> Result<Url, String> {
    if spec.vus == 0 {
        return Err("Run spec requires vus > 0".to_string());
    }
    if spec.iterations == 0 {
        return Err("Run spec requires iterations > 0".to_string());
    }
    Url::parse(&spec.base_url).map_err(|err| format!("Invalid base URL `{}`: {err}", spec.base_url))
}

/// Run the whole scenario set: one worker task per virtual user, each
/// executing its iterations sequentially with an isolated recorder. Workers
/// share nothing but the HTTP client and the result channel.
pub async fn execute_run(spec: &RunSpec) -> Result<RunReport, String> {
    let base = validate_spec(spec)?;
    let client = Arc::new(http::build_client(spec.timeout_ms)?);

    info!(
        "running {} iteration(s) across {} virtual user(s) against {}",
        spec.iterations, spec.vus, spec.base_url
    );

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

    let mut handles = Vec::with_capacity(spec.vus as usize);
    for _ in 0..spec.vus {
        let client = client.clone();
        let spec = spec.clone();
        let base = base.clone();
        let outcome_tx = outcome_tx.clone();

        handles.push(tokio::spawn(async move {
            for _ in 0..spec.iterations {
                let mut checks = Checks::new();
                scenarios::run_iteration(&client, &spec, &base, &mut checks).await;
                let (results, samples) = checks.into_parts();
                let _ = outcome_tx.send(IterationOutcome { results, samples });
            }
        }));
    }
    drop(outcome_tx);

    for handle in handles {
        handle
            .await
            .map_err(|err| format!("Virtual user crashed: {err}"))?;
    }

    let mut outcomes = Vec::new();
    while let Some(outcome) = outcome_rx.recv().await {
        outcomes.push(outcome);
    }

    let report = aggregate(spec, outcomes)?;
    info!(
        "run complete: {} check(s) passed, {} failed",
        report.checks_passed, report.checks_failed
    );
    Ok(report)
}

/// Fold per-iteration outcomes into the run report. Per-check tallies keep
/// the order checks were first seen in, so the text report reads like one
/// iteration.
fn aggregate(spec: &RunSpec, outcomes: Vec<IterationOutcome>) -> Result<RunReport, String> {
    let mut order: Vec<(Vec<String>, String)> = Vec::new();
    let mut tallies: HashMap<(Vec<String>, String), (u64, u64)> = HashMap::new();

    let mut stats = RunningStats::default();
    let mut histogram = Histogram::<u64>::new_with_bounds(1, MAX_LATENCY_MS, 3)
        .map_err(|err| format!("Failed to initialize latency histogram: {err}"))?;

    let iterations_completed = outcomes.len() as u64;
    let mut total_requests = 0u64;
    let mut bytes_in = 0u64;
    let mut checks_passed = 0u64;
    let mut checks_failed = 0u64;

    for outcome in outcomes {
        for result in outcome.results {
            if result.passed {
                checks_passed += 1;
            } else {
                checks_failed += 1;
            }

            let key = (result.path, result.name);
            let tally = tallies.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (0, 0)
            });
            if result.passed {
                tally.0 += 1;
            } else {
                tally.1 += 1;
            }
        }

        for sample in outcome.samples {
            total_requests += 1;
            bytes_in += sample.bytes;
            stats.add(sample.time as f64);
            let _ = histogram.record(sample.time.clamp(1, MAX_LATENCY_MS));
        }
    }

    let latency = if total_requests > 0 {
        LatencyMetrics {
            min_ms: round_to_3(stats.min),
            avg_ms: round_to_3(stats.mean),
            max_ms: round_to_3(stats.max),
            stddev_ms: round_to_3(stats.stddev()),
            p50_ms: histogram.value_at_quantile(0.50) as f64,
            p90_ms: histogram.value_at_quantile(0.90) as f64,
            p95_ms: histogram.value_at_quantile(0.95) as f64,
            p99_ms: histogram.value_at_quantile(0.99) as f64,
        }
    } else {
        LatencyMetrics::default()
    };

    let checks = order
        .into_iter()
        .map(|key| {
            let (passed, failed) = tallies[&key];
            let (path, name) = key;
            CheckStats {
                path,
                name,
                passed,
                failed,
            }
        })
        .collect();

    Ok(RunReport {
        vus: spec.vus,
        iterations_per_vu: spec.iterations,
        iterations_completed,
        total_requests,
        bytes_in,
        checks_passed,
        checks_failed,
        latency,
        checks,
    })
}
