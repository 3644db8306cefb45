use serde::Serialize;

/// One named boolean outcome recorded during an iteration, attributed to the
/// group path that was active when it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub path: Vec<String>,
    pub name: String,
    pub passed: bool,
}

/// Timing and size of one issued request.
#[derive(Debug, Clone, Copy)]
pub struct RequestSample {
    pub time: u64,
    pub bytes: u64,
}

/// Pass/fail tally for one check across every iteration of the run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStats {
    pub path: Vec<String>,
    pub name: String,
    pub passed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LatencyMetrics {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub stddev_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Aggregated result of a whole run, ready for text or JSON output.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub vus: u32,
    pub iterations_per_vu: u64,
    pub iterations_completed: u64,
    pub total_requests: u64,
    pub bytes_in: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub latency: LatencyMetrics,
    pub checks: Vec<CheckStats>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.checks_failed == 0
    }
}
