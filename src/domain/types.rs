use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Full configuration for one harness run. Deserializable from a JSON spec
/// file; CLI flags override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSpec {
    /// Base address of the service under test.
    pub base_url: String,

    /// Number of concurrent virtual users.
    pub vus: u32,

    /// Iterations of the full scenario set per virtual user.
    pub iterations: u64,

    pub timeout_ms: u64,

    /// Statuses in `200..successCeiling` count as success for
    /// ceiling-checked requests.
    pub success_ceiling: u16,

    /// Whether the negative-path checks (unknown unit must 404) run.
    pub include_negative_checks: bool,

    /// A unit known to exist on the target host.
    pub known_unit: String,

    /// A unit name guaranteed not to resolve.
    pub missing_unit: String,

    /// Line count requested (and expected back) by the limited unit-logs
    /// request.
    pub lines_query: u64,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4444".to_string(),
            vus: 1,
            iterations: 1,
            timeout_ms: 30_000,
            success_ceiling: 300,
            include_negative_checks: true,
            known_unit: "systemd-journald.service".to_string(),
            missing_unit: "non-existing.service".to_string(),
            lines_query: 5,
        }
    }
}

/// Everything a scenario reads from one HTTP exchange. A capture is created
/// per request and consumed only by the scenario function that issued it.
#[derive(Debug, Clone)]
pub struct ResponseCapture {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub time: u64,
    pub size: u64,
}

impl ResponseCapture {
    /// Content type as reported by the response headers; `text/plain` when
    /// the header is absent (transport-error captures carry no headers).
    pub fn content_type(&self) -> &str {
        self.headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("text/plain")
    }

    /// Parse the raw body on demand. Callers decide how a parse failure is
    /// reported; it never propagates past the scenario.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
