mod report_types;
mod types;

pub use report_types::{CheckResult, CheckStats, LatencyMetrics, RequestSample, RunReport};
pub use types::{ResponseCapture, RunSpec};
