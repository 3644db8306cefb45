use crate::domain::{CheckResult, RequestSample};
use std::ops::{Deref, DerefMut};

/// Per-iteration recorder for check outcomes and request samples.
///
/// A check is a named boolean assertion; recording a failure never aborts the
/// iteration. Groups give checks a hierarchical label (category/capability)
/// without affecting their outcomes, and a group that records zero checks is
/// fine.
#[derive(Debug, Default)]
pub struct Checks {
    path: Vec<String>,
    results: Vec<CheckResult>,
    samples: Vec<RequestSample>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a named group. Checks recorded through the returned guard carry
    /// the nested path; the group is left when the guard drops.
    pub fn group(&mut self, name: &str) -> Group<'_> {
        self.path.push(name.to_string());
        Group { checks: self }
    }

    /// Record a named boolean outcome under the current group path. Returns
    /// the outcome so callers can branch on it without re-evaluating the
    /// predicate.
    pub fn check(&mut self, name: impl Into<String>, passed: bool) -> bool {
        self.results.push(CheckResult {
            path: self.path.clone(),
            name: name.into(),
            passed,
        });
        passed
    }

    /// Record the wall time and size of one issued request for the run
    /// report.
    pub fn observe_request(&mut self, time_ms: u64, bytes: u64) {
        self.samples.push(RequestSample {
            time: time_ms,
            bytes,
        });
    }

    pub fn into_parts(self) -> (Vec<CheckResult>, Vec<RequestSample>) {
        (self.results, self.samples)
    }
}

pub struct Group<'a> {
    checks: &'a mut Checks,
}

impl Drop for Group<'_> {
    fn drop(&mut self) {
        self.checks.path.pop();
    }
}

impl Deref for Group<'_> {
    type Target = Checks;

    fn deref(&self) -> &Checks {
        self.checks
    }
}

impl DerefMut for Group<'_> {
    fn deref_mut(&mut self) -> &mut Checks {
        self.checks
    }
}
