use crate::domain::{ResponseCapture, RunSpec};
use crate::engine::checks::Checks;
use crate::engine::http;
use log::{debug, warn};
use reqwest::{Client, Url};
use serde_json::Value;

const APPLICATION_JSON: &str = "application/json";

const SYSTEMD_SCOPE: &str = "/systemd";
const JOURNALD_SCOPE: &str = "/journald";

/// The unit of work executed once per virtual user per cycle: both service
/// categories run unconditionally and in a fixed order, so a failed check in
/// one scenario never hides the others.
pub async fn run_iteration(client: &Client, spec: &RunSpec, base: &Url, checks: &mut Checks) {
    {
        let mut systemd = checks.group("systemd");
        {
            let mut capability = systemd.group("list-units");
            list_units(client, spec, base, &mut capability).await;
        }
        {
            let mut capability = systemd.group("load-unit");
            load_unit(client, spec, base, &mut capability).await;
        }
    }

    let mut journald = checks.group("journald");
    let mut capability = journald.group("unit-logs");
    unit_logs(client, spec, base, &mut capability).await;
}

/// GET the units listing and assert the known logging unit appears in it.
pub async fn list_units(client: &Client, spec: &RunSpec, base: &Url, checks: &mut Checks) {
    let url = endpoint(base, &format!("{SYSTEMD_SCOPE}/list-units"), &[]);
    let listing = fetch(client, checks, url, Some(spec.success_ceiling)).await;

    check_json_shape(checks, &listing);

    let present = match listing.json() {
        Ok(body) => contains_unit(&body, &spec.known_unit),
        Err(_) => false,
    };
    checks.check(format!("{} is listed", spec.known_unit), present);
}

/// Load the known unit and assert it reports `loadState == "loaded"`, then
/// (when negative checks are on) assert an unknown unit yields exactly 404.
pub async fn load_unit(client: &Client, spec: &RunSpec, base: &Url, checks: &mut Checks) {
    let url = endpoint(
        base,
        &format!("{SYSTEMD_SCOPE}/load-unit/{}", spec.known_unit),
        &[],
    );
    let loaded = fetch(client, checks, url, Some(spec.success_ceiling)).await;

    check_json_shape(checks, &loaded);

    let body = loaded.json().ok();
    let is_loaded = body.as_ref().and_then(load_state) == Some("loaded");
    checks.check("unit is loaded", is_loaded);

    if !spec.include_negative_checks {
        return;
    }

    // The not-found contract is asserted on its own capture; any status is
    // allowed through here, only the exact code matters.
    let missing_url = endpoint(
        base,
        &format!("{SYSTEMD_SCOPE}/load-unit/{}", spec.missing_unit),
        &[],
    );
    let missing = fetch(client, checks, missing_url, None).await;
    checks.check("unknown unit returns 404", missing.status == 404);
}

/// Read unit logs twice: once without a query (the endpoint's default limit
/// is one entry) and once with `lines_number` set. Each count is asserted on
/// the capture it belongs to.
pub async fn unit_logs(client: &Client, spec: &RunSpec, base: &Url, checks: &mut Checks) {
    let path = format!("{JOURNALD_SCOPE}/unit-logs/{}", spec.known_unit);

    let unlimited = fetch(
        client,
        checks,
        endpoint(base, &path, &[]),
        Some(spec.success_ceiling),
    )
    .await;
    check_json_shape(checks, &unlimited);
    let unlimited_body = unlimited.json().ok();
    checks.check(
        "default query returns one entry",
        unlimited_body.as_ref().and_then(entry_count) == Some(1),
    );

    let lines = spec.lines_query;
    let limited = fetch(
        client,
        checks,
        endpoint(base, &path, &[("lines_number", lines.to_string())]),
        Some(spec.success_ceiling),
    )
    .await;
    check_json_shape(checks, &limited);
    let limited_body = limited.json().ok();
    checks.check(
        format!("lines_number={lines} returns {lines} entries"),
        limited_body.as_ref().and_then(entry_count) == Some(lines as usize),
    );
}

/// Shared shape validation: exact JSON content type plus a structured body.
/// Runs before any semantic assertion on the same capture.
pub fn check_json_shape(checks: &mut Checks, capture: &ResponseCapture) {
    let content_type = capture.content_type();
    let is_json = content_type == APPLICATION_JSON;
    if !is_json {
        warn!("content-type was {content_type}");
    }
    checks.check("content-type is application/json", is_json);

    let structured = matches!(
        capture.json(),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    );
    checks.check("body is valid json", structured);
}

/// Issue one GET, record its sample, and (when a ceiling is given) check the
/// status falls in the accepted range.
async fn fetch(
    client: &Client,
    checks: &mut Checks,
    url: Url,
    ceiling: Option<u16>,
) -> ResponseCapture {
    let capture = http::issue(client, url).await;
    checks.observe_request(capture.time, capture.size);

    if let Some(ceiling) = ceiling {
        let accepted = status_accepted(capture.status, ceiling);
        if !accepted {
            warn!(
                "unexpected status {} {}",
                capture.status, capture.status_text
            );
        }
        checks.check("status is accepted", accepted);
    }

    capture
}

fn endpoint(base: &Url, path: &str, query: &[(&str, String)]) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    url
}

fn status_accepted(status: u16, ceiling: u16) -> bool {
    (200..ceiling).contains(&status)
}

/// Strict boolean scan for a unit descriptor with the given name. A body
/// that is not a sequence counts as "not found".
fn contains_unit(body: &Value, name: &str) -> bool {
    match body.as_array() {
        Some(units) => units
            .iter()
            .any(|unit| unit.get("name").and_then(Value::as_str) == Some(name)),
        None => {
            debug!("list-units body is not an array");
            false
        }
    }
}

fn load_state(body: &Value) -> Option<&str> {
    body.get("loadState").and_then(Value::as_str)
}

fn entry_count(body: &Value) -> Option<usize> {
    body.as_array().map(Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn json_capture(body: &str) -> ResponseCapture {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/json".to_string(),
        );
        ResponseCapture {
            status: 200,
            status_text: "OK".to_string(),
            headers,
            body: body.to_string(),
            time: 1,
            size: body.len() as u64,
        }
    }

    fn recorded(checks: Checks) -> Vec<(String, bool)> {
        let (results, _) = checks.into_parts();
        results
            .into_iter()
            .map(|result| (result.name, result.passed))
            .collect()
    }

    #[test]
    fn shape_validator_accepts_objects_and_arrays() {
        for body in [r#"{"name":"a"}"#, "[1,2]"] {
            let mut checks = Checks::new();
            check_json_shape(&mut checks, &json_capture(body));
            assert_eq!(
                recorded(checks),
                vec![
                    ("content-type is application/json".to_string(), true),
                    ("body is valid json".to_string(), true),
                ]
            );
        }
    }

    #[test]
    fn shape_validator_rejects_primitives_and_garbage() {
        for body in ["42", "\"text\"", "true", "not json at all"] {
            let mut checks = Checks::new();
            check_json_shape(&mut checks, &json_capture(body));
            let results = recorded(checks);
            assert!(results[0].1, "content type should still pass for {body}");
            assert!(!results[1].1, "body {body} must fail the shape check");
        }
    }

    #[test]
    fn shape_validator_flags_wrong_content_type() {
        let mut capture = json_capture("[]");
        capture
            .headers
            .insert("content-type".to_string(), "text/html".to_string());

        let mut checks = Checks::new();
        check_json_shape(&mut checks, &capture);
        let results = recorded(checks);
        assert!(!results[0].1);
        assert!(results[1].1, "body shape is judged independently");
    }

    #[test]
    fn shape_validator_fails_both_checks_on_error_capture() {
        let mut checks = Checks::new();
        check_json_shape(&mut checks, &http::error_capture("Request failed: timeout"));
        assert!(recorded(checks).iter().all(|(_, passed)| !passed));
    }

    #[test]
    fn contains_unit_short_circuits_on_first_match() {
        let body = json!([
            {"name": "dbus.service", "loadState": "loaded"},
            {"name": "systemd-journald.service", "loadState": "loaded"},
            {"name": "cron.service"},
        ]);
        assert!(contains_unit(&body, "systemd-journald.service"));
        assert!(!contains_unit(&body, "nginx.service"));
    }

    #[test]
    fn contains_unit_is_false_for_non_sequences_and_nameless_entries() {
        assert!(!contains_unit(&json!({"name": "x"}), "x"));
        assert!(!contains_unit(&json!([{"id": "x"}, {"name": 3}]), "x"));
        assert!(!contains_unit(&json!([]), "x"));
    }

    #[test]
    fn load_state_reads_the_camel_case_field() {
        assert_eq!(load_state(&json!({"loadState": "loaded"})), Some("loaded"));
        assert_eq!(load_state(&json!({"loadState": "masked"})), Some("masked"));
        assert_eq!(load_state(&json!({"load_state": "loaded"})), None);
        assert_eq!(load_state(&json!([])), None);
    }

    #[test]
    fn entry_count_only_counts_sequences() {
        assert_eq!(entry_count(&json!([1, 2, 3, 4, 5])), Some(5));
        assert_eq!(entry_count(&json!([])), Some(0));
        assert_eq!(entry_count(&json!({"length": 5})), None);
    }

    #[test]
    fn status_ceiling_is_exclusive_and_floored_at_200() {
        assert!(status_accepted(200, 300));
        assert!(status_accepted(204, 300));
        assert!(!status_accepted(300, 300));
        assert!(!status_accepted(404, 300));
        assert!(!status_accepted(0, 300), "transport errors must not pass");
        assert!(!status_accepted(199, 300));
    }

    #[test]
    fn endpoint_builds_path_and_query() {
        let base = Url::parse("http://localhost:4444").expect("base url");
        let plain = endpoint(&base, "/systemd/list-units", &[]);
        assert_eq!(plain.as_str(), "http://localhost:4444/systemd/list-units");

        let with_query = endpoint(
            &base,
            "/journald/unit-logs/systemd-journald.service",
            &[("lines_number", "5".to_string())],
        );
        assert_eq!(
            with_query.as_str(),
            "http://localhost:4444/journald/unit-logs/systemd-journald.service?lines_number=5"
        );
    }

    // Scenario-flow tests point at a closed loopback port: every request
    // degrades to an error capture, which is enough to observe which checks
    // run and how they are grouped.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[tokio::test]
    async fn iteration_runs_every_group_despite_failures() {
        let spec = RunSpec {
            timeout_ms: 1_000,
            ..RunSpec::default()
        };
        let client = http::build_client(spec.timeout_ms).expect("client");
        let base = Url::parse(UNREACHABLE).expect("base url");

        let mut checks = Checks::new();
        run_iteration(&client, &spec, &base, &mut checks).await;

        let (results, samples) = checks.into_parts();
        let paths: Vec<String> = results.iter().map(|r| r.path.join("/")).collect();
        assert!(paths.contains(&"systemd/list-units".to_string()));
        assert!(paths.contains(&"systemd/load-unit".to_string()));
        assert!(paths.contains(&"journald/unit-logs".to_string()));
        assert!(results.iter().all(|r| !r.passed));
        assert_eq!(samples.len(), 5, "one sample per issued request");

        // Fixed category order: all systemd checks precede all journald ones.
        let first_journald = paths
            .iter()
            .position(|p| p.starts_with("journald"))
            .expect("journald ran");
        assert!(paths[..first_journald]
            .iter()
            .all(|p| p.starts_with("systemd")));
    }

    #[tokio::test]
    async fn skipping_negative_checks_drops_the_404_request() {
        let spec = RunSpec {
            include_negative_checks: false,
            timeout_ms: 1_000,
            ..RunSpec::default()
        };
        let client = http::build_client(spec.timeout_ms).expect("client");
        let base = Url::parse(UNREACHABLE).expect("base url");

        let mut checks = Checks::new();
        load_unit(&client, &spec, &base, &mut checks).await;

        let (results, samples) = checks.into_parts();
        assert!(results
            .iter()
            .all(|r| r.name != "unknown unit returns 404"));
        assert_eq!(samples.len(), 1, "only the positive-path request runs");
    }

    #[tokio::test]
    async fn negative_check_asserts_the_second_capture() {
        let spec = RunSpec {
            timeout_ms: 1_000,
            ..RunSpec::default()
        };
        let client = http::build_client(spec.timeout_ms).expect("client");
        let base = Url::parse(UNREACHABLE).expect("base url");

        let mut checks = Checks::new();
        load_unit(&client, &spec, &base, &mut checks).await;

        let (results, samples) = checks.into_parts();
        let not_found = results
            .iter()
            .find(|r| r.name == "unknown unit returns 404")
            .expect("negative check recorded");
        assert!(!not_found.passed, "status 0 is not 404");
        assert_eq!(samples.len(), 2);
        // No ceiling check is recorded for the negative-path request.
        let ceiling_checks = results
            .iter()
            .filter(|r| r.name == "status is accepted")
            .count();
        assert_eq!(ceiling_checks, 1);
    }
}
