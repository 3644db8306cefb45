use crate::domain::ResponseCapture;
use log::debug;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One client is built per run and shared by every virtual user. Timeout and
/// abort behavior live entirely here; scenarios only ever see a capture.
pub fn build_client(timeout_ms: u64) -> Result<Client, String> {
    let mut builder = Client::builder().redirect(reqwest::redirect::Policy::limited(10));

    if timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }

    builder
        .build()
        .map_err(|err| format!("Failed to build HTTP client: {err}"))
}

/// A transport failure still yields a capture: status 0, no headers, and a
/// plain-text body, so the shape and semantic checks fail without anything
/// propagating out of the scenario.
pub fn error_capture(message: impl Into<String>) -> ResponseCapture {
    ResponseCapture {
        status: 0,
        status_text: "Error".into(),
        headers: HashMap::new(),
        body: message.into(),
        time: 0,
        size: 0,
    }
}

pub async fn issue(client: &Client, url: Url) -> ResponseCapture {
    debug!("GET {url}");
    let started = Instant::now();

    let result = client.get(url).send().await;
    match result {
        Ok(response) => {
            let elapsed = started.elapsed().as_millis() as u64;
            let status = response.status();
            let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();

            let mut headers = HashMap::new();
            for (key, value) in response.headers() {
                headers.insert(
                    key.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                );
            }

            match response.bytes().await {
                Ok(bytes) => ResponseCapture {
                    status: status.as_u16(),
                    status_text,
                    headers,
                    body: String::from_utf8_lossy(&bytes).to_string(),
                    time: elapsed,
                    size: bytes.len() as u64,
                },
                Err(err) => {
                    let mut capture = error_capture(format!("Failed to read response: {err}"));
                    capture.time = started.elapsed().as_millis() as u64;
                    capture
                }
            }
        }
        Err(err) => {
            let mut capture = error_capture(format!("Request failed: {err}"));
            capture.time = started.elapsed().as_millis() as u64;
            capture
        }
    }
}
