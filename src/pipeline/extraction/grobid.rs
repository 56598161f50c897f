use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::{RequestBuilder, Response};

use super::types::{ExtractionOptions, ExtractionService, ServiceResponse};
use super::ExtractionError;
use crate::config::GrobidConfig;

/// Full-text endpoint, relative to the server root.
const FULLTEXT_PATH: &str = "/api/processFulltextDocument";

/// Liveness endpoint, relative to the server root.
const ALIVE_PATH: &str = "/api/isalive";

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Blocking HTTP client for a GROBID-compatible extraction service.
///
/// Every request carries the configured timeout. Connection failures,
/// timeouts, and 5xx answers are retried with exponential backoff.
pub struct GrobidClient {
    base_url: String,
    client: reqwest::blocking::Client,
    config: GrobidConfig,
}

impl GrobidClient {
    pub fn new(config: GrobidConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .no_proxy()
            .build()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.grobid_server.trim_end_matches('/').to_string(),
            client,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.config
                .retry_backoff_ms
                .saturating_mul(factor)
                .min(MAX_BACKOFF_MS),
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> ExtractionError {
        if e.is_timeout() {
            ExtractionError::Timeout(self.config.timeout)
        } else {
            ExtractionError::HttpClient(e.to_string())
        }
    }

    /// Send a request built by `build`, retrying transport errors and 5xx answers.
    fn send_with_retry<F>(&self, what: &str, build: F) -> Result<Response, ExtractionError>
    where
        F: Fn() -> Result<RequestBuilder, ExtractionError>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = build()?.send().map_err(|e| self.map_send_error(e));
            let retry_reason = match &outcome {
                Ok(resp) if resp.status().is_server_error() => {
                    format!("server answered {}", resp.status().as_u16())
                }
                Ok(_) => break outcome,
                Err(e) if e.is_retryable() => e.to_string(),
                Err(_) => break outcome,
            };

            if attempt >= self.config.max_retries {
                break outcome;
            }

            let delay = self.backoff(attempt);
            tracing::warn!(
                request = what,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                reason = %retry_reason,
                "Extraction service request failed, retrying"
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

impl ExtractionService for GrobidClient {
    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    fn check_alive(&self) -> Result<(), ExtractionError> {
        let url = format!("{}{ALIVE_PATH}", self.base_url);
        let unavailable = |reason: String| ExtractionError::ServiceUnavailable {
            url: self.base_url.clone(),
            reason,
        };

        let response = self
            .send_with_retry("isalive", || Ok(self.client.get(&url)))
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("status {}", status.as_u16())));
        }
        tracing::debug!(url = %self.base_url, "Extraction service is alive");
        Ok(())
    }

    fn process_fulltext(
        &self,
        path: &Path,
        options: &ExtractionOptions,
    ) -> Result<ServiceResponse, ExtractionError> {
        let url = format!("{}{FULLTEXT_PATH}", self.base_url);

        // The multipart body is consumed by each send, so it is rebuilt per attempt.
        let build = || -> Result<RequestBuilder, ExtractionError> {
            let mut form = Form::new().file("input", path)?;
            for (name, value) in options.form_flags() {
                form = form.text(name, value);
            }
            if options.layout_coordinates {
                for element in &self.config.coordinates {
                    form = form.text("teiCoordinates", element.clone());
                }
            }
            Ok(self.client.post(&url).multipart(form))
        };

        let response = self.send_with_retry("processFulltextDocument", build)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;

        Ok(ServiceResponse { status, body })
    }
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum MockReply {
    Respond(ServiceResponse),
    Timeout,
}

/// Mock extraction service for testing. Canned answers keyed by file name.
pub struct MockExtractionService {
    alive: bool,
    replies: HashMap<String, MockReply>,
    default_reply: MockReply,
    calls: Mutex<Vec<String>>,
}

impl MockExtractionService {
    /// Reachable service answering `200` with `markup` for every file.
    pub fn new(markup: &str) -> Self {
        Self {
            alive: true,
            replies: HashMap::new(),
            default_reply: MockReply::Respond(ServiceResponse {
                status: 200,
                body: markup.to_string(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Service that fails the liveness check.
    pub fn unreachable() -> Self {
        Self {
            alive: false,
            ..Self::new("")
        }
    }

    pub fn with_response(mut self, file_name: &str, status: u16, body: &str) -> Self {
        self.replies.insert(
            file_name.to_string(),
            MockReply::Respond(ServiceResponse {
                status,
                body: body.to_string(),
            }),
        );
        self
    }

    pub fn with_timeout(mut self, file_name: &str) -> Self {
        self.replies
            .insert(file_name.to_string(), MockReply::Timeout);
        self
    }

    /// File names submitted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl ExtractionService for MockExtractionService {
    fn endpoint(&self) -> String {
        "mock://extraction".to_string()
    }

    fn check_alive(&self) -> Result<(), ExtractionError> {
        if self.alive {
            Ok(())
        } else {
            Err(ExtractionError::ServiceUnavailable {
                url: "mock://extraction".into(),
                reason: "connection refused".into(),
            })
        }
    }

    fn process_fulltext(
        &self,
        path: &Path,
        _options: &ExtractionOptions,
    ) -> Result<ServiceResponse, ExtractionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name.clone());
        }

        match self.replies.get(&name).unwrap_or(&self.default_reply) {
            MockReply::Respond(resp) => Ok(resp.clone()),
            MockReply::Timeout => Err(ExtractionError::Timeout(180)),
        }
    }
}
