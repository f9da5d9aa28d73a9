use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::TestCase;
use crate::utils::retry::{with_retry, RetryPolicy};

/// Raw per-case result as the code-execution collaborator reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRunResult {
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub input: Option<serde_json::Value>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub stderr: Option<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub results: Vec<CaseOutcome>,
    pub all_passed: bool,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    results: Vec<RawRunResult>,
}

/// Client for the code-execution collaborator. Runs are idempotent, so
/// transient failures get a bounded retry before surfacing inline.
#[derive(Clone)]
pub struct CompilerGateway {
    http: Client,
    url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CompilerGateway {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            url,
            timeout,
            retry: RetryPolicy::collaborator(),
        }
    }

    pub async fn run(
        &self,
        language: &str,
        code: &str,
        test_cases: &[TestCase],
    ) -> Result<RunReport, SessionError> {
        let body = serde_json::json!({
            "language": language,
            "code": code,
            "test_cases": test_cases,
        });

        let raw = with_retry(&self.retry, || async {
            let response = self
                .http
                .post(&self.url)
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| {
                    SessionError::collaborator(format!("code execution request failed: {e}"))
                })?;

            if !response.status().is_success() {
                return Err(SessionError::collaborator(format!(
                    "code executor returned {}",
                    response.status()
                )));
            }

            response
                .json::<RunEnvelope>()
                .await
                .map_err(|e| SessionError::collaborator(format!("malformed run results: {e}")))
        })
        .await?;

        Ok(normalize_results(raw.results))
    }
}

/// A result carrying `stderr` or `error` is a failed run, whatever the
/// collaborator's own `passed` flag claims.
fn normalize_results(raw: Vec<RawRunResult>) -> RunReport {
    let results: Vec<CaseOutcome> = raw
        .into_iter()
        .map(|r| {
            let diagnostic = [r.stderr, r.error]
                .into_iter()
                .flatten()
                .find(|s| !s.trim().is_empty());
            let failed = diagnostic.is_some();
            CaseOutcome {
                input: r.input,
                expected: r.expected,
                actual: r.actual.or(r.stdout),
                stderr: diagnostic,
                passed: !failed && r.passed.unwrap_or(false),
            }
        })
        .collect();
    let all_passed = !results.is_empty() && results.iter().all(|r| r.passed);
    RunReport {
        results,
        all_passed,
    }
}
