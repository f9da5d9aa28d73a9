use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::SessionError;
use crate::models::{ScoreBreakdown, ScoreRequest};
use crate::proctor::controller::ScoringPort;

/// Client for the external scoring collaborator.
///
/// One call per question per submission, never retried here: a failed call
/// fails the whole submission and the user retries it explicitly.
pub struct ScoringGateway {
    http: Client,
    url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ScoreEnvelope {
    reply: serde_json::Value,
}

impl ScoringGateway {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            url,
            timeout,
        }
    }
}

#[async_trait]
impl ScoringPort for ScoringGateway {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreBreakdown, SessionError> {
        let wire = serde_json::json!({
            "question_id": request.question_id,
            "payload": {
                "candidate_answer": request.candidate_answer,
                "expected_answer": request.expected_answer,
                "elapsed_seconds": request.elapsed_seconds,
                "prompt_count": request.prompt_count,
                "notes": request.notes,
            },
        });

        tracing::debug!(
            question_id = %request.question_id,
            prompt_count = request.prompt_count,
            "calling scoring collaborator"
        );

        let response = self
            .http
            .post(&self.url)
            .json(&wire)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SessionError::scoring(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SessionError::scoring(format!(
                "scorer returned {status}: {body}"
            )));
        }

        let envelope: ScoreEnvelope = response
            .json()
            .await
            .map_err(|e| SessionError::scoring(format!("malformed scorer response: {e}")))?;

        normalize_reply(envelope.reply)
    }
}

/// The upstream scorer is an LLM; `reply` arrives either as the rubric
/// object itself or as a stringified (possibly markdown-fenced) JSON blob.
/// Anything that does not normalize into the rubric shape fails the call —
/// a zero score is never fabricated.
fn normalize_reply(reply: serde_json::Value) -> Result<ScoreBreakdown, SessionError> {
    match reply {
        serde_json::Value::String(text) => {
            serde_json::from_str(strip_code_fences(&text)).map_err(|e| {
                SessionError::scoring(format!("unparseable scorer reply: {e}"))
            })
        }
        value => serde_json::from_value(value)
            .map_err(|e| SessionError::scoring(format!("unexpected scorer reply shape: {e}"))),
    }
}

fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the fence line itself ("```json" or bare "```").
        trimmed = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
        trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
        trimmed = trimmed.trim();
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUBRIC: &str = r#"{
        "prompt_quality": {"score": 8, "justification": "clear prompts"},
        "answer_accuracy": {"score": 10, "justification": "matches"},
        "creativity_innovation": {"score": 5, "justification": "standard"},
        "overall": {"score": 23, "justification": "sum"}
    }"#;

    #[test]
    fn normalizes_object_reply() {
        let reply: serde_json::Value = serde_json::from_str(RUBRIC).unwrap();
        let breakdown = normalize_reply(reply).unwrap();
        assert_eq!(breakdown.answer_accuracy.score, 10.0);
        assert_eq!(breakdown.overall.score, 23.0);
    }

    #[test]
    fn normalizes_fenced_string_reply() {
        let fenced = format!("```json\n{}\n```", RUBRIC);
        let breakdown = normalize_reply(serde_json::Value::String(fenced)).unwrap();
        assert_eq!(breakdown.prompt_quality.score, 8.0);
    }

    #[test]
    fn normalizes_bare_string_reply() {
        let breakdown = normalize_reply(serde_json::Value::String(RUBRIC.to_string())).unwrap();
        assert_eq!(breakdown.creativity_innovation.score, 5.0);
    }

    #[test]
    fn rejects_unusable_replies() {
        for reply in [
            serde_json::Value::String("the model rambled instead".to_string()),
            serde_json::json!({"error": "no content"}),
            serde_json::Value::Null,
        ] {
            assert!(matches!(
                normalize_reply(reply),
                Err(SessionError::ScoringUnavailable { .. })
            ));
        }
    }

    #[test]
    fn strips_fences_without_language_tag() {
        let fenced = format!("```\n{}\n```", RUBRIC);
        assert_eq!(strip_code_fences(&fenced), RUBRIC.trim());
    }
}
