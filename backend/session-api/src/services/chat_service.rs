use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::SessionError;
use crate::models::Question;

/// Which of the two independent AI chat collaborators a prompt goes to:
/// the rules-only interviewer or the general candidate assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEndpoint {
    Interviewer,
    Assistant,
}

impl ChatEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatEndpoint::Interviewer => "interviewer",
            ChatEndpoint::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    reply: String,
}

/// Relay for candidate chat traffic. Stateless on this side: conversation
/// history lives with the collaborator, keyed by question id. Failures are
/// inline (`CollaboratorUnreachable`) and never touch the session phase.
/// No retry either — a timed-out delivery may still have reached the
/// collaborator, and replaying it would corrupt the prompt accounting.
#[derive(Clone)]
pub struct ChatGateway {
    http: Client,
    interviewer_url: String,
    assistant_url: String,
    timeout: Duration,
}

impl ChatGateway {
    pub fn new(interviewer_url: String, assistant_url: String, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            interviewer_url,
            assistant_url,
            timeout,
        }
    }

    pub async fn relay(
        &self,
        endpoint: ChatEndpoint,
        prompt: &str,
        question: &Question,
    ) -> Result<String, SessionError> {
        let url = match endpoint {
            ChatEndpoint::Interviewer => &self.interviewer_url,
            ChatEndpoint::Assistant => &self.assistant_url,
        };

        let body = serde_json::json!({
            "prompt": prompt,
            "question_id": question.id,
            "question_info": question.title,
        });

        tracing::debug!(
            endpoint = endpoint.as_str(),
            question_id = %question.id,
            "relaying chat prompt"
        );

        let response = self
            .http
            .post(url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SessionError::collaborator(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SessionError::collaborator(format!(
                "chat collaborator returned {}",
                response.status()
            )));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| SessionError::collaborator(format!("malformed chat reply: {e}")))?;

        Ok(reply.reply)
    }
}
