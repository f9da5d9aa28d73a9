use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod question;
pub mod score;

use crate::proctor::signals::ClientDirective;
pub use question::{Difficulty, Example, Question, QuestionView, TestCase};
pub use score::{RubricScore, ScoreBreakdown, ScoreCard, ScoreRequest, SessionReport};

/// Session lifecycle phase. Transitions are owned exclusively by the
/// controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Active,
    Blocked,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Previous,
}

/// Observable view of a session, published on every state change and
/// streamed to clients over SSE.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: Phase,
    pub current_question: usize,
    pub question_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub code_by_question: HashMap<String, String>,
    pub prompt_count_by_question: HashMap<String, u32>,
}

/// Events carried on the per-session SSE stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    Snapshot(SessionSnapshot),
    Directive { directive: ClientDirective },
}

impl SessionEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::Snapshot(_) => "snapshot",
            SessionEvent::Directive { .. } => "directive",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(max = 128))]
    pub candidate_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCodeRequest {
    #[validate(length(min = 1, max = 128))]
    pub question_id: String,
    #[validate(length(max = 65536))]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub direction: Direction,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4096))]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RunCodeRequest {
    #[validate(length(max = 65536))]
    pub code: String,
    /// Overrides the question's configured language when present.
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InputCheckResponse {
    pub suppress: bool,
}
