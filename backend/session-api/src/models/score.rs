use serde::{Deserialize, Serialize};

/// One rubric dimension as returned by the scoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricScore {
    pub score: f64,
    pub justification: String,
}

/// The four-dimension rubric block the scorer replies with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub prompt_quality: RubricScore,
    pub answer_accuracy: RubricScore,
    pub creativity_innovation: RubricScore,
    pub overall: RubricScore,
}

/// What the engine sends to the scorer for a single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub question_id: String,
    pub candidate_answer: String,
    pub expected_answer: String,
    pub elapsed_seconds: u64,
    pub prompt_count: u32,
    pub notes: String,
}

/// Per-question result, immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCard {
    pub question_id: String,
    pub question_title: String,
    pub prompt_quality: RubricScore,
    pub answer_accuracy: RubricScore,
    pub creativity_innovation: RubricScore,
    pub overall: RubricScore,
}

impl ScoreCard {
    pub fn from_breakdown(
        question_id: impl Into<String>,
        question_title: impl Into<String>,
        breakdown: ScoreBreakdown,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            question_title: question_title.into(),
            prompt_quality: breakdown.prompt_quality,
            answer_accuracy: breakdown.answer_accuracy,
            creativity_innovation: breakdown.creativity_innovation,
            overall: breakdown.overall,
        }
    }
}

/// Aggregated submission outcome, one card per question in catalog order,
/// sharing a single elapsed-time value for the whole attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub results: Vec<ScoreCard>,
    pub total_seconds: u64,
}
