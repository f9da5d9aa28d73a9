use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::models::{Direction, Phase, Question, SessionSnapshot};

/// Pure per-attempt session data. All mutation goes through the methods
/// below; the controller owns the only instance and serializes access.
#[derive(Debug)]
pub struct SessionState {
    session_id: String,
    question_order: Vec<String>,
    started_at: Option<DateTime<Utc>>,
    current_question: usize,
    code_by_question: HashMap<String, String>,
    prompt_count_by_question: HashMap<String, u32>,
    phase: Phase,
}

impl SessionState {
    /// Seeds one code buffer (from the question's starter template) and one
    /// zeroed prompt counter per configured question.
    pub fn initialize(session_id: impl Into<String>, questions: &[Question]) -> Self {
        let code_by_question = questions
            .iter()
            .map(|q| (q.id.clone(), q.starter_code.clone()))
            .collect();
        let prompt_count_by_question = questions.iter().map(|q| (q.id.clone(), 0)).collect();
        Self {
            session_id: session_id.into(),
            question_order: questions.iter().map(|q| q.id.clone()).collect(),
            started_at: None,
            current_question: 0,
            code_by_question,
            prompt_count_by_question,
            phase: Phase::NotStarted,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn current_question(&self) -> usize {
        self.current_question
    }

    pub fn question_count(&self) -> usize {
        self.question_order.len()
    }

    /// Records the start timestamp exactly once and activates the session.
    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.started_at.get_or_insert(now);
        self.phase = Phase::Active;
    }

    /// Overwrites the buffer for that question only; unknown ids leave the
    /// state untouched. Returns whether the edit applied.
    pub fn update_code(&mut self, question_id: &str, code: String) -> bool {
        match self.code_by_question.get_mut(question_id) {
            Some(buffer) => {
                *buffer = code;
                true
            }
            None => false,
        }
    }

    pub fn code_for(&self, question_id: &str) -> Option<&str> {
        self.code_by_question.get(question_id).map(String::as_str)
    }

    /// Counts one AI round-trip against the question. Counters only ever
    /// grow. Returns whether the id was known.
    pub fn increment_prompt_count(&mut self, question_id: &str) -> bool {
        match self.prompt_count_by_question.get_mut(question_id) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub fn prompt_count_for(&self, question_id: &str) -> u32 {
        self.prompt_count_by_question
            .get(question_id)
            .copied()
            .unwrap_or(0)
    }

    /// Moves the question pointer by one, clamped to the configured range;
    /// navigation at a boundary is a no-op, never a wrap.
    pub fn navigate(&mut self, direction: Direction) {
        match direction {
            Direction::Next => {
                if self.current_question + 1 < self.question_order.len() {
                    self.current_question += 1;
                }
            }
            Direction::Previous => {
                self.current_question = self.current_question.saturating_sub(1);
            }
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let started_at = self.started_at.ok_or(SessionError::NotStarted)?;
        Ok((now - started_at).num_seconds().max(0) as u64)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            phase: self.phase,
            current_question: self.current_question,
            question_count: self.question_order.len(),
            started_at: self.started_at,
            code_by_question: self.code_by_question.clone(),
            prompt_count_by_question: self.prompt_count_by_question.clone(),
        }
    }
}
