use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::error::SessionError;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_TOTAL, SUBMISSIONS_TOTAL, VIOLATIONS_TOTAL};
use crate::models::{
    Direction, Phase, Question, ScoreBreakdown, ScoreCard, ScoreRequest, SessionReport,
    SessionSnapshot,
};
use crate::proctor::lockdown::{InputEvent, InputLockdown};
use crate::proctor::monitor::{MonitorEvent, ViolationEvent, ViolationMonitor};
use crate::proctor::signals::EnvironmentLink;
use crate::proctor::state::SessionState;
use crate::services::results_service::ResultStore;

/// Seam to the external scoring collaborator.
#[async_trait]
pub trait ScoringPort: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreBreakdown, SessionError>;
}

#[derive(Debug, Clone, Copy)]
pub enum SubmitReason {
    Manual,
    Violation(ViolationEvent),
}

impl SubmitReason {
    fn as_str(&self) -> &'static str {
        match self {
            SubmitReason::Manual => "manual",
            SubmitReason::Violation(_) => "forced",
        }
    }
}

/// Orchestrates one proctored attempt:
/// `NotStarted -> Active -> (Blocked <-> Active) -> Submitting -> Submitted`.
///
/// Composes the violation monitor, the input lockdown, and the per-question
/// session state; publishes a snapshot through a watch channel after every
/// state change so UI layers can subscribe without touching the engine.
pub struct TestSessionController {
    session_id: String,
    questions: Arc<Vec<Question>>,
    state: Mutex<SessionState>,
    monitor: Arc<ViolationMonitor>,
    lockdown: InputLockdown,
    link: Arc<EnvironmentLink>,
    scorer: Arc<dyn ScoringPort>,
    results: ResultStore,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl TestSessionController {
    /// Builds the controller and spawns its violation consumer. The
    /// consumer lives until the environment link closes.
    pub fn spawn(
        session_id: String,
        questions: Arc<Vec<Question>>,
        link: Arc<EnvironmentLink>,
        scorer: Arc<dyn ScoringPort>,
        results: ResultStore,
    ) -> Arc<Self> {
        let state = SessionState::initialize(session_id.clone(), &questions);
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        let monitor = Arc::new(ViolationMonitor::new(link.clone()));

        let controller = Arc::new(Self {
            session_id,
            questions,
            state: Mutex::new(state),
            lockdown: InputLockdown::new(link.clone()),
            monitor: monitor.clone(),
            link,
            scorer,
            results,
            snapshot_tx,
        });

        let mut events = monitor.watch();
        let consumer = controller.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                consumer.handle_monitor_event(event).await;
            }
            tracing::debug!(session_id = %consumer.session_id, "monitor event loop ended");
        });

        controller
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Whether the lockdown policy suppresses the given input event.
    pub fn blocks_input(&self, event: &InputEvent) -> bool {
        self.lockdown.blocks(event)
    }

    /// Explicit start action. Fullscreen must be acquired before anything
    /// else happens; on failure the session stays `NotStarted`, nothing is
    /// engaged, and the caller may retry.
    pub async fn start(&self) -> Result<SessionSnapshot, SessionError> {
        {
            let state = self.state.lock().await;
            let phase = state.phase();
            if phase != Phase::NotStarted {
                return Err(SessionError::InvalidPhase { phase });
            }
        }

        self.monitor.request_fullscreen().await?;

        let snapshot = {
            let mut state = self.state.lock().await;
            state.begin(Utc::now());
            state.snapshot()
        };
        self.lockdown.engage();
        self.monitor.arm();

        SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        SESSIONS_ACTIVE.inc();
        tracing::info!(session_id = %self.session_id, "session started");

        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// User-initiated resume from the blocking overlay. Failure to
    /// re-enter fullscreen leaves the session `Blocked`.
    pub async fn resume(&self) -> Result<SessionSnapshot, SessionError> {
        {
            let state = self.state.lock().await;
            let phase = state.phase();
            if phase != Phase::Blocked {
                return Err(SessionError::InvalidPhase { phase });
            }
        }

        self.monitor.request_fullscreen().await?;

        let snapshot = {
            let mut state = self.state.lock().await;
            if state.phase() == Phase::Blocked {
                state.set_phase(Phase::Active);
            }
            state.snapshot()
        };
        tracing::info!(session_id = %self.session_id, "session resumed after fullscreen block");
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Overwrites the buffer of the addressed question. Active phase only;
    /// the blocking overlay makes edits inert.
    pub async fn edit_code(
        &self,
        question_id: &str,
        code: String,
    ) -> Result<SessionSnapshot, SessionError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let phase = state.phase();
            if phase != Phase::Active {
                return Err(SessionError::InvalidPhase { phase });
            }
            if !state.update_code(question_id, code) {
                return Err(SessionError::UnknownQuestion(question_id.to_string()));
            }
            state.snapshot()
        };
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Clamped single-step navigation; disabled while blocked/submitting.
    pub async fn navigate(&self, direction: Direction) -> Result<SessionSnapshot, SessionError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let phase = state.phase();
            if phase != Phase::Active {
                return Err(SessionError::InvalidPhase { phase });
            }
            state.navigate(direction);
            state.snapshot()
        };
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Counts one successful AI round-trip against the question.
    pub async fn record_prompt(&self, question_id: &str) -> Result<SessionSnapshot, SessionError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let phase = state.phase();
            if phase != Phase::Active {
                return Err(SessionError::InvalidPhase { phase });
            }
            if !state.increment_prompt_count(question_id) {
                return Err(SessionError::UnknownQuestion(question_id.to_string()));
            }
            state.snapshot()
        };
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// The question currently on screen; chat and code execution are keyed
    /// by it and require an unblocked session.
    pub async fn active_question(&self) -> Result<Question, SessionError> {
        let state = self.state.lock().await;
        let phase = state.phase();
        if phase != Phase::Active {
            return Err(SessionError::InvalidPhase { phase });
        }
        Ok(self.questions[state.current_question()].clone())
    }

    /// Runs the single scoring pass for this session.
    ///
    /// Elapsed time is computed once and shared by every question. Scoring
    /// calls run sequentially in catalog order; any failure aborts the
    /// whole pass and restores the pre-submit phase so the user can retry.
    /// A second submission while `Submitting`/`Submitted` is rejected
    /// without any scoring call.
    pub async fn submit(&self, reason: SubmitReason) -> Result<SessionReport, SessionError> {
        let (prior_phase, elapsed, work) = {
            let mut state = self.state.lock().await;
            let phase = state.phase();
            match (phase, reason) {
                (Phase::Submitting | Phase::Submitted, _) => {
                    return Err(SessionError::AlreadySubmitted)
                }
                (Phase::Active, _) => {}
                // A tab switch can land while the fullscreen overlay is up;
                // forced submission still applies.
                (Phase::Blocked, SubmitReason::Violation(_)) => {}
                (phase, _) => return Err(SessionError::InvalidPhase { phase }),
            }

            let elapsed = state.elapsed_seconds(Utc::now())?;
            state.set_phase(Phase::Submitting);

            let work: Vec<(Question, String, u32)> = self
                .questions
                .iter()
                .map(|q| {
                    (
                        q.clone(),
                        state.code_for(&q.id).unwrap_or_default().to_string(),
                        state.prompt_count_for(&q.id),
                    )
                })
                .collect();
            let snapshot = state.snapshot();
            drop(state);
            self.publish(snapshot);
            (phase, elapsed, work)
        };

        tracing::info!(
            session_id = %self.session_id,
            reason = reason.as_str(),
            elapsed_seconds = elapsed,
            "scoring {} questions",
            work.len()
        );

        let mut results = Vec::with_capacity(work.len());
        for (question, candidate_answer, prompt_count) in &work {
            let request = ScoreRequest {
                question_id: question.id.clone(),
                candidate_answer: candidate_answer.clone(),
                expected_answer: question.expected_answer.clone(),
                elapsed_seconds: elapsed,
                prompt_count: *prompt_count,
                notes: format!("Question: {}", question.title),
            };

            match self.scorer.score(&request).await {
                Ok(breakdown) => results.push(ScoreCard::from_breakdown(
                    question.id.clone(),
                    question.title.clone(),
                    breakdown,
                )),
                Err(e) => {
                    tracing::error!(
                        session_id = %self.session_id,
                        question_id = %question.id,
                        "scoring failed, aborting submission: {e}"
                    );
                    let snapshot = {
                        let mut state = self.state.lock().await;
                        state.set_phase(prior_phase);
                        state.snapshot()
                    };
                    self.publish(snapshot);
                    SUBMISSIONS_TOTAL
                        .with_label_values(&[reason.as_str(), "failed"])
                        .inc();
                    return Err(e);
                }
            }
        }

        self.lockdown.release();
        self.link.exit_fullscreen();

        let report = SessionReport {
            results,
            total_seconds: elapsed,
        };
        self.results.put(&self.session_id, report.clone());

        let snapshot = {
            let mut state = self.state.lock().await;
            state.set_phase(Phase::Submitted);
            state.snapshot()
        };
        self.publish(snapshot);

        SUBMISSIONS_TOTAL
            .with_label_values(&[reason.as_str(), "ok"])
            .inc();
        SESSIONS_ACTIVE.dec();
        tracing::info!(session_id = %self.session_id, "session submitted");

        Ok(report)
    }

    async fn handle_monitor_event(&self, event: MonitorEvent) {
        match event {
            MonitorEvent::Violation(ViolationEvent::FullscreenExited) => {
                VIOLATIONS_TOTAL
                    .with_label_values(&[ViolationEvent::FullscreenExited.as_str()])
                    .inc();
                let snapshot = {
                    let mut state = self.state.lock().await;
                    if state.phase() != Phase::Active {
                        return;
                    }
                    state.set_phase(Phase::Blocked);
                    state.snapshot()
                };
                tracing::warn!(session_id = %self.session_id, "fullscreen lost, session blocked");
                self.publish(snapshot);
            }
            MonitorEvent::FullscreenRestored => {
                let snapshot = {
                    let mut state = self.state.lock().await;
                    if state.phase() != Phase::Blocked {
                        return;
                    }
                    state.set_phase(Phase::Active);
                    state.snapshot()
                };
                tracing::info!(session_id = %self.session_id, "fullscreen restored");
                self.publish(snapshot);
            }
            MonitorEvent::Violation(violation) => {
                VIOLATIONS_TOTAL
                    .with_label_values(&[violation.as_str()])
                    .inc();
                tracing::warn!(
                    session_id = %self.session_id,
                    kind = violation.as_str(),
                    "terminal violation, forcing submission"
                );
                if let Err(e) = self.submit(SubmitReason::Violation(violation)).await {
                    // AlreadySubmitted is expected when blur and hidden
                    // arrive from the same tab switch.
                    tracing::warn!(
                        session_id = %self.session_id,
                        "forced submission not performed: {e}"
                    );
                }
            }
        }
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        self.snapshot_tx.send_replace(snapshot);
    }
}
