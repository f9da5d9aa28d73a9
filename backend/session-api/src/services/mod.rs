use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use uuid::Uuid;

use crate::config::Config;
use crate::error::SessionError;
use crate::metrics::SESSIONS_TOTAL;
use crate::models::question::{self, Question};
use crate::proctor::controller::{ScoringPort, TestSessionController};
use crate::proctor::signals::EnvironmentLink;

pub mod chat_service;
pub mod compiler_service;
pub mod results_service;
pub mod scoring_service;

use chat_service::ChatGateway;
use compiler_service::CompilerGateway;
use results_service::ResultStore;
use scoring_service::ScoringGateway;

/// Everything a live session needs: the controller plus the signal link
/// its client reports into.
#[derive(Clone)]
pub struct SessionHandle {
    pub controller: Arc<TestSessionController>,
    pub link: Arc<EnvironmentLink>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn insert(&self, session_id: &str, handle: SessionHandle) {
        self.inner
            .write()
            .expect("session registry lock poisoned")
            .insert(session_id.to_string(), handle);
    }

    pub fn get(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.inner
            .read()
            .expect("session registry lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("session registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<Vec<Question>>,
    pub sessions: SessionRegistry,
    pub results: ResultStore,
    pub scorer: Arc<dyn ScoringPort>,
    pub chat: ChatGateway,
    pub compiler: CompilerGateway,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let catalog = Arc::new(question::load_catalog(config.question_catalog.as_deref())?);
        tracing::info!("question catalog loaded: {} questions", catalog.len());

        let timeout = Duration::from_secs(config.collaborator_timeout_secs);
        let scorer: Arc<dyn ScoringPort> =
            Arc::new(ScoringGateway::new(config.scorer_url.clone(), timeout));
        let chat = ChatGateway::new(
            config.interviewer_url.clone(),
            config.assistant_url.clone(),
            timeout,
        );
        let compiler = CompilerGateway::new(config.compiler_url.clone(), timeout);

        Ok(Self {
            config,
            catalog,
            sessions: SessionRegistry::default(),
            results: ResultStore::default(),
            scorer,
            chat,
            compiler,
        })
    }

    /// Allocates a fresh attempt: a signal link for the client to report
    /// into and a controller spawned around the configured catalog.
    pub fn create_session(&self) -> (String, SessionHandle) {
        let session_id = Uuid::new_v4().to_string();
        let link = Arc::new(EnvironmentLink::new(Duration::from_millis(
            self.config.fullscreen_ack_ms,
        )));
        let controller = TestSessionController::spawn(
            session_id.clone(),
            self.catalog.clone(),
            link.clone(),
            self.scorer.clone(),
            self.results.clone(),
        );
        let handle = SessionHandle { controller, link };
        self.sessions.insert(&session_id, handle.clone());

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!(session_id = %session_id, "session created");

        (session_id, handle)
    }
}
