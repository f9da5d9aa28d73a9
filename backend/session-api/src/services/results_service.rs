use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::SessionReport;

/// Session-local hand-off between submission and the results view.
///
/// The controller deposits exactly one report per session; the results
/// view takes it exactly once. Nothing here is durable; everything is
/// gone with the process.
#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<RwLock<HashMap<String, SessionReport>>>,
}

impl ResultStore {
    pub fn put(&self, session_id: &str, report: SessionReport) {
        self.inner
            .write()
            .expect("result store lock poisoned")
            .insert(session_id.to_string(), report);
    }

    /// Single-use retrieval: the report is removed on read, mirroring a
    /// results page that consumes its hand-off and leaves nothing behind.
    pub fn take(&self, session_id: &str) -> Option<SessionReport> {
        self.inner
            .write()
            .expect("result store lock poisoned")
            .remove(session_id)
    }
}
