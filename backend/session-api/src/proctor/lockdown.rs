use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use crate::proctor::signals::{ClientDirective, EnvironmentLink};

/// Candidate input event reported for policy evaluation. Key events carry
/// their modifier state; everything else is identified by kind alone.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    Copy,
    Paste,
    Cut,
    ContextMenu,
    SelectAll,
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        meta: bool,
    },
}

/// Clipboard/context-menu suppression for the life of an active session.
///
/// Engaging pushes a `LockdownOn` directive so the client detaches-proof
/// itself; releasing pushes `LockdownOff` so restrictions never leak into
/// subsequent pages. Both are idempotent: re-engaging an engaged lockdown
/// emits nothing. `blocks` is the engine-side policy for clients that
/// forward events instead of suppressing locally.
pub struct InputLockdown {
    link: Arc<EnvironmentLink>,
    engaged: AtomicBool,
}

impl InputLockdown {
    pub fn new(link: Arc<EnvironmentLink>) -> Self {
        Self {
            link,
            engaged: AtomicBool::new(false),
        }
    }

    pub fn engage(&self) {
        if !self.engaged.swap(true, Ordering::SeqCst) {
            self.link.send_directive(ClientDirective::LockdownOn);
        }
    }

    pub fn release(&self) {
        if self.engaged.swap(false, Ordering::SeqCst) {
            self.link.send_directive(ClientDirective::LockdownOff);
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// Whether the given event must be suppressed right now. Imposes no
    /// restriction while released.
    pub fn blocks(&self, event: &InputEvent) -> bool {
        if !self.is_engaged() {
            return false;
        }
        match event {
            InputEvent::Copy
            | InputEvent::Paste
            | InputEvent::Cut
            | InputEvent::ContextMenu
            | InputEvent::SelectAll => true,
            InputEvent::Key { key, ctrl, meta } => {
                (*ctrl || *meta)
                    && matches!(
                        key.to_ascii_lowercase().as_str(),
                        "c" | "v" | "x" | "a"
                    )
            }
        }
    }
}
