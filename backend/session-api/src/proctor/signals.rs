use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::SessionError;

/// Raw environment signal reported by the client. One variant per browser
/// observation the original proctoring relies on: fullscreen-element
/// presence, document visibility, window focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentSignal {
    Fullscreen { active: bool },
    Visibility { hidden: bool },
    Blur,
}

/// Command pushed to the client over the session event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientDirective {
    EnterFullscreen,
    ExitFullscreen,
    LockdownOn,
    LockdownOff,
}

const SIGNAL_CHANNEL_CAPACITY: usize = 32;

/// Per-session signal hub between the engine and whatever renders it.
///
/// Replaces the original's DOM listeners with three independent broadcast
/// streams (fullscreen, visibility, blur) plus a directive channel going
/// the other way. The monitor subscribes; handlers feed `report`; tests
/// pump both sides deterministically without any DOM.
pub struct EnvironmentLink {
    fullscreen_tx: broadcast::Sender<bool>,
    visibility_tx: broadcast::Sender<bool>,
    blur_tx: broadcast::Sender<()>,
    directive_tx: broadcast::Sender<ClientDirective>,
    ack_window: Duration,
}

impl EnvironmentLink {
    pub fn new(ack_window: Duration) -> Self {
        let (fullscreen_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let (visibility_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let (blur_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let (directive_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        Self {
            fullscreen_tx,
            visibility_tx,
            blur_tx,
            directive_tx,
            ack_window,
        }
    }

    /// Fan a reported signal into the matching stream. Reports with no
    /// subscriber are dropped; there is nobody to act on them.
    pub fn report(&self, signal: EnvironmentSignal) {
        match signal {
            EnvironmentSignal::Fullscreen { active } => {
                let _ = self.fullscreen_tx.send(active);
            }
            EnvironmentSignal::Visibility { hidden } => {
                let _ = self.visibility_tx.send(hidden);
            }
            EnvironmentSignal::Blur => {
                let _ = self.blur_tx.send(());
            }
        }
    }

    /// Ask the client to enter fullscreen and wait for the acknowledging
    /// `Fullscreen { active: true }` report. No connected client, a closed
    /// link, or an expired ack window all fail the request; the caller may
    /// retry and the session does not start.
    pub async fn request_fullscreen(&self) -> Result<(), SessionError> {
        let mut acks = self.fullscreen_tx.subscribe();

        if self.directive_tx.send(ClientDirective::EnterFullscreen).is_err() {
            return Err(SessionError::fullscreen("no client connected"));
        }

        let deadline = tokio::time::Instant::now() + self.ack_window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, acks.recv()).await {
                Ok(Ok(true)) => return Ok(()),
                Ok(Ok(false)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(SessionError::fullscreen("environment link closed"));
                }
                Err(_) => {
                    return Err(SessionError::fullscreen(format!(
                        "client did not acknowledge within {}ms",
                        self.ack_window.as_millis()
                    )));
                }
            }
        }
    }

    /// Best-effort; failure to exit fullscreen is never fatal.
    pub fn exit_fullscreen(&self) {
        let _ = self.directive_tx.send(ClientDirective::ExitFullscreen);
    }

    pub(crate) fn send_directive(&self, directive: ClientDirective) {
        let _ = self.directive_tx.send(directive);
    }

    pub fn subscribe_fullscreen(&self) -> broadcast::Receiver<bool> {
        self.fullscreen_tx.subscribe()
    }

    pub fn subscribe_visibility(&self) -> broadcast::Receiver<bool> {
        self.visibility_tx.subscribe()
    }

    pub fn subscribe_blur(&self) -> broadcast::Receiver<()> {
        self.blur_tx.subscribe()
    }

    pub fn subscribe_directives(&self) -> broadcast::Receiver<ClientDirective> {
        self.directive_tx.subscribe()
    }
}
