use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::error::SessionError;
use crate::proctor::signals::EnvironmentLink;

/// A detected deviation from required test-taking conditions. Carries no
/// payload; the kind alone decides block-vs-forced-submit downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationEvent {
    FullscreenExited,
    TabHidden,
    WindowBlurred,
}

impl ViolationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationEvent::FullscreenExited => "fullscreen_exited",
            ViolationEvent::TabHidden => "tab_hidden",
            ViolationEvent::WindowBlurred => "window_blurred",
        }
    }
}

/// What the monitor emits to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    Violation(ViolationEvent),
    FullscreenRestored,
}

/// Translates the three raw signal streams into a normalized monitor-event
/// stream plus a fullscreen-blocked flag.
///
/// Disarmed until the session starts: fullscreen churn on the start screen
/// is never a violation. Once armed, fullscreen loss flips `is_blocked` and
/// raises `FullscreenExited`; regain clears the flag and raises
/// `FullscreenRestored`. Hidden-document and window-blur signals raise
/// terminal violations, one per occurrence. The monitor only observes and
/// emits; submission and navigation belong to the controller.
pub struct ViolationMonitor {
    link: Arc<EnvironmentLink>,
    armed: AtomicBool,
    blocked: AtomicBool,
}

impl ViolationMonitor {
    pub fn new(link: Arc<EnvironmentLink>) -> Self {
        Self {
            link,
            armed: AtomicBool::new(false),
            blocked: AtomicBool::new(false),
        }
    }

    /// Start treating signals as violations. Called once the session has
    /// actually started (fullscreen acquired).
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Forwarded to the environment link; the monitor owns the fullscreen
    /// relationship with the client.
    pub async fn request_fullscreen(&self) -> Result<(), SessionError> {
        self.link.request_fullscreen().await
    }

    /// Spawns the observation loop for the life of the session and returns
    /// the event stream. The loop ends when the link or the receiver goes
    /// away.
    pub fn watch(self: &Arc<Self>) -> mpsc::Receiver<MonitorEvent> {
        let (tx, rx) = mpsc::channel(16);
        let monitor = Arc::clone(self);
        let mut fullscreen = monitor.link.subscribe_fullscreen();
        let mut visibility = monitor.link.subscribe_visibility();
        let mut blur = monitor.link.subscribe_blur();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    signal = fullscreen.recv() => match signal {
                        Ok(active) => monitor.on_fullscreen(active),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    signal = visibility.recv() => match signal {
                        Ok(hidden) => monitor.on_visibility(hidden),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    signal = blur.recv() => match signal {
                        Ok(()) => monitor.on_blur(),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };

                if let Some(event) = event {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            tracing::debug!("violation monitor loop ended");
        });

        rx
    }

    fn on_fullscreen(&self, active: bool) -> Option<MonitorEvent> {
        if !self.is_armed() {
            return None;
        }
        if !active {
            // swap dedupes repeated loss signals into one violation
            if !self.blocked.swap(true, Ordering::SeqCst) {
                return Some(MonitorEvent::Violation(ViolationEvent::FullscreenExited));
            }
        } else if self.blocked.swap(false, Ordering::SeqCst) {
            return Some(MonitorEvent::FullscreenRestored);
        }
        None
    }

    fn on_visibility(&self, hidden: bool) -> Option<MonitorEvent> {
        if self.is_armed() && hidden {
            Some(MonitorEvent::Violation(ViolationEvent::TabHidden))
        } else {
            None
        }
    }

    fn on_blur(&self) -> Option<MonitorEvent> {
        if self.is_armed() {
            Some(MonitorEvent::Violation(ViolationEvent::WindowBlurred))
        } else {
            None
        }
    }
}
