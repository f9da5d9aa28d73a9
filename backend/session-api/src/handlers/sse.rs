use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::{
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{SessionEvent, SessionSnapshot},
    proctor::signals::ClientDirective,
    services::AppState,
};

/// Per-session event stream: the current snapshot on connect, then a
/// `snapshot` event per state change and a `directive` event per client
/// command (enter/exit fullscreen, lockdown on/off).
/// GET /api/v1/sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = state
        .sessions
        .get(&session_id)
        .map_err(crate::handlers::error_response)?;

    tracing::info!(session_id = %session_id, "client connected to session stream");

    let snapshots = handle.controller.subscribe();
    let directives = handle.link.subscribe_directives();
    let stream = session_events(snapshots, directives);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Decrements the connection gauge when the stream is dropped.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

fn snapshot_event(snapshot: SessionSnapshot) -> Event {
    let event = SessionEvent::Snapshot(snapshot);
    Event::default()
        .event(event.event_name())
        .data(event.to_sse_data())
}

fn directive_event(directive: ClientDirective) -> Event {
    let event = SessionEvent::Directive { directive };
    Event::default()
        .event(event.event_name())
        .data(event.to_sse_data())
}

fn session_events(
    snapshots: watch::Receiver<SessionSnapshot>,
    directives: broadcast::Receiver<ClientDirective>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = ConnectionGuard::new();

    stream::unfold(
        (snapshots, directives, guard, true),
        |(mut snapshots, mut directives, guard, initial)| async move {
            if initial {
                let event = snapshot_event(snapshots.borrow_and_update().clone());
                return Some((Ok(event), (snapshots, directives, guard, false)));
            }

            loop {
                tokio::select! {
                    changed = snapshots.changed() => match changed {
                        Ok(()) => {
                            let event = snapshot_event(snapshots.borrow_and_update().clone());
                            return Some((Ok(event), (snapshots, directives, guard, false)));
                        }
                        Err(_) => return None,
                    },
                    directive = directives.recv() => match directive {
                        Ok(directive) => {
                            return Some((
                                Ok(directive_event(directive)),
                                (snapshots, directives, guard, false),
                            ));
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("session stream lagged, {skipped} directives dropped");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                }
            }
        },
    )
}
