use std::collections::VecDeque;
use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use time::OffsetDateTime;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::core::time::{format_timestamp, now_utc};
use crate::exam::session::ExamSession;
use crate::exam::types::{SessionPhase, SubmitTrigger};
use crate::schemas::events::SessionEvent;

/// Polls the session once per second and streams what it finds: a
/// `timer-tick` while the session is open, a `tab-warning` after the tick
/// while the warning is raised, then a single `session-submitted` or
/// `time-expired` event and the stream ends. The stream also ends if the
/// session is evicted from the registry.
pub(crate) async fn session_events(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    helpers::owned_session(&state, &session_id, &student).await?;

    let queue = VecDeque::new();
    let stream = stream::unfold(
        (state, session_id, queue, false),
        |(state, session_id, mut queue, mut done)| async move {
            if queue.is_empty() {
                if done {
                    return None;
                }

                tokio::time::sleep(std::time::Duration::from_secs(1)).await;

                let handle = state.registry().find(&session_id).await?;
                let (events, finished) = {
                    let session = handle.lock().await;
                    poll_events(&session, now_utc())
                };
                queue.extend(events);
                done = finished;
            }

            let event = queue.pop_front()?;
            let sse_event = Event::default().event(event.event_name()).data(event.to_sse_data());
            Some((Ok(sse_event), (state, session_id, queue, done)))
        },
    );

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Events for one poll of the session, plus whether the stream is finished
/// once they are delivered.
fn poll_events(session: &ExamSession, now: OffsetDateTime) -> (Vec<SessionEvent>, bool) {
    if session.phase == SessionPhase::Submitted {
        let submitted_at = session.submitted_at.map(format_timestamp).unwrap_or_default();
        let score_available = session.result.is_some();
        let terminal = match session.submit_trigger {
            Some(SubmitTrigger::TimerExpiry) => {
                SessionEvent::TimeExpired { submitted_at, score_available }
            }
            _ => SessionEvent::SessionSubmitted { submitted_at, score_available },
        };
        return (vec![terminal], true);
    }

    let warning_active = session.warning_active(now);
    let mut events = vec![SessionEvent::TimerTick {
        remaining_seconds: session.remaining_seconds,
        phase: session.phase,
        violation_count: session.violations.count,
        warning_active,
    }];
    if warning_active {
        events.push(SessionEvent::TabWarning { violation_count: session.violations.count });
    }
    (events, false)
}
