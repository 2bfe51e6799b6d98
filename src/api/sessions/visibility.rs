use axum::extract::{Path, State};
use axum::Json;
use time::Duration;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::exam::models::ViolationEvent;
use crate::exam::session::VisibilityOutcome;
use crate::schemas::session::{VisibilityRequest, VisibilityResponse};

pub(crate) async fn report_visibility(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(session_id): Path<String>,
    Json(payload): Json<VisibilityRequest>,
) -> Result<Json<VisibilityResponse>, ApiError> {
    let handle = helpers::owned_session(&state, &session_id, &student).await?;

    let now = now_utc();
    let window = Duration::seconds(state.settings().exam().tab_warning_seconds as i64);

    let (response, event) = {
        let mut session = handle.lock().await;
        let outcome = session.record_visibility(payload.hidden, now, window);

        let event = match outcome {
            VisibilityOutcome::Violation { persist: true } => Some(ViolationEvent {
                test_id: session.test.id.clone(),
                test_name: session.test.name.clone(),
                student_id: session.student.id.clone(),
                student_name: session.student.name.clone(),
                at: now,
            }),
            _ => None,
        };

        let response = VisibilityResponse {
            counted: matches!(outcome, VisibilityOutcome::Violation { .. }),
            violation_count: session.violations.count,
            warning_active: session.warning_active(now),
        };

        (response, event)
    };

    if let Some(event) = event {
        // Fire and forget; the exam flow never waits on the violation store.
        let sink = state.violations();
        tokio::spawn(async move { sink.record(event).await });
    }

    Ok(Json(response))
}
