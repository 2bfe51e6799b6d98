use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::exam::session::ExamSession;
use crate::schemas::session::{SessionResponse, StartSessionRequest};
use crate::services::{countdown, loader, UpstreamError};

pub(crate) async fn start_session(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Json(payload): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    // Reconnecting to an open session must not burn an attempt or reshuffle
    // the questions, so the existing session wins over starting fresh.
    if let Some(handle) = state.registry().find_in_progress(&payload.test_id, &student.id).await {
        let session = handle.lock().await;
        return Ok((StatusCode::OK, Json(helpers::session_response(&session, now_utc()))));
    }

    let open = state.registry().open_count().await;
    if open as u64 >= state.settings().exam().max_concurrent_sessions {
        return Err(ApiError::ServiceUnavailable(
            "Exam hall is at capacity, try again shortly".to_string(),
        ));
    }

    let dto = match state.testbank().fetch_test(&payload.test_id).await {
        Ok(dto) => dto,
        Err(UpstreamError::TestNotFound(_)) => {
            return Err(ApiError::NotFound("Test not found".to_string()));
        }
        Err(err) => return Err(ApiError::internal(err, "Failed to load test definition")),
    };

    let test = loader::prepare_session_test(dto);
    let now = now_utc();

    if let Some(open_time) = test.open_time {
        if now < open_time {
            return Err(ApiError::BadRequest("Test has not started yet".to_string()));
        }
    }
    if let Some(close_time) = test.close_time {
        if now > close_time {
            return Err(ApiError::BadRequest("Test has ended".to_string()));
        }
    }

    // max_retake of zero means unlimited.
    if test.max_retake > 0 {
        let attempts = state.registry().attempts(&test.id, &student.id).await;
        if attempts >= test.max_retake {
            return Err(ApiError::Forbidden("Maximum attempts reached"));
        }
    }

    let session = ExamSession::new(Uuid::new_v4().to_string(), student, test, now);
    let session_id = session.id.clone();
    let response = helpers::session_response(&session, now);

    state.registry().insert(session).await;
    countdown::spawn_countdown(state.clone(), session_id.clone());

    metrics::counter!("examhall_sessions_started_total").increment(1);
    tracing::info!(
        session_id = %session_id,
        test_id = %response.test_id,
        remaining_seconds = response.remaining_seconds,
        "Exam session started"
    );

    Ok((StatusCode::CREATED, Json(response)))
}
