use axum::extract::{Path, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::core::time::format_timestamp;
use crate::exam::types::SubmitTrigger;
use crate::schemas::session::SubmitResponse;
use crate::services::submission::{self, SubmitError};

pub(crate) async fn submit_session(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(session_id): Path<String>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let handle = helpers::owned_session(&state, &session_id, &student).await?;

    // A submit that lost the race to the timer (or to itself) is not an
    // error; the response simply reports the session as it stands.
    match submission::submit_session(&state, &session_id, SubmitTrigger::Manual).await {
        Ok(_) => {}
        Err(SubmitError::NotFound) => {
            return Err(ApiError::NotFound("Session not found".to_string()));
        }
        Err(SubmitError::Upstream(_)) => {
            return Err(ApiError::ServiceUnavailable(
                "Failed to submit exam, please try again".to_string(),
            ));
        }
    }

    let session = handle.lock().await;
    Ok(Json(SubmitResponse {
        id: session.id.clone(),
        phase: session.phase,
        trigger: session.submit_trigger,
        submitted_at: session.submitted_at.map(format_timestamp),
    }))
}
