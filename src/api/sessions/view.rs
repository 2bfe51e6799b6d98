use axum::extract::{Path, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::schemas::session::SessionResponse;

pub(crate) async fn get_session(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = helpers::owned_session(&state, &session_id, &student).await?;
    let session = handle.lock().await;
    Ok(Json(helpers::session_response(&session, now_utc())))
}
