use axum::extract::{Path, State};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::exam::session::SelectError;
use crate::schemas::session::{AnswerStateResponse, SelectAnswerRequest};

pub(crate) async fn select_answer(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(session_id): Path<String>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<Json<AnswerStateResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let handle = helpers::owned_session(&state, &session_id, &student).await?;
    let mut session = handle.lock().await;

    match session.select_answer(&payload.question_id, payload.option_index) {
        Ok(selected) => Ok(Json(AnswerStateResponse {
            question_id: payload.question_id,
            selected,
            answered_count: session.answers.answered_count(),
            total_questions: session.test.questions.len(),
        })),
        Err(SelectError::SessionClosed) => {
            Err(ApiError::Conflict("Session is no longer accepting answers".to_string()))
        }
        Err(SelectError::UnknownQuestion) => {
            Err(ApiError::NotFound("Question not found".to_string()))
        }
        Err(err @ SelectError::OptionOutOfRange { .. }) => {
            Err(ApiError::BadRequest(err.to_string()))
        }
    }
}
