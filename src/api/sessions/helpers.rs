use time::OffsetDateTime;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::format_timestamp;
use crate::exam::models::StudentIdentity;
use crate::exam::session::ExamSession;
use crate::registry::SessionHandle;
use crate::schemas::session::{OptionView, QuestionView, SessionResponse};

/// Looks up a session and enforces ownership. A foreign session id answers
/// 404, indistinguishable from an id that never existed.
pub(super) async fn owned_session(
    state: &AppState,
    session_id: &str,
    student: &StudentIdentity,
) -> Result<SessionHandle, ApiError> {
    let handle = state
        .registry()
        .find(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    {
        let session = handle.lock().await;
        if session.student.id != student.id {
            return Err(ApiError::NotFound("Session not found".to_string()));
        }
    }

    Ok(handle)
}

pub(super) fn session_response(session: &ExamSession, now: OffsetDateTime) -> SessionResponse {
    let questions = session
        .test
        .questions
        .iter()
        .map(|question| QuestionView {
            id: question.id.clone(),
            content: question.content.clone(),
            kind: question.kind,
            level: question.level.clone(),
            options: question
                .options
                .iter()
                .map(|option| OptionView { id: option.id.clone(), text: option.text.clone() })
                .collect(),
            selected: session.answers.selected(&question.id),
        })
        .collect();

    SessionResponse {
        id: session.id.clone(),
        test_id: session.test.id.clone(),
        test_name: session.test.name.clone(),
        phase: session.phase,
        remaining_seconds: session.remaining_seconds,
        duration_minutes: session.test.duration_minutes,
        total_score: session.test.total_score,
        started_at: format_timestamp(session.started_at),
        answered_count: session.answers.answered_count(),
        violation_count: session.violations.count,
        warning_active: session.warning_active(now),
        show_answer_after_submit: session.test.show_answer_after_submit,
        questions,
    }
}
