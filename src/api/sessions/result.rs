use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::core::time::format_timestamp;
use crate::exam::models::ScoredDetail;
use crate::exam::types::SessionPhase;
use crate::schemas::session::{ResultAnswer, ResultResponse, ResultSummary};

pub(crate) async fn get_result(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(session_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let handle = helpers::owned_session(&state, &session_id, &student).await?;
    let session = handle.lock().await;

    if session.phase != SessionPhase::Submitted {
        return Err(ApiError::Conflict("Session has not been submitted yet".to_string()));
    }
    let result = session
        .result
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Result not available".to_string()))?;

    let scored: HashMap<&str, &ScoredDetail> = result
        .details
        .iter()
        .map(|detail| (detail.question_id.as_str(), detail))
        .collect();

    // Whether the student may see correctness and reference answers.
    let disclose = session.test.show_answer_after_submit;

    let mut answers = Vec::with_capacity(session.test.questions.len());
    let mut unanswered = 0usize;
    for question in &session.test.questions {
        let detail = scored.get(question.id.as_str()).copied();
        let option_ids = detail
            .map(|detail| detail.option_ids.clone())
            .unwrap_or_else(|| session.answers.option_ids_for(question));

        if option_ids.is_empty() {
            unanswered += 1;
        }

        answers.push(ResultAnswer {
            question_id: question.id.clone(),
            question: question.content.clone(),
            submitted_answer: question.answer_text_for_ids(&option_ids),
            correct: if disclose { detail.map(|detail| detail.correct) } else { None },
            point: if disclose { detail.map(|detail| detail.point) } else { None },
            correct_answer: disclose.then(|| question.correct_answer_text()),
        });
    }

    let total_questions = session.test.questions.len();
    let correct = result.details.iter().filter(|detail| detail.correct).count();
    let incorrect = total_questions.saturating_sub(correct).saturating_sub(unanswered);

    let summary = ResultSummary {
        total_questions,
        answered: total_questions.saturating_sub(unanswered),
        unanswered,
        correct,
        incorrect,
        score: result.score,
        max_score: session.test.total_score,
    };

    Ok(Json(ResultResponse {
        session_id: session.id.clone(),
        test_id: session.test.id.clone(),
        test_name: session.test.name.clone(),
        submitted_at: session.submitted_at.map(format_timestamp).unwrap_or_default(),
        summary,
        answers,
        notice: (!disclose).then(|| "Answer review is disabled for this test".to_string()),
    }))
}
