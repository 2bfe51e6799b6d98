use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::exam::types::{QuestionKind, SessionPhase, SubmitTrigger};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StartSessionRequest {
    #[validate(length(min = 1, message = "test_id must not be empty"))]
    pub(crate) test_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SelectAnswerRequest {
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    pub(crate) option_index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisibilityRequest {
    pub(crate) hidden: bool,
}

/// Full session view. Options never carry correctness; reference answers
/// appear only in the result view and only when the test allows it.
#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) test_name: String,
    pub(crate) phase: SessionPhase,
    pub(crate) remaining_seconds: u32,
    pub(crate) duration_minutes: u32,
    pub(crate) total_score: f64,
    pub(crate) started_at: String,
    pub(crate) answered_count: usize,
    pub(crate) violation_count: u32,
    pub(crate) warning_active: bool,
    pub(crate) show_answer_after_submit: bool,
    pub(crate) questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) kind: QuestionKind,
    pub(crate) level: String,
    pub(crate) options: Vec<OptionView>,
    pub(crate) selected: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionView {
    pub(crate) id: String,
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerStateResponse {
    pub(crate) question_id: String,
    pub(crate) selected: Vec<usize>,
    pub(crate) answered_count: usize,
    pub(crate) total_questions: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct VisibilityResponse {
    pub(crate) counted: bool,
    pub(crate) violation_count: u32,
    pub(crate) warning_active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) id: String,
    pub(crate) phase: SessionPhase,
    pub(crate) trigger: Option<SubmitTrigger>,
    pub(crate) submitted_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) session_id: String,
    pub(crate) test_id: String,
    pub(crate) test_name: String,
    pub(crate) submitted_at: String,
    pub(crate) summary: ResultSummary,
    pub(crate) answers: Vec<ResultAnswer>,
    /// Set when the test withholds correct answers after submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) notice: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultSummary {
    pub(crate) total_questions: usize,
    pub(crate) answered: usize,
    pub(crate) unanswered: usize,
    pub(crate) correct: usize,
    pub(crate) incorrect: usize,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultAnswer {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) submitted_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<String>,
}
