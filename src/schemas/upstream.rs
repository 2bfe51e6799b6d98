use serde::{Deserialize, Serialize};

use crate::core::time::format_timestamp;
use crate::exam::models::{ScoredDetail, ScoredResult};
use crate::exam::session::SubmissionSnapshot;

/// Test definition as served by the exam bank. The legacy wire format uses
/// camelCase and tolerates missing option ids and question types; the
/// loader normalizes all of that before anything else sees it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestDto {
    pub(crate) id: String,
    pub(crate) name: String,
    /// Minutes.
    pub(crate) duration: u32,
    #[serde(default)]
    pub(crate) score: f64,
    #[serde(default)]
    pub(crate) max_retake: u32,
    #[serde(default)]
    pub(crate) randomize_questions: bool,
    #[serde(default)]
    pub(crate) enable_anti_cheat: bool,
    #[serde(default)]
    pub(crate) enable_tab_warning: bool,
    #[serde(default)]
    pub(crate) show_answer_after_submit: bool,
    #[serde(default)]
    pub(crate) open_time: Option<String>,
    #[serde(default)]
    pub(crate) close_time: Option<String>,
    #[serde(default)]
    pub(crate) questions: Vec<QuestionDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionDto {
    pub(crate) id: String,
    pub(crate) content: String,
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) level: Option<String>,
    #[serde(default)]
    pub(crate) options: Vec<OptionDto>,
    #[serde(default)]
    pub(crate) answer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OptionDto {
    #[serde(default)]
    pub(crate) id: Option<String>,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) is_correct: bool,
}

/// Body of the submit-and-score call, mirroring what the grader expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionPayload {
    pub(crate) user_id: String,
    pub(crate) user_name: String,
    pub(crate) user_email: String,
    pub(crate) user_student_id: String,
    pub(crate) test_id: String,
    pub(crate) test_name: String,
    pub(crate) submitted_at: String,
    pub(crate) status: String,
    pub(crate) leave_screen_count: u32,
    pub(crate) details: Vec<SubmissionDetailDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionDetailDto {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) option_ids: String,
}

impl SubmissionPayload {
    pub(crate) fn from_snapshot(snapshot: &SubmissionSnapshot) -> Self {
        Self {
            user_id: snapshot.student.id.clone(),
            user_name: snapshot.student.name.clone(),
            user_email: snapshot.student.email.clone(),
            user_student_id: snapshot.student.student_no.clone(),
            test_id: snapshot.test_id.clone(),
            test_name: snapshot.test_name.clone(),
            submitted_at: format_timestamp(snapshot.submitted_at),
            status: "submitted".to_string(),
            leave_screen_count: snapshot.leave_screen_count,
            details: snapshot
                .details
                .iter()
                .map(|detail| SubmissionDetailDto {
                    question_id: detail.question_id.clone(),
                    question: detail.question.clone(),
                    option_ids: detail.option_ids.clone(),
                })
                .collect(),
        }
    }
}

/// Grading response from submit-and-score.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScoredResultDto {
    #[serde(default)]
    pub(crate) score: f64,
    #[serde(default)]
    pub(crate) details: Vec<ScoredDetailDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScoredDetailDto {
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) option_ids: String,
    #[serde(default)]
    pub(crate) correct: bool,
    #[serde(default)]
    pub(crate) point: f64,
}

impl ScoredResultDto {
    pub(crate) fn into_result(self) -> ScoredResult {
        ScoredResult {
            score: self.score,
            details: self
                .details
                .into_iter()
                .map(|detail| ScoredDetail {
                    question_id: detail.question_id,
                    option_ids: detail.option_ids,
                    correct: detail.correct,
                    point: detail.point,
                })
                .collect(),
        }
    }
}

/// Value stored under `{prefix}/{testId}/{userId}`. Names are denormalized
/// on purpose so proctoring dashboards can read records standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViolationRecordDto {
    pub(crate) user_id: String,
    pub(crate) user_name: String,
    pub(crate) exam_id: String,
    pub(crate) exam_name: String,
    /// Unix epoch milliseconds of the latest violation.
    pub(crate) timestamp: i64,
    pub(crate) count: u32,
}
