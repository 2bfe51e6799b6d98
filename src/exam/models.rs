use time::OffsetDateTime;

use crate::exam::types::QuestionKind;

/// Shown in place of an answer when the student left a question blank.
pub(crate) const NOT_ANSWERED: &str = "not answered";

/// A test definition after normalization: option ids are guaranteed present
/// and question kinds are resolved. Everything downstream relies on that.
#[derive(Debug, Clone)]
pub(crate) struct TestDefinition {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) duration_minutes: u32,
    pub(crate) total_score: f64,
    pub(crate) max_retake: u32,
    pub(crate) randomize_questions: bool,
    pub(crate) enable_anti_cheat: bool,
    pub(crate) enable_tab_warning: bool,
    pub(crate) show_answer_after_submit: bool,
    pub(crate) open_time: Option<OffsetDateTime>,
    pub(crate) close_time: Option<OffsetDateTime>,
    pub(crate) questions: Vec<TestQuestion>,
}

impl TestDefinition {
    pub(crate) fn question(&self, question_id: &str) -> Option<&TestQuestion> {
        self.questions.iter().find(|question| question.id == question_id)
    }

    /// The visibility monitor runs when either anti-cheat feature is on.
    pub(crate) fn monitor_active(&self) -> bool {
        self.enable_anti_cheat || self.enable_tab_warning
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TestQuestion {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) kind: QuestionKind,
    pub(crate) level: String,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) free_answer: Option<String>,
}

impl TestQuestion {
    /// Renders the selection stored as a comma-joined option id list, e.g.
    /// "A. Paris, C. Lyon". Unknown ids are skipped; an empty selection
    /// renders as [`NOT_ANSWERED`].
    pub(crate) fn answer_text_for_ids(&self, option_ids: &str) -> String {
        let mut parts = Vec::new();
        for id in option_ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            if let Some((index, option)) =
                self.options.iter().enumerate().find(|(_, option)| option.id == id)
            {
                parts.push(format!("{}. {}", option_letter(index), option.text));
            }
        }

        if parts.is_empty() {
            NOT_ANSWERED.to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Reference answer shown after submission when the test allows it.
    /// Falls back to the free-form answer for questions without options.
    pub(crate) fn correct_answer_text(&self) -> String {
        let parts: Vec<String> = self
            .options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.correct)
            .map(|(index, option)| format!("{}. {}", option_letter(index), option.text))
            .collect();

        if parts.is_empty() {
            self.free_answer.clone().unwrap_or_default()
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) correct: bool,
}

/// Authenticated student taking the exam, resolved from token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StudentIdentity {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) student_no: String,
}

/// One transition into a hidden tab, ready for the violation store.
#[derive(Debug, Clone)]
pub(crate) struct ViolationEvent {
    pub(crate) test_id: String,
    pub(crate) test_name: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) at: OffsetDateTime,
}

/// Grading outcome returned by the scoring backend.
#[derive(Debug, Clone)]
pub(crate) struct ScoredResult {
    pub(crate) score: f64,
    pub(crate) details: Vec<ScoredDetail>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScoredDetail {
    pub(crate) question_id: String,
    pub(crate) option_ids: String,
    pub(crate) correct: bool,
    pub(crate) point: f64,
}

fn option_letter(index: usize) -> char {
    char::from(b'A' + (index % 26) as u8)
}
