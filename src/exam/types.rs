use serde::{Deserialize, Serialize};

/// How a question accepts answers. True/false questions behave exactly like
/// single choice; they only render differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
}

impl QuestionKind {
    pub(crate) fn is_multi(self) -> bool {
        matches!(self, QuestionKind::MultipleChoice)
    }
}

/// Lifecycle of an exam session. `Submitting` exists so that the guard
/// against double submission can be observed, not just inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SessionPhase {
    InProgress,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SubmitTrigger {
    Manual,
    TimerExpiry,
}
