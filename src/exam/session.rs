use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::exam::models::{ScoredResult, StudentIdentity, TestDefinition, TestQuestion};
use crate::exam::types::{QuestionKind, SessionPhase, SubmitTrigger};

/// Answer storage for one question. Single choice and true/false overwrite;
/// multiple choice toggles set membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AnswerSlot {
    Single(Option<usize>),
    Multiple(BTreeSet<usize>),
}

impl AnswerSlot {
    fn for_kind(kind: QuestionKind) -> Self {
        if kind.is_multi() {
            AnswerSlot::Multiple(BTreeSet::new())
        } else {
            AnswerSlot::Single(None)
        }
    }

    fn select(&mut self, option_index: usize) {
        match self {
            AnswerSlot::Single(slot) => *slot = Some(option_index),
            AnswerSlot::Multiple(set) => {
                if !set.remove(&option_index) {
                    set.insert(option_index);
                }
            }
        }
    }

    pub(crate) fn selected_indices(&self) -> Vec<usize> {
        match self {
            AnswerSlot::Single(None) => Vec::new(),
            AnswerSlot::Single(Some(index)) => vec![*index],
            AnswerSlot::Multiple(set) => set.iter().copied().collect(),
        }
    }

    pub(crate) fn is_answered(&self) -> bool {
        match self {
            AnswerSlot::Single(slot) => slot.is_some(),
            AnswerSlot::Multiple(set) => !set.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum SelectError {
    #[error("session is no longer accepting answers")]
    SessionClosed,
    #[error("question not found")]
    UnknownQuestion,
    #[error("option index {index} out of range for {available} options")]
    OptionOutOfRange { index: usize, available: usize },
}

/// Per-question answer state for a session. Slots are created once from the
/// test definition; selection never adds or removes slots.
#[derive(Debug, Clone)]
pub(crate) struct AnswerSheet {
    slots: BTreeMap<String, AnswerSlot>,
}

impl AnswerSheet {
    pub(crate) fn for_test(test: &TestDefinition) -> Self {
        let slots = test
            .questions
            .iter()
            .map(|question| (question.id.clone(), AnswerSlot::for_kind(question.kind)))
            .collect();
        Self { slots }
    }

    pub(crate) fn select(
        &mut self,
        question: &TestQuestion,
        option_index: usize,
    ) -> Result<(), SelectError> {
        if option_index >= question.options.len() {
            return Err(SelectError::OptionOutOfRange {
                index: option_index,
                available: question.options.len(),
            });
        }

        let slot = self.slots.get_mut(&question.id).ok_or(SelectError::UnknownQuestion)?;
        slot.select(option_index);
        Ok(())
    }

    pub(crate) fn selected(&self, question_id: &str) -> Vec<usize> {
        self.slots.get(question_id).map(AnswerSlot::selected_indices).unwrap_or_default()
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_answered()).count()
    }

    /// Selected option ids joined with commas, in option order. Empty string
    /// when nothing is selected; the scorer relies on that encoding.
    pub(crate) fn option_ids_for(&self, question: &TestQuestion) -> String {
        let ids: Vec<String> = self
            .selected(&question.id)
            .into_iter()
            .filter_map(|index| question.options.get(index).map(|option| option.id.clone()))
            .collect();
        ids.join(",")
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Countdown has nothing left to do for this session.
    Halted,
    Running { remaining_seconds: u32 },
    Expired,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum VisibilityOutcome {
    /// Monitor disabled for this test, or the session is closed.
    Inactive,
    /// Signal processed without a transition into hidden.
    NoTransition,
    /// Transition into hidden was counted.
    Violation { persist: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum SubmitBlocked {
    #[error("submission already in flight")]
    InFlight,
    #[error("session already submitted")]
    AlreadySubmitted,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ViolationTally {
    pub(crate) count: u32,
    last_hidden: bool,
    warning_until: Option<OffsetDateTime>,
}

/// Everything the scorer needs, captured under the session lock at the
/// moment a submission is initiated.
#[derive(Debug, Clone)]
pub(crate) struct SubmissionSnapshot {
    pub(crate) session_id: String,
    pub(crate) student: StudentIdentity,
    pub(crate) test_id: String,
    pub(crate) test_name: String,
    pub(crate) submitted_at: OffsetDateTime,
    pub(crate) leave_screen_count: u32,
    pub(crate) details: Vec<AnswerDetail>,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerDetail {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) option_ids: String,
}

/// One student's run through one test. Methods are synchronous; callers
/// hold the session lock and must not await between a guard check and its
/// state change, which these methods make impossible to get wrong.
#[derive(Debug, Clone)]
pub(crate) struct ExamSession {
    pub(crate) id: String,
    pub(crate) student: StudentIdentity,
    pub(crate) test: TestDefinition,
    pub(crate) phase: SessionPhase,
    pub(crate) remaining_seconds: u32,
    pub(crate) started_at: OffsetDateTime,
    pub(crate) answers: AnswerSheet,
    pub(crate) violations: ViolationTally,
    pub(crate) submitted_at: Option<OffsetDateTime>,
    pub(crate) submit_trigger: Option<SubmitTrigger>,
    pub(crate) last_submit_error: Option<String>,
    pub(crate) result: Option<ScoredResult>,
    expiry_fired: bool,
}

impl ExamSession {
    pub(crate) fn new(
        id: String,
        student: StudentIdentity,
        test: TestDefinition,
        now: OffsetDateTime,
    ) -> Self {
        let answers = AnswerSheet::for_test(&test);
        let remaining_seconds = test.duration_minutes.saturating_mul(60);
        Self {
            id,
            student,
            test,
            phase: SessionPhase::InProgress,
            remaining_seconds,
            started_at: now,
            answers,
            violations: ViolationTally::default(),
            submitted_at: None,
            submit_trigger: None,
            last_submit_error: None,
            result: None,
            expiry_fired: false,
        }
    }

    /// Advances the countdown by one second. Reports `Expired` exactly once;
    /// after that the countdown is done regardless of submission outcome.
    pub(crate) fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::InProgress || self.expiry_fired {
            return TickOutcome::Halted;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.expiry_fired = true;
            TickOutcome::Expired
        } else {
            TickOutcome::Running { remaining_seconds: self.remaining_seconds }
        }
    }

    pub(crate) fn select_answer(
        &mut self,
        question_id: &str,
        option_index: usize,
    ) -> Result<Vec<usize>, SelectError> {
        if self.phase != SessionPhase::InProgress {
            return Err(SelectError::SessionClosed);
        }

        let question = self.test.question(question_id).ok_or(SelectError::UnknownQuestion)?;
        self.answers.select(question, option_index)?;
        Ok(self.answers.selected(question_id))
    }

    /// Processes one visibility signal. Only the transition visible→hidden
    /// counts; holding the tab hidden does not accumulate. A fresh violation
    /// restarts the warning window instead of stacking a second one.
    pub(crate) fn record_visibility(
        &mut self,
        hidden: bool,
        now: OffsetDateTime,
        warning_window: Duration,
    ) -> VisibilityOutcome {
        if self.phase != SessionPhase::InProgress || !self.test.monitor_active() {
            return VisibilityOutcome::Inactive;
        }

        let entered_hidden = hidden && !self.violations.last_hidden;
        self.violations.last_hidden = hidden;

        if !entered_hidden {
            return VisibilityOutcome::NoTransition;
        }

        self.violations.count += 1;
        if self.test.enable_tab_warning {
            self.violations.warning_until = Some(now + warning_window);
        }

        VisibilityOutcome::Violation { persist: self.test.enable_anti_cheat }
    }

    pub(crate) fn warning_active(&self, now: OffsetDateTime) -> bool {
        self.violations.warning_until.is_some_and(|until| now < until)
    }

    /// Claims the right to submit. The phase moves to `Submitting` before
    /// this returns, so only one caller can ever obtain a snapshot at a
    /// time. `submitted_at` freezes on the first initiation and survives
    /// retries, keeping resubmissions recognizable upstream.
    pub(crate) fn begin_submission(
        &mut self,
        trigger: SubmitTrigger,
        now: OffsetDateTime,
    ) -> Result<SubmissionSnapshot, SubmitBlocked> {
        match self.phase {
            SessionPhase::Submitting => Err(SubmitBlocked::InFlight),
            SessionPhase::Submitted => Err(SubmitBlocked::AlreadySubmitted),
            SessionPhase::InProgress => {
                self.phase = SessionPhase::Submitting;
                self.submit_trigger = Some(trigger);
                let submitted_at = *self.submitted_at.get_or_insert(now);
                Ok(self.snapshot(submitted_at))
            }
        }
    }

    pub(crate) fn complete_submission(&mut self, result: ScoredResult) {
        self.phase = SessionPhase::Submitted;
        self.violations.warning_until = None;
        self.last_submit_error = None;
        self.result = Some(result);
    }

    /// Reopens the session after a failed submission so a retry can claim
    /// the guard again. The expiry flag stays set: the timer never fires a
    /// second auto-submit, a retry has to be manual.
    pub(crate) fn fail_submission(&mut self, reason: String) {
        self.phase = SessionPhase::InProgress;
        self.last_submit_error = Some(reason);
    }

    /// True when the sweeper may drop this session from the registry.
    pub(crate) fn evictable(&self, now: OffsetDateTime, retention: Duration) -> bool {
        match self.phase {
            SessionPhase::Submitted => {
                self.submitted_at.map(|at| at + retention < now).unwrap_or(true)
            }
            _ => {
                let deadline = self.started_at
                    + Duration::minutes(i64::from(self.test.duration_minutes))
                    + retention;
                now > deadline
            }
        }
    }

    fn snapshot(&self, submitted_at: OffsetDateTime) -> SubmissionSnapshot {
        let details = self
            .test
            .questions
            .iter()
            .map(|question| AnswerDetail {
                question_id: question.id.clone(),
                question: question.content.clone(),
                option_ids: self.answers.option_ids_for(question),
            })
            .collect();

        SubmissionSnapshot {
            session_id: self.id.clone(),
            student: self.student.clone(),
            test_id: self.test.id.clone(),
            test_name: self.test.name.clone(),
            submitted_at,
            leave_screen_count: self.violations.count,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::{ExamSession, SelectError, SubmitBlocked, TickOutcome, VisibilityOutcome};
    use crate::exam::models::{
        QuestionOption, ScoredResult, StudentIdentity, TestDefinition, TestQuestion,
    };
    use crate::exam::types::{QuestionKind, SessionPhase, SubmitTrigger};

    fn option(id: &str, text: &str, correct: bool) -> QuestionOption {
        QuestionOption { id: id.to_string(), text: text.to_string(), correct }
    }

    fn question(id: &str, kind: QuestionKind, options: usize) -> TestQuestion {
        TestQuestion {
            id: id.to_string(),
            content: format!("Question {id}"),
            kind,
            level: "easy".to_string(),
            options: (0..options)
                .map(|index| option(&format!("opt_{index}"), &format!("Option {index}"), index == 0))
                .collect(),
            free_answer: None,
        }
    }

    fn test_definition() -> TestDefinition {
        TestDefinition {
            id: "test-1".to_string(),
            name: "Midterm".to_string(),
            duration_minutes: 1,
            total_score: 10.0,
            max_retake: 0,
            randomize_questions: false,
            enable_anti_cheat: true,
            enable_tab_warning: true,
            show_answer_after_submit: true,
            open_time: None,
            close_time: None,
            questions: vec![
                question("q1", QuestionKind::SingleChoice, 4),
                question("q2", QuestionKind::MultipleChoice, 4),
                question("q3", QuestionKind::TrueFalse, 2),
            ],
        }
    }

    fn student() -> StudentIdentity {
        StudentIdentity {
            id: "student-1".to_string(),
            name: "Alice Nguyen".to_string(),
            email: "alice@example.com".to_string(),
            student_no: "SV001".to_string(),
        }
    }

    fn session() -> ExamSession {
        ExamSession::new(
            "session-1".to_string(),
            student(),
            test_definition(),
            datetime!(2025-03-01 10:00:00 UTC),
        )
    }

    const NOW: time::OffsetDateTime = datetime!(2025-03-01 10:05:00 UTC);
    const WARNING: Duration = Duration::seconds(3);

    #[test]
    fn new_session_starts_with_empty_slots_and_full_clock() {
        let session = session();
        assert_eq!(session.remaining_seconds, 60);
        assert_eq!(session.phase, SessionPhase::InProgress);
        assert_eq!(session.answers.answered_count(), 0);
        assert!(session.answers.selected("q1").is_empty());
        assert!(session.answers.selected("q2").is_empty());
    }

    #[test]
    fn single_choice_select_overwrites() {
        let mut session = session();
        session.select_answer("q1", 1).expect("select");
        let selected = session.select_answer("q1", 3).expect("select");
        assert_eq!(selected, vec![3]);
        assert_eq!(session.answers.answered_count(), 1);
    }

    #[test]
    fn true_false_select_overwrites() {
        let mut session = session();
        session.select_answer("q3", 0).expect("select");
        let selected = session.select_answer("q3", 1).expect("select");
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn multiple_choice_select_toggles() {
        let mut session = session();
        session.select_answer("q2", 0).expect("select");
        session.select_answer("q2", 2).expect("select");
        let selected = session.select_answer("q2", 0).expect("select");
        assert_eq!(selected, vec![2]);
    }

    #[test]
    fn toggling_twice_restores_previous_state() {
        let mut session = session();
        session.select_answer("q2", 1).expect("select");
        let before = session.answers.selected("q2");
        session.select_answer("q2", 3).expect("select");
        session.select_answer("q2", 3).expect("select");
        assert_eq!(session.answers.selected("q2"), before);
    }

    #[test]
    fn select_rejects_out_of_range_option() {
        let mut session = session();
        let err = session.select_answer("q1", 4).expect_err("out of range");
        assert_eq!(err, SelectError::OptionOutOfRange { index: 4, available: 4 });
    }

    #[test]
    fn select_rejects_unknown_question() {
        let mut session = session();
        let err = session.select_answer("nope", 0).expect_err("unknown");
        assert_eq!(err, SelectError::UnknownQuestion);
    }

    #[test]
    fn select_rejects_closed_session() {
        let mut session = session();
        session.begin_submission(SubmitTrigger::Manual, NOW).expect("begin");
        let err = session.select_answer("q1", 0).expect_err("closed");
        assert_eq!(err, SelectError::SessionClosed);
    }

    #[test]
    fn countdown_expires_exactly_once() {
        let mut session = session();
        for expected in (1..60).rev() {
            assert_eq!(session.tick(), TickOutcome::Running { remaining_seconds: expected });
        }
        assert_eq!(session.tick(), TickOutcome::Expired);
        assert_eq!(session.tick(), TickOutcome::Halted);
        assert_eq!(session.remaining_seconds, 0);
    }

    #[test]
    fn zero_duration_expires_on_first_tick() {
        let mut test = test_definition();
        test.duration_minutes = 0;
        let mut session = ExamSession::new("s".to_string(), student(), test, NOW);
        assert_eq!(session.tick(), TickOutcome::Expired);
        assert_eq!(session.tick(), TickOutcome::Halted);
    }

    #[test]
    fn countdown_halts_once_submission_starts() {
        let mut session = session();
        session.begin_submission(SubmitTrigger::Manual, NOW).expect("begin");
        assert_eq!(session.tick(), TickOutcome::Halted);
    }

    #[test]
    fn begin_submission_guards_reentry() {
        let mut session = session();
        session.begin_submission(SubmitTrigger::TimerExpiry, NOW).expect("begin");
        assert!(matches!(
            session.begin_submission(SubmitTrigger::Manual, NOW),
            Err(SubmitBlocked::InFlight)
        ));

        session.complete_submission(ScoredResult { score: 0.0, details: Vec::new() });
        assert!(matches!(
            session.begin_submission(SubmitTrigger::Manual, NOW),
            Err(SubmitBlocked::AlreadySubmitted)
        ));
    }

    #[test]
    fn failed_submission_reopens_and_freezes_timestamp() {
        let mut session = session();
        let first = session.begin_submission(SubmitTrigger::Manual, NOW).expect("begin");
        session.fail_submission("upstream returned status 502".to_string());

        assert_eq!(session.phase, SessionPhase::InProgress);
        assert_eq!(session.last_submit_error.as_deref(), Some("upstream returned status 502"));

        let later = NOW + Duration::seconds(30);
        let retry = session.begin_submission(SubmitTrigger::Manual, later).expect("retry");
        assert_eq!(retry.submitted_at, first.submitted_at);

        session.complete_submission(ScoredResult { score: 1.0, details: Vec::new() });
        assert!(session.last_submit_error.is_none());
        assert_eq!(session.submitted_at, Some(first.submitted_at));
    }

    #[test]
    fn expiry_does_not_rearm_after_failed_auto_submit() {
        let mut test = test_definition();
        test.duration_minutes = 0;
        let mut session = ExamSession::new("s".to_string(), student(), test, NOW);

        assert_eq!(session.tick(), TickOutcome::Expired);
        session.begin_submission(SubmitTrigger::TimerExpiry, NOW).expect("begin");
        session.fail_submission("timeout".to_string());

        assert_eq!(session.tick(), TickOutcome::Halted);
    }

    #[test]
    fn snapshot_keeps_session_order_and_joins_option_ids() {
        let mut session = session();
        session.select_answer("q2", 2).expect("select");
        session.select_answer("q2", 0).expect("select");
        session.select_answer("q3", 1).expect("select");

        let snapshot = session.begin_submission(SubmitTrigger::Manual, NOW).expect("begin");
        let ids: Vec<&str> = snapshot.details.iter().map(|d| d.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);

        assert_eq!(snapshot.details[0].option_ids, "");
        assert_eq!(snapshot.details[1].option_ids, "opt_0,opt_2");
        assert_eq!(snapshot.details[2].option_ids, "opt_1");
        assert_eq!(snapshot.test_name, "Midterm");
        assert_eq!(snapshot.leave_screen_count, 0);
    }

    #[test]
    fn each_transition_into_hidden_counts() {
        let mut session = session();
        for _ in 0..3 {
            let outcome = session.record_visibility(true, NOW, WARNING);
            assert_eq!(outcome, VisibilityOutcome::Violation { persist: true });
            session.record_visibility(false, NOW, WARNING);
        }
        assert_eq!(session.violations.count, 3);
    }

    #[test]
    fn holding_hidden_does_not_stack() {
        let mut session = session();
        session.record_visibility(true, NOW, WARNING);
        let repeat = session.record_visibility(true, NOW + Duration::seconds(1), WARNING);
        assert_eq!(repeat, VisibilityOutcome::NoTransition);
        assert_eq!(session.violations.count, 1);
    }

    #[test]
    fn warning_window_restarts_instead_of_stacking() {
        let mut session = session();
        session.record_visibility(true, NOW, WARNING);
        session.record_visibility(false, NOW + Duration::seconds(1), WARNING);

        let second = NOW + Duration::seconds(2);
        session.record_visibility(true, second, WARNING);

        assert!(session.warning_active(second + Duration::seconds(2)));
        assert!(!session.warning_active(second + Duration::seconds(4)));
    }

    #[test]
    fn monitor_inactive_when_features_disabled() {
        let mut test = test_definition();
        test.enable_anti_cheat = false;
        test.enable_tab_warning = false;
        let mut session = ExamSession::new("s".to_string(), student(), test, NOW);

        assert_eq!(session.record_visibility(true, NOW, WARNING), VisibilityOutcome::Inactive);
        assert_eq!(session.violations.count, 0);
    }

    #[test]
    fn tab_warning_alone_counts_without_persisting() {
        let mut test = test_definition();
        test.enable_anti_cheat = false;
        let mut session = ExamSession::new("s".to_string(), student(), test, NOW);

        let outcome = session.record_visibility(true, NOW, WARNING);
        assert_eq!(outcome, VisibilityOutcome::Violation { persist: false });
        assert!(session.warning_active(NOW + Duration::seconds(1)));
    }

    #[test]
    fn anti_cheat_alone_persists_without_warning() {
        let mut test = test_definition();
        test.enable_tab_warning = false;
        let mut session = ExamSession::new("s".to_string(), student(), test, NOW);

        let outcome = session.record_visibility(true, NOW, WARNING);
        assert_eq!(outcome, VisibilityOutcome::Violation { persist: true });
        assert!(!session.warning_active(NOW + Duration::seconds(1)));
    }

    #[test]
    fn visibility_ignored_after_submission() {
        let mut session = session();
        session.begin_submission(SubmitTrigger::Manual, NOW).expect("begin");
        session.complete_submission(ScoredResult { score: 0.0, details: Vec::new() });

        assert_eq!(session.record_visibility(true, NOW, WARNING), VisibilityOutcome::Inactive);
        assert_eq!(session.violations.count, 0);
    }

    #[test]
    fn eviction_waits_for_retention() {
        let retention = Duration::minutes(60);
        let mut session = session();

        assert!(!session.evictable(NOW, retention));

        session.begin_submission(SubmitTrigger::Manual, NOW).expect("begin");
        session.complete_submission(ScoredResult { score: 0.0, details: Vec::new() });
        assert!(!session.evictable(NOW + Duration::minutes(59), retention));
        assert!(session.evictable(NOW + Duration::minutes(61), retention));
    }

    #[test]
    fn abandoned_session_evicts_after_deadline_plus_retention() {
        let retention = Duration::minutes(60);
        let session = session();
        let started = session.started_at;

        assert!(!session.evictable(started + Duration::minutes(60), retention));
        assert!(session.evictable(started + Duration::minutes(62), retention));
    }
}
