use thiserror::Error;

use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::exam::session::SubmitBlocked;
use crate::exam::types::SubmitTrigger;
use crate::schemas::upstream::SubmissionPayload;
use crate::services::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitOutcome {
    Submitted,
    /// Another submission currently holds the guard.
    InFlight,
    AlreadySubmitted,
}

#[derive(Debug, Error)]
pub(crate) enum SubmitError {
    #[error("session not found")]
    NotFound,
    #[error(transparent)]
    Upstream(UpstreamError),
}

/// Runs one submission attempt end to end. The guard is claimed and the
/// payload snapshotted under the session lock; the scoring call happens
/// with the lock released. Both the manual endpoint and the countdown task
/// funnel through here, which is what makes double submission impossible.
pub(crate) async fn submit_session(
    state: &AppState,
    session_id: &str,
    trigger: SubmitTrigger,
) -> Result<SubmitOutcome, SubmitError> {
    let Some(handle) = state.registry().find(session_id).await else {
        return Err(SubmitError::NotFound);
    };

    let snapshot = {
        let mut session = handle.lock().await;
        match session.begin_submission(trigger, now_utc()) {
            Ok(snapshot) => snapshot,
            Err(SubmitBlocked::InFlight) => return Ok(SubmitOutcome::InFlight),
            Err(SubmitBlocked::AlreadySubmitted) => return Ok(SubmitOutcome::AlreadySubmitted),
        }
    };

    let payload = SubmissionPayload::from_snapshot(&snapshot);
    let scored = state.scoring().submit(&payload).await;

    let mut session = handle.lock().await;
    match scored {
        Ok(dto) => {
            session.complete_submission(dto.into_result());
            drop(session);

            state.registry().record_attempt(&snapshot.test_id, &snapshot.student.id).await;

            let trigger_label = match trigger {
                SubmitTrigger::Manual => "manual",
                SubmitTrigger::TimerExpiry => "timer",
            };
            metrics::counter!("examhall_sessions_submitted_total", "trigger" => trigger_label)
                .increment(1);
            tracing::info!(
                session_id = %snapshot.session_id,
                test_id = %snapshot.test_id,
                student_id = %snapshot.student.id,
                trigger = trigger_label,
                "Exam session submitted"
            );

            Ok(SubmitOutcome::Submitted)
        }
        Err(err) => {
            session.fail_submission(err.to_string());
            drop(session);

            metrics::counter!("examhall_scoring_failures_total").increment(1);
            tracing::warn!(
                session_id = %snapshot.session_id,
                error = %err,
                "Scoring call failed; session reopened for retry"
            );

            Err(SubmitError::Upstream(err))
        }
    }
}
