use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::exam::session::TickOutcome;
use crate::exam::types::SubmitTrigger;
use crate::services::submission;

/// Starts the 1 Hz countdown task for a session. The task owns expiry: when
/// the clock hits zero it fires the auto-submit exactly once and exits.
pub(crate) fn spawn_countdown(state: AppState, session_id: String) {
    tokio::spawn(run_countdown(state, session_id));
}

async fn run_countdown(state: AppState, session_id: String) {
    let mut ticker = interval(Duration::from_secs(1));
    // Late ticks shift the schedule instead of bursting; the clock counts
    // ticks, not wall time.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and is not a second of exam time.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(handle) = state.registry().find(&session_id).await else {
            break;
        };
        let outcome = { handle.lock().await.tick() };

        match outcome {
            TickOutcome::Running { .. } => {}
            TickOutcome::Halted => break,
            TickOutcome::Expired => {
                tracing::info!(session_id = %session_id, "Exam time expired; auto-submitting");
                if let Err(err) =
                    submission::submit_session(&state, &session_id, SubmitTrigger::TimerExpiry)
                        .await
                {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %err,
                        "Auto-submit failed; session stays open for a manual retry"
                    );
                }
                break;
            }
        }
    }
}
