use time::Duration;
use tokio::sync::watch;
use tokio::time::interval;

use crate::core::state::AppState;
use crate::core::time::now_utc;

/// Drops submitted sessions once their retention window has passed, so the
/// registry does not grow for the lifetime of the process.
pub(crate) async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let exam = state.settings().exam();
    let retention = Duration::minutes(exam.session_retention_minutes as i64);
    let mut tick = interval(std::time::Duration::from_secs(exam.sweep_interval_seconds.max(1)));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let removed = state.registry().sweep(now_utc(), retention).await;
                let open = state.registry().open_count().await;
                metrics::gauge!("examhall_sessions_open").set(open as f64);
                if removed > 0 {
                    let remaining = state.registry().len().await;
                    tracing::info!(removed, remaining, "Evicted expired exam sessions");
                }
            }
        }
    }

    tracing::debug!("Session sweeper stopped");
}
