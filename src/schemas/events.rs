use serde::Serialize;

use crate::exam::types::SessionPhase;

/// Events pushed over the session SSE stream: one tick per second while the
/// session is open, a `tab-warning` riding along while the warning is
/// raised, and a single terminal event once the session is submitted.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum SessionEvent {
    TimerTick {
        remaining_seconds: u32,
        phase: SessionPhase,
        violation_count: u32,
        warning_active: bool,
    },
    TabWarning {
        violation_count: u32,
    },
    SessionSubmitted {
        submitted_at: String,
        score_available: bool,
    },
    TimeExpired {
        submitted_at: String,
        score_available: bool,
    },
}

impl SessionEvent {
    pub(crate) fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::TimerTick { .. } => "timer-tick",
            SessionEvent::TabWarning { .. } => "tab-warning",
            SessionEvent::SessionSubmitted { .. } => "session-submitted",
            SessionEvent::TimeExpired { .. } => "time-expired",
        }
    }

    pub(crate) fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
