use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};

use crate::exam::session::ExamSession;
use crate::exam::types::SessionPhase;

pub(crate) type SessionHandle = Arc<Mutex<ExamSession>>;

/// In-memory session registry. The map lock is only ever taken for lookups
/// and inserts; per-session work happens under the session's own mutex,
/// acquired after the map lock is released.
#[derive(Clone, Default)]
pub(crate) struct SessionStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionHandle>,
    // Finished attempts per (test, student); survives session eviction so
    // retake limits keep holding.
    attempts: HashMap<(String, String), u32>,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, session: ExamSession) -> SessionHandle {
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        self.inner.write().await.sessions.insert(id, handle.clone());
        handle
    }

    pub(crate) async fn find(&self, session_id: &str) -> Option<SessionHandle> {
        self.inner.read().await.sessions.get(session_id).cloned()
    }

    /// An open session for this (test, student) pair, if one exists. The
    /// handles are snapshotted before any session lock is awaited, so a
    /// session mid-tick is waited out rather than missed.
    pub(crate) async fn find_in_progress(
        &self,
        test_id: &str,
        student_id: &str,
    ) -> Option<SessionHandle> {
        let handles: Vec<SessionHandle> =
            self.inner.read().await.sessions.values().cloned().collect();

        for handle in handles {
            let session = handle.lock().await;
            if session.test.id == test_id
                && session.student.id == student_id
                && session.phase == SessionPhase::InProgress
            {
                drop(session);
                return Some(handle);
            }
        }
        None
    }

    /// Number of sessions that still hold capacity. Sessions whose lock is
    /// busy are counted as open.
    pub(crate) async fn open_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner
            .sessions
            .values()
            .filter(|handle| match handle.try_lock() {
                Ok(session) => session.phase != SessionPhase::Submitted,
                Err(_) => true,
            })
            .count()
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub(crate) async fn record_attempt(&self, test_id: &str, student_id: &str) {
        let mut inner = self.inner.write().await;
        *inner.attempts.entry((test_id.to_string(), student_id.to_string())).or_insert(0) += 1;
    }

    pub(crate) async fn attempts(&self, test_id: &str, student_id: &str) -> u32 {
        self.inner
            .read()
            .await
            .attempts
            .get(&(test_id.to_string(), student_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Drops evictable sessions. Sessions whose mutex is held stay for the
    /// next sweep. Returns how many were removed.
    pub(crate) async fn sweep(&self, now: OffsetDateTime, retention: Duration) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.evictable(now, retention),
            Err(_) => true,
        });
        before - inner.sessions.len()
    }
}
