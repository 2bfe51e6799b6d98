use std::sync::Arc;

use crate::core::config::Settings;
use crate::core::redis::RedisHandle;
use crate::registry::SessionStore;
use crate::services::scoring::ScoringBackend;
use crate::services::testbank::TestSource;
use crate::services::violations::ViolationSink;

/// Shared application state. Cheap to clone; handlers receive it through
/// the axum `State` extractor.
#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    redis: RedisHandle,
    registry: SessionStore,
    testbank: Arc<dyn TestSource>,
    scoring: Arc<dyn ScoringBackend>,
    violations: Arc<dyn ViolationSink>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        redis: RedisHandle,
        registry: SessionStore,
        testbank: Arc<dyn TestSource>,
        scoring: Arc<dyn ScoringBackend>,
        violations: Arc<dyn ViolationSink>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                settings,
                redis,
                registry,
                testbank,
                scoring,
                violations,
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn registry(&self) -> &SessionStore {
        &self.inner.registry
    }

    pub(crate) fn testbank(&self) -> &dyn TestSource {
        self.inner.testbank.as_ref()
    }

    pub(crate) fn scoring(&self) -> &dyn ScoringBackend {
        self.inner.scoring.as_ref()
    }

    pub(crate) fn violations(&self) -> Arc<dyn ViolationSink> {
        self.inner.violations.clone()
    }
}
