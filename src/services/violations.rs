use async_trait::async_trait;

use crate::core::config::Settings;
use crate::core::redis::RedisHandle;
use crate::core::time::unix_millis;
use crate::exam::models::ViolationEvent;
use crate::schemas::upstream::ViolationRecordDto;

/// Destination for anti-cheat violation records. Recording is best-effort
/// by contract: implementations log failures and never surface them, so the
/// exam flow cannot be disturbed by proctoring storage.
#[async_trait]
pub(crate) trait ViolationSink: Send + Sync {
    async fn record(&self, event: ViolationEvent);
}

pub(crate) struct RedisViolationStore {
    redis: RedisHandle,
    key_prefix: String,
}

impl RedisViolationStore {
    pub(crate) fn from_settings(settings: &Settings, redis: RedisHandle) -> Self {
        Self { redis, key_prefix: settings.exam().violation_key_prefix.clone() }
    }

    fn key(&self, test_id: &str, student_id: &str) -> String {
        format!("{}/{}/{}", self.key_prefix, test_id, student_id)
    }
}

/// Merges a violation into the stored record: stored count plus one, with
/// the timestamp of the latest violation. Read-then-write, so two writers
/// racing on the same key can lose an increment; the authoritative count is
/// the one in the submission payload.
fn next_record(previous: Option<ViolationRecordDto>, event: &ViolationEvent) -> ViolationRecordDto {
    let count = previous.map(|record| record.count).unwrap_or(0) + 1;
    ViolationRecordDto {
        user_id: event.student_id.clone(),
        user_name: event.student_name.clone(),
        exam_id: event.test_id.clone(),
        exam_name: event.test_name.clone(),
        timestamp: unix_millis(event.at),
        count,
    }
}

#[async_trait]
impl ViolationSink for RedisViolationStore {
    async fn record(&self, event: ViolationEvent) {
        let key = self.key(&event.test_id, &event.student_id);

        let previous = match self.redis.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<ViolationRecordDto>(&raw) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(error = %err, key = %key, "Discarding malformed violation record");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "Failed to read violation record");
                None
            }
        };

        let record = next_record(previous, &event);
        let raw = match serde_json::to_string(&record) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, key = %key, "Failed to encode violation record");
                return;
            }
        };

        match self.redis.put(&key, &raw).await {
            Ok(true) => {
                metrics::counter!("examhall_violations_recorded_total").increment(1);
                tracing::debug!(key = %key, count = record.count, "Violation record stored");
            }
            Ok(false) => {
                tracing::debug!(key = %key, "Violation store offline; record not persisted");
            }
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "Failed to write violation record");
            }
        }
    }
}
