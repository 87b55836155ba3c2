//! In-memory alarm state
//!
//! One record per sensor plus a single fleet-wide "last admitted" instant.
//! Both live behind one mutex, so admission and expiry never interleave.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::types::{AlarmRecord, SendStatus};

/// Why an admission attempt produced no alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Fleet-wide cooldown still running
    GlobalCooldown { remaining: Duration },
    /// Sensor already has an active record
    AlreadyActive,
}

impl std::fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GlobalCooldown { remaining } => {
                write!(f, "global cooldown ({}s remaining)", remaining.as_secs())
            },
            Self::AlreadyActive => write!(f, "sensor already alarming"),
        }
    }
}

/// Result of [`AlarmStore::admit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(AlarmRecord),
    Suppressed(SuppressReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

#[derive(Debug)]
struct ActiveAlarm {
    record: AlarmRecord,
    admitted_at: Instant,
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<String, ActiveAlarm>,
    last_alarm_sent_at: Option<Instant>,
}

/// Active alarms keyed by sensor id, with the global admission gate
#[derive(Debug)]
pub struct AlarmStore {
    state: Mutex<StoreState>,
    cooldown: Duration,
}

impl AlarmStore {
    /// A zero `cooldown` disables the global gate
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether a decoded alarm becomes an active, notified record
    ///
    /// The global gate is checked first and is re-armed on every attempt that
    /// passes it, including attempts then rejected as [`SuppressReason::AlreadyActive`].
    pub fn admit(&self, mut record: AlarmRecord) -> Admission {
        let now = Instant::now();
        let mut state = self.state.lock();

        if let Some(last) = state.last_alarm_sent_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cooldown {
                return Admission::Suppressed(SuppressReason::GlobalCooldown {
                    remaining: self.cooldown - elapsed,
                });
            }
        }

        state.last_alarm_sent_at = Some(now);

        if state.records.contains_key(&record.sensor_id) {
            return Admission::Suppressed(SuppressReason::AlreadyActive);
        }

        record.send_status = SendStatus::NotSent;
        state.records.insert(
            record.sensor_id.clone(),
            ActiveAlarm {
                record: record.clone(),
                admitted_at: now,
            },
        );
        Admission::Admitted(record)
    }

    /// Forget a sensor's record; returns whether one was present
    pub fn drop_alarm(&self, sensor_id: &str) -> bool {
        let removed = self.state.lock().records.remove(sensor_id);
        match removed {
            Some(active) => {
                debug!(
                    sensor_id,
                    active_for_secs = active.admitted_at.elapsed().as_secs(),
                    "Alarm entry dropped"
                );
                true
            },
            None => false,
        }
    }

    /// Record the dispatch outcome on a still-active alarm
    pub fn set_send_status(&self, sensor_id: &str, status: SendStatus) -> bool {
        let mut state = self.state.lock();
        match state.records.get_mut(sensor_id) {
            Some(active) => {
                active.record.send_status = status;
                true
            },
            None => false,
        }
    }

    pub fn get(&self, sensor_id: &str) -> Option<AlarmRecord> {
        self.state
            .lock()
            .records
            .get(sensor_id)
            .map(|active| active.record.clone())
    }

    pub fn admitted_at(&self, sensor_id: &str) -> Option<Instant> {
        self.state
            .lock()
            .records
            .get(sensor_id)
            .map(|active| active.admitted_at)
    }

    pub fn last_alarm_sent_at(&self) -> Option<Instant> {
        self.state.lock().last_alarm_sent_at
    }

    /// Sorted ids of all sensors currently in cooldown
    pub fn active_sensors(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().records.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn record(sensor_id: &str) -> AlarmRecord {
        AlarmRecord::new("HighTemp", sensor_id, "GW-7", "9.5", "2024-01-01T00:00:00")
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_admission_always_passes() {
        let store = AlarmStore::new(Duration::from_secs(300));
        assert!(store.last_alarm_sent_at().is_none());

        let admission = store.admit(record("S1"));
        assert!(admission.is_admitted());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("S1").unwrap().send_status, SendStatus::NotSent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_sensor_is_suppressed_without_touching_record() {
        let store = AlarmStore::new(Duration::ZERO);
        assert!(store.admit(record("S1")).is_admitted());
        let first_admitted = store.admitted_at("S1").unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        let mut second = record("S1");
        second.value = "12.0".to_string();

        assert_eq!(
            store.admit(second),
            Admission::Suppressed(SuppressReason::AlreadyActive)
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("S1").unwrap().value, "9.5");
        assert_eq!(store.admitted_at("S1").unwrap(), first_admitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_cooldown_blocks_other_sensors() {
        let store = AlarmStore::new(Duration::from_secs(300));
        assert!(store.admit(record("S1")).is_admitted());

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(
            store.admit(record("S2")),
            Admission::Suppressed(SuppressReason::GlobalCooldown {
                remaining: Duration::from_secs(180),
            })
        );
        assert!(store.get("S2").is_none());

        tokio::time::advance(Duration::from_secs(180)).await;
        assert!(store.admit(record("S2")).is_admitted());
        assert_eq!(store.active_sensors(), vec!["S1".to_string(), "S2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_duplicate_still_rearms_global_gate() {
        let store = AlarmStore::new(Duration::from_secs(60));
        assert!(store.admit(record("S1")).is_admitted());

        tokio::time::advance(Duration::from_secs(60)).await;
        // passes the gate, rejected per sensor, but resets the gate clock
        assert_eq!(
            store.admit(record("S1")),
            Admission::Suppressed(SuppressReason::AlreadyActive)
        );

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(matches!(
            store.admit(record("S2")),
            Admission::Suppressed(SuppressReason::GlobalCooldown { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_is_idempotent_and_reenables_sensor() {
        let store = AlarmStore::new(Duration::ZERO);
        assert!(store.admit(record("S1")).is_admitted());

        assert!(store.drop_alarm("S1"));
        assert!(!store.drop_alarm("S1"));
        assert!(!store.drop_alarm("never-seen"));
        assert!(store.is_empty());

        assert!(store.admit(record("S1")).is_admitted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_send_status_only_on_active_records() {
        let store = AlarmStore::new(Duration::ZERO);
        assert!(!store.set_send_status("S1", SendStatus::Sent));

        assert!(store.admit(record("S1")).is_admitted());
        assert!(store.set_send_status("S1", SendStatus::PartiallySent));
        assert_eq!(
            store.get("S1").unwrap().send_status,
            SendStatus::PartiallySent
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_resets_incoming_send_status() {
        let store = AlarmStore::new(Duration::ZERO);
        let mut incoming = record("S1");
        incoming.send_status = SendStatus::Sent;

        match store.admit(incoming) {
            Admission::Admitted(stored) => assert_eq!(stored.send_status, SendStatus::NotSent),
            other => panic!("expected admission, got {other:?}"),
        }
    }
}
