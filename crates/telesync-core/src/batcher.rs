// ── Persistent event batcher ──
//
// Every tracked event is written to storage before it is sent, and only
// removed once the service has acknowledged it. Sending coalesces all
// unsent events of the batch's type, so events left behind by a failed
// send ride along with the next batch of the same type.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use telesync_api::{Event, TrackedEventType};
use tracing::debug;

use crate::error::CoreError;
use crate::storage::{Storage, StorageExt, keys};

/// Launch events within this many milliseconds (inclusive) of a previous
/// launch are dropped.
pub const LAUNCH_DEDUP_WINDOW_MS: i64 = 1_000;

/// The events selected for one send, all of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub event_type: String,
    pub events: Vec<Event>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Reject empty batches and batches mixing event types.
pub fn validate(events: &[Event]) -> Result<(), CoreError> {
    let Some(first) = events.first() else {
        return Err(CoreError::NoEvents);
    };
    if events.iter().any(|e| e.event_type != first.event_type) {
        return Err(CoreError::TooManyEventTypes);
    }
    Ok(())
}

/// Persistent, deduplicating event store.
pub struct EventBatcher {
    storage: Arc<dyn Storage>,
    lock: Mutex<()>,
}

impl EventBatcher {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    /// Persist `events` and return every stored event of their type.
    ///
    /// Exact duplicates (within the batch or already stored) are dropped,
    /// as are launch events within [`LAUNCH_DEDUP_WINDOW_MS`] of the latest
    /// stored or accepted launch.
    pub fn track(&self, events: Vec<Event>) -> Result<Batch, CoreError> {
        validate(&events)?;
        let Some(first) = events.first() else {
            return Err(CoreError::NoEvents);
        };
        let event_type = first.event_type.clone();
        let is_launch = first.is_type(TrackedEventType::Launch);

        let _guard = self.guard()?;
        let mut stored = self.load()?;

        let mut last_launch: Option<DateTime<Utc>> = if is_launch {
            stored
                .iter()
                .filter(|e| e.is_type(TrackedEventType::Launch))
                .map(|e| e.timestamp)
                .max()
        } else {
            None
        };

        let incoming = events.len();
        let mut accepted = 0_usize;
        for event in events {
            if stored.iter().any(|s| s.is_identical(&event)) {
                continue;
            }
            if is_launch {
                if let Some(last) = last_launch {
                    if (event.timestamp - last).num_milliseconds().abs() <= LAUNCH_DEDUP_WINDOW_MS {
                        continue;
                    }
                }
                last_launch = last_launch.max(Some(event.timestamp));
            }
            stored.push(event);
            accepted += 1;
        }

        if accepted > 0 {
            self.save(&stored)?;
        }
        debug!(%event_type, incoming, accepted, "events persisted");

        let events: Vec<Event> = stored
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect();
        Ok(Batch { event_type, events })
    }

    /// Remove exactly the events of a successfully sent batch.
    pub fn acknowledge(&self, batch: &Batch) -> Result<(), CoreError> {
        let _guard = self.guard()?;
        let mut stored = self.load()?;
        let before = stored.len();
        stored.retain(|e| !batch.events.contains(e));

        if stored.len() != before {
            self.save(&stored)?;
        }
        debug!(
            event_type = %batch.event_type,
            removed = before - stored.len(),
            remaining = stored.len(),
            "batch acknowledged"
        );
        Ok(())
    }

    /// All unsent events, in insertion order.
    pub fn pending(&self) -> Result<Vec<Event>, CoreError> {
        let _guard = self.guard()?;
        self.load()
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, CoreError> {
        self.lock
            .lock()
            .map_err(|_| CoreError::other("event store lock poisoned"))
    }

    fn load(&self) -> Result<Vec<Event>, CoreError> {
        Ok(self.storage.load(keys::EVENTS)?.unwrap_or_default())
    }

    fn save(&self, events: &[Event]) -> Result<(), CoreError> {
        if events.is_empty() {
            self.storage.set(keys::EVENTS, None)?;
        } else {
            self.storage.store(keys::EVENTS, Some(&events))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};

    use super::*;
    use crate::storage::MemoryStorage;

    fn batcher() -> (Arc<MemoryStorage>, EventBatcher) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), EventBatcher::new(storage))
    }

    fn at(kind: &str, secs: i64) -> Event {
        let base = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid");
        Event::at(kind, Map::new(), base + Duration::seconds(secs))
    }

    #[test]
    fn validation() {
        assert_eq!(validate(&[]), Err(CoreError::NoEvents));
        assert_eq!(
            validate(&[at("launch", 0), at("clickthru", 0)]),
            Err(CoreError::TooManyEventTypes)
        );
        assert_eq!(validate(&[at("clickthru", 0), at("clickthru", 5)]), Ok(()));
    }

    #[test]
    fn invalid_batches_are_not_persisted() {
        let (storage, batcher) = batcher();
        let result = batcher
            .track(vec![at("launch", 0), at("clickthru", 0)])
            ;

        assert_eq!(result, Err(CoreError::TooManyEventTypes));
        assert!(storage.is_empty());
    }

    #[test]
    fn tracking_same_event_twice_stores_it_once() {
        let (_, batcher) = batcher();
        let event = at("clickthru", 0);

        batcher.track(vec![event.clone()]).expect("track");
        let batch = batcher.track(vec![event.clone()]).expect("track");

        assert_eq!(batch.events, vec![event]);
        assert_eq!(batcher.pending().expect("pending").len(), 1);
    }

    #[test]
    fn duplicates_within_one_batch_collapse() {
        let (_, batcher) = batcher();
        let event = at("clickthru", 0);

        let batch = batcher
            .track(vec![event.clone(), event.clone()])
            
            .expect("track");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn same_uuid_with_different_properties_is_kept() {
        let (_, batcher) = batcher();
        let event = at("clickthru", 0);
        let mut changed = event.clone();
        changed.properties.insert("k".into(), json!("v"));

        let batch = batcher.track(vec![event, changed]).expect("track");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn launch_window() {
        let (_, batcher) = batcher();

        batcher.track(vec![at("launch", 0)]).expect("track");
        let batch = batcher.track(vec![at("launch", 0)]).expect("track");
        assert_eq!(batch.len(), 1, "launch 0s later is dropped");

        let batch = batcher.track(vec![at("launch", 2)]).expect("track");
        assert_eq!(batch.len(), 2, "launch 2s later is kept");
    }

    #[test]
    fn launch_window_bound_is_inclusive() {
        let (_, batcher) = batcher();
        let base = at("launch", 0);
        let later = |ms: i64| Event::at("launch", Map::new(), base.timestamp + Duration::milliseconds(ms));

        batcher.track(vec![base.clone()]).expect("track");
        let batch = batcher.track(vec![later(1_000)]).expect("track");
        assert_eq!(batch.len(), 1, "launch exactly 1s later is dropped");

        let batch = batcher.track(vec![later(1_001)]).expect("track");
        assert_eq!(batch.len(), 2, "launch 1.001s later is kept");
    }

    #[test]
    fn launch_window_applies_within_one_batch() {
        let (_, batcher) = batcher();
        let batch = batcher
            .track(vec![at("launch", 10), at("launch", 10), at("launch", 13)])
            
            .expect("track");

        let offsets: Vec<_> = batch.events.iter().map(|e| e.timestamp).collect();
        assert_eq!(offsets, vec![at("launch", 10).timestamp, at("launch", 13).timestamp]);
    }

    #[test]
    fn launch_window_ignores_other_types() {
        let (_, batcher) = batcher();
        batcher.track(vec![at("clickthru", 0)]).expect("track");
        batcher.track(vec![at("clickthru", 0)]).expect("track");

        assert_eq!(batcher.pending().expect("pending").len(), 2);
    }

    #[test]
    fn batch_coalesces_only_same_type() {
        let (_, batcher) = batcher();
        batcher.track(vec![at("clickthru", 0)]).expect("track");
        batcher.track(vec![at("launch", 0)]).expect("track");

        let batch = batcher.track(vec![at("clickthru", 5)]).expect("track");
        assert_eq!(batch.event_type, "clickthru");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn acknowledge_removes_exactly_the_batch() {
        let (storage, batcher) = batcher();
        let batch = batcher.track(vec![at("clickthru", 0)]).expect("track");
        let late = at("clickthru", 9);
        batcher.track(vec![late.clone()]).expect("track");

        batcher.acknowledge(&batch).expect("ack");
        assert_eq!(batcher.pending().expect("pending"), vec![late.clone()]);

        let rest = Batch {
            event_type: "clickthru".into(),
            events: vec![late],
        };
        batcher.acknowledge(&rest).expect("ack");
        assert!(storage.is_empty());
    }

    #[test]
    fn events_survive_a_new_batcher() {
        let storage = Arc::new(MemoryStorage::new());
        let event = at("inbox_open", 0);
        EventBatcher::new(storage.clone())
            .track(vec![event.clone()])
            .expect("track");

        let reopened = EventBatcher::new(storage);
        let pending = reopened.pending().expect("pending");
        assert_eq!(pending, vec![event]);
    }
}
