use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::ParseError;
use crate::model::StreamId;
use crate::scanner::StreamState;

struct StreamSlot {
    state: Mutex<StreamState>,
    /// Registry tick of the last access; orders streams for LRU eviction.
    last_tick: AtomicU64,
    /// Nanoseconds since the registry epoch of the last access.
    last_touched_nanos: AtomicU64,
}

impl StreamSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(StreamState::new()),
            last_tick: AtomicU64::new(0),
            last_touched_nanos: AtomicU64::new(0),
        }
    }
}

/// Stream id -> parse state.
///
/// States are created on first use and live until removed, reset, or evicted.
/// Calls for the same id are serialised by a per-stream lock; distinct ids
/// proceed independently.
pub struct StreamRegistry {
    streams: DashMap<StreamId, Arc<StreamSlot>>,
    max_streams: Option<usize>,
    epoch: Instant,
    tick: AtomicU64,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StreamRegistry {
    /// `max_streams` caps tracked streams; inserting past it evicts the least
    /// recently touched one.
    pub fn new(max_streams: Option<usize>) -> Self {
        Self {
            streams: DashMap::new(),
            max_streams: max_streams.map(|max| max.max(1)),
            epoch: Instant::now(),
            tick: AtomicU64::new(0),
        }
    }

    fn touch(&self, slot: &StreamSlot) {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        slot.last_tick.store(tick, Ordering::Relaxed);
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        slot.last_touched_nanos.store(nanos, Ordering::Relaxed);
    }

    /// Runs `f` on the state of `id`, creating it first if needed.
    ///
    /// The stream's lock is held while `f` runs, but no map shard is.
    pub fn with_stream<R>(
        &self,
        id: &StreamId,
        f: impl FnOnce(&mut StreamState) -> R,
    ) -> Result<R, ParseError> {
        let (slot, inserted) = match self.streams.get(id) {
            Some(slot) => (Arc::clone(slot.value()), false),
            None => {
                let mut inserted = false;
                let slot = self
                    .streams
                    .entry(id.clone())
                    .or_insert_with(|| {
                        inserted = true;
                        Arc::new(StreamSlot::new())
                    })
                    .value()
                    .clone();
                (slot, inserted)
            }
        };
        self.touch(&slot);
        if inserted {
            tracing::debug!(stream_id = %id, "stream state created");
            self.enforce_capacity(id);
        }

        let mut state = slot
            .state
            .lock()
            .map_err(|_| ParseError::StatePoisoned(id.clone()))?;
        Ok(f(&mut state))
    }

    fn enforce_capacity(&self, keep: &StreamId) {
        let Some(max) = self.max_streams else {
            return;
        };
        while self.streams.len() > max {
            let oldest = self
                .streams
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.value().last_tick.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else {
                break;
            };
            self.streams.remove(&oldest);
            tracing::info!(stream_id = %oldest, max_streams = max, "evicted least recently used stream");
        }
    }

    /// Drops every stream state.
    pub fn reset(&self) {
        let dropped = self.streams.len();
        self.streams.clear();
        tracing::debug!(dropped, "stream registry reset");
    }

    /// Drops the state of one stream. Returns whether it existed.
    pub fn remove(&self, id: &StreamId) -> bool {
        self.streams.remove(id).is_some()
    }

    /// Drops streams not touched within `max_idle`. Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let limit = u64::try_from(max_idle.as_nanos()).unwrap_or(u64::MAX);
        let before = self.streams.len();
        self.streams.retain(|_, slot| {
            now.saturating_sub(slot.last_touched_nanos.load(Ordering::Relaxed)) <= limit
        });
        let evicted = before.saturating_sub(self.streams.len());
        if evicted > 0 {
            tracing::info!(evicted, "evicted idle streams");
        }
        evicted
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.streams.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Copy of the current state of `id`, if tracked.
    pub fn snapshot(&self, id: &StreamId) -> Option<StreamState> {
        let slot = self.streams.get(id).map(|entry| Arc::clone(entry.value()))?;
        let state = slot.state.lock().ok()?;
        Some(state.clone())
    }
}
