//! Outcomes of successful writes, by idempotency key

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

pub const DEFAULT_CAPACITY: usize = 4096;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct Record {
    status: StatusCode,
    body: Value,
    recorded_at: Instant,
}

/// Bounded record of write outcomes.
///
/// Records expire after `ttl`; when `capacity` is reached the oldest record
/// is dropped. A key is claimed for the whole write, so concurrent deliveries
/// of the same key run the write once.
#[derive(Debug)]
pub struct IdempotencyLog {
    records: DashMap<String, Record>,
    capacity: usize,
    ttl: Duration,
}

impl Default for IdempotencyLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl IdempotencyLog {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Answer from the record for `key`, or run `write` and remember its
    /// outcome if it succeeds. Returns the outcome and whether it was replayed.
    ///
    /// `write` runs while the key's shard is locked, so it must not touch
    /// this log.
    pub fn run<E>(
        &self,
        key: &str,
        write: impl FnOnce() -> Result<(StatusCode, Value), E>,
    ) -> Result<((StatusCode, Value), bool), E> {
        if !self.records.contains_key(key) {
            self.make_room();
        }

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().recorded_at.elapsed() < self.ttl {
                    let record = entry.get();
                    return Ok(((record.status, record.body.clone()), true));
                }
                let (status, body) = write()?;
                entry.insert(Record {
                    status,
                    body: body.clone(),
                    recorded_at: Instant::now(),
                });
                Ok(((status, body), false))
            }
            Entry::Vacant(entry) => {
                let (status, body) = write()?;
                entry.insert(Record {
                    status,
                    body: body.clone(),
                    recorded_at: Instant::now(),
                });
                Ok(((status, body), false))
            }
        }
    }

    /// Drop expired records, then the oldest one if still full.
    fn make_room(&self) {
        if self.records.len() < self.capacity {
            return;
        }
        self.records
            .retain(|_, record| record.recorded_at.elapsed() < self.ttl);
        if self.records.len() < self.capacity {
            return;
        }
        let oldest = self
            .records
            .iter()
            .min_by_key(|record| record.recorded_at)
            .map(|record| record.key().clone());
        if let Some(key) = oldest {
            self.records.remove(&key);
        }
    }
}
