use std::sync::{PoisonError, RwLock};

/// Accumulated traffic of one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsBucket {
    /// Unix second the bucket accumulates.
    pub second: i64,
    pub requests: u64,
    pub bytes: u64,
}

/// Totals of the buckets falling inside one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowTotals {
    pub requests: u64,
    pub bytes: u64,
}

/// Fixed ring of one second buckets indexed by `second mod horizon`.
///
/// A slot holding an older second is reset when a newer second claims it, so data older than
/// the horizon disappears lazily on the next write to its slot. Readers skip such stale
/// buckets.
#[derive(Debug)]
pub struct BucketSeries {
    horizon: i64,
    buckets: RwLock<Vec<Option<StatsBucket>>>,
}

impl BucketSeries {
    /// Creates an empty series retaining `horizon_secs` seconds (at least one).
    pub fn new(horizon_secs: u64) -> Self {
        let horizon = i64::try_from(horizon_secs.max(1)).unwrap_or(i64::MAX);
        let slots = usize::try_from(horizon).unwrap_or(usize::MAX);

        Self {
            horizon,
            buckets: RwLock::new(vec![None; slots]),
        }
    }

    pub fn horizon_secs(&self) -> u64 {
        self.horizon.unsigned_abs()
    }

    /// Adds one request of `bytes` bytes to the bucket of second `now`.
    pub fn record(&self, now: i64, bytes: u64) {
        let slot = self.slot(now);
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);

        let bucket = match &mut buckets[slot] {
            Some(bucket) if bucket.second == now => bucket,
            entry => entry.insert(StatsBucket {
                second: now,
                requests: 0,
                bytes: 0,
            }),
        };
        bucket.requests += 1;
        bucket.bytes = bucket.bytes.saturating_add(bytes);
    }

    /// Sums the buckets younger than each of `windows_secs` as seen at second `now`.
    ///
    /// Totals are returned in the order of `windows_secs`. Buckets from the future or older
    /// than the horizon are ignored.
    pub fn snapshot_windows(&self, now: i64, windows_secs: &[u64]) -> Vec<WindowTotals> {
        let mut totals = vec![WindowTotals::default(); windows_secs.len()];
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);

        for bucket in buckets.iter().flatten() {
            let age = now.saturating_sub(bucket.second);
            if age < 0 || age >= self.horizon {
                continue;
            }

            for (window, total) in windows_secs.iter().zip(totals.iter_mut()) {
                if age.unsigned_abs() < *window {
                    total.requests += bucket.requests;
                    total.bytes = total.bytes.saturating_add(bucket.bytes);
                }
            }
        }

        totals
    }

    /// Returns the bucket currently stored in the slot of second `second`.
    pub fn bucket_at(&self, second: i64) -> Option<StatsBucket> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets[self.slot(second)]
    }

    fn slot(&self, second: i64) -> usize {
        // rem_euclid is non negative and below the horizon, which fits the ring length.
        second.rem_euclid(self.horizon) as usize
    }
}
