//! Running classification statistics shared by concurrent calls.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rating::scale::RatingCode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationStats {
    pub total: u64,
    pub failures: u64,
    pub by_rating: BTreeMap<RatingCode, u64>,
    /// Mean latency of successful classifications, in milliseconds.
    pub mean_latency_ms: Decimal,
}

#[derive(Debug, Default)]
struct Accumulator {
    successes: u64,
    failures: u64,
    by_rating: BTreeMap<RatingCode, u64>,
    latency_us_sum: u128,
}

/// Only the counter update is serialised; classification itself runs
/// outside the lock.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: Mutex<Accumulator>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, code: RatingCode, latency: Duration) {
        let mut acc = self.inner.lock();
        acc.successes += 1;
        *acc.by_rating.entry(code).or_default() += 1;
        acc.latency_us_sum += latency.as_micros();
    }

    pub fn record_failure(&self) {
        self.inner.lock().failures += 1;
    }

    pub fn snapshot(&self) -> ClassificationStats {
        let acc = self.inner.lock();
        let mean_latency_ms = if acc.successes == 0 {
            Decimal::ZERO
        } else {
            let sum_us = Decimal::from(u64::try_from(acc.latency_us_sum).unwrap_or(u64::MAX));
            sum_us / Decimal::from(acc.successes) / Decimal::from(1000)
        };
        ClassificationStats {
            total: acc.successes + acc.failures,
            failures: acc.failures,
            by_rating: acc.by_rating.clone(),
            mean_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn test_counts_and_mean_latency() {
        let stats = StatsCollector::new();
        stats.record_success(RatingCode::A1, Duration::from_millis(2));
        stats.record_success(RatingCode::A1, Duration::from_millis(4));
        stats.record_success(RatingCode::C1, Duration::from_millis(6));
        stats.record_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.total, 4);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.by_rating[&RatingCode::A1], 2);
        assert_eq!(snap.mean_latency_ms, dec!(4));
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = StatsCollector::new().snapshot();
        assert_eq!(snap.total, 0);
        assert_eq!(snap.mean_latency_ms, Decimal::ZERO);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(StatsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_success(RatingCode::B1, Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().by_rating[&RatingCode::B1], 8000);
    }
}
