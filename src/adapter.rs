use crate::error::BenchError;
use crate::reading::Reading;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::time::Duration;

/// Exact-match triple plus trailing window for a recency lookup.
#[derive(Debug, Clone)]
pub struct RecencyQuery {
    pub asset_id: i64,
    pub asset_type: String,
    pub metric_type: String,
    pub window: Duration,
}

impl RecencyQuery {
    /// Oldest timestamp still inside the window, relative to `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = ChronoDuration::from_std(self.window).unwrap_or(ChronoDuration::MAX);
        now.checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn matches(&self, reading: &Reading, now: DateTime<Utc>) -> bool {
        reading.asset_id == self.asset_id
            && reading.asset_type == self.asset_type
            && reading.metric_type == self.metric_type
            && reading.timestamp >= self.cutoff(now)
    }
}

/// Readings returned by a recency query together with how long the lookup took.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub elapsed: Duration,
    pub readings: Vec<Reading>,
}

/// Storage capability set every benchmarked backend implements.
///
/// Implementations own their connection handle; the driver never inspects which
/// backend it is talking to beyond `name()`.
pub trait StorageAdapter {
    fn name(&self) -> &'static str;

    /// Creates the target table/collection if absent. Safe to call repeatedly.
    fn prepare_schema(&self) -> impl Future<Output = Result<(), BenchError>> + Send;

    /// Persists the whole batch as one logical write and returns the time from
    /// start of transfer to confirmed durability.
    fn bulk_insert(
        &self,
        readings: &[Reading],
    ) -> impl Future<Output = Result<Duration, BenchError>> + Send;

    /// Matching readings within `query.window` of now, newest first.
    fn query_recent(
        &self,
        query: &RecencyQuery,
    ) -> impl Future<Output = Result<QueryOutcome, BenchError>> + Send;

    fn footprint_bytes(&self) -> impl Future<Output = Result<u64, BenchError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(window: Duration) -> RecencyQuery {
        RecencyQuery {
            asset_id: 1,
            asset_type: "Circuit".to_string(),
            metric_type: "red-distributed-temperature".to_string(),
            window,
        }
    }

    #[test]
    fn cutoff_subtracts_window() {
        let now = Utc.with_ymd_and_hms(2026, 1, 11, 12, 0, 0).unwrap();
        let cutoff = query(Duration::from_secs(15 * 60)).cutoff(now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 1, 11, 11, 45, 0).unwrap());
    }

    #[test]
    fn huge_window_saturates() {
        let now = Utc::now();
        let cutoff = query(Duration::MAX).cutoff(now);
        assert_eq!(cutoff, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn matches_requires_triple_and_recency() {
        let now = Utc.with_ymd_and_hms(2026, 1, 11, 12, 0, 0).unwrap();
        let q = query(Duration::from_secs(60));
        let mut reading = Reading {
            timestamp: now - ChronoDuration::seconds(30),
            asset_id: 1,
            asset_type: "Circuit".to_string(),
            metric_type: "red-distributed-temperature".to_string(),
            locations: vec![],
            values: vec![],
        };
        assert!(q.matches(&reading, now));
        reading.timestamp = now - ChronoDuration::seconds(90);
        assert!(!q.matches(&reading, now));
        reading.timestamp = now;
        reading.metric_type = "yellow-distributed-temperature".to_string();
        assert!(!q.matches(&reading, now));
    }
}
