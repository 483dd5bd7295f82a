//! Daily free-tier quota.
//!
//! Counters reset lazily: a counter whose stored date is not today's local date
//! is treated as zero and rewritten on the next check. No reset job exists.

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone};
use dashmap::DashMap;
use std::time::Duration;

use crate::key::ClientKey;
use crate::rate_limiter::to_std;
use crate::store::{QuotaDecision, QuotaStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCounter {
    pub count: u32,
    pub day: NaiveDate,
}

impl DailyCounter {
    fn fresh(day: NaiveDate) -> Self {
        Self { count: 0, day }
    }

    /// Count as seen on `today`.
    fn count_on(&self, today: NaiveDate) -> u32 {
        if self.day == today {
            self.count
        } else {
            0
        }
    }
}

#[derive(Debug)]
pub struct DailyQuotaTracker {
    counters: DashMap<ClientKey, DailyCounter>,
    daily_limit: u32,
}

impl DailyQuotaTracker {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            counters: DashMap::new(),
            daily_limit,
        }
    }

    /// Snapshot of the stored counter, stale date included.
    pub fn counter(&self, key: &ClientKey) -> Option<DailyCounter> {
        self.counters.get(key).map(|counter| *counter)
    }
}

impl QuotaStore for DailyQuotaTracker {
    fn check_and_record_quota(&self, key: &ClientKey, now: DateTime<Local>) -> QuotaDecision {
        let today = now.date_naive();
        let mut counter = self
            .counters
            .entry(key.clone())
            .or_insert_with(|| DailyCounter::fresh(today));

        if counter.day != today {
            *counter = DailyCounter::fresh(today);
        }

        if counter.count >= self.daily_limit {
            return QuotaDecision::Exceeded {
                retry_after: until_next_day(now),
            };
        }

        counter.count += 1;
        QuotaDecision::Allowed {
            remaining: self.daily_limit - counter.count,
        }
    }

    fn remaining(&self, key: &ClientKey, now: DateTime<Local>) -> u32 {
        let today = now.date_naive();
        let used = self
            .counters
            .get(key)
            .map(|counter| counter.count_on(today))
            .unwrap_or(0);
        self.daily_limit.saturating_sub(used)
    }

    fn sweep(&self, now: DateTime<Local>) -> usize {
        let today = now.date_naive();
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.day == today);
        before.saturating_sub(self.counters.len())
    }

    fn tracked(&self) -> usize {
        self.counters.len()
    }
}

/// Time left until the next local midnight.
pub fn until_next_day(now: DateTime<Local>) -> Duration {
    let Some(tomorrow) = now.date_naive().checked_add_days(Days::new(1)) else {
        return Duration::ZERO;
    };

    // Some zones skip midnight on DST changes; the first valid hour starts the day.
    (0..3)
        .find_map(|hour| {
            tomorrow
                .and_hms_opt(hour, 0, 0)
                .and_then(|start| Local.from_local_datetime(&start).earliest())
        })
        .map(|start| to_std(start - now))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 6, day, hour, minute, 0).unwrap()
    }

    fn key(raw: &str) -> ClientKey {
        ClientKey::new(raw)
    }

    #[test]
    fn test_five_allowed_then_exceeded() {
        let tracker = DailyQuotaTracker::new(5);
        for expected_remaining in (0..5).rev() {
            assert_eq!(
                tracker.check_and_record_quota(&key("a"), at(10, 9, 0)),
                QuotaDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }

        let decision = tracker.check_and_record_quota(&key("a"), at(10, 9, 0));
        assert!(!decision.is_allowed());
        assert_eq!(tracker.counter(&key("a")).unwrap().count, 5);
    }

    #[test]
    fn test_exceeded_retry_after_runs_to_midnight() {
        let tracker = DailyQuotaTracker::new(1);
        tracker.check_and_record_quota(&key("a"), at(10, 22, 0));
        match tracker.check_and_record_quota(&key("a"), at(10, 22, 0)) {
            QuotaDecision::Exceeded { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(2 * 3600));
            }
            other => panic!("expected exceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_counter_resets_lazily() {
        let tracker = DailyQuotaTracker::new(2);
        tracker.check_and_record_quota(&key("a"), at(10, 20, 0));
        tracker.check_and_record_quota(&key("a"), at(10, 21, 0));
        assert!(!tracker.check_and_record_quota(&key("a"), at(10, 23, 59)).is_allowed());

        // Nothing was reset explicitly; the stored date is simply stale.
        assert_eq!(tracker.remaining(&key("a"), at(11, 0, 1)), 2);
        assert_eq!(tracker.counter(&key("a")).unwrap().count, 2);

        assert_eq!(
            tracker.check_and_record_quota(&key("a"), at(11, 0, 1)),
            QuotaDecision::Allowed { remaining: 1 }
        );
        let counter = tracker.counter(&key("a")).unwrap();
        assert_eq!(counter.count, 1);
        assert_eq!(counter.day, at(11, 0, 1).date_naive());
    }

    #[test]
    fn test_remaining_is_read_only() {
        let tracker = DailyQuotaTracker::new(5);
        assert_eq!(tracker.remaining(&key("a"), at(10, 9, 0)), 5);
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn test_sweep_drops_stale_days() {
        let tracker = DailyQuotaTracker::new(5);
        tracker.check_and_record_quota(&key("yesterday"), at(9, 12, 0));
        tracker.check_and_record_quota(&key("today"), at(10, 8, 0));

        assert_eq!(tracker.sweep(at(10, 12, 0)), 1);
        assert_eq!(tracker.tracked(), 1);
        assert!(tracker.counter(&key("yesterday")).is_none());
        assert_eq!(tracker.remaining(&key("today"), at(10, 12, 0)), 4);
    }
}
