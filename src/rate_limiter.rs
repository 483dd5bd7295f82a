use chrono::{DateTime, Local};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;

use crate::key::ClientKey;
use crate::store::{LimitReason, RateDecision, RateStore};

/// In-memory sliding-window rate limiter.
///
/// Each client owns a queue of accepted-request timestamps, oldest first.
/// Inserts preserve that order, so pruning only ever looks at the front. The
/// `DashMap` entry guard is held for the whole prune, check and record sequence,
/// so the operation is atomic per key.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    windows: DashMap<ClientKey, VecDeque<DateTime<Local>>>,
    max_requests: u32,
    window: chrono::Duration,
    min_interval: chrono::Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_min_interval(max_requests, window, Duration::ZERO)
    }

    /// Also reject requests arriving sooner than `min_interval` after the last
    /// accepted one. A zero interval disables the check.
    pub fn with_min_interval(max_requests: u32, window: Duration, min_interval: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window: to_chrono(window),
            min_interval: to_chrono(min_interval),
        }
    }

    fn cutoff(&self, now: DateTime<Local>) -> DateTime<Local> {
        now - self.window
    }

    /// Timestamps at or before the cutoff no longer count.
    fn prune(timestamps: &mut VecDeque<DateTime<Local>>, cutoff: DateTime<Local>) {
        while timestamps.front().is_some_and(|ts| *ts <= cutoff) {
            timestamps.pop_front();
        }
    }
}

impl RateStore for SlidingWindowLimiter {
    fn check_and_record_rate(&self, key: &ClientKey, now: DateTime<Local>) -> RateDecision {
        let mut timestamps = self.windows.entry(key.clone()).or_default();

        if self.min_interval > chrono::Duration::zero() {
            if let Some(last) = timestamps.back() {
                let since_last = now - *last;
                if since_last < self.min_interval {
                    tracing::info!(
                        client = %key,
                        since_last_ms = since_last.num_milliseconds(),
                        min_interval_ms = self.min_interval.num_milliseconds(),
                        "Request arrived too soon after the last one"
                    );
                    return RateDecision::Limited {
                        reason: LimitReason::TooFast,
                        retry_after: to_std(self.min_interval - since_last),
                    };
                }
            }
        }

        Self::prune(&mut timestamps, self.cutoff(now));

        let count = timestamps.len() as u32;
        if count >= self.max_requests {
            let retry_after = timestamps
                .front()
                .map(|oldest| to_std(*oldest + self.window - now))
                .unwrap_or_default();
            tracing::info!(
                client = %key,
                count,
                limit = self.max_requests,
                window_secs = self.window.num_seconds(),
                "Rate window full"
            );
            return RateDecision::Limited {
                reason: LimitReason::WindowFull,
                retry_after,
            };
        }

        // Keep the queue ordered even if the wall clock stepped backwards.
        let at = timestamps.partition_point(|ts| *ts <= now);
        timestamps.insert(at, now);
        RateDecision::Allowed {
            remaining: self.max_requests - count - 1,
        }
    }

    fn remaining(&self, key: &ClientKey, now: DateTime<Local>) -> u32 {
        let cutoff = self.cutoff(now);
        let used = self
            .windows
            .get(key)
            .map(|timestamps| timestamps.iter().filter(|ts| **ts > cutoff).count() as u32)
            .unwrap_or(0);
        self.max_requests.saturating_sub(used)
    }

    fn sweep(&self, now: DateTime<Local>) -> usize {
        let cutoff = self.cutoff(now);
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            Self::prune(timestamps, cutoff);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    fn tracked(&self) -> usize {
        self.windows.len()
    }
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
}

pub(crate) fn to_std(delta: chrono::Duration) -> Duration {
    delta.to_std().unwrap_or_default()
}
