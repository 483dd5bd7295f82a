//! Store abstractions behind the admission decision.
//!
//! Each `check_and_record_*` call is a single atomic step per client key: it
//! evaluates the limit and, only on success, records the request. Implementations
//! must never let two concurrent calls for the same key both observe the last free
//! slot.

use crate::key::ClientKey;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;

/// Why the rate limiter turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitReason {
    /// The previous accepted request was less than the minimum interval ago.
    TooFast,
    /// The sliding window already holds the maximum number of requests.
    WindowFull,
}

impl LimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitReason::TooFast => "too_fast",
            LimitReason::WindowFull => "rate_window",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Recorded. `remaining` is the number of further requests the window admits.
    Allowed { remaining: u32 },
    /// Not recorded.
    Limited {
        reason: LimitReason,
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Counted. `remaining` is what is left for today.
    Allowed { remaining: u32 },
    /// Not counted. `retry_after` runs until local midnight.
    Exceeded { retry_after: Duration },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }
}

/// Sliding-window request frequency store.
pub trait RateStore: Send + Sync {
    /// Check the window for `key` at `now` and record the request if it fits.
    fn check_and_record_rate(&self, key: &ClientKey, now: DateTime<Local>) -> RateDecision;

    /// Requests still admissible for `key` at `now`, without recording anything.
    fn remaining(&self, key: &ClientKey, now: DateTime<Local>) -> u32;

    /// Drop entries with nothing left inside the window. Returns how many went.
    fn sweep(&self, now: DateTime<Local>) -> usize;

    /// Number of tracked clients.
    fn tracked(&self) -> usize;
}

/// Calendar-day request volume store.
pub trait QuotaStore: Send + Sync {
    /// Count one request for `key` on the local date of `now` if the day still
    /// has room.
    fn check_and_record_quota(&self, key: &ClientKey, now: DateTime<Local>) -> QuotaDecision;

    /// Requests left today for `key`, without counting anything.
    fn remaining(&self, key: &ClientKey, now: DateTime<Local>) -> u32;

    /// Drop counters dated before today. Returns how many went.
    fn sweep(&self, now: DateTime<Local>) -> usize;

    /// Number of tracked clients.
    fn tracked(&self) -> usize;
}
