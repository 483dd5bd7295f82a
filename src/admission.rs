use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Limits;
use crate::key::ClientKey;
use crate::quota::DailyQuotaTracker;
use crate::rate_limiter::SlidingWindowLimiter;
use crate::store::{LimitReason, QuotaDecision, QuotaStore, RateDecision, RateStore};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Proceed to the provider. `quota_remaining` is `None` for callers that
    /// brought their own credential.
    Allowed {
        rate_remaining: u32,
        quota_remaining: Option<u32>,
    },
    /// Too many requests in the window; retryable.
    RateLimited {
        reason: LimitReason,
        retry_after: Duration,
    },
    /// Free tier used up for today.
    QuotaExceeded { retry_after: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Allowed,
    RateLimited,
    QuotaExceeded,
}

impl Verdict {
    pub fn kind(&self) -> VerdictKind {
        match self {
            Verdict::Allowed { .. } => VerdictKind::Allowed,
            Verdict::RateLimited { .. } => VerdictKind::RateLimited,
            Verdict::QuotaExceeded { .. } => VerdictKind::QuotaExceeded,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Verdict::Allowed { .. } => None,
            Verdict::RateLimited { retry_after, .. } | Verdict::QuotaExceeded { retry_after } => {
                Some(*retry_after)
            }
        }
    }
}

/// Read-only view of what a client has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub rate_remaining: u32,
    pub quota_remaining: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub rate_entries: usize,
    pub quota_entries: usize,
}

/// Composes the rate store and the quota store into a single decision.
///
/// The order is fixed: the rate limiter always runs first, and a rate-limit
/// rejection returns before the quota store is touched. A caller-supplied
/// credential skips the quota store and nothing else.
#[derive(Clone)]
pub struct Admission {
    rate: Arc<dyn RateStore>,
    quota: Arc<dyn QuotaStore>,
}

impl Admission {
    pub fn new(rate: Arc<dyn RateStore>, quota: Arc<dyn QuotaStore>) -> Self {
        Self { rate, quota }
    }

    /// In-memory stores sized from `limits`.
    pub fn from_limits(limits: &Limits) -> Self {
        let rate = SlidingWindowLimiter::with_min_interval(
            limits.max_requests,
            limits.window,
            limits.min_interval,
        );
        let quota = DailyQuotaTracker::new(limits.daily_limit);
        Self::new(Arc::new(rate), Arc::new(quota))
    }

    pub fn decide(
        &self,
        key: &ClientKey,
        has_own_credential: bool,
        now: DateTime<Local>,
    ) -> Verdict {
        let rate_remaining = match self.rate.check_and_record_rate(key, now) {
            RateDecision::Allowed { remaining } => remaining,
            RateDecision::Limited {
                reason,
                retry_after,
            } => {
                tracing::debug!(
                    client = %key,
                    reason = reason.as_str(),
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limit blocked request"
                );
                return Verdict::RateLimited {
                    reason,
                    retry_after,
                };
            }
        };

        if has_own_credential {
            return Verdict::Allowed {
                rate_remaining,
                quota_remaining: None,
            };
        }

        match self.quota.check_and_record_quota(key, now) {
            QuotaDecision::Allowed { remaining } => Verdict::Allowed {
                rate_remaining,
                quota_remaining: Some(remaining),
            },
            QuotaDecision::Exceeded { retry_after } => {
                tracing::warn!(client = %key, "Daily free limit exceeded");
                Verdict::QuotaExceeded { retry_after }
            }
        }
    }

    pub fn usage(&self, key: &ClientKey, has_own_credential: bool, now: DateTime<Local>) -> Usage {
        Usage {
            rate_remaining: self.rate.remaining(key, now),
            quota_remaining: (!has_own_credential).then(|| self.quota.remaining(key, now)),
        }
    }

    pub fn sweep(&self, now: DateTime<Local>) -> SweepStats {
        SweepStats {
            rate_entries: self.rate.sweep(now),
            quota_entries: self.quota.sweep(now),
        }
    }

    /// Tracked clients in the rate store and the quota store.
    pub fn tracked(&self) -> (usize, usize) {
        (self.rate.tracked(), self.quota.tracked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 2, 17, 14, 0, 0).unwrap()
    }

    fn millis(n: i64) -> chrono::Duration {
        chrono::Duration::milliseconds(n)
    }

    fn setup() -> (Admission, Arc<DailyQuotaTracker>) {
        let limits = Limits::default();
        let quota = Arc::new(DailyQuotaTracker::new(limits.daily_limit));
        let rate = Arc::new(SlidingWindowLimiter::new(limits.max_requests, limits.window));
        (Admission::new(rate, quota.clone()), quota)
    }

    #[test]
    fn test_free_client_hits_quota_before_rate_limit() {
        let (admission, _) = setup();
        let key = ClientKey::new("A");

        let kinds: Vec<VerdictKind> = (0..10)
            .map(|i| admission.decide(&key, false, now() + millis(i * 100)).kind())
            .collect();

        assert_eq!(&kinds[..5], &[VerdictKind::Allowed; 5]);
        assert_eq!(&kinds[5..], &[VerdictKind::QuotaExceeded; 5]);
    }

    #[test]
    fn test_credentialed_client_only_rate_limited() {
        let (admission, quota) = setup();
        let key = ClientKey::new("B");

        for i in 0..10 {
            let verdict = admission.decide(&key, true, now() + millis(i * 90));
            assert_eq!(
                verdict,
                Verdict::Allowed {
                    rate_remaining: 9 - i as u32,
                    quota_remaining: None,
                }
            );
        }
        let eleventh = admission.decide(&key, true, now() + millis(990));
        assert_eq!(eleventh.kind(), VerdictKind::RateLimited);
        assert!(quota.counter(&key).is_none());
    }

    #[test]
    fn test_rate_rejection_leaves_quota_untouched() {
        let limits = Limits {
            max_requests: 2,
            ..Limits::default()
        };
        let quota = Arc::new(DailyQuotaTracker::new(limits.daily_limit));
        let rate = Arc::new(SlidingWindowLimiter::new(limits.max_requests, limits.window));
        let admission = Admission::new(rate, quota.clone());
        let key = ClientKey::new("C");

        assert!(admission.decide(&key, false, now()).is_allowed());
        assert!(admission.decide(&key, false, now()).is_allowed());
        for _ in 0..4 {
            assert_eq!(admission.decide(&key, false, now()).kind(), VerdictKind::RateLimited);
        }
        assert_eq!(quota.counter(&key).unwrap().count, 2);
    }

    #[test]
    fn test_same_call_with_credential_after_quota_exhausted() {
        let (admission, _) = setup();
        let key = ClientKey::new("D");
        for _ in 0..5 {
            assert!(admission.decide(&key, false, now()).is_allowed());
        }

        assert_eq!(admission.decide(&key, false, now()).kind(), VerdictKind::QuotaExceeded);
        assert!(admission.decide(&key, true, now()).is_allowed());
    }

    #[test]
    fn test_quota_resets_on_new_day() {
        let (admission, _) = setup();
        let key = ClientKey::new("E");
        for _ in 0..5 {
            admission.decide(&key, false, now());
        }
        assert_eq!(admission.decide(&key, false, now()).kind(), VerdictKind::QuotaExceeded);

        let tomorrow = now() + chrono::Duration::days(1);
        assert_eq!(
            admission.decide(&key, false, tomorrow),
            Verdict::Allowed {
                rate_remaining: 9,
                quota_remaining: Some(4),
            }
        );
    }

    #[test]
    fn test_usage_does_not_mutate() {
        let (admission, _) = setup();
        let key = ClientKey::new("F");
        admission.decide(&key, false, now());

        let usage = admission.usage(&key, false, now());
        assert_eq!(
            usage,
            Usage {
                rate_remaining: 9,
                quota_remaining: Some(4),
            }
        );
        assert_eq!(admission.usage(&key, false, now()), usage);
        assert_eq!(admission.usage(&key, true, now()).quota_remaining, None);
    }

    #[test]
    fn test_concurrent_calls_admit_exactly_max_requests() {
        let (admission, _) = setup();
        let key = ClientKey::new("G");
        let at = now();

        let admission = &admission;
        let key = &key;
        let verdicts: Vec<Verdict> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..50)
                .map(|_| scope.spawn(move || admission.decide(key, true, at)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let allowed = verdicts.iter().filter(|v| v.is_allowed()).count();
        let limited = verdicts
            .iter()
            .filter(|v| v.kind() == VerdictKind::RateLimited)
            .count();
        assert_eq!(allowed, 10);
        assert_eq!(limited, 40);
        assert_eq!(admission.usage(key, true, at).rate_remaining, 0);
    }

    #[test]
    fn test_concurrent_free_calls_admit_exactly_daily_limit() {
        let (admission, quota) = setup();
        let key = ClientKey::new("H");
        let at = now();

        let admission = &admission;
        let key_ref = &key;
        let verdicts: Vec<Verdict> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..50)
                .map(|_| scope.spawn(move || admission.decide(key_ref, false, at)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let count = |kind: VerdictKind| verdicts.iter().filter(|v| v.kind() == kind).count();
        assert_eq!(count(VerdictKind::Allowed), 5);
        assert_eq!(count(VerdictKind::QuotaExceeded), 5);
        assert_eq!(count(VerdictKind::RateLimited), 40);
        assert_eq!(quota.counter(&key).unwrap().count, 5);
        assert_eq!(admission.usage(&key, false, at).quota_remaining, Some(0));
    }
}
