use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::admission::VerdictKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSnapshot {
    pub total_requests: u64,
    pub allowed_requests: u64,
    pub rate_limited_requests: u64,
    pub quota_exceeded_requests: u64,
    pub started_at: u64,
}

/// Process-wide verdict counters.
#[derive(Debug)]
pub struct AdmissionMetrics {
    total: AtomicU64,
    allowed: AtomicU64,
    rate_limited: AtomicU64,
    quota_exceeded: AtomicU64,
    started_at: u64,
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            quota_exceeded: AtomicU64::new(0),
            started_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    pub fn record(&self, kind: VerdictKind) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let counter = match kind {
            VerdictKind::Allowed => &self.allowed,
            VerdictKind::RateLimited => &self.rate_limited,
            VerdictKind::QuotaExceeded => &self.quota_exceeded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            total_requests: self.total.load(Ordering::Relaxed),
            allowed_requests: self.allowed.load(Ordering::Relaxed),
            rate_limited_requests: self.rate_limited.load(Ordering::Relaxed),
            quota_exceeded_requests: self.quota_exceeded.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }
}

impl Default for AdmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
