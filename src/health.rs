use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::admission::Admission;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub stores: StoreStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreStatus {
    pub rate_clients: usize,
    pub quota_clients: usize,
}

pub struct HealthChecker {
    started: Instant,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// The stores are in-process, so the service is healthy whenever it answers.
    pub fn check_health(&self, admission: &Admission) -> HealthStatus {
        let (rate_clients, quota_clients) = admission.tracked();

        HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
            stores: StoreStatus {
                rate_clients,
                quota_clients,
            },
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
