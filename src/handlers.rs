use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName},
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::admission::{Admission, Verdict};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, Limits};
use crate::error::{GateError, Result};
use crate::health::HealthChecker;
use crate::key::{has_credential, ClientKey, KeyExtractor};
use crate::metrics::AdmissionMetrics;
use crate::response::{verdict_response, UsageResponse};

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Everything a request needs to reach an admission verdict
pub struct AppState {
    pub admission: Admission,
    pub limits: Limits,
    pub clock: Arc<dyn Clock>,
    pub keys: KeyExtractor,
    pub credential_header: HeaderName,
    pub metrics: AdmissionMetrics,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(
        admission: Admission,
        limits: Limits,
        clock: Arc<dyn Clock>,
        keys: KeyExtractor,
        credential_header: HeaderName,
    ) -> Self {
        Self {
            admission,
            limits,
            clock,
            keys,
            credential_header,
            metrics: AdmissionMetrics::new(),
            health: HealthChecker::new(),
        }
    }

    /// In-memory stores on the system clock, as configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let limits = config.limits();
        let credential_header = HeaderName::from_bytes(config.credential_header.as_bytes())
            .map_err(|e| GateError::Config(format!("Invalid credential header: {}", e)))?;

        Ok(Self::new(
            Admission::from_limits(&limits),
            limits,
            Arc::new(SystemClock),
            KeyExtractor::new(config.trust_proxy_headers),
            credential_header,
        ))
    }

    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientKey {
        self.keys.extract(headers, peer)
    }

    pub fn has_credential(&self, headers: &HeaderMap) -> bool {
        has_credential(headers, self.credential_header.as_str())
    }

    /// Run one admission check for a request and count the outcome.
    pub fn admit(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Verdict {
        let key = self.client_key(headers, peer);
        let verdict = self
            .admission
            .decide(&key, self.has_credential(headers), self.clock.now());
        self.metrics.record(verdict.kind());
        verdict
    }
}

fn peer_addr(connect_info: Option<ConnectInfo<SocketAddr>>) -> Option<SocketAddr> {
    connect_info.map(|ConnectInfo(addr)| addr)
}

/// Run an admission check for the caller
pub async fn admit(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let verdict = state.admit(&headers, peer_addr(connect_info));
    verdict_response(&verdict, state.limits.max_requests)
}

/// Remaining allowance for the caller, without consuming any
pub async fn usage(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let key = state.client_key(&headers, peer_addr(connect_info));
    let usage = state
        .admission
        .usage(&key, state.has_credential(&headers), state.clock.now());

    Json(UsageResponse::new(key, usage, state.limits))
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.health.check_health(&state.admission))
}

/// Verdict counters since startup
pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
