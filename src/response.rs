use axum::{
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

use crate::admission::{Usage, Verdict};
use crate::config::Limits;
use crate::error::ErrorResponse;
use crate::key::ClientKey;
use crate::store::LimitReason;

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const QUOTA_REMAINING: &str = "x-quota-remaining";

#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub allowed: bool,
    pub rate_remaining: u32,
    pub quota_remaining: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub client: ClientKey,
    pub rate_remaining: u32,
    pub quota_remaining: Option<u32>,
    pub limits: Limits,
}

impl UsageResponse {
    pub fn new(client: ClientKey, usage: Usage, limits: Limits) -> Self {
        Self {
            client,
            rate_remaining: usage.rate_remaining,
            quota_remaining: usage.quota_remaining,
            limits,
        }
    }
}

/// Translate a verdict into its HTTP form: `200` with the remaining counts, or
/// `429` with a reason-specific body and `Retry-After`.
pub fn verdict_response(verdict: &Verdict, limit: u32) -> Response {
    match verdict {
        Verdict::Allowed {
            rate_remaining,
            quota_remaining,
        } => {
            let mut resp = Json(AdmissionResponse {
                allowed: true,
                rate_remaining: *rate_remaining,
                quota_remaining: *quota_remaining,
            })
            .into_response();
            insert_usage_headers(resp.headers_mut(), verdict, limit);
            resp
        }
        _ => rejection_response(verdict, limit),
    }
}

/// `429` response for a denied verdict. Allowed verdicts map to an empty `200`.
pub fn rejection_response(verdict: &Verdict, limit: u32) -> Response {
    let body = match verdict {
        Verdict::Allowed { .. } => return StatusCode::OK.into_response(),
        Verdict::RateLimited {
            reason: LimitReason::TooFast,
            ..
        } => ErrorResponse::new(
            "rate_limited",
            "Too many requests. Please wait a moment and try again.",
            429,
        ),
        Verdict::RateLimited {
            reason: LimitReason::WindowFull,
            ..
        } => ErrorResponse::new("rate_limited", "Rate limit exceeded. Try again later.", 429),
        Verdict::QuotaExceeded { .. } => ErrorResponse::new(
            "quota_exceeded",
            "Daily free limit reached. Add your own API key to keep going without the daily cap.",
            429,
        ),
    };

    let mut resp = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    insert_usage_headers(resp.headers_mut(), verdict, limit);
    if let Some(retry_after) = verdict.retry_after() {
        resp.headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
    }
    resp
}

/// Rate-limit headers for any verdict.
pub fn insert_usage_headers(headers: &mut HeaderMap, verdict: &Verdict, limit: u32) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));

    match verdict {
        Verdict::Allowed {
            rate_remaining,
            quota_remaining,
        } => {
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(*rate_remaining));
            if let Some(quota) = quota_remaining {
                headers.insert(QUOTA_REMAINING, HeaderValue::from(*quota));
            }
        }
        Verdict::RateLimited { .. } => {
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0u32));
        }
        Verdict::QuotaExceeded { .. } => {
            headers.insert(QUOTA_REMAINING, HeaderValue::from(0u32));
        }
    }
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = retry_after.as_millis() as u64;
    millis.div_ceil(1000).max(1)
}
