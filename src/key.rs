//! Client key derivation.

use axum::http::HeaderMap;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

/// Key shared by every caller whose address could not be determined.
pub const FALLBACK_KEY: &str = "unknown";

/// Identifies one counting bucket. Derived from the caller's network address and
/// never validated for format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    /// Build a key from a raw address string. Blank input collapses to
    /// [`FALLBACK_KEY`].
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            Self::fallback()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_KEY.to_string())
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the client key for an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct KeyExtractor {
    trust_proxy_headers: bool,
}

impl KeyExtractor {
    pub fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }

    /// First `X-Forwarded-For` hop, then `X-Real-IP` (only when proxy headers
    /// are trusted), then the socket peer, then the shared fallback.
    pub fn extract(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientKey {
        if self.trust_proxy_headers {
            if let Some(ip) = forwarded_for(headers).or_else(|| real_ip(headers)) {
                return ClientKey::new(ip);
            }
        }

        match peer {
            Some(addr) => ClientKey::new(addr.ip().to_string()),
            None => {
                tracing::warn!(
                    "Could not determine client address; using shared fallback key"
                );
                ClientKey::fallback()
            }
        }
    }
}

impl Default for KeyExtractor {
    fn default() -> Self {
        Self::new(true)
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

fn real_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

/// A credential counts as present only when its header carries non-blank text.
pub fn has_credential(headers: &HeaderMap, header_name: &str) -> bool {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}
