use axum::http::HeaderName;

use crate::config::Limits;
use crate::error::GateError;

/// Validates configuration rules that span more than one field
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the admission limits as a whole
    pub fn validate_limits(limits: &Limits) -> Result<(), GateError> {
        if limits.max_requests == 0 {
            return Err(GateError::Config(
                "Max requests per window must be greater than 0".to_string(),
            ));
        }

        if limits.window.is_zero() {
            return Err(GateError::Config(
                "Rate limit window must be greater than 0".to_string(),
            ));
        }

        if limits.daily_limit == 0 {
            return Err(GateError::Config(
                "Free-tier daily limit must be greater than 0".to_string(),
            ));
        }

        // A spacing as long as the window would be the only limit in effect.
        if limits.min_interval >= limits.window {
            return Err(GateError::Config(format!(
                "Minimum interval ({:?}) must be shorter than the window ({:?})",
                limits.min_interval, limits.window
            )));
        }

        Ok(())
    }

    /// Validates the credential header name
    pub fn validate_credential_header(name: &str) -> Result<(), GateError> {
        if name.trim().is_empty() {
            return Err(GateError::Config(
                "Credential header cannot be empty".to_string(),
            ));
        }

        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            GateError::Config(format!("'{}' is not a valid HTTP header name", name))
        })?;

        Ok(())
    }
}
