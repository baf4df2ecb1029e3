//! Upstream failure classification.

use thiserror::Error;

/// Failure of a call to the weather provider.
///
/// Only `Transient` failures are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Timeouts, connection errors and HTTP 408/429/500/502/503/504.
    #[error("transient upstream failure (status {status:?}): {reason}")]
    Transient { status: Option<u16>, reason: String },

    /// Any other 4xx, or a body that cannot be used.
    #[error("permanent upstream failure (status {status:?}): {reason}")]
    Permanent { status: Option<u16>, reason: String },
}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            status: None,
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            reason: reason.into(),
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match status {
            408 | 429 | 500 | 502 | 503 | 504 => Self::Transient {
                status: Some(status),
                reason,
            },
            _ => Self::Permanent {
                status: Some(status),
                reason,
            },
        }
    }

    /// Classify a transport-level error. The URL is stripped so the API key
    /// never reaches logs.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let is_builder = err.is_builder();
        let reason = err.without_url().to_string();
        if let Some(code) = status {
            return Self::from_status(code, reason);
        }
        if is_builder {
            Self::Permanent { status, reason }
        } else {
            Self::Transient { status, reason }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Permanent { status, .. } => *status,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient { reason, .. } | Self::Permanent { reason, .. } => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert!(FetchError::from_status(code, "x").is_transient(), "{code}");
        }
        for code in [400, 401, 403, 404, 422, 501] {
            assert!(!FetchError::from_status(code, "x").is_transient(), "{code}");
        }
    }

    #[test]
    fn test_accessors() {
        let err = FetchError::from_status(503, "maintenance");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.reason(), "maintenance");
        assert!(err.to_string().contains("transient"));

        let err = FetchError::permanent("bad body");
        assert_eq!(err.status(), None);
    }
}
