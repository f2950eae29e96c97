use std::time::Duration;

/// Typed errors for the REST transport.
/// Classifies failures as fatal (bad request/credentials) or transient;
/// the engines never retry either way, callers may.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    // Fatal
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Transient
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::NetworkError(_)
                | Self::Timeout(_)
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Classify an HTTP status code into the appropriate variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 => Self::InvalidRequest(body),
            429 => Self::RateLimited { retry_after: None },
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TransportError::RateLimited { retry_after: None }.is_transient());
        assert!(TransportError::ServerError { status: 503, body: "down".into() }.is_transient());
        assert!(TransportError::NetworkError("reset".into()).is_transient());
        assert!(TransportError::Timeout(Duration::from_secs(10)).is_transient());
    }

    #[test]
    fn fatal_classification() {
        assert!(!TransportError::AuthenticationFailed("bad key".into()).is_transient());
        assert!(!TransportError::InvalidRequest("bad".into()).is_transient());
        assert!(!TransportError::MalformedResponse("truncated".into()).is_transient());
    }

    #[test]
    fn from_status_mapping() {
        assert!(matches!(
            TransportError::from_status(401, "no".into()),
            TransportError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            TransportError::from_status(400, "no".into()),
            TransportError::InvalidRequest(_)
        ));
        assert!(matches!(
            TransportError::from_status(429, "slow".into()),
            TransportError::RateLimited { .. }
        ));
        assert!(matches!(
            TransportError::from_status(502, "gw".into()),
            TransportError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            TransportError::from_status(302, "odd".into()),
            TransportError::InvalidRequest(_)
        ));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(
            TransportError::RateLimited { retry_after: None }.error_kind(),
            "rate_limited"
        );
        assert_eq!(
            TransportError::NetworkError("tcp".into()).error_kind(),
            "network_error"
        );
    }
}
