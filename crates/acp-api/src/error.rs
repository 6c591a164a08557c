use std::fmt;

/// Coarse failure taxonomy shared with the reconciler's reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection failed, timed out, or the response was not JSON.
    Transport,
    /// The service answered with an error object (or an error status).
    Service,
}

/// Errors a single management-service call can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network failure. `connect` is set when the request never reached the
    /// service, which makes a resend safe even for creations.
    Transport { message: String, connect: bool },
    /// The per-call timeout elapsed.
    Timeout,
    /// The response body was not valid JSON, whatever the HTTP status.
    /// `status` lets gateway pages (502/503/504) still count as transient.
    InvalidJson { status: u16, message: String },
    /// The service reported a failure: either a `{code, message}` object
    /// (regardless of HTTP status) or a non-2xx status with a JSON body.
    Service {
        status: u16,
        code: String,
        message: String,
    },
    /// The request body could not be serialized.
    Encode(String),
    /// Valid JSON that does not match the expected record shape.
    Decode(String),
}

impl ApiError {
    pub fn class(&self) -> FailureClass {
        match self {
            ApiError::Service { .. } => FailureClass::Service,
            ApiError::Transport { .. }
            | ApiError::Timeout
            | ApiError::InvalidJson { .. }
            | ApiError::Encode(_)
            | ApiError::Decode(_) => FailureClass::Transport,
        }
    }

    /// Transient conditions worth another attempt: network failures,
    /// timeouts, rate limiting and gateway errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport { .. } | ApiError::Timeout => true,
            ApiError::Service { status, .. } | ApiError::InvalidJson { status, .. } => {
                matches!(status, 429 | 502 | 503 | 504)
            }
            ApiError::Encode(_) | ApiError::Decode(_) => false,
        }
    }

    /// Whether a non-idempotent request can be sent again without risking a
    /// duplicate: it never arrived, or the service refused it outright.
    pub fn is_safe_to_resend(&self) -> bool {
        match self {
            ApiError::Transport { connect, .. } => *connect,
            ApiError::Service { status, .. } | ApiError::InvalidJson { status, .. } => {
                *status == 429
            }
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport {
                connect: e.is_connect(),
                message: e.to_string(),
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport { message, .. } => write!(f, "transport error: {message}"),
            ApiError::Timeout => write!(f, "transport error: call timed out"),
            ApiError::InvalidJson { status, message } => {
                write!(f, "transport error: invalid json (status={status}): {message}")
            }
            ApiError::Service {
                status,
                code,
                message,
            } => write!(f, "service error status={status} code={code}: {message}"),
            ApiError::Encode(msg) => write!(f, "encode error: {msg}"),
            ApiError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(status: u16) -> ApiError {
        ApiError::Service {
            status,
            code: "x".to_string(),
            message: "y".to_string(),
        }
    }

    #[test]
    fn display_service_error() {
        let err = ApiError::Service {
            status: 200,
            code: "409".to_string(),
            message: "exists".to_string(),
        };
        assert_eq!(err.to_string(), "service error status=200 code=409: exists");
    }

    #[test]
    fn classes_follow_taxonomy() {
        assert_eq!(service(409).class(), FailureClass::Service);
        assert_eq!(ApiError::Timeout.class(), FailureClass::Transport);
        let html = ApiError::InvalidJson {
            status: 502,
            message: "<html>".to_string(),
        };
        assert_eq!(html.class(), FailureClass::Transport);
    }

    #[test]
    fn retryable_statuses() {
        for s in [429, 502, 503, 504] {
            assert!(service(s).is_retryable(), "status {s}");
        }
        for s in [200, 400, 401, 404, 409, 500] {
            assert!(!service(s).is_retryable(), "status {s}");
        }
        assert!(ApiError::Timeout.is_retryable());
        assert!(!ApiError::Decode("x".to_string()).is_retryable());
    }

    #[test]
    fn non_json_gateway_pages_are_retryable_but_other_garbage_is_not() {
        let page = |status| ApiError::InvalidJson {
            status,
            message: "<html>".to_string(),
        };
        for s in [429, 502, 503, 504] {
            assert!(page(s).is_retryable(), "status {s}");
        }
        assert!(!page(200).is_retryable());
        assert!(!page(500).is_retryable());
        assert!(page(429).is_safe_to_resend());
        assert!(!page(503).is_safe_to_resend());
    }

    #[test]
    fn only_unsent_or_rate_limited_requests_are_safe_to_resend() {
        let refused = ApiError::Transport {
            message: "refused".to_string(),
            connect: true,
        };
        let reset = ApiError::Transport {
            message: "reset".to_string(),
            connect: false,
        };
        assert!(refused.is_safe_to_resend());
        assert!(!reset.is_safe_to_resend());
        assert!(service(429).is_safe_to_resend());
        assert!(!service(503).is_safe_to_resend());
        assert!(!ApiError::Timeout.is_safe_to_resend());
    }
}
