//! 生成后端失败分类：定义失败类别及其重试语义。
//!
//! Failure classification for the generation backend.
//!
//! Every failure reported by a [`GenerationBackend`](crate::generation::GenerationBackend)
//! carries a [`FailureClass`]. The retry orchestrator only looks at the class to decide
//! whether another attempt is worthwhile; the class also decides which typed
//! [`Error`](crate::Error) variant is surfaced once retries stop.
//!
//! | Class             | Retryable | Surfaced as                 |
//! |-------------------|-----------|-----------------------------|
//! | `timeout`         | yes       | `GenerationTimeout`         |
//! | `rate_limited`    | no        | `UpstreamUnavailable`       |
//! | `server_fault`    | no        | `UpstreamUnavailable`       |
//! | `auth_fault`      | no        | `AuthRequired`              |
//! | `auth_expired`    | no        | `AuthExpired`               |
//! | `quota_exhausted` | no        | `QuotaExhausted`            |
//! | `invalid_request` | no        | `Validation`                |
//! | `unknown`         | no        | `UpstreamUnavailable`       |
//!
//! ## Example
//!
//! ```rust
//! use workout_planner::error_code::FailureClass;
//!
//! let class = FailureClass::from_http_status(504);
//! assert_eq!(class, FailureClass::Timeout);
//! assert!(class.retryable());
//! assert_eq!(class.name(), "timeout");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status classification attached to a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The attempt did not finish in time.
    Timeout,
    /// The backend refused the call because of request rate.
    RateLimited,
    /// Internal error or overload on the backend side.
    ServerFault,
    /// Missing or invalid credentials.
    AuthFault,
    /// Credentials were valid once but have expired or been revoked.
    AuthExpired,
    /// Account usage quota or billing limit reached.
    QuotaExhausted,
    /// The prompt or hints were rejected as malformed.
    InvalidRequest,
    /// Could not be classified.
    Unknown,
}

impl FailureClass {
    /// Returns the standard name (e.g., `"server_fault"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerFault => "server_fault",
            Self::AuthFault => "auth_fault",
            Self::AuthExpired => "auth_expired",
            Self::QuotaExhausted => "quota_exhausted",
            Self::InvalidRequest => "invalid_request",
            Self::Unknown => "unknown",
        }
    }

    /// Only timeout-class failures are retried.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Failures the caller can fix by signing in again.
    #[inline]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthFault | Self::AuthExpired)
    }

    /// Maps a class name or a common provider alias to a `FailureClass`.
    ///
    /// Unknown names map to [`FailureClass::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "timeout" | "deadline_exceeded" | "request_timeout" => Self::Timeout,
            "rate_limited" | "rate_limit_exceeded" => Self::RateLimited,
            "server_fault" | "server_error" | "overloaded" | "unavailable" => Self::ServerFault,
            "auth_fault" | "authentication" | "invalid_api_key" | "unauthorized" => {
                Self::AuthFault
            }
            "auth_expired" | "token_expired" | "forbidden" => Self::AuthExpired,
            "quota_exhausted" | "insufficient_quota" => Self::QuotaExhausted,
            "invalid_request" | "validation" | "bad_request" => Self::InvalidRequest,
            _ => Self::Unknown,
        }
    }

    /// Maps an HTTP status code to the most likely class.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::AuthFault,
            402 => Self::QuotaExhausted,
            403 => Self::AuthExpired,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            500..=503 | 505..=599 => Self::ServerFault,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
