//! Generation backend seam.

use crate::error_code::FailureClass;
use crate::{Error, ErrorContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Hints passed alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationHints {
    pub workout_type: String,
    pub experience: String,
    pub duration_minutes: u32,
}

/// One failed backend call, before retry annotation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct BackendFailure {
    pub class: FailureClass,
    pub message: String,
    pub status: Option<u16>,
}

impl BackendFailure {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Typed error for this failure after `attempts` attempts.
    pub fn into_error(self, attempts: u32) -> Error {
        match self.class {
            FailureClass::Timeout => Error::GenerationTimeout { attempts },
            FailureClass::AuthFault => Error::AuthRequired {
                message: self.message,
            },
            FailureClass::AuthExpired => Error::AuthExpired {
                message: self.message,
            },
            FailureClass::QuotaExhausted => Error::QuotaExhausted {
                attempts,
                message: self.message,
            },
            FailureClass::InvalidRequest => Error::validation_with_context(
                self.message,
                ErrorContext::new()
                    .with_details(format!("attempts: {}", attempts))
                    .with_source("generation_backend"),
            ),
            class @ (FailureClass::RateLimited | FailureClass::ServerFault | FailureClass::Unknown) => {
                Error::UpstreamUnavailable {
                    class,
                    attempts,
                    message: self.message,
                }
            }
        }
    }
}

/// Opaque generator: prompt in, loosely structured plan JSON out.
///
/// Calls may take minutes and are not deterministic.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        hints: &GenerationHints,
    ) -> std::result::Result<serde_json::Value, BackendFailure>;

    fn name(&self) -> &'static str;
}
