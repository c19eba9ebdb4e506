use crate::error_code::FailureClass;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "request.duration_minutes", "retry.max_attempts")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "request_validator", "generation_backend")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the planning pipeline.
///
/// The type is `Clone` so that every caller coalesced onto one in-flight generation
/// receives the same failure. Foreign errors are captured as messages for that reason.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Generation timed out after {attempts} attempt(s)")]
    GenerationTimeout { attempts: u32 },

    #[error("Generation backend unavailable ({class}) after {attempts} attempt(s): {message}")]
    UpstreamUnavailable {
        class: FailureClass,
        attempts: u32,
        message: String,
    },

    #[error("Authentication required: {message}")]
    AuthRequired { message: String },

    #[error("Authentication expired: {message}")]
    AuthExpired { message: String },

    #[error("Generation quota exhausted after {attempts} attempt(s): {message}")]
    QuotaExhausted { attempts: u32, message: String },

    #[error("Generation record already exists for digest {digest}")]
    DuplicateRecordRace { digest: String },

    #[error("Generated plan has no warm-up, main or cool-down exercises")]
    EmptyPlan,

    #[error("Store error: {message}{}", format_context(.context))]
    Store {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new store error with structured context
    pub fn store_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Store {
            message: msg.into(),
            context,
        }
    }

    /// The caller has no usable profile yet.
    pub fn profile_incomplete(owner_id: &str) -> Self {
        Error::validation_with_context(
            "complete your profile first",
            ErrorContext::new()
                .with_field_path("profile")
                .with_details(format!("owner: {}", owner_id))
                .with_source("profile_provider"),
        )
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. }
            | Error::Configuration { context, .. }
            | Error::Store { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Number of generation attempts made before this error surfaced.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::GenerationTimeout { attempts }
            | Error::UpstreamUnavailable { attempts, .. }
            | Error::QuotaExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Backend classification this error was derived from, if any.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Error::GenerationTimeout { .. } => Some(FailureClass::Timeout),
            Error::UpstreamUnavailable { class, .. } => Some(*class),
            Error::AuthRequired { .. } => Some(FailureClass::AuthFault),
            Error::AuthExpired { .. } => Some(FailureClass::AuthExpired),
            Error::QuotaExhausted { .. } => Some(FailureClass::QuotaExhausted),
            _ => None,
        }
    }

    /// Whether the failure is transient, i.e. a later identical request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::GenerationTimeout { .. } | Error::UpstreamUnavailable { .. }
        )
    }

    /// Single actionable message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message, .. } => message.clone(),
            Error::GenerationTimeout { attempts } => format!(
                "Plan generation took too long after {} attempt(s). Please try again.",
                attempts
            ),
            Error::UpstreamUnavailable { .. } | Error::Transport(_) => {
                "The plan generator is unavailable right now. Try again later.".to_string()
            }
            Error::AuthRequired { .. } => "Please sign in to generate a plan.".to_string(),
            Error::AuthExpired { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            Error::QuotaExhausted { .. } => {
                "You have reached your plan generation limit.".to_string()
            }
            Error::EmptyPlan => {
                "The generated plan was empty. Please try again.".to_string()
            }
            _ => "Something went wrong while generating your plan.".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::configuration_with_context(
            err.to_string(),
            ErrorContext::new().with_source("config_loader"),
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
