//! Store-level error type.
//!
//! Native store failures arrive as a code plus a message. The code carries a
//! retryability classification the caller can use to decide whether replaying
//! the request makes sense; the driver preserves it when wrapping.

use std::fmt;

/// Well-known native store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum StoreErrorCode {
    /// Table (or other resource) does not exist.
    ResourceNotFound,
    /// Table already exists or is busy with another mutation.
    ResourceInUse,
    /// A conditional write lost.
    ConditionalCheckFailed,
    /// Throughput limit hit; retryable after backoff.
    ProvisionedThroughputExceeded,
    /// Account-wide request limit hit; retryable after backoff.
    RequestLimitExceeded,
    /// Request rejected as malformed.
    #[default]
    Validation,
    /// Request body failed to serialize or deserialize.
    Serialization,
    /// Transient server-side failure; retryable.
    InternalServerError,
    /// Transient unavailability; retryable.
    ServiceUnavailable,
    /// Request was throttled; retryable after backoff.
    Throttling,
}

impl StoreErrorCode {
    /// The short code string as the store reports it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::ResourceInUse => "ResourceInUseException",
            Self::ConditionalCheckFailed => "ConditionalCheckFailedException",
            Self::ProvisionedThroughputExceeded => "ProvisionedThroughputExceededException",
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::Validation => "ValidationException",
            Self::Serialization => "SerializationException",
            Self::InternalServerError => "InternalServerError",
            Self::ServiceUnavailable => "ServiceUnavailableException",
            Self::Throttling => "ThrottlingException",
        }
    }

    /// Whether a request failing with this code may succeed on replay.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProvisionedThroughputExceeded
                | Self::RequestLimitExceeded
                | Self::InternalServerError
                | Self::ServiceUnavailable
                | Self::Throttling
        )
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed native store call.
#[derive(Debug)]
pub struct StoreError {
    /// The native error code.
    pub code: StoreErrorCode,
    /// Human-readable message.
    pub message: String,
    /// The underlying transport or client error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// Create an error from a code, with the code's name as message.
    #[must_use]
    pub fn new(code: StoreErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether replaying the failed request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    // -- Convenience constructors --

    /// Table or resource not found.
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ResourceNotFound, message)
    }

    /// Table already exists.
    #[must_use]
    pub fn resource_in_use(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ResourceInUse, message)
    }

    /// Request rejected as malformed.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::Validation, message)
    }

    /// Transient server-side failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::InternalServerError, message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
