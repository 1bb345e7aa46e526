//! Error types for the tempmail-sync crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized by their retryability - see [`Error::is_retryable`].
//!
//! Only [`Error::ServiceUnavailable`] is meant to reach end users once the retry and
//! fallback budget is spent. Its message is stable and carries no provider detail; the
//! underlying causes are logged where they happen.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during mailbox operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Requested mailbox name cannot be sent upstream.
    #[error("invalid mailbox name: '{name}'")]
    InvalidMailboxName {
        /// The rejected name.
        name: String,
    },

    /// Proxy settings could not be turned into an HTTP proxy.
    #[error("invalid proxy {proxy}")]
    InvalidProxy {
        /// Masked proxy URL.
        proxy: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Unsupported services (NOT retryable, surfaced immediately)
    // ─────────────────────────────────────────────────────────────────────────
    /// Caller asked for a mail service this crate does not know.
    #[error("unsupported mail service: '{service}'")]
    UnsupportedService {
        /// The requested service name.
        service: String,
    },

    /// The provider does not implement this operation.
    #[error("operation '{operation}' is not supported by provider '{provider}'")]
    FallbackUnsupported {
        /// Operation name.
        operation: &'static str,
        /// Provider tag.
        provider: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Transport errors (RETRYABLE)
    // ─────────────────────────────────────────────────────────────────────────
    /// HTTP request failed before a response arrived.
    #[error("request to {endpoint} failed")]
    Http {
        /// Endpoint that failed.
        endpoint: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    HttpStatus {
        /// Endpoint that failed.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// Single request exceeded its timeout.
    #[error("request to {endpoint} timed out after {timeout:?}")]
    RequestTimeout {
        /// Endpoint that timed out.
        endpoint: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The HTTP client was released by `cleanup`.
    #[error("HTTP client already closed")]
    ClientClosed,

    // ─────────────────────────────────────────────────────────────────────────
    // Upstream data errors (RETRYABLE at operation level)
    // ─────────────────────────────────────────────────────────────────────────
    /// Upstream response had no mailbox address.
    #[error("{endpoint} response contained no mailbox address")]
    MissingMailbox {
        /// Endpoint that answered.
        endpoint: String,
    },

    /// Upstream returned something that is not an email address.
    #[error("upstream returned invalid mailbox address '{address}'")]
    InvalidMailbox {
        /// The address as returned.
        address: String,
    },

    /// Response body was not the expected JSON.
    #[error("malformed response from {endpoint}")]
    MalformedResponse {
        /// Endpoint that answered.
        endpoint: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// A single message record could not be normalized (skipped, not retried).
    #[error("malformed message record: {reason}")]
    MalformedRecord {
        /// What was wrong with the record.
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Deadlines (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Overall operation deadline elapsed.
    #[error("operation deadline of {timeout:?} exceeded")]
    DeadlineExceeded {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Timeout waiting for a matching message.
    #[error("timeout waiting for matching message after {timeout:?}")]
    WaitTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Exhaustion (surfaced to callers)
    // ─────────────────────────────────────────────────────────────────────────
    /// All retries and the fallback provider were exhausted.
    #[error("mail service is temporarily unavailable, please try again later")]
    ServiceUnavailable,
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http { .. }
            | Error::HttpStatus { .. }
            | Error::RequestTimeout { .. }
            | Error::MissingMailbox { .. }
            | Error::InvalidMailbox { .. }
            | Error::MalformedResponse { .. } => true,

            Error::InvalidConfig { .. }
            | Error::InvalidMailboxName { .. }
            | Error::InvalidProxy { .. }
            | Error::UnsupportedService { .. }
            | Error::FallbackUnsupported { .. }
            | Error::ClientClosed
            | Error::MalformedRecord { .. }
            | Error::DeadlineExceeded { .. }
            | Error::WaitTimeout { .. }
            | Error::ServiceUnavailable => false,
        }
    }

    /// Returns `true` if exhausting retries on this error should escalate to the
    /// fallback provider.
    ///
    /// Caller mistakes are surfaced as-is; everything the upstream can be blamed
    /// for escalates.
    #[must_use]
    pub fn should_fail_over(&self) -> bool {
        self.is_retryable() || matches!(self, Error::ClientClosed)
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. }
            | Error::InvalidMailboxName { .. }
            | Error::InvalidProxy { .. } => ErrorCategory::Configuration,

            Error::UnsupportedService { .. } | Error::FallbackUnsupported { .. } => {
                ErrorCategory::Unsupported
            }

            Error::Http { .. } | Error::HttpStatus { .. } | Error::ClientClosed => {
                ErrorCategory::Network
            }

            Error::RequestTimeout { .. }
            | Error::DeadlineExceeded { .. }
            | Error::WaitTimeout { .. } => ErrorCategory::Timeout,

            Error::MissingMailbox { .. }
            | Error::InvalidMailbox { .. }
            | Error::MalformedResponse { .. }
            | Error::MalformedRecord { .. } => ErrorCategory::UpstreamData,

            Error::ServiceUnavailable => ErrorCategory::Unavailable,
        }
    }

    /// Maps a reqwest failure onto the transport taxonomy.
    pub(crate) fn from_reqwest(endpoint: &str, timeout: Duration, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Error::RequestTimeout {
                endpoint: endpoint.to_string(),
                timeout,
            }
        } else if let Some(status) = source.status() {
            Error::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
        } else {
            Error::Http {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Requested service or operation is not available.
    Unsupported,
    /// Network connectivity errors.
    Network,
    /// Timeout errors.
    Timeout,
    /// Upstream returned unusable data.
    UpstreamData,
    /// Retries and fallback exhausted.
    Unavailable,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Unsupported => write!(f, "unsupported"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::UpstreamData => write!(f, "upstream_data"),
            ErrorCategory::Unavailable => write!(f, "unavailable"),
        }
    }
}
