//! Error types for a single HTTP call.
//!
//! # Design
//! Input errors (bad URL, malformed header list, malformed special-header
//! value) are raised by the request builder before anything touches the
//! network. Transport errors come from the exchange itself. A response with a
//! non-2xx status is never an error: it is returned as a document, so callers
//! can tell "the server said 404" apart from "the call failed outright".

use thiserror::Error;

/// Errors returned by `HttpCallClient` and [`crate::http_request`].
#[derive(Debug, Error)]
pub enum CallError {
    /// A caller argument is missing or unusable (URL, method, timeout).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The header-list document could not be parsed.
    #[error("malformed header list: {0}")]
    HeaderList(String),

    /// A header element has no `Name` attribute.
    #[error("header element <{element}> is missing the Name attribute")]
    MissingHeaderName { element: String },

    /// A header value does not have the shape its name requires.
    #[error("invalid value for header {header}: {message}")]
    HeaderFormat { header: String, message: String },

    /// The exchange did not complete within the timeout.
    #[error("request timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// Connect, DNS, TLS or protocol failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response document could not be rendered.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl CallError {
    pub(crate) fn header_format(header: &str, message: impl Into<String>) -> Self {
        CallError::HeaderFormat {
            header: header.to_string(),
            message: message.into(),
        }
    }

    /// True for errors raised before any network I/O was attempted.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CallError::InvalidArgument(_)
                | CallError::HeaderList(_)
                | CallError::MissingHeaderName { .. }
                | CallError::HeaderFormat { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CallError>;
