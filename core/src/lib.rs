//! Single-operation HTTP call core.
//!
//! # Overview
//! Performs one outbound HTTP request described by primitive arguments
//! (method, URL, parameters, a header list, timeout, decompression and
//! base64 flags) and returns a structured `ResponseDocument` describing the
//! response.
//!
//! # Design
//! - `HttpCallClient` is stateless; each call builds its own transport.
//! - A call is split into `build_request` (pure), `execute` (I/O) and
//!   `parse_response` (pure), so the I/O boundary is explicit and both pure
//!   halves are testable without a server.
//! - Caller headers are dispatched through a declarative special-header
//!   table (`headers::SPECIAL_HEADERS`); unknown names pass through verbatim.
//! - A non-2xx status is a document, not an error.

pub mod client;
pub mod error;
pub mod headers;
pub mod http;
pub mod response;
pub mod transport;
pub mod types;

pub use client::HttpCallClient;
pub use error::{CallError, Result};
pub use headers::{HeaderList, SpecialHeader};
pub use http::{PreparedRequest, RawResponse, RequestProperties};
pub use response::{BodyMode, DocumentFormat, ResponseDocument, ResponseHeader};
pub use transport::TransportConfig;
pub use types::{Credentials, HeaderEntry, ProxySpec, RequestArgs, RequestSpec};

/// Perform one HTTP request from caller arguments with default transport settings.
pub fn http_request(args: RequestArgs) -> Result<ResponseDocument> {
    let spec = args.into_spec()?;
    HttpCallClient::new().call(&spec)
}
