//! HTTP exchange types described as plain data.
//!
//! # Design
//! `PreparedRequest` is what the request builder produces and the transport
//! consumes; `RawResponse` is what the transport produces and the serializer
//! consumes. Neither touches the network, so both halves of the core stay
//! deterministic and can be tested without a server.
//!
//! Headers that a transport owns as typed request properties live in
//! `RequestProperties`, separate from the generic, order-preserving header
//! list.

use std::time::Duration;

use crate::types::{Credentials, ProxySpec};

/// A fully configured outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// Upper-cased method.
    pub method: String,
    /// Target URL, including any GET parameters.
    pub url: String,
    /// Pass-through headers in caller order. Repeated names are kept.
    pub headers: Vec<(String, String)>,
    pub properties: RequestProperties,
    /// Credentials presented when the server issues a Basic challenge.
    pub credentials: Option<Credentials>,
    pub proxy: Option<ProxySpec>,
    pub body: Option<Vec<u8>>,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Transparent gzip and deflate decoding.
    pub decompress: bool,
}

impl PreparedRequest {
    pub(crate) fn new(method: String, url: String) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            properties: RequestProperties::default(),
            credentials: None,
            proxy: None,
            body: None,
            timeout: None,
            decompress: false,
        }
    }

    /// First generic header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Header fields set as transport properties rather than generic headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestProperties {
    pub accept: Option<String>,
    pub connection: Option<String>,
    /// `Some` when the caller set it explicitly.
    pub content_length: Option<u64>,
    /// `Some` when the caller set it explicitly.
    pub content_type: Option<String>,
    /// IMF-fixdate.
    pub date: Option<String>,
    pub expect: Option<String>,
    pub host: Option<String>,
    /// IMF-fixdate.
    pub if_modified_since: Option<String>,
    /// Inclusive byte ranges, in the order they were added.
    pub ranges: Vec<(u64, u64)>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestProperties {
    /// Wire representation of every property that is set.
    pub fn header_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let mut push = |name: &'static str, value: &Option<String>| {
            if let Some(v) = value {
                fields.push((name, v.clone()));
            }
        };
        push("Accept", &self.accept);
        push("Connection", &self.connection);
        push("Content-Type", &self.content_type);
        push("Date", &self.date);
        push("Expect", &self.expect);
        push("Host", &self.host);
        push("If-Modified-Since", &self.if_modified_since);
        push("Referer", &self.referer);
        push("User-Agent", &self.user_agent);
        if let Some(length) = self.content_length {
            fields.push(("Content-Length", length.to_string()));
        }
        if let Some(range) = self.range_header() {
            fields.push(("Range", range));
        }
        fields
    }

    /// `bytes=a-b[,c-d...]` when at least one range was added.
    pub fn range_header(&self) -> Option<String> {
        if self.ranges.is_empty() {
            return None;
        }
        let specs: Vec<String> = self
            .ranges
            .iter()
            .map(|(start, end)| format!("{start}-{end}"))
            .collect();
        Some(format!("bytes={}", specs.join(",")))
    }
}

/// A received response with its body fully drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Method of the request that produced this response.
    pub method: String,
    pub status: u16,
    /// Protocol version, e.g. `"1.1"`.
    pub version: String,
    /// Final URL after redirects.
    pub url: String,
    /// One entry per header value, in the order the transport returned them.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
