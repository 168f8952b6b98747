//! Blocking execution of a `PreparedRequest`.
//!
//! # Design
//! A fresh `reqwest::blocking::Client` is built for every call, so proxy,
//! timeout and decompression settings never leak between invocations and
//! nothing is pooled across calls. The TLS 1.2 floor is part of building that
//! client rather than process-wide state.
//!
//! Non-2xx statuses are returned as responses, never as errors.

use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use reqwest::{redirect, tls, Method, Proxy, StatusCode, Version};
use serde::Deserialize;

use crate::error::{CallError, Result};
use crate::http::{PreparedRequest, RawResponse};
use crate::types::Credentials;

pub const DEFAULT_MAX_REDIRECTS: usize = 50;

/// Transport settings shared by every call made through one client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportConfig {
    /// Redirects followed before giving up; `0` returns 3xx responses as-is.
    pub max_redirects: usize,
    /// Honor `HTTP_PROXY`-style environment settings when no `Proxy` header is given.
    pub use_system_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            use_system_proxy: false,
        }
    }
}

/// Send `request` and drain the response.
pub fn execute(config: &TransportConfig, request: &PreparedRequest) -> Result<RawResponse> {
    let client = build_client(config, request)?;
    tracing::debug!(method = %request.method, url = %request.url, "sending request");

    let started = Instant::now();
    let mut response = send(&client, request, None, request.timeout)?;
    if let Some(credentials) = &request.credentials {
        if response.status() == StatusCode::UNAUTHORIZED && offers_basic(response.headers()) {
            tracing::debug!(user = %credentials.username, "basic challenge received, re-sending with credentials");
            drop(response);
            let budget = remaining(request.timeout, started.elapsed())?;
            response = send(&client, request, Some(credentials), budget)?;
        }
    }
    drain(request, response)
}

fn build_client(config: &TransportConfig, request: &PreparedRequest) -> Result<Client> {
    let policy = if config.max_redirects == 0 {
        redirect::Policy::none()
    } else {
        redirect::Policy::limited(config.max_redirects)
    };
    let builder = Client::builder()
        .min_tls_version(tls::Version::TLS_1_2)
        .gzip(request.decompress)
        .deflate(request.decompress)
        .redirect(policy)
        .timeout(request.timeout);

    let builder = match &request.proxy {
        Some(spec) => {
            let mut proxy = Proxy::all(spec.url()).map_err(|e| CallError::header_format("Proxy", e.to_string()))?;
            if let Some(c) = &spec.credentials {
                proxy = proxy.basic_auth(&c.username, &c.password);
            }
            builder.proxy(proxy)
        }
        None if !config.use_system_proxy => builder.no_proxy(),
        None => builder,
    };
    builder.build().map_err(|e| CallError::Transport(error_chain(&e)))
}

/// Time left of the call's timeout after `elapsed`; the whole exchange shares one budget.
fn remaining(timeout: Option<Duration>, elapsed: Duration) -> Result<Option<Duration>> {
    let Some(total) = timeout else {
        return Ok(None);
    };
    match total.checked_sub(elapsed) {
        Some(left) if !left.is_zero() => Ok(Some(left)),
        _ => Err(CallError::Timeout {
            millis: total.as_millis() as u64,
        }),
    }
}

fn send(
    client: &Client,
    request: &PreparedRequest,
    credentials: Option<&Credentials>,
    timeout: Option<Duration>,
) -> Result<Response> {
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|_| CallError::InvalidArgument(format!("{:?} is not a valid HTTP method", request.method)))?;
    let mut builder = client.request(method, request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (name, value) in request.properties.header_fields() {
        builder = builder.header(name, value);
    }
    if let Some(c) = credentials {
        builder = builder.basic_auth(&c.username, Some(&c.password));
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.send().map_err(|e| failure(e, request.timeout))
}

/// Read status, headers and the whole body; the response is consumed here.
fn drain(request: &PreparedRequest, response: Response) -> Result<RawResponse> {
    let status = response.status().as_u16();
    let version = protocol_version(response.version());
    let url = response.url().to_string();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.bytes().map_err(|e| failure(e, request.timeout))?.to_vec();
    tracing::debug!(status, bytes = body.len(), "response drained");

    Ok(RawResponse {
        method: request.method.clone(),
        status,
        version,
        url,
        headers,
        body,
    })
}

fn offers_basic(headers: &HeaderMap) -> bool {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|challenge| challenge.split_whitespace().next())
        .any(|scheme| scheme.eq_ignore_ascii_case("basic"))
}

fn protocol_version(version: Version) -> String {
    let text = if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_11 {
        "1.1"
    } else if version == Version::HTTP_2 {
        "2.0"
    } else if version == Version::HTTP_3 {
        "3.0"
    } else {
        return format!("{version:?}");
    };
    text.to_string()
}

fn failure(err: reqwest::Error, timeout: Option<Duration>) -> CallError {
    if err.is_timeout() {
        CallError::Timeout {
            millis: timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
        }
    } else {
        CallError::Transport(error_chain(&err))
    }
}

/// `err` followed by each of its sources, so the root cause is visible.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.max_redirects, 50);
        assert!(!config.use_system_proxy);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: TransportConfig = serde_json::from_str(r#"{"maxRedirects":3}"#).unwrap();
        assert_eq!(config.max_redirects, 3);
        assert!(!config.use_system_proxy);
    }

    #[test]
    fn basic_challenge_detection() {
        let mut headers = HeaderMap::new();
        assert!(!offers_basic(&headers));
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("Negotiate"));
        assert!(!offers_basic(&headers));
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"mock\""));
        assert!(offers_basic(&headers));
    }

    #[test]
    fn resend_gets_only_the_remaining_budget() {
        assert_eq!(remaining(None, Duration::from_secs(90)).unwrap(), None);
        assert_eq!(
            remaining(Some(Duration::from_millis(1000)), Duration::from_millis(400)).unwrap(),
            Some(Duration::from_millis(600))
        );
        for elapsed in [1000, 1500] {
            let err = remaining(Some(Duration::from_millis(1000)), Duration::from_millis(elapsed)).unwrap_err();
            assert!(matches!(err, CallError::Timeout { millis: 1000 }), "{elapsed}: {err}");
        }
    }

    #[test]
    fn protocol_versions_render_as_numbers() {
        assert_eq!(protocol_version(Version::HTTP_11), "1.1");
        assert_eq!(protocol_version(Version::HTTP_2), "2.0");
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        // Port 9 on loopback is discard; nothing listens there in test environments.
        let request = PreparedRequest {
            timeout: Some(Duration::from_secs(5)),
            ..PreparedRequest::new("GET".into(), "http://127.0.0.1:9/".into())
        };
        let err = execute(&TransportConfig::default(), &request).unwrap_err();
        assert!(matches!(err, CallError::Transport(_) | CallError::Timeout { .. }));
        assert!(!err.is_input_error());
    }
}
