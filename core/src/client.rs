//! Request builder and the single call operation.
//!
//! # Design
//! `HttpCallClient` holds only a `TransportConfig` and carries no mutable
//! state between calls. A call is split into `build_request` (pure, produces
//! a `PreparedRequest`), `execute` (the only step that does I/O) and
//! `parse_response` (pure, produces a `ResponseDocument`). `call` runs the
//! three in sequence. Every input error surfaces from `build_request`, before
//! anything is sent.

use std::time::{Duration, Instant};

use reqwest::Method;
use url::Url;
use uuid::Uuid;

use crate::error::{CallError, Result};
use crate::headers;
use crate::http::{PreparedRequest, RawResponse};
use crate::response::{BodyMode, ResponseDocument};
use crate::transport::{self, TransportConfig};
use crate::types::{RequestSpec, INFINITE_TIMEOUT};

/// Content type sent with non-GET parameters unless the caller names one.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Stateless client performing one HTTP exchange per call.
#[derive(Debug, Clone, Default)]
pub struct HttpCallClient {
    config: TransportConfig,
}

impl HttpCallClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Build, send and serialize one request.
    pub fn call(&self, spec: &RequestSpec) -> Result<ResponseDocument> {
        let call_id = Uuid::new_v4();
        let span = tracing::info_span!("http_call", %call_id, method = %spec.normalized_method());
        let _guard = span.enter();
        let started = Instant::now();

        let result = self
            .build_request(spec)
            .and_then(|request| self.execute(&request))
            .map(|raw| self.parse_response(&raw, BodyMode::from_flag(spec.response_as_base64)));
        match &result {
            Ok(document) => tracing::info!(
                status = document.status_number,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "call completed"
            ),
            Err(e) => tracing::warn!(error = %e, "call failed"),
        }
        result
    }

    /// Translate a `RequestSpec` into a ready-to-send `PreparedRequest`.
    pub fn build_request(&self, spec: &RequestSpec) -> Result<PreparedRequest> {
        let method = spec.normalized_method();
        Method::from_bytes(method.as_bytes())
            .map_err(|_| CallError::InvalidArgument(format!("{:?} is not a valid HTTP method", spec.method)))?;
        if spec.url.trim().is_empty() {
            return Err(CallError::InvalidArgument("url must not be empty".into()));
        }

        let parameters = spec.effective_parameters();
        let mut url = spec.url.clone();
        if method == "GET" {
            if let Some(params) = parameters {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str(params);
            }
        }
        check_url(&url)?;

        let mut request = PreparedRequest::new(method, url);
        for entry in &spec.headers {
            headers::dispatch(&mut request, entry)?;
        }
        request.timeout = resolve_timeout(spec.timeout_millis)?;
        request.decompress = spec.auto_decompress;

        if request.method != "GET" {
            if let Some(params) = parameters {
                let body = params.as_bytes().to_vec();
                let props = &mut request.properties;
                props.content_length.get_or_insert(body.len() as u64);
                props
                    .content_type
                    .get_or_insert_with(|| FORM_CONTENT_TYPE.to_string());
                request.body = Some(body);
            }
        }
        check_content_length(&request)?;

        tracing::debug!(
            url = %request.url,
            headers = request.headers.len(),
            body = request.body.as_ref().map_or(0, Vec::len),
            "request built"
        );
        Ok(request)
    }

    pub fn execute(&self, request: &PreparedRequest) -> Result<RawResponse> {
        transport::execute(&self.config, request)
    }

    pub fn parse_response(&self, raw: &RawResponse, mode: BodyMode) -> ResponseDocument {
        ResponseDocument::from_raw(raw, mode)
    }
}

/// An explicit length must describe the body actually sent, or the peer waits
/// for bytes that never arrive.
fn check_content_length(request: &PreparedRequest) -> Result<()> {
    let Some(declared) = request.properties.content_length else {
        return Ok(());
    };
    let actual = request.body.as_ref().map_or(0, |b| b.len() as u64);
    if declared != actual {
        return Err(CallError::header_format(
            "Content-Length",
            format!("declares {declared} bytes but the body has {actual}"),
        ));
    }
    Ok(())
}

fn check_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| CallError::InvalidArgument(format!("invalid url {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(CallError::InvalidArgument(format!("unsupported url scheme {other:?}"))),
    }
}

fn resolve_timeout(millis: i32) -> Result<Option<Duration>> {
    match millis {
        INFINITE_TIMEOUT => Ok(None),
        m if m < 0 => Err(CallError::InvalidArgument(format!(
            "timeout must be non-negative or {INFINITE_TIMEOUT}, got {m}"
        ))),
        m => Ok(Some(Duration::from_millis(m as u64))),
    }
}
