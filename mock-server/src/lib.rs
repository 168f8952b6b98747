//! Echo and fixture HTTP server used to exercise the call core end to end.
//!
//! Every route is deterministic apart from `/delay`, which only waits.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{any, get},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

/// Body of `/bytes`: deliberately not valid UTF-8.
pub const BINARY_BODY: &[u8] = &[0xff, 0x00, 0xfe, 0x80, b'h', b'i', 0xc3, 0x28];

/// Body of `/gzip`, long enough to be worth compressing.
pub const GZIP_TEXT: &str = "compressible text, compressible text, compressible text, compressible text";

/// What `/echo` saw.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    /// Request target as received; absolute-form when sent through a proxy.
    pub uri: String,
    pub path: String,
    pub query: Option<String>,
    /// Every header in arrival order, names lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// All values of `name`.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/cookies", get(cookies))
        .route("/bytes", get(bytes))
        .route("/status/{code}", any(status))
        .route("/delay/{millis}", get(delay))
        .route("/basic-auth/{user}/{password}", get(basic_auth))
        .route("/gzip", get(gzip_text).layer(CompressionLayer::new()))
        .route("/redirect", get(redirect))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Serve on a random loopback port from a background thread with its own runtime.
pub fn spawn() -> std::io::Result<SocketAddr> {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = std_listener.local_addr()?;
    std_listener.set_nonblocking(true)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::spawn(move || {
        let served = runtime.block_on(async {
            let listener = TcpListener::from_std(std_listener)?;
            run(listener).await
        });
        if let Err(e) = served {
            tracing::error!(error = %e, "mock server stopped");
        }
    });
    Ok(addr)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        uri: uri.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn cookies() -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, "a"), (header::SET_COOKIE, "b")]),
        "cookies set",
    )
}

async fn bytes() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], BINARY_BODY)
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "unknown status").into_response(),
    }
}

async fn delay(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "done"
}

async fn basic_auth(Path((user, password)): Path<(String, String)>, headers: HeaderMap) -> Response {
    let expected = format!("Basic {}", STANDARD.encode(format!("{user}:{password}")));
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        (StatusCode::OK, format!("authenticated as {user}")).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"mock\"")],
            "credentials required",
        )
            .into_response()
    }
}

async fn gzip_text() -> &'static str {
    GZIP_TEXT
}

async fn redirect() -> Redirect {
    Redirect::to("/echo")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_serializes_headers_as_pairs() {
        let echo = Echo {
            method: "GET".into(),
            uri: "/echo?a=1".into(),
            path: "/echo".into(),
            query: Some("a=1".into()),
            headers: vec![("accept".into(), "*/*".into())],
            body: String::new(),
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["headers"], serde_json::json!([["accept", "*/*"]]));
        assert_eq!(json["query"], "a=1");
    }

    #[test]
    fn echo_header_lookup_is_case_insensitive() {
        let echo = Echo {
            method: "GET".into(),
            uri: "/".into(),
            path: "/".into(),
            query: None,
            headers: vec![("x-a".into(), "1".into()), ("x-a".into(), "2".into())],
            body: String::new(),
        };
        assert_eq!(echo.header_values("X-A"), vec!["1", "2"]);
        assert_eq!(echo.header("x-b"), None);
    }

    #[test]
    fn binary_body_is_not_utf8() {
        assert!(std::str::from_utf8(BINARY_BODY).is_err());
    }
}
