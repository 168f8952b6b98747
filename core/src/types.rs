//! Caller-facing input types.
//!
//! # Design
//! `RequestArgs` mirrors the nullable primitives a host passes in.
//! `RequestSpec` is the same request with every default resolved, built once
//! at the start of a call by `RequestArgs::into_spec`. Both are plain data and
//! `RequestSpec` can also be read from JSON with the same defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CallError, Result};
use crate::headers::HeaderList;

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_TIMEOUT_MILLIS: i32 = 30_000;
/// Timeout value meaning "wait indefinitely".
pub const INFINITE_TIMEOUT: i32 = -1;

/// One caller-supplied header, forwarded or dispatched by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Arguments exactly as the caller supplies them. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct RequestArgs {
    pub method: Option<String>,
    pub url: String,
    pub parameters: Option<String>,
    /// Header-list document (XML or JSON, see [`HeaderList::parse`]).
    pub headers: Option<String>,
    pub timeout_millis: Option<i32>,
    pub auto_decompress: Option<bool>,
    pub response_as_base64: Option<bool>,
}

impl RequestArgs {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Apply defaults and parse the header list.
    pub fn into_spec(self) -> Result<RequestSpec> {
        let headers = match self.headers.as_deref() {
            Some(text) => HeaderList::parse(text)?.into_entries(),
            None => Vec::new(),
        };
        Ok(RequestSpec {
            method: self.method.unwrap_or_else(default_method),
            url: self.url,
            body_parameters: self.parameters,
            headers,
            timeout_millis: self.timeout_millis.unwrap_or(DEFAULT_TIMEOUT_MILLIS),
            auto_decompress: self.auto_decompress.unwrap_or(false),
            response_as_base64: self.response_as_base64.unwrap_or(false),
        })
    }
}

/// A fully defaulted request description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body_parameters: Option<String>,
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    #[serde(default = "default_timeout")]
    pub timeout_millis: i32,
    #[serde(default)]
    pub auto_decompress: bool,
    #[serde(default)]
    pub response_as_base64: bool,
}

impl RequestSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            url: url.into(),
            body_parameters: None,
            headers: Vec::new(),
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            auto_decompress: false,
            response_as_base64: false,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn parameters(mut self, parameters: impl Into<String>) -> Self {
        self.body_parameters = Some(parameters.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderEntry::new(name, value));
        self
    }

    pub fn timeout_millis(mut self, millis: i32) -> Self {
        self.timeout_millis = millis;
        self
    }

    pub fn auto_decompress(mut self, enabled: bool) -> Self {
        self.auto_decompress = enabled;
        self
    }

    pub fn response_as_base64(mut self, enabled: bool) -> Self {
        self.response_as_base64 = enabled;
        self
    }

    /// Upper-cased method used for every comparison and on the wire.
    pub fn normalized_method(&self) -> String {
        self.method.trim().to_ascii_uppercase()
    }

    /// Body parameters when present and not blank.
    pub fn effective_parameters(&self) -> Option<&str> {
        self.body_parameters
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

fn default_timeout() -> i32 {
    DEFAULT_TIMEOUT_MILLIS
}

/// A username/password pair. The password is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Parse `username:password`, splitting on the first colon only.
    pub fn parse(header: &str, value: &str) -> Result<Self> {
        let (username, password) = value.split_once(':').ok_or_else(|| {
            CallError::header_format(header, "expected a value in the format username:password")
        })?;
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Explicit proxy parsed from a `Proxy` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySpec {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl ProxySpec {
    /// Parse `host,port[,username:password]`.
    ///
    /// Everything after the second comma is the credential segment, and
    /// everything after its first colon is the password.
    pub fn parse(header: &str, value: &str) -> Result<Self> {
        let mut parts = value.splitn(3, ',');
        let host = parts.next().unwrap_or_default().trim();
        let port = parts.next().ok_or_else(|| {
            CallError::header_format(header, "expected a value in the format host,port[,username:password]")
        })?;
        if host.is_empty() {
            return Err(CallError::header_format(header, "proxy host is empty"));
        }
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| CallError::header_format(header, format!("proxy port {:?} is not numeric", port.trim())))?;
        let credentials = match parts.next() {
            Some(segment) => Some(Credentials::parse(header, segment.trim()).map_err(|_| {
                CallError::header_format(header, "proxy credentials must be in the format username:password")
            })?),
            None => None,
        };
        Ok(Self {
            host: host.to_string(),
            port,
            credentials,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults_are_applied() {
        let spec = RequestArgs::new("http://localhost/").into_spec().unwrap();
        assert_eq!(spec.method, "GET");
        assert_eq!(spec.timeout_millis, 30_000);
        assert!(!spec.auto_decompress);
        assert!(!spec.response_as_base64);
        assert!(spec.headers.is_empty());
        assert!(spec.body_parameters.is_none());
    }

    #[test]
    fn args_parse_header_list() {
        let args = RequestArgs {
            headers: Some(r#"<Headers><Header Name="X-One">1</Header></Headers>"#.to_string()),
            ..RequestArgs::new("http://localhost/")
        };
        let spec = args.into_spec().unwrap();
        assert_eq!(spec.headers, vec![HeaderEntry::new("X-One", "1")]);
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: RequestSpec = serde_json::from_str(r#"{"url":"http://localhost/"}"#).unwrap();
        assert_eq!(spec, RequestSpec::new("http://localhost/"));
    }

    #[test]
    fn spec_deserializes_camel_case_fields() {
        let spec: RequestSpec = serde_json::from_str(
            r#"{"url":"http://h/","method":"post","bodyParameters":"a=1","timeoutMillis":5,
                "autoDecompress":true,"responseAsBase64":true,
                "headers":[{"name":"Accept","value":"*/*"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.normalized_method(), "POST");
        assert_eq!(spec.effective_parameters(), Some("a=1"));
        assert_eq!(spec.timeout_millis, 5);
        assert!(spec.auto_decompress && spec.response_as_base64);
        assert_eq!(spec.headers.len(), 1);
    }

    #[test]
    fn blank_parameters_are_ignored() {
        let spec = RequestSpec::new("http://h/").parameters("   ");
        assert_eq!(spec.effective_parameters(), None);
    }

    #[test]
    fn credentials_split_on_first_colon() {
        let c = Credentials::parse("Authorization-Network-Credentials", "user:pa:ss").unwrap();
        assert_eq!(c.username, "user");
        assert_eq!(c.password, "pa:ss");
    }

    #[test]
    fn credentials_without_colon_fail() {
        let err = Credentials::parse("Authorization-Network-Credentials", "user").unwrap_err();
        assert!(matches!(err, CallError::HeaderFormat { ref header, .. } if header == "Authorization-Network-Credentials"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let c = Credentials::parse("x", "user:secret").unwrap();
        assert!(!format!("{c:?}").contains("secret"));
    }

    #[test]
    fn proxy_without_port_fails() {
        assert!(matches!(
            ProxySpec::parse("Proxy", "proxy.local"),
            Err(CallError::HeaderFormat { .. })
        ));
    }

    #[test]
    fn proxy_with_non_numeric_port_fails() {
        assert!(ProxySpec::parse("Proxy", "proxy.local,http").is_err());
    }

    #[test]
    fn proxy_host_and_port() {
        let p = ProxySpec::parse("Proxy", "proxy.local,8080").unwrap();
        assert_eq!(p.host, "proxy.local");
        assert_eq!(p.port, 8080);
        assert!(p.credentials.is_none());
        assert_eq!(p.url(), "http://proxy.local:8080");
    }

    #[test]
    fn proxy_password_with_colons_is_reassembled() {
        let p = ProxySpec::parse("Proxy", "proxy.local,8080,user:pa:ss").unwrap();
        let creds = p.credentials.unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn proxy_credentials_without_colon_fail() {
        assert!(ProxySpec::parse("Proxy", "proxy.local,8080,user").is_err());
    }
}
