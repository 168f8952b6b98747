//! Response document and its serializer.
//!
//! # Design
//! `ResponseDocument::from_raw` is a pure function of a drained
//! `RawResponse`. Headers are grouped by name in first-appearance order, so a
//! name the server sent several times becomes one entry with every value in
//! transport order. The `headers` shape is the same for zero, one or many
//! values.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use encoding_rs::UTF_8;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{CallError, Result};
use crate::http::RawResponse;

/// Charset reported when a content type carries none.
const DEFAULT_CHARSET: &str = "ISO-8859-1";

/// How the response body is carried in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// UTF-8 text.
    Text,
    /// Base64 of the exact bytes.
    Base64,
}

impl BodyMode {
    pub fn from_flag(response_as_base64: bool) -> Self {
        if response_as_base64 {
            BodyMode::Base64
        } else {
            BodyMode::Text
        }
    }

    fn encode(self, bytes: &[u8]) -> String {
        match self {
            BodyMode::Base64 => STANDARD.encode(bytes),
            // A UTF-8 or UTF-16 byte-order mark selects the decoder and is dropped;
            // without one the body is read as UTF-8.
            BodyMode::Text => UTF_8.decode(bytes).0.into_owned(),
        }
    }
}

/// Output format of a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Xml,
}

/// One response header name with all of its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub name: String,
    pub values: Vec<String>,
}

/// Structured description of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDocument {
    pub character_set: String,
    pub content_encoding: String,
    /// `-1` when the server sent no Content-Length.
    pub content_length: i64,
    pub content_type: String,
    pub cookies_count: usize,
    pub header_count: usize,
    pub headers: Vec<ResponseHeader>,
    pub is_from_cache: bool,
    pub is_mutually_authenticated: bool,
    pub last_modified: Option<String>,
    pub method: String,
    pub protocol_version: String,
    pub response_uri: String,
    pub server: String,
    pub status_code: String,
    pub status_number: u16,
    pub status_description: String,
    pub supports_headers: bool,
    pub body: String,
}

impl ResponseDocument {
    pub fn from_raw(raw: &RawResponse, mode: BodyMode) -> Self {
        let headers = group_headers(&raw.headers);
        let content_type = raw.header("Content-Type").unwrap_or_default().to_string();
        let status = StatusCode::from_u16(raw.status).ok();
        let reason = status.and_then(|s| s.canonical_reason()).unwrap_or_default();

        ResponseDocument {
            character_set: character_set(&content_type),
            content_encoding: raw.header("Content-Encoding").unwrap_or_default().to_string(),
            content_length: raw
                .header("Content-Length")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(-1),
            content_type,
            cookies_count: raw.header_values("Set-Cookie").count(),
            header_count: headers.len(),
            headers,
            is_from_cache: false,
            is_mutually_authenticated: false,
            last_modified: raw.header("Last-Modified").map(str::to_string),
            method: raw.method.clone(),
            protocol_version: raw.version.clone(),
            response_uri: raw.url.clone(),
            server: raw.header("Server").unwrap_or_default().to_string(),
            status_code: status_name(raw.status, reason),
            status_number: raw.status,
            status_description: reason.to_string(),
            supports_headers: true,
            body: mode.encode(&raw.body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_number)
    }

    /// All values of the header `name`, compared case-insensitively.
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.values.as_slice())
    }

    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Json => self.to_json(),
            DocumentFormat::Xml => self.to_xml(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CallError::Serialization(e.to_string()))
    }

    /// Render as a `<Response>` element with one child per field.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = XmlOut::new();
        xml.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        xml.open("Response")?;
        xml.leaf("CharacterSet", &self.character_set)?;
        xml.leaf("ContentEncoding", &self.content_encoding)?;
        xml.leaf("ContentLength", &self.content_length.to_string())?;
        xml.leaf("ContentType", &self.content_type)?;
        xml.leaf("CookiesCount", &self.cookies_count.to_string())?;
        xml.leaf("HeadersCount", &self.header_count.to_string())?;
        xml.open("Headers")?;
        for header in &self.headers {
            xml.open("Header")?;
            xml.leaf("Name", &header.name)?;
            xml.open("Values")?;
            for value in &header.values {
                xml.leaf("Value", value)?;
            }
            xml.close("Values")?;
            xml.close("Header")?;
        }
        xml.close("Headers")?;
        xml.leaf("IsFromCache", &self.is_from_cache.to_string())?;
        xml.leaf("IsMutuallyAuthenticated", &self.is_mutually_authenticated.to_string())?;
        xml.leaf("LastModified", self.last_modified.as_deref().unwrap_or_default())?;
        xml.leaf("Method", &self.method)?;
        xml.leaf("ProtocolVersion", &self.protocol_version)?;
        xml.leaf("ResponseUri", &self.response_uri)?;
        xml.leaf("Server", &self.server)?;
        xml.leaf("StatusCode", &self.status_code)?;
        xml.leaf("StatusNumber", &self.status_number.to_string())?;
        xml.leaf("StatusDescription", &self.status_description)?;
        xml.leaf("SupportsHeaders", &self.supports_headers.to_string())?;
        xml.leaf("Body", &self.body)?;
        xml.close("Response")?;
        xml.finish()
    }
}

struct XmlOut(Writer<Cursor<Vec<u8>>>);

impl XmlOut {
    fn new() -> Self {
        XmlOut(Writer::new(Cursor::new(Vec::new())))
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.0
            .write_event(event)
            .map_err(|e| CallError::Serialization(e.to_string()))
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(name)?;
        if !text.is_empty() {
            self.event(Event::Text(BytesText::new(text)))?;
        }
        self.close(name)
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.0.into_inner().into_inner())
            .map_err(|e| CallError::Serialization(e.to_string()))
    }
}

/// Group `(name, value)` pairs by case-insensitive name, first appearance first.
fn group_headers(pairs: &[(String, String)]) -> Vec<ResponseHeader> {
    let mut grouped: Vec<ResponseHeader> = Vec::new();
    for (name, value) in pairs {
        match grouped.iter_mut().find(|h| h.name.eq_ignore_ascii_case(name)) {
            Some(header) => header.values.push(value.clone()),
            None => grouped.push(ResponseHeader {
                name: name.clone(),
                values: vec![value.clone()],
            }),
        }
    }
    grouped
}

fn character_set(content_type: &str) -> String {
    if content_type.trim().is_empty() {
        return String::new();
    }
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| DEFAULT_CHARSET.to_string())
}

/// `"Not Found"` becomes `"NotFound"`; unknown codes render as the number.
fn status_name(status: u16, reason: &str) -> String {
    if reason.is_empty() {
        return status.to_string();
    }
    reason
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, headers: &[(&str, &str)], body: &[u8]) -> RawResponse {
        RawResponse {
            method: "GET".into(),
            status,
            version: "1.1".into(),
            url: "http://localhost/echo".into(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn repeated_headers_are_grouped() {
        let doc = ResponseDocument::from_raw(
            &raw(200, &[("set-cookie", "a"), ("server", "mock"), ("set-cookie", "b")], b""),
            BodyMode::Text,
        );
        assert_eq!(doc.header_count, 2);
        assert_eq!(doc.headers[0].name, "set-cookie");
        assert_eq!(doc.headers[0].values, vec!["a", "b"]);
        assert_eq!(doc.headers[1].values, vec!["mock"]);
        assert_eq!(doc.cookies_count, 2);
        assert_eq!(doc.server, "mock");
    }

    #[test]
    fn zero_headers_still_produce_a_list() {
        let doc = ResponseDocument::from_raw(&raw(204, &[], b""), BodyMode::Text);
        assert_eq!(doc.header_count, 0);
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["headers"], serde_json::json!([]));
        assert_eq!(json["contentLength"], -1);
        assert_eq!(json["characterSet"], "");
    }

    #[test]
    fn base64_body_preserves_exact_bytes() {
        let bytes = [0xffu8, 0x00, 0xfe, 0x80, b'h', b'i'];
        let doc = ResponseDocument::from_raw(&raw(200, &[], &bytes), BodyMode::Base64);
        assert_eq!(STANDARD.decode(&doc.body).unwrap(), bytes);
    }

    #[test]
    fn text_body_is_utf8_without_bom() {
        let doc = ResponseDocument::from_raw(&raw(200, &[], "\u{feff}héllo".as_bytes()), BodyMode::Text);
        assert_eq!(doc.body, "héllo");
    }

    #[test]
    fn utf16_bodies_are_decoded_by_their_bom() {
        let le = [0xff, 0xfe, b'h', 0x00, 0xe9, 0x00];
        let doc = ResponseDocument::from_raw(&raw(200, &[], &le), BodyMode::Text);
        assert_eq!(doc.body, "h\u{e9}");

        let be = [0xfe, 0xff, 0x00, b'o', 0x00, b'k'];
        let doc = ResponseDocument::from_raw(&raw(200, &[], &be), BodyMode::Text);
        assert_eq!(doc.body, "ok");
    }

    #[test]
    fn invalid_utf8_is_replaced_in_text_mode() {
        let doc = ResponseDocument::from_raw(&raw(200, &[], &[b'a', 0xff, b'b']), BodyMode::Text);
        assert_eq!(doc.body, "a\u{fffd}b");
    }

    #[test]
    fn status_metadata() {
        let doc = ResponseDocument::from_raw(&raw(404, &[], b""), BodyMode::Text);
        assert_eq!(doc.status_number, 404);
        assert_eq!(doc.status_code, "NotFound");
        assert_eq!(doc.status_description, "Not Found");
        assert!(!doc.is_success());

        let doc = ResponseDocument::from_raw(&raw(299, &[], b""), BodyMode::Text);
        assert_eq!(doc.status_code, "299");
        assert_eq!(doc.status_description, "");
    }

    #[test]
    fn content_metadata() {
        let doc = ResponseDocument::from_raw(
            &raw(
                200,
                &[
                    ("Content-Type", "text/html; charset=\"utf-8\""),
                    ("Content-Length", "10"),
                    ("Content-Encoding", "gzip"),
                    ("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
                ],
                b"",
            ),
            BodyMode::Text,
        );
        assert_eq!(doc.character_set, "utf-8");
        assert_eq!(doc.content_length, 10);
        assert_eq!(doc.content_encoding, "gzip");
        assert_eq!(doc.last_modified.as_deref(), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
    }

    #[test]
    fn content_type_without_charset_reports_default() {
        assert_eq!(character_set("application/json"), "ISO-8859-1");
        assert_eq!(character_set(""), "");
    }

    #[test]
    fn json_uses_camel_case_schema() {
        let doc = ResponseDocument::from_raw(&raw(200, &[("x-one", "1")], b"ok"), BodyMode::Text);
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["headerCount"], 1);
        assert_eq!(json["headers"][0]["name"], "x-one");
        assert_eq!(json["headers"][0]["values"], serde_json::json!(["1"]));
        assert_eq!(json["isFromCache"], false);
        assert_eq!(json["isMutuallyAuthenticated"], false);
        assert_eq!(json["responseUri"], "http://localhost/echo");
        assert_eq!(json["statusNumber"], 200);
        assert_eq!(json["body"], "ok");
    }

    #[test]
    fn xml_rendering_escapes_and_nests_values() {
        let doc = ResponseDocument::from_raw(
            &raw(200, &[("set-cookie", "a"), ("set-cookie", "b")], b"<tag> & more"),
            BodyMode::Text,
        );
        let xml = doc.to_xml().unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(
            "<Headers><Header><Name>set-cookie</Name><Values><Value>a</Value><Value>b</Value></Values></Header></Headers>"
        ));
        assert!(xml.contains("<Body>&lt;tag&gt; &amp; more</Body>"));
        assert!(xml.contains("<StatusCode>OK</StatusCode>"));
        assert!(xml.ends_with("</Response>"));
    }
}
