//! Header-list parsing and special-header dispatch.
//!
//! # Design
//! Callers describe headers as an open-ended list of name/value pairs. A
//! small, closed set of names needs transport-level handling (content
//! framing, credentials, proxy, typed request properties); everything else is
//! forwarded verbatim. The closed set is the declarative `SPECIAL_HEADERS`
//! table, looked up case-insensitively, with pass-through as the explicit
//! default.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;

use crate::error::{CallError, Result};
use crate::http::PreparedRequest;
use crate::types::{Credentials, HeaderEntry, ProxySpec};

/// Header names that are not forwarded as plain headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialHeader {
    ContentLength,
    ContentType,
    BasicCredentials,
    NetworkCredentials,
    Proxy,
    Accept,
    Connection,
    Date,
    Expect,
    Host,
    IfModifiedSince,
    Range,
    Referer,
    TransferEncoding,
    UserAgent,
}

pub const SPECIAL_HEADERS: &[(&str, SpecialHeader)] = &[
    ("Content-Length", SpecialHeader::ContentLength),
    ("Content-Type", SpecialHeader::ContentType),
    ("Authorization-Basic-Credentials", SpecialHeader::BasicCredentials),
    ("Authorization-Network-Credentials", SpecialHeader::NetworkCredentials),
    ("Proxy", SpecialHeader::Proxy),
    ("Accept", SpecialHeader::Accept),
    ("Connection", SpecialHeader::Connection),
    ("Date", SpecialHeader::Date),
    ("Expect", SpecialHeader::Expect),
    ("Host", SpecialHeader::Host),
    ("If-Modified-Since", SpecialHeader::IfModifiedSince),
    ("Range", SpecialHeader::Range),
    ("Referer", SpecialHeader::Referer),
    ("Transfer-Encoding", SpecialHeader::TransferEncoding),
    ("User-Agent", SpecialHeader::UserAgent),
];

impl SpecialHeader {
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        SPECIAL_HEADERS
            .iter()
            .find(|(special, _)| special.eq_ignore_ascii_case(name))
            .map(|(_, kind)| *kind)
    }

    /// Apply `value` to `request`. `name` is the caller's spelling, used in errors.
    fn apply(self, request: &mut PreparedRequest, name: &str, value: &str) -> Result<()> {
        let props = &mut request.properties;
        match self {
            SpecialHeader::ContentLength => {
                let length = value.trim().parse::<u64>().map_err(|_| {
                    CallError::header_format(name, format!("{value:?} is not a non-negative integer"))
                })?;
                props.content_length = Some(length);
            }
            SpecialHeader::ContentType => props.content_type = Some(checked_value(name, value)?),
            SpecialHeader::BasicCredentials => {
                let encoded = STANDARD.encode(value.as_bytes());
                request.headers.push(("Authorization".to_string(), format!("Basic {encoded}")));
            }
            SpecialHeader::NetworkCredentials => {
                request.credentials = Some(Credentials::parse(name, value)?);
            }
            SpecialHeader::Proxy => request.proxy = Some(ProxySpec::parse(name, value)?),
            SpecialHeader::Accept => props.accept = Some(checked_value(name, value)?),
            SpecialHeader::Connection => props.connection = Some(checked_value(name, value)?),
            SpecialHeader::Date => props.date = Some(parse_http_date(name, value)?),
            SpecialHeader::Expect => props.expect = Some(checked_value(name, value)?),
            SpecialHeader::Host => props.host = Some(checked_value(name, value)?),
            SpecialHeader::IfModifiedSince => {
                props.if_modified_since = Some(parse_http_date(name, value)?)
            }
            SpecialHeader::Range => props.ranges.push(parse_range(name, value)?),
            SpecialHeader::Referer => props.referer = Some(checked_value(name, value)?),
            // The body is always sent as-is, so `identity` is the only coding
            // the request can honestly declare, and it is the default framing.
            SpecialHeader::TransferEncoding => {
                if !value.trim().eq_ignore_ascii_case("identity") {
                    return Err(CallError::header_format(
                        name,
                        "only identity is supported; the transport chooses the body framing",
                    ));
                }
            }
            SpecialHeader::UserAgent => props.user_agent = Some(checked_value(name, value)?),
        }
        Ok(())
    }
}

/// Route one caller header to a transport property or the generic list.
pub(crate) fn dispatch(request: &mut PreparedRequest, entry: &HeaderEntry) -> Result<()> {
    match SpecialHeader::lookup(&entry.name) {
        Some(special) => {
            tracing::debug!(header = %entry.name, kind = ?special, "special header");
            special.apply(request, &entry.name, &entry.value)
        }
        None => {
            HeaderName::from_bytes(entry.name.as_bytes())
                .map_err(|_| CallError::header_format(&entry.name, "not a valid header name"))?;
            let value = checked_value(&entry.name, &entry.value)?;
            request.headers.push((entry.name.clone(), value));
            Ok(())
        }
    }
}

fn checked_value(name: &str, value: &str) -> Result<String> {
    HeaderValue::from_str(value)
        .map_err(|_| CallError::header_format(name, "value contains characters not allowed in a header"))?;
    Ok(value.to_string())
}

fn parse_range(name: &str, value: &str) -> Result<(u64, u64)> {
    let mut parts = value.trim().split('-');
    let (Some(start), Some(end)) = (parts.next(), parts.next()) else {
        return Err(CallError::header_format(name, "Range must be specified in a format of start-end"));
    };
    let bound = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| CallError::header_format(name, format!("range bound {:?} is not numeric", s.trim())))
    };
    let (start, end) = (bound(start)?, bound(end)?);
    if start > end {
        return Err(CallError::header_format(name, "range start is greater than range end"));
    }
    Ok((start, end))
}

/// Parse a caller date and render it as an IMF-fixdate.
fn parse_http_date(name: &str, value: &str) -> Result<String> {
    let v = value.trim();
    let parsed = DateTime::parse_from_rfc2822(v)
        .or_else(|_| DateTime::parse_from_rfc3339(v))
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(v, fmt).ok())
                .map(|n| n.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|n| n.and_utc())
        });
    parsed
        .map(|d: DateTime<Utc>| d.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        .ok_or_else(|| CallError::header_format(name, format!("{v:?} is not a recognized date")))
}

/// An ordered list of caller headers parsed from text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<HeaderEntry>);

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonHeader {
    Object {
        #[serde(alias = "Name")]
        name: String,
        #[serde(alias = "Value")]
        value: String,
    },
    Pair(String, String),
}

impl HeaderList {
    /// Parse a header-list document.
    ///
    /// Accepts XML, a root element whose descendant elements each carry a
    /// `Name` attribute and the header value as text:
    ///
    /// ```text
    /// <Headers><Header Name="Accept">text/plain</Header></Headers>
    /// ```
    ///
    /// or a JSON array of `{"name", "value"}` objects or `[name, value]`
    /// pairs. Blank text is an empty list.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            Ok(Self::default())
        } else if text.starts_with('[') {
            Self::parse_json(text)
        } else {
            Self::parse_xml(text)
        }
    }

    fn parse_json(text: &str) -> Result<Self> {
        let headers: Vec<JsonHeader> =
            serde_json::from_str(text).map_err(|e| CallError::HeaderList(e.to_string()))?;
        Ok(Self(
            headers
                .into_iter()
                .map(|h| match h {
                    JsonHeader::Object { name, value } | JsonHeader::Pair(name, value) => {
                        HeaderEntry { name, value }
                    }
                })
                .collect(),
        ))
    }

    fn parse_xml(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut entries: Vec<HeaderEntry> = Vec::new();
        // One slot per open element; `None` for the root.
        let mut open: Vec<Option<usize>> = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => {
                    let slot = if open.is_empty() {
                        open_root(&mut saw_root)?;
                        None
                    } else {
                        Some(push_entry(&mut entries, &start)?)
                    };
                    open.push(slot);
                }
                Event::Empty(start) => {
                    if open.is_empty() {
                        open_root(&mut saw_root)?;
                    } else {
                        push_entry(&mut entries, &start)?;
                    }
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(t) => {
                    let value = t.unescape().map_err(xml_error)?;
                    append_text(&mut entries, &open, &value)?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    append_text(&mut entries, &open, &value)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(CallError::HeaderList("document has no root element".into()));
        }
        if !open.is_empty() {
            return Err(CallError::HeaderList("document ends inside an open element".into()));
        }
        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[HeaderEntry] {
        &self.0
    }

    pub fn into_entries(self) -> Vec<HeaderEntry> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn xml_error(e: impl std::fmt::Display) -> CallError {
    CallError::HeaderList(e.to_string())
}

fn open_root(saw_root: &mut bool) -> Result<()> {
    if *saw_root {
        return Err(CallError::HeaderList("document has more than one root element".into()));
    }
    *saw_root = true;
    Ok(())
}

fn push_entry(entries: &mut Vec<HeaderEntry>, start: &BytesStart<'_>) -> Result<usize> {
    let element = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let name = start
        .try_get_attribute("Name")
        .map_err(xml_error)?
        .ok_or(CallError::MissingHeaderName { element })?
        .unescape_value()
        .map_err(xml_error)?
        .into_owned();
    entries.push(HeaderEntry {
        name,
        value: String::new(),
    });
    Ok(entries.len() - 1)
}

/// Text belongs to every open header element, like an element's string value.
fn append_text(entries: &mut [HeaderEntry], open: &[Option<usize>], text: &str) -> Result<()> {
    if open.is_empty() {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(CallError::HeaderList("text outside the root element".into()));
    }
    for index in open.iter().flatten() {
        entries[*index].value.push_str(text);
    }
    Ok(())
}
