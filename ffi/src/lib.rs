//! C-ABI wrapper around `webcall-core`.
//!
//! # Overview
//! Exposes the single HTTP call operation through `extern "C"` functions so
//! any host with a C FFI can perform a request and receive the response
//! document as text, without linking to Rust's HTTP stack directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Optional arguments follow C conventions: a null string means "not
//!   supplied", `timeout_ms == 0` means the default, and flags are tri-state
//!   (`-1` default, `0` false, `1` true).
//! - A single `FfiCallResult` envelope carries either the document or an
//!   error. The caller owns it and must release it with `webcall_free_result`.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::catch_unwind;

use webcall_core::{CallError, DocumentFormat, RequestArgs};

use types::*;

// ---------------------------------------------------------------------------
// Call functions
// ---------------------------------------------------------------------------

/// Perform one HTTP request and return the response document as JSON.
///
/// `url` is required; every other pointer may be null. `headers` is a
/// header-list document (XML `<Headers><Header Name="...">value</Header>...`
/// or a JSON array of name/value pairs).
/// The caller must free the returned pointer with `webcall_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_http_request(
    method: *const c_char,
    url: *const c_char,
    parameters: *const c_char,
    headers: *const c_char,
    timeout_ms: i32,
    auto_decompress: i32,
    response_as_base64: i32,
) -> *mut FfiCallResult {
    catch_unwind(|| {
        call(
            DocumentFormat::Json,
            method,
            url,
            parameters,
            headers,
            timeout_ms,
            auto_decompress,
            response_as_base64,
        )
    })
    .unwrap_or_else(|_| FfiCallResult::panic("panic in webcall_http_request"))
}

/// Same as `webcall_http_request`, rendering the document as XML.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_http_request_xml(
    method: *const c_char,
    url: *const c_char,
    parameters: *const c_char,
    headers: *const c_char,
    timeout_ms: i32,
    auto_decompress: i32,
    response_as_base64: i32,
) -> *mut FfiCallResult {
    catch_unwind(|| {
        call(
            DocumentFormat::Xml,
            method,
            url,
            parameters,
            headers,
            timeout_ms,
            auto_decompress,
            response_as_base64,
        )
    })
    .unwrap_or_else(|_| FfiCallResult::panic("panic in webcall_http_request_xml"))
}

#[allow(clippy::too_many_arguments)]
fn call(
    format: DocumentFormat,
    method: *const c_char,
    url: *const c_char,
    parameters: *const c_char,
    headers: *const c_char,
    timeout_ms: i32,
    auto_decompress: i32,
    response_as_base64: i32,
) -> *mut FfiCallResult {
    if url.is_null() {
        return FfiCallResult::null_arg("url");
    }
    let args = match read_args(method, url, parameters, headers) {
        Ok((method, url, parameters, headers)) => RequestArgs {
            method,
            url,
            parameters,
            headers,
            timeout_millis: (timeout_ms != 0).then_some(timeout_ms),
            auto_decompress: tri_state(auto_decompress),
            response_as_base64: tri_state(response_as_base64),
        },
        Err(e) => return FfiCallResult::from_error(e),
    };

    let rendered = webcall_core::http_request(args)
        .and_then(|doc| doc.render(format).map(|text| (doc.status_number, text)));
    match rendered {
        Ok((status, document)) => FfiCallResult::ok(status, document),
        Err(e) => FfiCallResult::from_error(e),
    }
}

type Strings = (Option<String>, String, Option<String>, Option<String>);

fn read_args(
    method: *const c_char,
    url: *const c_char,
    parameters: *const c_char,
    headers: *const c_char,
) -> Result<Strings, CallError> {
    Ok((
        optional_str(method, "method")?,
        optional_str(url, "url")?.unwrap_or_default(),
        optional_str(parameters, "parameters")?,
        optional_str(headers, "headers")?,
    ))
}

/// Read a nullable C string. Null is `None`; invalid UTF-8 is an error.
fn optional_str(ptr: *const c_char, name: &str) -> Result<Option<String>, CallError> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|_| CallError::InvalidArgument(format!("{name} is not valid UTF-8")))
}

fn tri_state(value: i32) -> Option<bool> {
    match value {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install a stderr tracing subscriber filtered by `RUST_LOG`
/// (default `webcall_core=info`). Returns false if one was already installed.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_init_tracing() -> bool {
    catch_unwind(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "webcall_core=info".into()),
            )
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    })
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiCallResult` returned by a call function. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_free_result(result: *mut FfiCallResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.document.is_null() {
            drop(unsafe { CString::from_raw(result.document) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
