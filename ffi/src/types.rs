//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! A call returns one heap-allocated `FfiCallResult`: either a rendered
//! response document or an error code with a message. Conversion from core
//! results lives here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use webcall_core::CallError;

/// Error codes returned in `FfiCallResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidArgument = 1,
    HeaderList = 2,
    HeaderFormat = 3,
    Timeout = 4,
    Transport = 5,
    Serialization = 6,
    Panic = 7,
    NullArg = 8,
}

impl From<&CallError> for FfiErrorCode {
    fn from(err: &CallError) -> Self {
        match err {
            CallError::InvalidArgument(_) => FfiErrorCode::InvalidArgument,
            CallError::HeaderList(_) | CallError::MissingHeaderName { .. } => FfiErrorCode::HeaderList,
            CallError::HeaderFormat { .. } => FfiErrorCode::HeaderFormat,
            CallError::Timeout { .. } => FfiErrorCode::Timeout,
            CallError::Transport(_) => FfiErrorCode::Transport,
            CallError::Serialization(_) => FfiErrorCode::Serialization,
        }
    }
}

/// Result envelope for a call.
///
/// On success `error_code` is `Ok`, `error_message` is null, `status` is the
/// HTTP status of the response (which may itself be non-2xx) and `document`
/// is the rendered response document.
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, `status` is 0 and `document` is null.
#[repr(C)]
pub struct FfiCallResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub status: u16,
    pub document: *mut c_char,
}

impl FfiCallResult {
    pub(crate) fn ok(status: u16, document: String) -> *mut Self {
        Box::into_raw(Box::new(FfiCallResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            status,
            document: c_string(document),
        }))
    }

    pub(crate) fn from_error(err: CallError) -> *mut Self {
        Self::failure(FfiErrorCode::from(&err), err.to_string())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        tracing::error!(reason = msg, "panic caught at ffi boundary");
        Self::failure(FfiErrorCode::Panic, msg.to_string())
    }

    fn failure(error_code: FfiErrorCode, message: String) -> *mut Self {
        Box::into_raw(Box::new(FfiCallResult {
            error_code,
            error_message: c_string(message),
            status: 0,
            document: std::ptr::null_mut(),
        }))
    }
}

/// Convert to an owned C string, dropping interior NUL bytes.
pub(crate) fn c_string(s: String) -> *mut c_char {
    CString::new(s)
        .unwrap_or_else(|e| {
            let mut bytes = e.into_vec();
            bytes.retain(|b| *b != 0);
            CString::new(bytes).unwrap_or_default()
        })
        .into_raw()
}
