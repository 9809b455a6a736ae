//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names. The header `include/lesson_forge.h` is
//! generated by `build.rs`.
//!
//! ## Memory management
//! - Buffers returned by `lforge_*` functions are allocated on the Rust heap.
//! - Callers **must** free them with `lforge_free_buffer` / `lforge_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int` from [`LforgeStatus`].
//! - A message for the last failure on the calling thread is available from
//!   `lforge_last_error`.
//!
//! ## Runtime
//! PDF generation goes through one process-wide service (runtime, engine
//! instance, configuration from `LESSON_FORGE_*` variables), created on the
//! first call.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -llesson_forge
//! // #include "lesson_forge.h"
//! // extern int lforge_generate_pdf(const uint8_t* json, uint32_t json_len,
//! //                                uint8_t** out_buf, uint32_t* out_len);
//! // extern void lforge_free_buffer(uint8_t* buf, uint32_t len);
//! // extern const char* lforge_last_error();
//! import "C"
//! ```

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CString};
use std::ptr;
use std::slice;
use std::sync::OnceLock;

use log::{error, warn};

use crate::config::ServiceConfig;
use crate::error::ForgeError;
use crate::layout_config::LayoutPreset;
use crate::model::LessonRequest;
use crate::pipeline::{render_markup, PdfService};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg.replace('\0', " ")).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Return codes of the `lforge_*` functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LforgeStatus {
    Ok = 0,
    /// Null pointer, invalid UTF-8 or another unusable argument.
    BadArgument = 1,
    /// The payload does not have the required shape.
    Validation = 2,
    /// No card contained a usable row.
    EmptyExtraction = 3,
    /// The rendering engine failed.
    Render = 4,
}

impl From<&ForgeError> for LforgeStatus {
    fn from(err: &ForgeError) -> Self {
        match err {
            ForgeError::Validation { .. } => LforgeStatus::Validation,
            ForgeError::EmptyExtraction => LforgeStatus::EmptyExtraction,
            ForgeError::Render(_) => LforgeStatus::Render,
        }
    }
}

/// Layout selector for `lforge_render_markup`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LforgeLayout {
    /// The payload's own `layout`, or the built-in default.
    Default = 0,
    SingleColumn = 1,
    TwoColumn = 2,
    CompactTwoColumn = 3,
}

impl LforgeLayout {
    fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(LforgeLayout::Default),
            1 => Some(LforgeLayout::SingleColumn),
            2 => Some(LforgeLayout::TwoColumn),
            3 => Some(LforgeLayout::CompactTwoColumn),
            _ => None,
        }
    }

    fn preset(self) -> Option<LayoutPreset> {
        match self {
            LforgeLayout::Default => None,
            LforgeLayout::SingleColumn => Some(LayoutPreset::SingleColumn),
            LforgeLayout::TwoColumn => Some(LayoutPreset::TwoColumn),
            LforgeLayout::CompactTwoColumn => Some(LayoutPreset::CompactTwoColumn),
        }
    }
}

struct FfiState {
    runtime: tokio::runtime::Runtime,
    service: PdfService,
}

static STATE: OnceLock<Result<FfiState, String>> = OnceLock::new();

fn state() -> Result<&'static FfiState, String> {
    STATE
        .get_or_init(|| {
            let config = ServiceConfig::from_env().unwrap_or_else(|e| {
                warn!("ffi: ignoring invalid environment configuration: {e}");
                ServiceConfig::default()
            });
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| format!("cannot start runtime: {e}"))?;
            Ok(FfiState {
                runtime,
                service: PdfService::from_config(&config),
            })
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn fail(err: &ForgeError) -> c_int {
    if let ForgeError::Render(cause) = err {
        error!("ffi: render failed: {cause}");
    }
    set_last_error(&err.public_message());
    LforgeStatus::from(err) as c_int
}

fn bad_argument(msg: &str) -> c_int {
    set_last_error(msg);
    LforgeStatus::BadArgument as c_int
}

/// # Safety
/// `ptr` must point to `len` readable bytes.
unsafe fn input<'a>(ptr: *const u8, len: u32) -> Result<&'a str, String> {
    let bytes = slice::from_raw_parts(ptr, len as usize);
    std::str::from_utf8(bytes).map_err(|e| format!("Invalid UTF-8: {e}"))
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Generate a PDF from a JSON lesson payload.
///
/// # Parameters
/// - `json_ptr`: pointer to UTF-8 JSON bytes (not necessarily null-terminated)
/// - `json_len`: length of the JSON data in bytes
/// - `out_buf`: on success, receives a pointer to heap-allocated PDF bytes
/// - `out_len`: on success, receives the length of the PDF buffer
///
/// # Returns
/// A [`LforgeStatus`] code. On error, call `lforge_last_error`.
///
/// # Safety
/// - `json_ptr` must point to `json_len` valid bytes.
/// - `out_buf` and `out_len` must be valid pointers.
/// - The caller must free `*out_buf` by calling `lforge_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn lforge_generate_pdf(
    json_ptr: *const u8,
    json_len: u32,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if json_ptr.is_null() || out_buf.is_null() || out_len.is_null() {
        return bad_argument("Null pointer argument");
    }
    let json = match input(json_ptr, json_len) {
        Ok(s) => s,
        Err(e) => return bad_argument(&e),
    };
    let state = match state() {
        Ok(state) => state,
        Err(e) => {
            set_last_error(&e);
            return LforgeStatus::Render as c_int;
        }
    };

    match state
        .runtime
        .block_on(state.service.generate_from_json(json.as_bytes()))
    {
        Ok(output) => {
            let Ok(len) = u32::try_from(output.bytes.len()) else {
                return bad_argument("PDF exceeds the 4 GiB buffer limit");
            };
            let buf = output.bytes.into_boxed_slice();
            *out_buf = Box::into_raw(buf) as *mut u8;
            *out_len = len;
            clear_last_error();
            LforgeStatus::Ok as c_int
        }
        Err(e) => fail(&e),
    }
}

/// Render only the print markup for a JSON lesson payload.
///
/// # Parameters
/// - `json_ptr`, `json_len`: the JSON input
/// - `layout`: a [`LforgeLayout`] value; anything but `Default` overrides
///   the payload's own `layout`
/// - `out_str`: receives a pointer to a null-terminated markup string
///
/// # Safety
/// `json_ptr` must point to `json_len` valid bytes and `out_str` must be a
/// valid pointer. Free `*out_str` with `lforge_free_string`.
#[no_mangle]
pub unsafe extern "C" fn lforge_render_markup(
    json_ptr: *const u8,
    json_len: u32,
    layout: c_int,
    out_str: *mut *mut c_char,
) -> c_int {
    if json_ptr.is_null() || out_str.is_null() {
        return bad_argument("Null pointer argument");
    }
    let Some(layout) = LforgeLayout::from_raw(layout) else {
        return bad_argument(&format!("Unknown layout selector {layout}"));
    };
    let json = match input(json_ptr, json_len) {
        Ok(s) => s,
        Err(e) => return bad_argument(&e),
    };

    let mut request = match LessonRequest::from_json(json.as_bytes()) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    if let Some(preset) = layout.preset() {
        request.layout = Some(preset);
    }

    match render_markup(&request, LayoutPreset::default()) {
        Ok(markup) => match CString::new(markup) {
            Ok(cs) => {
                *out_str = cs.into_raw();
                clear_last_error();
                LforgeStatus::Ok as c_int
            }
            Err(_) => bad_argument("Markup contained a null byte"),
        },
        Err(e) => fail(&e),
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a PDF buffer returned by `lforge_generate_pdf`.
///
/// # Safety
/// `buf` must have been returned by a previous `lforge_generate_pdf` call,
/// and `len` must be the corresponding length.
#[no_mangle]
pub unsafe extern "C" fn lforge_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(buf, len as usize)));
    }
}

/// Free a string returned by `lforge_render_markup`.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn lforge_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next `lforge_*` call on the same
/// thread. The caller should **not** free this pointer.
///
/// Returns null if the last call succeeded.
#[no_mangle]
pub extern "C" fn lforge_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cs) => cs.as_ptr(),
        None => ptr::null(),
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn lforge_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    const PAYLOAD: &str = r#"{
        "title": "Lesson 22",
        "cards": [{
            "title": "Greetings",
            "description": "<table><tbody><tr><td>1</td><td>Hello</td><td>नमस्ते</td></tr></tbody></table>"
        }]
    }"#;

    fn last_error() -> String {
        let p = lforge_last_error();
        assert!(!p.is_null());
        unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
    }

    #[test]
    fn ffi_render_markup() {
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            lforge_render_markup(
                PAYLOAD.as_ptr(),
                PAYLOAD.len() as u32,
                LforgeLayout::TwoColumn as c_int,
                &mut out,
            )
        };
        assert_eq!(rc, LforgeStatus::Ok as c_int);
        let markup = unsafe { CStr::from_ptr(out) }.to_string_lossy().into_owned();
        assert!(markup.contains("नमस्ते"));
        assert!(markup.contains("class=\"panes\""));
        unsafe { lforge_free_string(out) };
    }

    #[test]
    fn ffi_generate_pdf() {
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;
        let rc = unsafe {
            lforge_generate_pdf(PAYLOAD.as_ptr(), PAYLOAD.len() as u32, &mut out_buf, &mut out_len)
        };
        assert_eq!(rc, LforgeStatus::Ok as c_int);
        let bytes = unsafe { slice::from_raw_parts(out_buf, out_len as usize) };
        assert_eq!(&bytes[0..5], b"%PDF-");
        unsafe { lforge_free_buffer(out_buf, out_len) };
    }

    #[test]
    fn ffi_status_codes() {
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { lforge_render_markup(ptr::null(), 0, 0, &mut out) };
        assert_eq!(rc, LforgeStatus::BadArgument as c_int);

        let bad = br#"{"title": "", "cards": []}"#;
        let rc = unsafe { lforge_render_markup(bad.as_ptr(), bad.len() as u32, 0, &mut out) };
        assert_eq!(rc, LforgeStatus::Validation as c_int);
        assert!(last_error().contains("title"));

        let empty = br#"{"title": "T", "cards": [{"title": "A", "description": "<p>no table</p>"}]}"#;
        let rc = unsafe { lforge_render_markup(empty.as_ptr(), empty.len() as u32, 0, &mut out) };
        assert_eq!(rc, LforgeStatus::EmptyExtraction as c_int);

        let rc = unsafe { lforge_render_markup(PAYLOAD.as_ptr(), PAYLOAD.len() as u32, 9, &mut out) };
        assert_eq!(rc, LforgeStatus::BadArgument as c_int);
    }

    #[test]
    fn ffi_version() {
        let v = unsafe { CStr::from_ptr(lforge_version()) };
        assert_eq!(v.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
