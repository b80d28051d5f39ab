//! FFI bindings for the Bilbo engine
//!
//! C-compatible entry points for mobile hosts. Strings are null-terminated
//! UTF-8; every returned string is newly allocated and must be released with
//! `bilbo_free_string`. Timestamps are Unix milliseconds, where any value
//! `<= 0` means "now". Formula names are the JSON identifiers (`"epley"`,
//! `"brzycki"`, ...); a NULL formula selects Epley.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, TimeZone, Utc};

use crate::formulas::{estimate_max_reps, estimate_one_rm, Formula};
use crate::one_rm::round_to_increment;
use crate::pipeline::{report_from_json, BilboProcessor};
use crate::types::OneRmSource;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free with `bilbo_free_string`
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn timestamp_or_now(unix_ms: i64) -> DateTime<Utc> {
    if unix_ms <= 0 {
        return Utc::now();
    }
    Utc.timestamp_millis_opt(unix_ms).single().unwrap_or_else(Utc::now)
}

/// NULL selects the default formula; an unknown name sets the last error
unsafe fn parse_formula(ptr: *const c_char) -> Option<Formula> {
    if ptr.is_null() {
        return Some(Formula::default());
    }
    let name = match cstr_to_string(ptr) {
        Some(s) => s,
        None => {
            set_last_error("Invalid formula string pointer");
            return None;
        }
    };
    match name.parse::<Formula>() {
        Ok(formula) => Some(formula),
        Err(e) => {
            set_last_error(&e.to_string());
            None
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Estimate a one-rep max from a single set.
///
/// # Safety
/// - `formula` must be NULL or a valid null-terminated C string.
/// - Returns 0 for non-positive weight, zero reps, or an unknown formula
///   (the latter also sets `bilbo_last_error`).
#[no_mangle]
pub unsafe extern "C" fn bilbo_estimate_one_rm(
    weight: f64,
    reps: u32,
    formula: *const c_char,
) -> f64 {
    clear_last_error();

    match parse_formula(formula) {
        Some(formula) => estimate_one_rm(weight, reps, formula),
        None => 0.0,
    }
}

/// Estimate the reps achievable at `weight` for a known 1RM (may be negative).
///
/// # Safety
/// - `formula` must be NULL or a valid null-terminated C string.
/// - Returns 0 for non-positive inputs or an unknown formula.
#[no_mangle]
pub unsafe extern "C" fn bilbo_estimate_max_reps(
    weight: f64,
    one_rm: f64,
    formula: *const c_char,
) -> i32 {
    clear_last_error();

    match parse_formula(formula) {
        Some(formula) => estimate_max_reps(weight, one_rm, formula),
        None => 0,
    }
}

/// Round `value` to the nearest multiple of `increment`.
#[no_mangle]
pub extern "C" fn bilbo_round_to_increment(value: f64, increment: f64) -> f64 {
    round_to_increment(value, increment)
}

/// Build a progress report from a saved processor state.
///
/// # Safety
/// - `state_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `bilbo_free_string`.
/// - Returns NULL on error; call `bilbo_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bilbo_report_json(state_json: *const c_char, now_ms: i64) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(state_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match report_from_json(&json_str, timestamp_or_now(now_ms)) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a BilboProcessor
pub struct BilboProcessorHandle {
    processor: BilboProcessor,
}

/// Create a processor seeded with a manually entered 1RM.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `bilbo_processor_free`.
/// - Returns NULL when `one_rm` is not a finite non-negative number.
#[no_mangle]
pub unsafe extern "C" fn bilbo_processor_new(one_rm: f64) -> *mut BilboProcessorHandle {
    clear_last_error();

    if !one_rm.is_finite() || one_rm < 0.0 {
        set_last_error("one_rm must be a finite non-negative number");
        return ptr::null_mut();
    }

    let processor = BilboProcessor::new(one_rm, OneRmSource::Manual);
    Box::into_raw(Box::new(BilboProcessorHandle { processor }))
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `bilbo_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn bilbo_processor_free(processor: *mut BilboProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Load processor state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `bilbo_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error (see `bilbo_last_error`).
#[no_mangle]
pub unsafe extern "C" fn bilbo_processor_load_state(
    processor: *mut BilboProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_state(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Save processor state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `bilbo_processor_new`.
/// - Returns a newly allocated string that must be freed with `bilbo_free_string`.
/// - Returns NULL on error; call `bilbo_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bilbo_processor_save_state(
    processor: *mut BilboProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_state() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Log a BILBO session and return the stored session record as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `bilbo_processor_new`.
/// - `notes` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `bilbo_free_string`.
/// - Returns NULL on error (e.g. implausible input); call `bilbo_last_error`.
#[no_mangle]
pub unsafe extern "C" fn bilbo_processor_log_session(
    processor: *mut BilboProcessorHandle,
    weight_used: f64,
    reps_completed: u32,
    notes: *const c_char,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;
    let notes = cstr_to_string(notes).unwrap_or_default();

    let record = match handle.processor.log_session(
        weight_used,
        reps_completed,
        &notes,
        timestamp_or_now(now_ms),
    ) {
        Ok(record) => record,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&record) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Produce a progress report for the processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `bilbo_processor_new`.
/// - Returns a newly allocated string that must be freed with `bilbo_free_string`.
/// - Returns NULL on error; call `bilbo_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn bilbo_processor_report(
    processor: *mut BilboProcessorHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.report_json(timestamp_or_now(now_ms)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a Bilbo function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Bilbo function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn bilbo_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Bilbo function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn bilbo_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn bilbo_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
