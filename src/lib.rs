//! # Stack Link Core
//!
//! Data-access glue for a remote document stack. The crate maps declarative
//! query and mutation descriptors to remote collection calls, resolves the
//! references documents hold to each other, and binds observable queries to
//! an explicit mount/unmount scope.
//!
//! ## Building blocks
//!
//! - **[`stack_link::StackLink`]**: translates a [`query_definition::QueryDefinition`]
//!   or a [`mutation::Mutation`] into exactly one call on a
//!   [`collection::Collection`]
//! - **[`association::Association`]**: resolves a reference stored in a
//!   document, local state first, and dehydrates it before persistence
//! - **[`query_binder::QueryBinder`]**: subscribes to an
//!   [`collection::ObservableQuery`] while mounted and exposes its result and
//!   mutation helpers to a rendering callback
//! - **[`file_model`]**: helpers for documents of the files doctype
//!
//! The remote collections, the client and its observable queries are
//! collaborators described by traits in [`collection`].
//!
//! ## FFI Functions
//!
//! A small C-compatible surface exchanges JSON strings:
//!
//! - [`plan_request`] - Resolve a descriptor to the collection call it stands for
//! - [`normalize_file`] - Normalize a file document
//! - [`split_filename`] - Split a file name into name and extension
//! - [`free_response`] - Release a string returned by this library

pub mod app_error;
pub mod association;
pub mod collection;
pub mod document;
pub mod file_model;
pub mod mutation;
pub mod qualification;
pub mod query_binder;
pub mod query_definition;
pub mod schema;
pub mod stack_link;
mod app_response;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{debug, warn};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::document::Document;
use crate::stack_link::{plan, Operation};

/// Resolves a query or mutation descriptor to the collection call a
/// [`StackLink`](stack_link::StackLink) would issue for it, without issuing it.
///
/// # Parameters
///
/// * `json_ptr` - Null-terminated C string holding the descriptor
///
/// # Returns
///
/// A JSON-formatted [`AppResponse`] C string. On success the payload is the
/// serialized call, e.g. `{"doctype":"io.cozy.files","method":"get","id":"f1"}`.
/// The returned string must be released with [`free_response`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use stack_link_core::{plan_request, free_response};
///
/// let descriptor = CString::new(r#"{"doctype":"io.cozy.files","id":"f1"}"#).unwrap();
/// let response = plan_request(descriptor.as_ptr());
/// free_response(response as *mut _);
/// ```
///
/// # Errors
///
/// - `BadRequest` for a null pointer, invalid UTF-8, a missing doctype or an
///   unknown mutation type
/// - `SerializationError` for malformed JSON
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn plan_request(json_ptr: *const c_char) -> *const c_char {
    let value = match c_ptr_to_json(json_ptr, "descriptor") {
        Ok(value) => value,
        Err(err) => return err,
    };

    let call = match Operation::from_value(value).and_then(|operation| plan(&operation)) {
        Ok(call) => call,
        Err(e) => {
            warn!("Could not plan request: {e}");
            return response_to_c_string(&AppResponse::from(e));
        }
    };

    debug!("Planned {:?} on {}", call.action, call.doctype);
    match serde_json::to_string(&call) {
        Ok(json) => response_to_c_string(&AppResponse::success(json)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Normalizes a file document: `_id`/`id` both set, `_type` defaulted to the
/// files doctype.
///
/// Returns a JSON-formatted [`AppResponse`] C string holding the normalized
/// document.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn normalize_file(json_ptr: *const c_char) -> *const c_char {
    let doc = match c_ptr_to_document(json_ptr) {
        Ok(doc) => doc,
        Err(err) => return err,
    };

    match serde_json::to_string(&file_model::normalize(&doc)) {
        Ok(json) => response_to_c_string(&AppResponse::success(json)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Splits the name of a file document into `filename` and `extension`.
///
/// Returns a JSON-formatted [`AppResponse`] C string; a document without a
/// string `name` yields a `ValidationError`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn split_filename(json_ptr: *const c_char) -> *const c_char {
    let doc = match c_ptr_to_document(json_ptr) {
        Ok(doc) => doc,
        Err(err) => return err,
    };

    let split = match file_model::split_filename(&doc) {
        Ok(split) => split,
        Err(e) => return response_to_c_string(&AppResponse::from(e)),
    };

    match serde_json::to_string(&split) {
        Ok(json) => response_to_c_string(&AppResponse::success(json)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Releases a string previously returned by this library.
///
/// Null pointers are ignored. Passing any other pointer, or the same pointer
/// twice, is undefined behaviour.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr));
    }
}

/// Serializes an [`AppResponse`] into a C string owned by the caller.
///
/// Returns a null pointer if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust String.
///
/// On failure the error is already an [`AppResponse`] C string, ready to be
/// returned to the FFI caller.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn c_ptr_to_json(ptr: *const c_char, field_name: &str) -> Result<JsonValue, *const c_char> {
    let json_str = c_ptr_to_string(ptr, field_name)?;
    serde_json::from_str(&json_str).map_err(|e| {
        let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
        response_to_c_string(&error)
    })
}

fn c_ptr_to_document(ptr: *const c_char) -> Result<Document, *const c_char> {
    let value = c_ptr_to_json(ptr, "document")?;
    Document::from_value(value).map_err(|e| response_to_c_string(&AppResponse::from(e)))
}
