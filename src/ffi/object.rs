//! Object queries and root commands - C API

use super::borrow_raw;
use crate::error::{STATUS_EINVAL, STATUS_SUCCESS};
use crate::logging::trace;
use crate::object::ObjectHeader;
use std::ffi::{c_char, CStr};

/// Copy the type name into `buf` (NUL-terminated, truncated to fit)
///
/// Returns the full length of the name, excluding the terminator.
///
/// # Safety
/// - `obj` must carry a live reference
/// - `buf` must be valid for `len` bytes, or null with `len == 0`
#[no_mangle]
pub unsafe extern "C" fn objtree_object_typename(
    obj: *mut ObjectHeader,
    buf: *mut c_char,
    len: usize,
) -> usize {
    if obj.is_null() {
        return 0;
    }

    let name = borrow_raw(obj).type_name().as_bytes();
    if !buf.is_null() && len > 0 {
        let n = name.len().min(len - 1);
        std::ptr::copy_nonoverlapping(name.as_ptr(), buf as *mut u8, n);
        *buf.add(n) = 0;
    }
    name.len()
}

/// Process-unique identifier, 0 for null
///
/// # Safety
/// `obj` must be null or carry a live reference.
#[no_mangle]
pub unsafe extern "C" fn objtree_object_id(obj: *mut ObjectHeader) -> u64 {
    if obj.is_null() {
        return 0;
    }

    borrow_raw(obj).id().as_u64()
}

/// New reference to the parent, or null for a root
///
/// # Safety
/// `obj` must be null or carry a live reference. A non-null result must be
/// released with `objtree_object_release`.
#[no_mangle]
pub unsafe extern "C" fn objtree_object_parent(obj: *mut ObjectHeader) -> *mut ObjectHeader {
    if obj.is_null() {
        return std::ptr::null_mut();
    }

    borrow_raw(obj)
        .parent()
        .map_or(std::ptr::null_mut(), |parent| parent.into_raw())
}

/// Run a command variable (`tree`, `vars`) on an object
///
/// Returns `STATUS_SUCCESS` or a negative status; an unresolved `vars`
/// identifier yields `STATUS_ENOOBJ`.
///
/// # Safety
/// - `obj` must carry a live reference
/// - `name` must be a NUL-terminated string; `arg` may be null
#[no_mangle]
pub unsafe extern "C" fn objtree_command(
    obj: *mut ObjectHeader,
    name: *const c_char,
    arg: *const c_char,
) -> i32 {
    if obj.is_null() || name.is_null() {
        return STATUS_EINVAL;
    }

    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return STATUS_EINVAL;
    };
    let arg = if arg.is_null() {
        ""
    } else {
        match CStr::from_ptr(arg).to_str() {
            Ok(arg) => arg,
            Err(_) => return STATUS_EINVAL,
        }
    };

    trace!(target: "objtree::ffi", command = name, arg, "FFI command");

    match borrow_raw(obj).var_command(name, arg) {
        Ok(()) => STATUS_SUCCESS,
        Err(err) => err.code(),
    }
}
