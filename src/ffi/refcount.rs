//! Reference counting - C API for hold/release

use super::borrow_raw;
use crate::object::{Object, ObjectHeader};

/// Take a new reference and return the same handle (for chaining)
///
/// # Safety
/// - Null-safe (returns null)
/// - Otherwise `obj` must carry a live reference
#[no_mangle]
pub unsafe extern "C" fn objtree_object_hold(obj: *mut ObjectHeader) -> *mut ObjectHeader {
    if obj.is_null() {
        return obj;
    }

    let borrowed = borrow_raw(obj);
    Object::clone(&borrowed).into_raw()
}

/// Drop one reference, destroying the object when it was the last
///
/// # Safety
/// - Null-safe (no-op)
/// - Otherwise consumes one reference owned by the caller
#[no_mangle]
pub unsafe extern "C" fn objtree_object_release(obj: *mut ObjectHeader) {
    if obj.is_null() {
        return;
    }

    drop(Object::from_raw(obj));
}

/// Current reference count (for debugging/testing)
///
/// # Safety
/// - Returns 0 for null pointers
/// - Otherwise `obj` must carry a live reference
#[no_mangle]
pub unsafe extern "C" fn objtree_object_refs(obj: *mut ObjectHeader) -> usize {
    if obj.is_null() {
        return 0;
    }

    borrow_raw(obj).refs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_release_round_trip() {
        let root = Object::create(None, 0, "root").unwrap();
        let raw = root.clone().into_raw();

        unsafe {
            assert_eq!(objtree_object_refs(raw), 2);
            let again = objtree_object_hold(raw);
            assert_eq!(again, raw);
            assert_eq!(objtree_object_refs(raw), 3);

            objtree_object_release(again);
            objtree_object_release(raw);
        }
        assert_eq!(root.refs(), 1);
    }

    #[test]
    fn test_null_handles() {
        unsafe {
            assert!(objtree_object_hold(std::ptr::null_mut()).is_null());
            objtree_object_release(std::ptr::null_mut());
            assert_eq!(objtree_object_refs(std::ptr::null_mut()), 0);
        }
    }
}
