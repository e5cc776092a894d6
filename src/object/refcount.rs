//! Reference counting - hold/release on object headers
//!
//! Hold is a single relaxed increment. Release takes a lock-free CAS path
//! while other references remain, and only the transition to zero goes
//! through the structural lock, so that unlinking from the registry is atomic
//! with respect to any concurrent tree walk.

use super::header::ObjectPtr;
use super::lifecycle;
use crate::logging::trace;
use crate::tree;
use std::sync::atomic::{fence, Ordering};

/// Increment the reference count
///
/// # Panics
/// If the object was already destroyed (count at zero).
#[inline]
pub(crate) fn hold(ptr: ObjectPtr) {
    // SAFETY: callers hold a reference, or hold the structural lock while
    // `ptr` is registered
    let header = unsafe { ptr.header() };
    let old = header.refs.fetch_add(1, Ordering::Relaxed);

    assert!(old > 0, "hold on destroyed object {}", header.id);
}

/// Drop one reference, destroying the object (and possibly its ancestors)
/// when it was the last one
///
/// # Safety
/// The caller must own the reference being dropped.
pub(crate) unsafe fn release(ptr: ObjectPtr) {
    let mut next = Some(ptr);
    while let Some(ptr) = next {
        next = release_one(ptr);
    }
}

/// Returns the parent whose reference must be dropped next, if `ptr` died
unsafe fn release_one(ptr: ObjectPtr) -> Option<ObjectPtr> {
    let header = ptr.header();
    let mut refs = header.refs.load(Ordering::Relaxed);

    // Fast path: other references remain
    while refs > 1 {
        match header.refs.compare_exchange_weak(
            refs,
            refs - 1,
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => return None,
            Err(current) => refs = current,
        }
    }
    assert!(refs > 0, "refcount underflow on object {}", header.id);

    let id = header.id;

    let Some(parent) = header.parent else {
        // Root: nobody can race us, every other holder is a descendant
        let old = header.refs.fetch_sub(1, Ordering::Release);
        assert_eq!(old, 1, "concurrent reference on root object {}", id);
        fence(Ordering::Acquire);

        assert!(!tree::has_children_ptr(ptr), "root object {} destroyed with children", id);
        trace!(event = "refcount_destroy", object = %id, root = true);
        lifecycle::destroy(ptr);
        return None;
    };

    // Slow path: the decrement and the unlink are one step for tree walkers
    let last = {
        let mut registry = tree::lock();
        let old = header.refs.fetch_sub(1, Ordering::Release);
        assert!(old > 0, "refcount underflow on object {}", id);

        if old == 1 {
            registry.remove(id);
        }
        old == 1
    };

    if !last {
        return None;
    }

    fence(Ordering::Acquire);
    // Children hold a reference on their parent, so none can be left
    assert!(!tree::has_children_ptr(ptr), "object {} destroyed with children", id);
    trace!(event = "refcount_destroy", object = %id, root = false);
    lifecycle::destroy(ptr);

    Some(parent)
}
