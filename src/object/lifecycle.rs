//! Object lifecycle - creation, attachment and teardown

use super::header::{ObjectHeader, ObjectPtr};
use super::{Object, RootOptions};
use crate::cancel;
use crate::debug;
use crate::error::{ObjectError, Result};
use crate::logging::debug;
use crate::tree;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Parent-less objects currently alive
static LIVE_ROOTS: AtomicUsize = AtomicUsize::new(0);

/// Number of live root objects in the process
pub fn live_roots() -> usize {
    LIVE_ROOTS.load(Ordering::Relaxed)
}

/// Create an object attached to `parent`
pub(crate) fn create_child(
    parent: &Object,
    payload_len: usize,
    type_name: &'static str,
) -> Result<Object> {
    let parent_header = parent.header();

    // The new object owns this reference until it is destroyed
    let parent_ref = parent.clone();
    let header = ObjectHeader::new(
        type_name,
        Some(parent_ref.ptr),
        parent_header.logger.clone(),
        parent.no_interact(),
    );

    let ptr = ObjectPtr::allocate(header, payload_len)
        .ok_or(ObjectError::AllocationFailed { size: payload_len })?;
    std::mem::forget(parent_ref);

    {
        let mut registry = tree::lock();
        registry.insert(ptr);
    }

    let object = Object::from_ptr(ptr);
    debug!(
        target: "objtree::object",
        object = %object.id(),
        parent = %parent.id(),
        object_type = type_name,
        payload_len,
        "object created"
    );
    Ok(object)
}

/// Create a parent-less object carrying the debug commands
pub(crate) fn create_root(
    payload_len: usize,
    type_name: &'static str,
    options: RootOptions,
) -> Result<Object> {
    if options.config.root.single_root {
        LIVE_ROOTS
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed)
            .map_err(|_| ObjectError::RootExists)?;
    } else {
        LIVE_ROOTS.fetch_add(1, Ordering::AcqRel);
    }

    let header = ObjectHeader::new(
        type_name,
        None,
        options.logger,
        options.config.root.no_interact,
    );

    let Some(ptr) = ObjectPtr::allocate(header, payload_len) else {
        LIVE_ROOTS.fetch_sub(1, Ordering::AcqRel);
        return Err(ObjectError::AllocationFailed { size: payload_len });
    };
    let root = Object::from_ptr(ptr);

    {
        let _cancel = cancel::suspend();
        debug::register_commands(&root, options.config.tree.max_depth)?;
    }

    debug!(
        target: "objtree::object",
        object = %root.id(),
        object_type = type_name,
        payload_len,
        "root object created"
    );
    Ok(root)
}

/// Tear down an object whose reference count reached zero
///
/// # Safety
/// Called exactly once per object, by the release that observed the count
/// drop to zero, after the object left the registry.
pub(crate) unsafe fn destroy(ptr: ObjectPtr) {
    let header = ptr.header();
    let id = header.id;
    let type_name = header.type_name;

    assert!(
        header.resources.lock().is_empty(),
        "object {} destroyed with attached resources",
        id
    );

    {
        let _cancel = cancel::suspend();
        // Borrowed view: the count is already zero and must not be released
        let this = ManuallyDrop::new(Object::from_ptr(ptr));

        let hook = header.destructor.lock().take();
        if let Some(hook) = hook {
            hook(&this);
        }

        if header.parent.is_none() {
            debug::unregister_commands(&this);
            LIVE_ROOTS.fetch_sub(1, Ordering::AcqRel);
        }

        this.var_destroy_all();
    }

    debug!(target: "objtree::object", object = %id, object_type = type_name, "object destroyed");
    ptr.free();
}
