//! C FFI - Stable ABI for scripting hosts and native collaborators
//!
//! Design: handles cross the boundary as opaque `ObjectHeader` pointers, each
//! carrying one reference. Hosts only ever hold, release and query them;
//! they never see the header layout.
//! 1. Reference counting (hold, release, refs)
//! 2. Queries (type name, identifier, parent)
//! 3. Root commands with integer status codes

mod object;
mod refcount;

pub use object::{objtree_command, objtree_object_id, objtree_object_parent, objtree_object_typename};
pub use refcount::{objtree_object_hold, objtree_object_refs, objtree_object_release};

use crate::object::{Object, ObjectHeader};
use std::mem::ManuallyDrop;

/// Borrow the reference behind a raw handle without consuming it
///
/// # Safety
/// `raw` must be non-null and carry a live reference owned by the caller.
#[inline(always)]
pub(crate) unsafe fn borrow_raw(raw: *mut ObjectHeader) -> ManuallyDrop<Object> {
    ManuallyDrop::new(Object::from_raw(raw))
}
