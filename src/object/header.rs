//! Object header - metadata prefixed before every object payload
//!
//! # Memory Layout
//! ```text
//! +-------------------+
//! | ObjectHeader      |  <- refcount, parent, variables, hooks
//! +-------------------+
//! | padding           |
//! +-------------------+
//! | Payload           |  <- caller data, zero-initialised
//! +-------------------+
//! ```
//!
//! One allocation holds both parts. The block is freed only by
//! [`crate::object::lifecycle`] once the reference count reached zero.

use crate::debug::DebugCommands;
use crate::logging::Logger;
use crate::object::resources::Resource;
use crate::object::Object;
use crate::vars::VarStore;
use core::ptr::NonNull;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::alloc::{self, Layout};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Alignment guaranteed for the payload
pub const PAYLOAD_ALIGN: usize = 16;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Teardown hook run once, just before the object's memory is released
pub type Destructor = Box<dyn FnOnce(&Object) + Send>;

/// Process-unique object identifier
///
/// Identifiers are never reused, so a stale identifier can never resolve to
/// a different object. Printed and parsed as hexadecimal (`0x2a`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Error parsing an [`ObjectId`] from text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseObjectIdError;

impl fmt::Display for ParseObjectIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid object identifier")
    }
}

impl std::error::Error for ParseObjectIdError {}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| ParseObjectIdError)
    }
}

/// Object header (opaque outside the crate)
pub struct ObjectHeader {
    pub(crate) id: ObjectId,
    pub(crate) type_name: &'static str,
    pub(crate) refs: AtomicUsize,
    /// Held reference on the parent, `None` for a root
    pub(crate) parent: Option<ObjectPtr>,
    pub(crate) parent_id: Option<ObjectId>,
    pub(crate) destructor: Mutex<Option<Destructor>>,
    pub(crate) resources: Mutex<Vec<Resource>>,
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) no_interact: AtomicBool,
    pub(crate) vars: VarStore,
    /// Callbacks of the root-only debug commands
    pub(crate) commands: OnceCell<DebugCommands>,
    layout: Layout,
    payload_offset: usize,
    payload_len: usize,
}

impl ObjectHeader {
    pub(crate) fn new(
        type_name: &'static str,
        parent: Option<ObjectPtr>,
        logger: Option<Arc<dyn Logger>>,
        no_interact: bool,
    ) -> Self {
        // SAFETY: the caller passes a parent it holds a reference on
        let parent_id = parent.map(|p| unsafe { p.header().id });
        Self {
            id: ObjectId::next(),
            type_name,
            refs: AtomicUsize::new(1),
            parent,
            parent_id,
            destructor: Mutex::new(None),
            resources: Mutex::new(Vec::new()),
            logger,
            no_interact: AtomicBool::new(no_interact),
            vars: VarStore::new(),
            commands: OnceCell::new(),
            layout: Layout::new::<Self>(),
            payload_offset: 0,
            payload_len: 0,
        }
    }

    #[inline]
    pub(crate) fn refs(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn payload_len(&self) -> usize {
        self.payload_len
    }
}

/// Layout of a header + payload block and the payload offset inside it
pub(crate) fn block_layout(payload_len: usize) -> Option<(Layout, usize)> {
    let payload = Layout::from_size_align(payload_len, PAYLOAD_ALIGN).ok()?;
    let (layout, offset) = Layout::new::<ObjectHeader>().extend(payload).ok()?;
    Some((layout.pad_to_align(), offset))
}

/// Raw pointer to a live header
///
/// Copies carry no reference. Dereferencing is sound while the pointee is
/// kept alive by a held reference, or while it is reachable from the registry
/// and the structural lock is held.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ObjectPtr(NonNull<ObjectHeader>);

// Safety: the header is only mutated through atomics and its own locks
unsafe impl Send for ObjectPtr {}
unsafe impl Sync for ObjectPtr {}

impl ObjectPtr {
    #[inline]
    pub(crate) fn new(ptr: NonNull<ObjectHeader>) -> Self {
        Self(ptr)
    }

    #[inline]
    pub(crate) fn as_ptr(self) -> *mut ObjectHeader {
        self.0.as_ptr()
    }

    /// # Safety
    /// The object must be alive for the whole of `'a` (see type docs).
    #[inline]
    pub(crate) unsafe fn header<'a>(self) -> &'a ObjectHeader {
        &*self.0.as_ptr()
    }

    /// Start of the payload bytes
    #[inline]
    pub(crate) fn payload(self) -> NonNull<u8> {
        // SAFETY: offset and layout were fixed at allocation
        unsafe {
            let offset = self.header().payload_offset;
            NonNull::new_unchecked((self.0.as_ptr() as *mut u8).add(offset))
        }
    }

    /// Allocate a zeroed block and move `header` into it
    ///
    /// Returns `None` when the layout overflows or the allocator fails; the
    /// header is then dropped normally.
    pub(crate) fn allocate(mut header: ObjectHeader, payload_len: usize) -> Option<Self> {
        let (layout, offset) = block_layout(payload_len)?;
        header.layout = layout;
        header.payload_offset = offset;
        header.payload_len = payload_len;

        // SAFETY: layout has non-zero size (the header is never empty)
        let raw = unsafe { alloc::alloc_zeroed(layout) } as *mut ObjectHeader;
        let ptr = NonNull::new(raw)?;
        // SAFETY: freshly allocated, properly aligned for ObjectHeader
        unsafe { ptr.as_ptr().write(header) };
        Some(Self(ptr))
    }

    /// Drop the header in place and release the block
    ///
    /// # Safety
    /// Must be called exactly once, after the last reference is gone.
    pub(crate) unsafe fn free(self) {
        let layout = self.header().layout;
        core::ptr::drop_in_place(self.0.as_ptr());
        alloc::dealloc(self.0.as_ptr() as *mut u8, layout);
    }
}

impl fmt::Debug for ObjectPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPtr({:p})", self.0.as_ptr())
    }
}
