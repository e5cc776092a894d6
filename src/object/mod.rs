//! Object handles - typed, reference-counted tree nodes
//!
//! Design:
//! 1. One allocation per object: [`ObjectHeader`] followed by a zeroed payload
//! 2. [`Object`] is a held reference: `clone` holds, `drop` releases
//! 3. A child holds one reference on its parent for its whole life, so a
//!    parent always outlives its children
//!
//! ```ignore
//! let root = Object::create(None, 0, "root")?;
//! let input = Object::create(Some(&root), 64, "input")?;
//! input.set_destructor(|obj| obj_dbg!(obj, "input going away"));
//! drop(input); // destroyed here, releasing its reference on `root`
//! ```

mod header;
mod lifecycle;
mod refcount;
mod resources;


pub use header::{Destructor, ObjectHeader, ObjectId, ParseObjectIdError, PAYLOAD_ALIGN};
pub use lifecycle::live_roots;
pub use resources::ResourceId;

pub(crate) use header::ObjectPtr;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::logging::{self, Logger};
use crate::tree::{self, ChildList};
use core::ptr::NonNull;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Settings for a parent-less object
#[derive(Clone)]
pub struct RootOptions {
    pub config: RuntimeConfig,
    /// Logger inherited by every descendant
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            config: RuntimeConfig::default(),
            logger: Some(logging::default_logger()),
        }
    }
}

impl RootOptions {
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: Option<Arc<dyn Logger>>) -> Self {
        self.logger = logger;
        self
    }
}

/// Held reference to a live object
pub struct Object {
    ptr: ObjectPtr,
}

// Object is thread-safe: the header only changes through atomics and locks
unsafe impl Send for Object {}
unsafe impl Sync for Object {}

impl Object {
    /// Create an object with `payload_len` zeroed payload bytes
    ///
    /// With a parent, the new object inherits its logger and interaction flag
    /// and holds a reference on it. Without one, the object is a root with
    /// default [`RootOptions`].
    pub fn create(
        parent: Option<&Object>,
        payload_len: usize,
        type_name: &'static str,
    ) -> Result<Object> {
        match parent {
            Some(parent) => lifecycle::create_child(parent, payload_len, type_name),
            None => lifecycle::create_root(payload_len, type_name, RootOptions::default()),
        }
    }

    /// [`Object::create`] with the `"generic"` type name
    pub fn create_generic(parent: Option<&Object>, payload_len: usize) -> Result<Object> {
        Self::create(parent, payload_len, logging::GENERIC_TYPE_NAME)
    }

    pub fn create_root(
        payload_len: usize,
        type_name: &'static str,
        options: RootOptions,
    ) -> Result<Object> {
        lifecycle::create_root(payload_len, type_name, options)
    }

    /// Wrap a pointer without touching the count
    #[inline]
    pub(crate) fn from_ptr(ptr: ObjectPtr) -> Self {
        Self { ptr }
    }

    /// Take a new reference on `ptr`
    #[inline]
    pub(crate) fn hold_ptr(ptr: ObjectPtr) -> Self {
        refcount::hold(ptr);
        Self { ptr }
    }

    #[inline]
    pub(crate) fn ptr(&self) -> ObjectPtr {
        self.ptr
    }

    #[inline]
    pub(crate) fn header(&self) -> &ObjectHeader {
        // SAFETY: `self` owns a reference
        unsafe { self.ptr.header() }
    }

    /// Take an additional reference
    #[inline]
    pub fn hold(&self) -> Object {
        self.clone()
    }

    /// Drop this reference
    #[inline]
    pub fn release(self) {
        drop(self);
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.header().id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.header().type_name
    }

    /// Current reference count (diagnostics only)
    #[inline]
    pub fn refs(&self) -> usize {
        self.header().refs()
    }

    pub fn is_root(&self) -> bool {
        self.header().parent.is_none()
    }

    /// Held reference to the parent, `None` for a root
    pub fn parent(&self) -> Option<Object> {
        self.header().parent.map(Object::hold_ptr)
    }

    pub fn parent_id(&self) -> Option<ObjectId> {
        self.header().parent_id
    }

    /// Set the teardown hook; replaces any previous one
    pub fn set_destructor<F>(&self, hook: F)
    where
        F: FnOnce(&Object) + Send + 'static,
    {
        *self.header().destructor.lock() = Some(Box::new(hook));
    }

    pub fn logger(&self) -> Option<Arc<dyn Logger>> {
        self.header().logger.clone()
    }

    pub fn no_interact(&self) -> bool {
        self.header().no_interact.load(Ordering::Relaxed)
    }

    pub fn set_no_interact(&self, no_interact: bool) {
        self.header().no_interact.store(no_interact, Ordering::Relaxed);
    }

    /// Start of the zero-initialised payload
    pub fn payload(&self) -> NonNull<u8> {
        self.ptr.payload()
    }

    pub fn payload_len(&self) -> usize {
        self.header().payload_len()
    }

    /// View the payload as a `T`
    ///
    /// # Safety
    /// `T` must fit in the payload, need at most [`PAYLOAD_ALIGN`] alignment,
    /// be valid for whatever bytes the payload currently holds (all zero for a
    /// fresh object) and be safe to share between threads. Atomics and other
    /// interior-mutable zeroable types satisfy this.
    pub unsafe fn payload_as<T: Sync>(&self) -> &T {
        debug_assert!(std::mem::size_of::<T>() <= self.payload_len());
        debug_assert!(std::mem::align_of::<T>() <= PAYLOAD_ALIGN);
        &*(self.payload().as_ptr() as *const T)
    }

    /// Held snapshot of the direct children
    pub fn children(&self) -> Vec<Object> {
        tree::children_of(self)
    }

    pub fn list_children(&self, limit: usize) -> ChildList {
        tree::list_children(self, limit)
    }

    pub fn has_children(&self) -> bool {
        tree::has_children(self)
    }

    /// Look up an object by name
    ///
    /// Name lookup is disabled; always `None`.
    pub fn find_name(&self, name: &str) -> Option<Object> {
        crate::obj_dbg!(self, "object lookup by name ({}) is not supported", name);
        None
    }

    /// Give up ownership of this reference as an opaque pointer
    pub fn into_raw(self) -> *mut ObjectHeader {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    /// Reclaim a reference from [`Object::into_raw`]
    ///
    /// # Safety
    /// `raw` must come from `into_raw` and its reference not yet reclaimed.
    pub unsafe fn from_raw(raw: *mut ObjectHeader) -> Object {
        Self {
            ptr: ObjectPtr::new(NonNull::new_unchecked(raw)),
        }
    }
}

impl Clone for Object {
    #[inline]
    fn clone(&self) -> Self {
        Object::hold_ptr(self.ptr)
    }
}

impl Drop for Object {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: every Object owns exactly one reference
        unsafe { refcount::release(self.ptr) }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("type_name", &self.type_name())
            .field("refs", &self.refs())
            .field("parent", &self.parent_id())
            .finish()
    }
}
