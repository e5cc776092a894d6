//! Ownership tree - global registry of non-root objects
//!
//! Design: there are no per-node child lists. Each object records its parent
//! and every object that has one sits in a single ordered registry guarded by
//! the structural lock. "Children of X" is a filtered scan of that registry.
//!
//! The registry is keyed by [`ObjectId`]; identifiers grow monotonically, so
//! key order is creation order, which the tree dump relies on.
//!
//! Anything observed through these functions is a best-effort snapshot:
//! children can be created or destroyed the moment the lock is dropped.


use crate::object::{Object, ObjectId, ObjectPtr};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Global registry behind the structural lock
static TREE: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::new()));

/// Held children returned by [`list_children`]
pub type Children = SmallVec<[Object; 8]>;

/// Registry contents; only reachable through [`lock`]
pub(crate) struct Registry {
    entries: BTreeMap<ObjectId, ObjectPtr>,
}

impl Registry {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, ptr: ObjectPtr) {
        // SAFETY: the creator holds the only reference
        let id = unsafe { ptr.header().id };
        self.entries.insert(id, ptr);
    }

    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<ObjectPtr> {
        self.entries.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Registered objects whose parent is `parent`, in creation order
    pub(crate) fn children(
        &self,
        parent: ObjectId,
    ) -> impl Iterator<Item = (ObjectId, ObjectPtr)> + '_ {
        // Children are always created after their parent
        self.entries
            .range((Bound::Excluded(parent), Bound::Unbounded))
            .filter(move |(_, ptr)| parent_of(**ptr) == Some(parent))
            .map(|(id, ptr)| (*id, *ptr))
    }

    pub(crate) fn has_child(&self, parent: ObjectId) -> bool {
        self.children(parent).next().is_some()
    }

    /// True when no object registered after `child` shares its parent
    pub(crate) fn is_last_child(&self, child: ObjectId, parent: ObjectId) -> bool {
        self.entries
            .range((Bound::Excluded(child), Bound::Unbounded))
            .all(|(_, ptr)| parent_of(*ptr) != Some(parent))
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Find `id` in the subtree rooted at `root`
    ///
    /// Climbs from the match towards the top instead of walking down, so the
    /// cost is one lookup per ancestor and the stack stays flat.
    fn find(&self, root: ObjectId, root_ptr: ObjectPtr, id: ObjectId) -> Option<ObjectPtr> {
        if root == id {
            return Some(root_ptr);
        }

        let found = *self.entries.get(&id)?;
        let mut ancestor = parent_of(found);
        while let Some(current) = ancestor {
            if current == root {
                return Some(found);
            }
            // An unregistered ancestor is some other root
            ancestor = parent_of(*self.entries.get(&current)?);
        }
        None
    }
}

/// Parent of a registered object
///
/// Only meaningful while the structural lock is held: registry membership
/// keeps the header alive.
fn parent_of(ptr: ObjectPtr) -> Option<ObjectId> {
    // SAFETY: see above
    unsafe { ptr.header().parent_id }
}

/// Acquire the structural lock
pub(crate) fn lock() -> MutexGuard<'static, Registry> {
    TREE.lock()
}

/// Result of [`list_children`]
#[derive(Debug, Default)]
pub struct ChildList {
    /// Up to `limit` held children
    pub children: Children,
    /// Number of children found, may exceed `children.len()`
    pub total: usize,
}

/// Held snapshot of `obj`'s direct children
pub fn children_of(obj: &Object) -> Vec<Object> {
    let registry = lock();
    registry
        .children(obj.id())
        .map(|(_, ptr)| Object::hold_ptr(ptr))
        .collect()
}

/// Hold up to `limit` children of `obj`, returning the true count
///
/// Diagnostics only: the list may be stale before this returns, and objects
/// appear in the tree before their creator finished setting them up.
pub fn list_children(obj: &Object, limit: usize) -> ChildList {
    let registry = lock();
    let mut list = ChildList::default();

    for (_, ptr) in registry.children(obj.id()) {
        if list.total < limit {
            list.children.push(Object::hold_ptr(ptr));
        }
        list.total += 1;
    }
    list
}

pub fn has_children(obj: &Object) -> bool {
    has_children_ptr(obj.ptr())
}

pub(crate) fn has_children_ptr(ptr: ObjectPtr) -> bool {
    // SAFETY: callers hold a reference or are destroying the object
    let id = unsafe { ptr.header().id };
    lock().has_child(id)
}

/// Whether `obj` is the most recently created child of `parent`
pub fn is_last_child(obj: &Object, parent: &Object) -> bool {
    lock().is_last_child(obj.id(), parent.id())
}

/// Resolve an untrusted identifier to a held object in `root`'s subtree
///
/// The structural lock is held for the whole search, so the match cannot be
/// destroyed between being found and being held. Destroyed identifiers never
/// match since identifiers are not reused.
pub fn exists(root: &Object, id: ObjectId) -> Option<Object> {
    let registry = lock();
    let found = registry.find(root.id(), root.ptr(), id)?;
    Some(Object::hold_ptr(found))
}

/// Number of registered (non-root) objects in the process
pub fn registered_count() -> usize {
    lock().len()
}

/// Whether `id` is currently registered
pub fn is_registered(id: ObjectId) -> bool {
    lock().contains(id)
}
