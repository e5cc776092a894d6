//! Resources attached to an object's lifetime
//!
//! Owners attach values here and must clear them before the last reference
//! goes away; destroying an object with resources still attached is fatal.

use super::Object;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(u64);

pub(crate) struct Resource {
    id: ResourceId,
    value: Box<dyn Any + Send>,
}

impl Object {
    /// Attach `value` to this object
    pub fn add_resource<R: Any + Send>(&self, value: R) -> ResourceId {
        let id = ResourceId(NEXT_RESOURCE.fetch_add(1, Ordering::Relaxed));
        self.header().resources.lock().push(Resource {
            id,
            value: Box::new(value),
        });
        id
    }

    /// Detach and return a resource
    ///
    /// Returns `None` (and leaves it attached) when `id` is unknown or the
    /// resource is not an `R`.
    pub fn take_resource<R: Any + Send>(&self, id: ResourceId) -> Option<R> {
        let mut resources = self.header().resources.lock();
        let index = resources
            .iter()
            .position(|res| res.id == id && res.value.is::<R>())?;
        let resource = resources.remove(index);
        drop(resources);

        resource.value.downcast::<R>().ok().map(|value| *value)
    }

    pub fn resource_count(&self) -> usize {
        self.header().resources.lock().len()
    }

    /// Drop every attached resource, most recent first
    pub fn clear_resources(&self) {
        let drained = std::mem::take(&mut *self.header().resources.lock());
        for resource in drained.into_iter().rev() {
            drop(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Tracked(u32, Arc<Mutex<Vec<u32>>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.1.lock().push(self.0);
        }
    }

    #[test]
    fn test_take_resource() {
        let root = Object::create(None, 0, "root").unwrap();
        let id = root.add_resource(String::from("buffer"));
        assert_eq!(root.resource_count(), 1);

        // Wrong type leaves it in place
        assert_eq!(root.take_resource::<u32>(id), None);
        assert_eq!(root.resource_count(), 1);

        assert_eq!(root.take_resource::<String>(id).as_deref(), Some("buffer"));
        assert_eq!(root.resource_count(), 0);
    }

    #[test]
    fn test_clear_resources_reverse_order() {
        let root = Object::create(None, 0, "root").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        root.add_resource(Tracked(1, log.clone()));
        root.add_resource(Tracked(2, log.clone()));
        root.add_resource(Tracked(3, log.clone()));
        root.clear_resources();

        assert_eq!(*log.lock(), vec![3, 2, 1]);
        assert_eq!(root.resource_count(), 0);
    }
}
