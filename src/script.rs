//! Script-side object wrappers
//!
//! A scripting host sees objects only through [`ScriptObject`]: an opaque
//! held reference plus an optional release callback chosen per object kind
//! (an input, a video output, ...). When the host collects the wrapper the
//! callback receives the reference; without one the reference is simply
//! released.

use crate::error::{ObjectError, Result};
use crate::object::Object;
use std::fmt;

/// Kind-specific release, given ownership of the wrapper's reference
pub type ReleaseFn = fn(Object);

pub struct ScriptObject {
    object: Option<Object>,
    release: Option<ReleaseFn>,
}

impl ScriptObject {
    /// Wrap a held reference for the host
    pub fn push(object: Object, release: Option<ReleaseFn>) -> Self {
        Self {
            object: Some(object),
            release,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.object.as_ref().map_or("", Object::type_name)
    }

    pub fn is_kind(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }

    /// Access the object after checking its kind
    ///
    /// This is the only way back from the opaque wrapper to an object.
    pub fn check_kind(&self, expected: &'static str) -> Result<&Object> {
        match &self.object {
            Some(object) if object.type_name() == expected => Ok(object),
            Some(object) => Err(ObjectError::TypeMismatch {
                name: object.id().to_string(),
                expected,
                found: object.type_name(),
            }),
            None => Err(ObjectError::no_such_object("collected script object")),
        }
    }

    /// Host garbage collection entry point
    pub fn collect(mut self) {
        self.finalize();
    }

    fn finalize(&mut self) {
        if let Some(object) = self.object.take() {
            match self.release {
                Some(release) => release(object),
                None => drop(object),
            }
        }
    }
}

impl Drop for ScriptObject {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for ScriptObject {
    // Hide the handle from the host
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptObject")
            .field("type_name", &self.type_name())
            .field("has_release", &self.release.is_some())
            .finish_non_exhaustive()
    }
}
