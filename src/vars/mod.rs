//! Per-object variables with change callbacks
//!
//! Design: each object owns a [`VarStore`], a name-ordered map behind its own
//! mutex plus a condition variable. Callbacks run with the mutex released;
//! while a variable's callbacks run, other writers of that variable wait on
//! the condition variable. Nothing here touches the structural lock.

mod value;

#[cfg(test)]
mod tests;

pub use value::{Value, VarKind};

use crate::error::{ObjectError, Result};
use crate::object::Object;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

static NEXT_CALLBACK: AtomicU64 = AtomicU64::new(1);

/// Change callback: `(object, name, old value, new value)`
pub type VarCallback = dyn Fn(&Object, &str, &Value, &Value) -> Result<()> + Send + Sync;

/// Registration token returned by [`Object::var_add_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

struct Variable {
    kind: VarKind,
    is_command: bool,
    value: Value,
    /// Number of outstanding `var_create` calls
    refs: usize,
    callbacks: Vec<(CallbackId, Arc<VarCallback>)>,
    /// Thread currently running this variable's callbacks
    running: Option<ThreadId>,
}

/// Copy of one variable taken for dumps
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub name: String,
    pub kind: VarKind,
    pub value: Value,
    pub is_command: bool,
    pub callbacks: usize,
}

type VarMap = BTreeMap<String, Variable>;

pub struct VarStore {
    vars: Mutex<VarMap>,
    idle: Condvar,
}

impl VarStore {
    pub(crate) fn new() -> Self {
        Self {
            vars: Mutex::new(BTreeMap::new()),
            idle: Condvar::new(),
        }
    }

    /// Wait until no callback of `name` runs; fails if it does not exist
    fn wait_idle(&self, vars: &mut MutexGuard<'_, VarMap>, name: &str) -> Result<()> {
        let me = thread::current().id();
        loop {
            let running = match vars.get(name) {
                None => return Err(ObjectError::no_such_variable(name)),
                Some(var) => var.running,
            };
            match running {
                None => return Ok(()),
                Some(owner) => {
                    assert_ne!(owner, me, "variable '{}' modified from its own callback", name);
                    self.idle.wait(vars);
                }
            }
        }
    }
}

/// Clears a variable's running mark and wakes waiting writers, also when a
/// callback unwinds
struct RunningGuard<'a> {
    store: &'a VarStore,
    name: &'a str,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut vars = self.store.vars.lock();
        if let Some(var) = vars.get_mut(self.name) {
            var.running = None;
        }
        drop(vars);
        self.store.idle.notify_all();
    }
}

impl Object {
    fn vars(&self) -> &VarStore {
        &self.header().vars
    }

    /// Create a variable, or take another reference on an existing one
    pub fn var_create(&self, name: &str, kind: VarKind) -> Result<()> {
        self.create_var(name, kind, false)
    }

    /// Create a command variable
    ///
    /// Setting a command runs its callbacks with the argument and reports the
    /// first callback failure; the argument is not stored.
    pub fn var_create_command(&self, name: &str, kind: VarKind) -> Result<()> {
        self.create_var(name, kind, true)
    }

    fn create_var(&self, name: &str, kind: VarKind, is_command: bool) -> Result<()> {
        let mut vars = self.vars().vars.lock();
        if let Some(var) = vars.get_mut(name) {
            if var.kind != kind {
                return Err(ObjectError::TypeMismatch {
                    name: name.to_string(),
                    expected: var.kind.name(),
                    found: kind.name(),
                });
            }
            var.refs += 1;
            return Ok(());
        }

        vars.insert(
            name.to_string(),
            Variable {
                kind,
                is_command,
                value: kind.default_value(),
                refs: 1,
                callbacks: Vec::new(),
                running: None,
            },
        );
        Ok(())
    }

    /// Drop one creation reference; the variable goes away at zero
    pub fn var_destroy(&self, name: &str) -> Result<()> {
        let store = self.vars();
        let mut vars = store.vars.lock();
        store.wait_idle(&mut vars, name)?;

        let remaining = match vars.get_mut(name) {
            Some(var) => {
                var.refs -= 1;
                var.refs
            }
            None => return Err(ObjectError::no_such_variable(name)),
        };

        if remaining == 0 {
            let removed = vars.remove(name);
            drop(vars);
            // Callback captures are dropped outside the lock
            drop(removed);
        }
        Ok(())
    }

    pub fn var_exists(&self, name: &str) -> bool {
        self.vars().vars.lock().contains_key(name)
    }

    pub fn var_kind(&self, name: &str) -> Option<VarKind> {
        self.vars().vars.lock().get(name).map(|var| var.kind)
    }

    pub fn var_get(&self, name: &str) -> Result<Value> {
        self.vars()
            .vars
            .lock()
            .get(name)
            .map(|var| var.value.clone())
            .ok_or_else(|| ObjectError::no_such_variable(name))
    }

    /// Assign a value and run the change callbacks
    ///
    /// Callback failures are returned for command variables and only logged
    /// for plain ones.
    pub fn var_set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let store = self.vars();
        let mut vars = store.vars.lock();
        store.wait_idle(&mut vars, name)?;

        let var = vars
            .get_mut(name)
            .ok_or_else(|| ObjectError::no_such_variable(name))?;
        if value.kind() != var.kind {
            return Err(ObjectError::TypeMismatch {
                name: name.to_string(),
                expected: var.kind.name(),
                found: value.kind().name(),
            });
        }

        let old = if var.is_command {
            value.clone()
        } else {
            std::mem::replace(&mut var.value, value.clone())
        };
        if var.callbacks.is_empty() {
            return Ok(());
        }

        let callbacks: Vec<Arc<VarCallback>> =
            var.callbacks.iter().map(|(_, cb)| cb.clone()).collect();
        let is_command = var.is_command;
        var.running = Some(thread::current().id());
        drop(vars);
        let _running = RunningGuard { store, name };

        let mut result = Ok(());
        for callback in &callbacks {
            if let Err(err) = callback(self, name, &old, &value) {
                if is_command {
                    result = Err(err);
                    break;
                }
                crate::obj_dbg!(self, "callback on {} failed: {}", name, err);
            }
        }

        result
    }

    /// Run a command variable with a string argument
    pub fn var_command(&self, name: &str, arg: &str) -> Result<()> {
        let is_command = self
            .vars()
            .vars
            .lock()
            .get(name)
            .map(|var| var.is_command)
            .ok_or_else(|| ObjectError::no_such_variable(name))?;
        if !is_command {
            return Err(ObjectError::TypeMismatch {
                name: name.to_string(),
                expected: "command",
                found: "variable",
            });
        }
        self.var_set(name, arg)
    }

    pub fn var_add_callback<F>(&self, name: &str, callback: F) -> Result<CallbackId>
    where
        F: Fn(&Object, &str, &Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        let id = CallbackId(NEXT_CALLBACK.fetch_add(1, Ordering::Relaxed));
        let mut vars = self.vars().vars.lock();
        let var = vars
            .get_mut(name)
            .ok_or_else(|| ObjectError::no_such_variable(name))?;
        var.callbacks.push((id, Arc::new(callback)));
        Ok(id)
    }

    /// Unregister a callback, waiting for a running invocation to finish
    pub fn var_del_callback(&self, name: &str, id: CallbackId) -> Result<()> {
        let store = self.vars();
        let mut vars = store.vars.lock();
        store.wait_idle(&mut vars, name)?;

        let var = vars
            .get_mut(name)
            .ok_or_else(|| ObjectError::no_such_variable(name))?;
        let index = var
            .callbacks
            .iter()
            .position(|(cb_id, _)| *cb_id == id)
            .ok_or_else(|| ObjectError::NoSuchCallback { name: name.to_string() })?;
        let removed = var.callbacks.remove(index);
        drop(vars);
        drop(removed);
        Ok(())
    }

    /// Remove every variable regardless of creation count
    pub fn var_destroy_all(&self) {
        let drained = std::mem::take(&mut *self.vars().vars.lock());
        drop(drained);
    }

    /// Copy of all variables in name order
    pub fn var_snapshot(&self) -> Vec<VarInfo> {
        self.vars()
            .vars
            .lock()
            .iter()
            .map(|(name, var)| VarInfo {
                name: name.clone(),
                kind: var.kind,
                value: var.value.clone(),
                is_command: var.is_command,
                callbacks: var.callbacks.len(),
            })
            .collect()
    }
}
