//! Cooperative thread cancellation with suspension windows
//!
//! A thread may install a [`CancelToken`]; another thread cancels it and the
//! owner observes the request at its next [`check`]. Code that runs arbitrary
//! teardown callbacks opens a [`CancelGuard`] so the request is not observed
//! until the guard (and every enclosing guard) is dropped.

use crate::error::{ObjectError, Result};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

thread_local! {
    static TOKEN: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
    static SUSPENDED: Cell<u32> = const { Cell::new(0) };
}

/// Shared cancellation flag for one thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the owning thread
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Install `token` as the calling thread's token, returning the previous one
pub fn install(token: CancelToken) -> Option<CancelToken> {
    TOKEN.with(|slot| slot.borrow_mut().replace(token))
}

/// Remove the calling thread's token
pub fn uninstall() -> Option<CancelToken> {
    TOKEN.with(|slot| slot.borrow_mut().take())
}

/// Cancellation point
///
/// Fails with [`ObjectError::Cancelled`] when the thread's token was cancelled
/// and no [`CancelGuard`] is open.
pub fn check() -> Result<()> {
    if is_suspended() {
        return Ok(());
    }
    let cancelled = TOKEN.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(false, CancelToken::is_cancelled)
    });
    if cancelled {
        Err(ObjectError::Cancelled)
    } else {
        Ok(())
    }
}

/// Whether cancellation is currently suspended on this thread
pub fn is_suspended() -> bool {
    SUSPENDED.with(|depth| depth.get() > 0)
}

/// Suspend cancellation until the returned guard is dropped
#[must_use]
pub fn suspend() -> CancelGuard {
    SUSPENDED.with(|depth| depth.set(depth.get() + 1));
    CancelGuard { _not_send: PhantomData }
}

/// RAII suspension window; nests
pub struct CancelGuard {
    // Restores thread-local state, must drop on the thread that opened it
    _not_send: PhantomData<*const ()>,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        SUSPENDED.with(|depth| depth.set(depth.get() - 1));
    }
}
