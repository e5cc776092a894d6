//! objtree - reference-counted object trees with per-object variables
//!
//! Every object is a node in a single process-wide ownership tree. Objects
//! are reference counted; a child holds its parent alive, and the last
//! release tears an object down and walks up to its parent.
//!
//! Modules:
//! - [`object`]: handles, creation, hold/release and teardown
//! - [`tree`]: the registry and structural queries (children, `exists`)
//! - [`vars`]: typed variables with change callbacks
//! - [`debug`]: the `tree` and `vars` commands every root carries
//! - [`cancel`]: cooperative cancellation and suspension windows
//! - [`script`]: wrappers handed to scripting hosts
//! - [`ffi`]: the C ABI

pub mod cancel;
pub mod config;
pub mod debug;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod object;
pub mod script;
pub mod tree;
pub mod vars;

pub use config::RuntimeConfig;
pub use error::{ObjectError, Result};
pub use object::{Object, ObjectId, RootOptions};
pub use script::{ReleaseFn, ScriptObject};
pub use tree::{exists, ChildList};
pub use vars::{CallbackId, Value, VarKind};

use tracing_appender::non_blocking::WorkerGuard;

/// Runtime initialization
///
/// Sets up logging from `config` and the registry. The returned guard, if
/// any, must be kept alive for file output to be flushed.
pub fn init(config: &RuntimeConfig) -> Option<WorkerGuard> {
    let guard = logging::init_with_config(config.log_config());
    let registered = tree::registered_count();
    logging::debug!(target: "objtree", registered, "runtime initialized");
    guard
}
