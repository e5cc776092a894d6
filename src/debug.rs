//! Introspection commands hosted by root objects
//!
//! `tree` prints the ownership tree, `vars` prints one object's variables.
//! Both are command variables created on every root:
//!
//! ```ignore
//! root.var_command("tree", "")?;
//! root.var_command("vars", "0x2a")?;
//! ```
//!
//! Sample `tree` output:
//! ```text
//! ─┬╴0x1 root, 1 refs
//!  ├─┬╴0x2 input, 2 refs
//!  │ └──╴0x4 decoder, 1 refs
//!  └──╴0x3 output, 1 refs
//! ```

use crate::cancel;
use crate::error::{ObjectError, Result};
use crate::logging::GENERIC_TYPE_NAME;
use crate::object::{Object, ObjectId, ObjectPtr};
use crate::tree::{self, Registry};
use crate::vars::{CallbackId, VarInfo, VarKind};
use std::io::{self, Write};
use std::mem::ManuallyDrop;

/// Default recursion limit for tree dumps
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Callbacks installed on a root, removed again before it is torn down
pub(crate) struct DebugCommands {
    tree: CallbackId,
    vars: CallbackId,
}

pub(crate) fn register_commands(root: &Object, max_depth: usize) -> Result<()> {
    root.var_create_command("tree", VarKind::String)?;
    let tree = root.var_add_callback("tree", move |obj, _, _, _| tree_command(obj, max_depth))?;

    root.var_create_command("vars", VarKind::String)?;
    let vars = root.var_add_callback("vars", |obj, _, _, arg| {
        vars_command(obj, arg.as_str().unwrap_or_default())
    })?;

    if root.header().commands.set(DebugCommands { tree, vars }).is_err() {
        crate::obj_dbg!(root, "debug commands already registered");
    }
    Ok(())
}

pub(crate) fn unregister_commands(root: &Object) {
    let Some(commands) = root.header().commands.get() else {
        return;
    };
    for (name, id) in [("vars", commands.vars), ("tree", commands.tree)] {
        if let Err(err) = root.var_del_callback(name, id) {
            crate::obj_dbg!(root, "cannot remove {} command: {}", name, err);
        }
    }
}

fn io_failure(command: &str, err: io::Error) -> ObjectError {
    ObjectError::Callback {
        name: command.to_string(),
        message: err.to_string(),
    }
}

fn tree_command(root: &Object, max_depth: usize) -> Result<()> {
    let _cancel = cancel::suspend();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dump_tree_with_depth(root, &mut out, max_depth).map_err(|e| io_failure("tree", e))
}

fn vars_command(root: &Object, arg: &str) -> Result<()> {
    let _cancel = cancel::suspend();
    let target = resolve(root, arg)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dump_vars(&target, &mut out).map_err(|e| io_failure("vars", e))
}

/// Turn a `vars` argument into a held object
///
/// Text that parses as an identifier must name `root` or one of its live
/// descendants; anything else selects `root` itself.
pub fn resolve(root: &Object, arg: &str) -> Result<Object> {
    match arg.parse::<ObjectId>() {
        Ok(id) => tree::exists(root, id).ok_or_else(|| {
            crate::obj_err!(root, "no such object: {}", arg);
            ObjectError::no_such_object(arg)
        }),
        Err(_) => Ok(root.clone()),
    }
}

/// Print the subtree under `root`, one line per object
pub fn dump_tree<W: Write>(root: &Object, out: &mut W) -> io::Result<()> {
    dump_tree_with_depth(root, out, DEFAULT_MAX_DEPTH)
}

pub fn dump_tree_with_depth<W: Write>(
    root: &Object,
    out: &mut W,
    max_depth: usize,
) -> io::Result<()> {
    let registry = tree::lock();
    dump_structure(&registry, out, root.ptr(), 0, max_depth)
}

fn dump_structure<W: Write>(
    registry: &Registry,
    out: &mut W,
    obj: ObjectPtr,
    level: usize,
    max_depth: usize,
) -> io::Result<()> {
    print_object(registry, out, obj)?;

    // SAFETY: reachable from the registry under the structural lock
    let id = unsafe { obj.header().id };
    if level > max_depth {
        // Borrowed view, the registry keeps it alive; loggers must not touch the tree
        let this = ManuallyDrop::new(Object::from_ptr(obj));
        crate::obj_warn!(&this, "structure tree is too deep");
        return Ok(());
    }

    for (_, child) in registry.children(id) {
        dump_structure(registry, out, child, level + 1, max_depth)?;
    }
    Ok(())
}

fn print_object<W: Write>(registry: &Registry, out: &mut W, obj: ObjectPtr) -> io::Result<()> {
    // SAFETY: reachable from the registry under the structural lock
    let header = unsafe { obj.header() };

    print_prefix(registry, out, obj, true)?;
    let branch = if registry.has_child(header.id) { '┬' } else { '─' };
    let type_name = match header.type_name {
        "" => GENERIC_TYPE_NAME,
        name => name,
    };
    writeln!(
        out,
        "─{}╴{} {}, {} refs",
        branch,
        header.id,
        type_name,
        header.refs()
    )
}

fn print_prefix<W: Write>(
    registry: &Registry,
    out: &mut W,
    obj: ObjectPtr,
    last: bool,
) -> io::Result<()> {
    // SAFETY: ancestors are kept alive by the references of their children
    let header = unsafe { obj.header() };
    let (Some(parent), Some(parent_id)) = (header.parent, header.parent_id) else {
        return Ok(());
    };

    print_prefix(registry, out, parent, false)?;

    let connector = match (registry.is_last_child(header.id, parent_id), last) {
        (true, true) => " └",
        (true, false) => "  ",
        (false, true) => " ├",
        (false, false) => " │",
    };
    out.write_all(connector.as_bytes())
}

/// Print `obj`'s identity line followed by its variables
pub fn dump_vars<W: Write>(obj: &Object, out: &mut W) -> io::Result<()> {
    let parent = match obj.parent_id() {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    };
    writeln!(out, " o {} {}, parent {}", obj.id(), obj.type_name(), parent)?;

    for var in obj.var_snapshot() {
        write_var(out, &var)?;
    }
    Ok(())
}

fn write_var<W: Write>(out: &mut W, var: &VarInfo) -> io::Result<()> {
    write!(out, " *-o \"{}\" ({}", var.name, var.kind)?;
    if var.is_command {
        write!(out, ", command")?;
    }
    if var.callbacks > 0 {
        write!(out, ", {} callbacks", var.callbacks)?;
    }
    write!(out, ")")?;
    if var.kind != VarKind::Void && !var.is_command {
        write!(out, ": {}", var.value)?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogRecord, Logger, Severity};
    use crate::object::RootOptions;
    use parking_lot::Mutex;
    use std::fmt;
    use std::sync::Arc;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(Severity, String, String)>>);

    impl Logger for Capture {
        fn log(&self, record: &LogRecord<'_>, args: fmt::Arguments<'_>) {
            self.0
                .lock()
                .push((record.severity, record.object_type.to_string(), args.to_string()));
        }
    }

    fn captured_root(logger: &Arc<Capture>) -> Object {
        let options = RootOptions::default().with_logger(Some(logger.clone() as Arc<dyn Logger>));
        Object::create_root(0, "root", options).unwrap()
    }

    fn dump(root: &Object) -> String {
        let mut out = Vec::new();
        dump_tree(root, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_leaf_root_line() {
        let root = Object::create(None, 0, "root").unwrap();
        let text = dump(&root);
        assert_eq!(text, format!("──╴{} root, 1 refs\n", root.id()));
    }

    #[test]
    fn test_tree_connectors() {
        let root = Object::create(None, 0, "root").unwrap();
        let a = Object::create(Some(&root), 0, "a").unwrap();
        let b = Object::create(Some(&root), 0, "b").unwrap();
        let c = Object::create(Some(&a), 0, "c").unwrap();

        let expected = format!(
            "─┬╴{} root, 3 refs\n ├─┬╴{} a, 2 refs\n │ └──╴{} c, 1 refs\n └──╴{} b, 1 refs\n",
            root.id(),
            a.id(),
            c.id(),
            b.id()
        );
        assert_eq!(dump(&root), expected);
    }

    #[test]
    fn test_depth_cap() {
        let root = Object::create(None, 0, "root").unwrap();
        let mut chain = vec![root.clone()];
        for _ in 0..5 {
            let next = Object::create(Some(chain.last().unwrap()), 0, "link").unwrap();
            chain.push(next);
        }

        let mut out = Vec::new();
        dump_tree_with_depth(&root, &mut out, 2).unwrap();
        // levels 0..=3 are printed, deeper ones skipped
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 4);

        while let Some(obj) = chain.pop() {
            drop(obj);
        }
    }

    #[test]
    fn test_dump_vars_format() {
        let root = Object::create(None, 0, "root").unwrap();
        root.var_create("volume", VarKind::Integer).unwrap();
        root.var_set("volume", 42i64).unwrap();
        root.var_create("title", VarKind::String).unwrap();
        root.var_set("title", "intro").unwrap();

        let mut out = Vec::new();
        dump_vars(&root, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!(" o {} root, parent none", root.id()));
        assert_eq!(
            &lines[1..],
            &[
                " *-o \"title\" (string): \"intro\"",
                " *-o \"tree\" (string, command, 1 callbacks)",
                " *-o \"vars\" (string, command, 1 callbacks)",
                " *-o \"volume\" (integer): 42",
            ]
        );
    }

    #[test]
    fn test_resolve() {
        let root = Object::create(None, 0, "root").unwrap();
        let child = Object::create(Some(&root), 0, "child").unwrap();

        let found = resolve(&root, &child.id().to_string()).unwrap();
        assert_eq!(found, child);
        assert_eq!(resolve(&root, "").unwrap(), root);
        assert_eq!(resolve(&root, "not an id").unwrap(), root);

        let err = resolve(&root, "0xffffffffffff").unwrap_err();
        assert!(matches!(err, ObjectError::NoSuchObject { .. }));
    }

    #[test]
    fn test_depth_cap_warns_through_object_logger() {
        let logger = Arc::new(Capture::default());
        let root = captured_root(&logger);
        let link = Object::create(Some(&root), 0, "link").unwrap();
        let _leaf = Object::create(Some(&link), 0, "leaf").unwrap();

        let mut out = Vec::new();
        dump_tree_with_depth(&root, &mut out, 0).unwrap();

        let records = logger.0.lock();
        assert_eq!(
            *records,
            vec![(
                Severity::Warning,
                "link".to_string(),
                "structure tree is too deep".to_string()
            )]
        );
    }

    #[test]
    fn test_missing_command_callback_is_logged_at_teardown() {
        let logger = Arc::new(Capture::default());
        let root = captured_root(&logger);
        root.var_destroy_all();
        drop(root);

        let records = logger.0.lock();
        let messages: Vec<&str> = records
            .iter()
            .filter(|(severity, _, _)| *severity == Severity::Debug)
            .map(|(_, _, message)| message.as_str())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("cannot remove vars command"));
        assert!(messages[1].starts_with("cannot remove tree command"));
    }
}
