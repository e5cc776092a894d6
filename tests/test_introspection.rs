use objtree::debug::{dump_tree, dump_tree_with_depth, dump_vars, resolve};
use objtree::ffi::{objtree_command, objtree_object_release};
use objtree::{Object, ObjectError, VarKind};
use std::ffi::c_char;

fn tree_text(root: &Object) -> String {
    let mut out = Vec::new();
    dump_tree(root, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_tree_dump_nests_grandchildren() {
    let root = Object::create(None, 0, "root").unwrap();
    let a = Object::create(Some(&root), 0, "A").unwrap();
    let _b = Object::create(Some(&root), 0, "B").unwrap();
    let c = Object::create(Some(&a), 0, "C").unwrap();

    let text = tree_text(&root);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);

    assert!(lines[0].starts_with("─┬╴"));
    assert!(lines[1].starts_with(" ├─┬╴"));
    assert_eq!(lines[2], format!(" │ └──╴{} C, 1 refs", c.id()));
    assert!(lines[3].starts_with(" └──╴"));
    assert!(lines[3].ends_with(" B, 1 refs"));
}

#[test]
fn test_tree_dump_shows_generic_type() {
    let root = Object::create(None, 0, "root").unwrap();
    let anonymous = Object::create(Some(&root), 0, "").unwrap();

    let text = tree_text(&root);
    assert!(text.contains(&format!("{} generic, 1 refs", anonymous.id())));
}

#[test]
fn test_depth_limit_truncates() {
    let root = Object::create(None, 0, "root").unwrap();
    let mut chain = vec![root.clone()];
    for _ in 0..10 {
        let next = Object::create(chain.last(), 0, "link").unwrap();
        chain.push(next);
    }

    let mut out = Vec::new();
    dump_tree_with_depth(&root, &mut out, 0).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);

    assert_eq!(tree_text(&root).lines().count(), 11);
    while chain.pop().is_some() {}
}

#[test]
fn test_vars_of_descendant() {
    let root = Object::create(None, 0, "root").unwrap();
    let output = Object::create(Some(&root), 0, "audio output").unwrap();
    output.var_create("mute", VarKind::Bool).unwrap();
    output.var_set("mute", true).unwrap();
    output.var_create("gain", VarKind::Float).unwrap();
    output.var_set("gain", 0.5f64).unwrap();
    output.var_create("reset", VarKind::Void).unwrap();

    let target = resolve(&root, &output.id().to_string()).unwrap();
    let mut out = Vec::new();
    dump_vars(&target, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        format!(
            " o {} audio output, parent {}\n \
             *-o \"gain\" (float): 0.500000\n \
             *-o \"mute\" (bool): true\n \
             *-o \"reset\" (void)\n",
            output.id(),
            root.id()
        )
    );

    assert!(root.var_command("vars", &output.id().to_string()).is_ok());
}

#[test]
fn test_destroyed_identifiers_are_rejected() {
    let root = Object::create(None, 0, "root").unwrap();
    let child = Object::create(Some(&root), 0, "child").unwrap();
    let id = child.id().to_string();
    drop(child);

    assert!(matches!(resolve(&root, &id), Err(ObjectError::NoSuchObject { .. })));
    assert!(matches!(
        root.var_command("vars", &id),
        Err(ObjectError::NoSuchObject { .. })
    ));
}

#[test]
fn test_other_roots_subtree_is_out_of_reach() {
    let root = Object::create(None, 0, "root").unwrap();
    let other = Object::create(None, 0, "root").unwrap();
    let stranger = Object::create(Some(&other), 0, "stranger").unwrap();

    let id = stranger.id().to_string();
    assert!(resolve(&root, &id).is_err());
    assert_eq!(resolve(&other, &id).unwrap(), stranger);
}

#[test]
fn test_c_command_status() {
    let root = Object::create(None, 0, "root").unwrap();
    let raw = root.clone().into_raw();

    let status = unsafe {
        objtree_command(
            raw,
            b"tree\0".as_ptr() as *const c_char,
            std::ptr::null(),
        )
    };
    assert_eq!(status, objtree::error::STATUS_SUCCESS);

    unsafe { objtree_object_release(raw) };
    assert_eq!(root.refs(), 1);
}
