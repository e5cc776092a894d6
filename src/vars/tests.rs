use super::*;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

fn root() -> Object {
    Object::create(None, 0, "root").unwrap()
}

#[test]
fn test_create_get_set() {
    let obj = root();
    obj.var_create("volume", VarKind::Integer).unwrap();
    assert_eq!(obj.var_get("volume").unwrap(), Value::Integer(0));
    assert_eq!(obj.var_kind("volume"), Some(VarKind::Integer));

    obj.var_set("volume", 80i64).unwrap();
    assert_eq!(obj.var_get("volume").unwrap().as_integer(), Some(80));

    obj.var_create("rate", VarKind::Float).unwrap();
    obj.var_set("rate", 1.5f64).unwrap();
    assert_eq!(obj.var_get("rate").unwrap().as_float(), Some(1.5));
}

#[test]
fn test_missing_variable() {
    let obj = root();
    assert!(!obj.var_exists("nope"));
    assert_eq!(obj.var_get("nope"), Err(ObjectError::no_such_variable("nope")));
    assert_eq!(obj.var_set("nope", true), Err(ObjectError::no_such_variable("nope")));
    assert!(obj.var_destroy("nope").is_err());
}

#[test]
fn test_type_mismatch() {
    let obj = root();
    obj.var_create("fullscreen", VarKind::Bool).unwrap();

    let err = obj.var_set("fullscreen", "yes").unwrap_err();
    assert!(matches!(err, ObjectError::TypeMismatch { expected: "bool", found: "string", .. }));

    let err = obj.var_create("fullscreen", VarKind::Integer).unwrap_err();
    assert!(matches!(err, ObjectError::TypeMismatch { .. }));
    assert_eq!(obj.var_get("fullscreen").unwrap(), Value::Bool(false));
}

#[test]
fn test_creation_is_counted() {
    let obj = root();
    obj.var_create("title", VarKind::String).unwrap();
    obj.var_create("title", VarKind::String).unwrap();
    obj.var_set("title", "intro").unwrap();

    obj.var_destroy("title").unwrap();
    assert_eq!(obj.var_get("title").unwrap().as_str(), Some("intro"));

    obj.var_destroy("title").unwrap();
    assert!(!obj.var_exists("title"));
}

#[test]
fn test_callback_sees_old_and_new() {
    let obj = root();
    obj.var_create("volume", VarKind::Integer).unwrap();
    obj.var_set("volume", 10i64).unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    obj.var_add_callback("volume", move |_, name, old, new| {
        sink.lock().push((name.to_string(), old.clone(), new.clone()));
        Ok(())
    })
    .unwrap();

    obj.var_set("volume", 20i64).unwrap();
    assert_eq!(
        *seen.lock(),
        vec![("volume".to_string(), Value::Integer(10), Value::Integer(20))]
    );
}

#[test]
fn test_del_callback() {
    let obj = root();
    obj.var_create("volume", VarKind::Integer).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = obj
        .var_add_callback("volume", move |_, _, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    obj.var_set("volume", 1i64).unwrap();
    obj.var_del_callback("volume", id).unwrap();
    obj.var_set("volume", 2i64).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = obj.var_del_callback("volume", id).unwrap_err();
    assert!(matches!(err, ObjectError::NoSuchCallback { .. }));
}

#[test]
fn test_plain_callback_errors_are_ignored() {
    let obj = root();
    obj.var_create("volume", VarKind::Integer).unwrap();
    obj.var_add_callback("volume", |_, name, _, _| {
        Err(ObjectError::Callback {
            name: name.to_string(),
            message: "rejected".to_string(),
        })
    })
    .unwrap();

    assert!(obj.var_set("volume", 3i64).is_ok());
    assert_eq!(obj.var_get("volume").unwrap(), Value::Integer(3));
}

#[test]
fn test_command_reports_callback_error() {
    let obj = root();
    obj.var_create_command("seek", VarKind::String).unwrap();
    obj.var_add_callback("seek", |_, _, _, arg| match arg.as_str() {
        Some("start") => Ok(()),
        _ => Err(ObjectError::Callback {
            name: "seek".to_string(),
            message: "bad position".to_string(),
        }),
    })
    .unwrap();

    assert!(obj.var_command("seek", "start").is_ok());
    assert!(matches!(
        obj.var_command("seek", "middle"),
        Err(ObjectError::Callback { .. })
    ));
    // Command arguments are not stored
    assert_eq!(obj.var_get("seek").unwrap(), Value::String(String::new()));
}

#[test]
fn test_command_on_plain_variable() {
    let obj = root();
    obj.var_create("title", VarKind::String).unwrap();
    assert!(matches!(
        obj.var_command("title", "x"),
        Err(ObjectError::TypeMismatch { expected: "command", .. })
    ));
    assert!(matches!(
        obj.var_command("missing", "x"),
        Err(ObjectError::NoSuchVariable { .. })
    ));
}

#[test]
fn test_concurrent_set_waits_for_callbacks() {
    let obj = root();
    obj.var_create("volume", VarKind::Integer).unwrap();

    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (a, o) = (active.clone(), overlaps.clone());
    obj.var_add_callback("volume", move |_, _, _, _| {
        if a.fetch_add(1, Ordering::SeqCst) != 0 {
            o.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_millis(5));
        a.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let obj = obj.clone();
            thread::spawn(move || {
                for j in 0..5 {
                    obj.var_set("volume", (i * 10 + j) as i64).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
#[should_panic(expected = "modified from its own callback")]
fn test_set_from_own_callback_is_fatal() {
    let obj = root();
    obj.var_create("volume", VarKind::Integer).unwrap();
    obj.var_add_callback("volume", |obj, name, _, _| obj.var_set(name, 0i64))
        .unwrap();
    let _ = obj.var_set("volume", 1i64);
}

#[test]
fn test_snapshot_in_name_order() {
    let obj = root();
    obj.var_create("zoom", VarKind::Float).unwrap();
    obj.var_create("audio", VarKind::Void).unwrap();

    let names: Vec<String> = obj.var_snapshot().into_iter().map(|v| v.name).collect();
    assert_eq!(names, vec!["audio", "tree", "vars", "zoom"]);
}

#[test]
fn test_destroy_all() {
    let obj = root();
    obj.var_create("a", VarKind::Bool).unwrap();
    obj.var_create("b", VarKind::Bool).unwrap();
    obj.var_destroy_all();
    assert!(obj.var_snapshot().is_empty());
}

#[test]
fn test_panicking_callback_releases_writers() {
    let obj = root();
    obj.var_create("volume", VarKind::Integer).unwrap();
    obj.var_add_callback("volume", |_, _, _, new| {
        if new.as_integer() == Some(1) {
            panic!("callback rejected 1");
        }
        Ok(())
    })
    .unwrap();

    let first = obj.clone();
    let crashed = thread::spawn(move || first.var_set("volume", 1i64)).join();
    assert!(crashed.is_err());

    let (tx, rx) = std::sync::mpsc::channel();
    let second = obj.clone();
    thread::spawn(move || {
        let _ = tx.send(second.var_set("volume", 2i64));
    });

    let result = rx
        .recv_timeout(Duration::from_secs(3))
        .expect("var_set still blocked after a callback panicked");
    assert!(result.is_ok());
    assert_eq!(obj.var_get("volume").unwrap(), Value::Integer(2));
}
