//! Object logging macros
//!
//! Usage:
//! ```ignore
//! obj_err!(&obj, "no such object: {}", query);
//! obj_dbg!(&obj, "destroying {} children", n);
//! ```

/// Name of the enclosing function
#[doc(hidden)]
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}

/// Log through an object's logger at the given severity
#[macro_export]
macro_rules! obj_log {
    ($obj:expr, $severity:expr, $($arg:tt)+) => {
        $crate::logging::object_log(
            $obj,
            $severity,
            module_path!(),
            file!(),
            line!(),
            $crate::function_name!(),
            format_args!($($arg)+),
        )
    };
}

#[macro_export]
macro_rules! obj_err {
    ($obj:expr, $($arg:tt)+) => {
        $crate::obj_log!($obj, $crate::logging::Severity::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! obj_warn {
    ($obj:expr, $($arg:tt)+) => {
        $crate::obj_log!($obj, $crate::logging::Severity::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! obj_info {
    ($obj:expr, $($arg:tt)+) => {
        $crate::obj_log!($obj, $crate::logging::Severity::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! obj_dbg {
    ($obj:expr, $($arg:tt)+) => {
        $crate::obj_log!($obj, $crate::logging::Severity::Debug, $($arg)+)
    };
}
