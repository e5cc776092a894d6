//! Error types for the object runtime
//!
//! Only recoverable conditions live here. Ownership contract violations
//! (holding a dead object, destroying an object that still has children or
//! attached resources) are assertions, not errors.

use std::fmt;

/// Status returned by the C ABI on success
pub const STATUS_SUCCESS: i32 = 0;
/// Generic failure
pub const STATUS_EGENERIC: i32 = -1;
/// Allocation failure
pub const STATUS_ENOMEM: i32 = -2;
/// Identifier does not resolve to a live object
pub const STATUS_ENOOBJ: i32 = -3;
/// Variable does not exist
pub const STATUS_ENOVAR: i32 = -4;
/// Invalid value or argument
pub const STATUS_EINVAL: i32 = -5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    AllocationFailed { size: usize },
    NoSuchObject { query: String },
    NoSuchVariable { name: String },
    NoSuchCallback { name: String },
    TypeMismatch { name: String, expected: &'static str, found: &'static str },
    RootExists,
    Cancelled,
    Config { message: String },
    Callback { name: String, message: String },
}

impl ObjectError {
    pub fn no_such_object(query: impl Into<String>) -> Self {
        Self::NoSuchObject { query: query.into() }
    }

    pub fn no_such_variable(name: impl Into<String>) -> Self {
        Self::NoSuchVariable { name: name.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Map to the integer status used across the C ABI
    pub fn code(&self) -> i32 {
        match self {
            Self::AllocationFailed { .. } => STATUS_ENOMEM,
            Self::NoSuchObject { .. } => STATUS_ENOOBJ,
            Self::NoSuchVariable { .. } | Self::NoSuchCallback { .. } => STATUS_ENOVAR,
            Self::TypeMismatch { .. } | Self::Config { .. } => STATUS_EINVAL,
            Self::RootExists | Self::Cancelled | Self::Callback { .. } => STATUS_EGENERIC,
        }
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { size } => {
                write!(f, "Cannot allocate object with {} payload bytes", size)
            }
            Self::NoSuchObject { query } => write!(f, "no such object: {}", query),
            Self::NoSuchVariable { name } => write!(f, "no such variable: {}", name),
            Self::NoSuchCallback { name } => {
                write!(f, "callback not registered on variable: {}", name)
            }
            Self::TypeMismatch { name, expected, found } => write!(
                f,
                "Type mismatch on variable '{}': expected {}, found {}",
                name, expected, found
            ),
            Self::RootExists => write!(f, "A root object already exists"),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::Config { message } => write!(f, "Configuration error: {}", message),
            Self::Callback { name, message } => {
                write!(f, "Callback on '{}' failed: {}", name, message)
            }
        }
    }
}

impl std::error::Error for ObjectError {}

pub type Result<T> = std::result::Result<T, ObjectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_object_has_distinct_code() {
        let err = ObjectError::no_such_object("0x2a");
        assert_eq!(err.code(), STATUS_ENOOBJ);
        assert_ne!(err.code(), ObjectError::no_such_variable("x").code());
        assert_eq!(err.to_string(), "no such object: 0x2a");
    }

    #[test]
    fn test_display_messages() {
        let err = ObjectError::TypeMismatch {
            name: "volume".to_string(),
            expected: "integer",
            found: "string",
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch on variable 'volume': expected integer, found string"
        );
        assert_eq!(ObjectError::AllocationFailed { size: 8 }.code(), STATUS_ENOMEM);
    }
}
