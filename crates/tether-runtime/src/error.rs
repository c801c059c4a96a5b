//! Error taxonomy for the bridge
//!
//! Two families live here:
//! - [`ConversionError`] is returned to host code by the converter and the
//!   adapter constructor. It never reaches script context on its own.
//! - [`ScriptError`] is what a script-callable returns to the runtime. Its
//!   [`ErrorKind`] keeps argument errors apart from runtime faults.

use thiserror::Error;

/// Failure of a host/script value conversion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// A host or script value has no mapping rule
    #[error("unknown type {type_name}: {description}")]
    UnknownType {
        type_name: String,
        description: String,
    },

    /// Wrong argument count for an adapted function
    #[error(
        "wrong number of arguments: expected {}{expected}, got {actual}",
        arity_qualifier(.variadic)
    )]
    ArityMismatch {
        expected: usize,
        actual: usize,
        variadic: bool,
    },

    /// A decoded value cannot become the declared parameter type
    #[error("cannot convert {found} to {expected}")]
    TypeCoercionFailed { expected: String, found: String },

    /// Adapter input is not callable
    #[error("{type_name} is not a function")]
    NotAFunction { type_name: String },

    /// Nesting went past the configured depth limit
    #[error("value nesting exceeds the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    /// A map key cannot be stored in a table
    #[error(transparent)]
    InvalidTableKey(#[from] TableKeyError),
}

impl ConversionError {
    /// Build an `UnknownType` error
    pub fn unknown_type(type_name: impl Into<String>, description: impl Into<String>) -> Self {
        ConversionError::UnknownType {
            type_name: type_name.into(),
            description: description.into(),
        }
    }

    /// Build a `TypeCoercionFailed` error
    pub fn coercion(expected: impl ToString, found: impl Into<String>) -> Self {
        ConversionError::TypeCoercionFailed {
            expected: expected.to_string(),
            found: found.into(),
        }
    }
}

/// Keys a table refuses to store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableKeyError {
    #[error("table index is nil")]
    Nil,
    #[error("table index is NaN")]
    NaN,
}

/// Which script-visible channel an error travels on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong argument count or an argument that failed to decode/coerce
    Argument,
    /// Results that cannot be encoded, or an explicit host failure
    Runtime,
    /// Failures of the runtime state itself
    State,
}

/// Error raised inside script context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Argument at `position` could not be decoded or coerced
    #[error("bad argument #{position} to '{function}' ({message})")]
    Argument {
        function: String,
        position: usize,
        message: String,
    },

    /// Wrong number of arguments
    #[error(
        "Function '{function}' expects {}{expected} argument{}, got {actual}",
        arity_qualifier(.variadic),
        plural(.expected)
    )]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
        variadic: bool,
    },

    /// Host-level fault; `attempted` results were being pushed when it happened
    #[error("{message}")]
    Runtime { message: String, attempted: usize },

    /// Attempt to call something that is not a function
    #[error("attempt to call a {type_name} value")]
    NotCallable { type_name: String },

    /// `require` of a module nobody preloaded
    #[error("module '{name}' not found")]
    ModuleNotFound { name: String },

    /// Nested calls went past the state's limit
    #[error("stack overflow: call depth exceeded {limit}")]
    CallDepthExceeded { limit: usize },
}

impl ScriptError {
    /// The channel this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Argument { .. } | ScriptError::Arity { .. } => ErrorKind::Argument,
            ScriptError::Runtime { .. } => ErrorKind::Runtime,
            ScriptError::NotCallable { .. }
            | ScriptError::ModuleNotFound { .. }
            | ScriptError::CallDepthExceeded { .. } => ErrorKind::State,
        }
    }

    /// Plain runtime error with nothing pushed
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            message: message.into(),
            attempted: 0,
        }
    }

    pub fn is_argument_error(&self) -> bool {
        self.kind() == ErrorKind::Argument
    }
}

fn arity_qualifier(variadic: &bool) -> &'static str {
    if *variadic {
        "at least "
    } else {
        ""
    }
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message() {
        let err = ScriptError::Arity {
            function: "add".to_string(),
            expected: 2,
            actual: 3,
            variadic: false,
        };
        assert_eq!(err.to_string(), "Function 'add' expects 2 arguments, got 3");

        let err = ScriptError::Arity {
            function: "sum".to_string(),
            expected: 1,
            actual: 0,
            variadic: true,
        };
        assert_eq!(
            err.to_string(),
            "Function 'sum' expects at least 1 argument, got 0"
        );
    }

    #[test]
    fn test_error_kinds_are_disjoint() {
        let arg = ScriptError::Argument {
            function: "f".to_string(),
            position: 2,
            message: "cannot convert string to int".to_string(),
        };
        assert_eq!(arg.kind(), ErrorKind::Argument);
        assert_eq!(
            arg.to_string(),
            "bad argument #2 to 'f' (cannot convert string to int)"
        );

        assert_eq!(ScriptError::runtime("boom").kind(), ErrorKind::Runtime);
        assert_eq!(
            ScriptError::ModuleNotFound {
                name: "x".to_string()
            }
            .kind(),
            ErrorKind::State
        );
    }

    #[test]
    fn test_conversion_error_messages() {
        let err = ConversionError::ArityMismatch {
            expected: 1,
            actual: 0,
            variadic: true,
        };
        assert_eq!(
            err.to_string(),
            "wrong number of arguments: expected at least 1, got 0"
        );

        let err: ConversionError = TableKeyError::NaN.into();
        assert_eq!(err.to_string(), "table index is NaN");
    }
}
