//! Tether Runtime - host/script marshaling bridge
//!
//! This library lets a Rust host exchange values and functions with an
//! embedded, dynamically-typed scripting runtime:
//! - Value conversion between host values and script values
//! - Host functions (fixed-arity and variadic) adapted into script callables
//! - A minimal stack-based runtime state with modules and protected calls
//! - A pool of runtime states
//!
//! # Example
//!
//! ```
//! use tether_runtime::{to_script, HostFunction, Module, State, Value};
//!
//! let mut state = State::new();
//! Module::new("greet")
//!     .function(
//!         "hello",
//!         HostFunction::new(|name: String| format!("hello, {}", name)),
//!     )
//!     .register(&mut state);
//!
//! let greet = state.require("greet").unwrap();
//! let hello = greet.as_table().unwrap().raw_get(&Value::from("hello"));
//! let reply = state.call(&hello, &[to_script("tether").unwrap()], 1).unwrap();
//! assert_eq!(reply, vec![Value::from("hello, tether")]);
//! ```

/// Tether runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod convert;
pub mod error;
pub mod function;
pub mod host;
pub mod logging;
pub mod module;
pub mod pool;
pub mod state;
pub mod value;

// Re-export commonly used types
pub use convert::{
    from_script, from_value, must_from_value, must_to_value, to_script, to_value, Converter,
};
pub use error::{ConversionError, ErrorKind, ScriptError, TableKeyError};
pub use function::{
    must_to_script_function, to_script_function, CallFailure, FunctionDescriptor, HostFunction,
    IntoHostFunction, IntoResults, ParamType, Variadic,
};
pub use host::{Foreign, FromHost, HostValue, IntoHost};
pub use module::Module;
pub use pool::{PooledState, StatePool};
pub use state::{CallParams, State};
pub use value::{Function, Opaque, OpaqueKind, OpaqueType, Table, TableKey, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_state_is_send() {
        fn assert_send<T: Send>() {}
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send::<State>();
        assert_send_sync::<Value>();
        assert_send_sync::<HostValue>();
        assert_send_sync::<StatePool>();
    }
}
