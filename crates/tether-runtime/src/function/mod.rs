//! Host functions callable from scripts
//!
//! - `descriptor` - parameter/return types and arity rules
//! - `signature` - descriptors derived from Rust function types
//! - `adapter` - the decode/coerce/invoke/encode pipeline

pub mod adapter;
pub mod descriptor;
pub mod signature;

pub use adapter::{must_to_script_function, to_script_function, CallFailure, HostFn, HostFunction};
pub use descriptor::{FunctionDescriptor, ParamType};
pub use signature::{IntoHostFunction, IntoResults, Variadic};
