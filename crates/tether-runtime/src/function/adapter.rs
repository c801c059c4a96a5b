//! Host function adapter
//!
//! Wraps a [`HostFunction`] into a script [`Function`]. Each invocation runs
//! the same pipeline:
//!
//! 1. check the argument count against the descriptor
//! 2. decode every argument from the current frame
//! 3. coerce and invoke (the host function only runs if every argument fits)
//! 4. encode and push the results
//!
//! # Examples
//!
//! ```
//! use tether_runtime::{to_script_function, HostFunction, State, Value};
//!
//! let add = to_script_function(HostFunction::new(|a: i64, b: i64| a + b)).unwrap();
//!
//! let mut state = State::new();
//! let results = state
//!     .call(&Value::Function(add), &[Value::Number(2.0), Value::Number(3.0)], 1)
//!     .unwrap();
//! assert_eq!(results, vec![Value::Number(5.0)]);
//! ```

use super::descriptor::{FunctionDescriptor, ParamType};
use super::signature::IntoHostFunction;
use crate::error::{ConversionError, ScriptError};
use crate::host::{HostValue, IntoHost};
use crate::state::State;
use crate::value::Function;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Type-erased host function body: coerces the decoded arguments, runs the
/// function and encodes its results
pub type HostFn =
    dyn Fn(Vec<HostValue>) -> Result<Vec<HostValue>, CallFailure> + Send + Sync + 'static;

/// Why a host function call did not produce results
#[derive(Debug, Clone, PartialEq)]
pub enum CallFailure {
    /// Wrong number of arguments; nothing ran
    Arity {
        expected: usize,
        actual: usize,
        variadic: bool,
    },
    /// Argument at the 1-based `position` failed coercion; nothing ran
    Argument {
        position: usize,
        error: ConversionError,
    },
    /// The host function ran and reported a failure
    Host(String),
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallFailure::Arity {
                expected,
                actual,
                variadic,
            } => write!(
                f,
                "{}",
                ConversionError::ArityMismatch {
                    expected: *expected,
                    actual: *actual,
                    variadic: *variadic,
                }
            ),
            CallFailure::Argument { position, error } => {
                write!(f, "argument #{}: {}", position, error)
            }
            CallFailure::Host(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CallFailure {}

/// Host function with its descriptor
///
/// Cloning is cheap; clones share the descriptor and the body.
#[derive(Clone)]
pub struct HostFunction {
    descriptor: Arc<FunctionDescriptor>,
    body: Arc<HostFn>,
}

impl HostFunction {
    /// Wrap a typed Rust function
    ///
    /// The descriptor comes from the function's signature. A trailing
    /// [`Variadic<T>`](super::Variadic) argument makes the function variadic.
    pub fn new<F, Args>(f: F) -> Self
    where
        F: IntoHostFunction<Args>,
    {
        HostFunction {
            descriptor: Arc::new(F::descriptor()),
            body: f.into_body(),
        }
    }

    /// Wrap a closure over already-coerced host values
    ///
    /// Arguments are coerced to `descriptor`'s parameter types before `f`
    /// runs.
    pub fn dynamic<F, R>(descriptor: FunctionDescriptor, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> R + Send + Sync + 'static,
        R: super::IntoResults,
    {
        let descriptor = Arc::new(descriptor);
        let declared = Arc::clone(&descriptor);
        let body = move |args: Vec<HostValue>| {
            let args = args
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    let position = index + 1;
                    let ty = declared.param_at(position).unwrap_or(&ParamType::Any);
                    ty.coerce(value)
                        .map_err(|error| CallFailure::Argument { position, error })
                })
                .collect::<Result<Vec<_>, _>>()?;
            f(args).into_results().map_err(CallFailure::Host)
        };

        HostFunction {
            descriptor,
            body: Arc::new(body),
        }
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    /// Call from host code with decoded arguments
    ///
    /// Applies the same arity and coercion rules as a script call.
    pub fn call(&self, args: Vec<HostValue>) -> Result<Vec<HostValue>, CallFailure> {
        self.check_arity(args.len())?;
        self.invoke(args)
    }

    fn check_arity(&self, actual: usize) -> Result<(), CallFailure> {
        match self.descriptor.check_arity(actual) {
            Err(ConversionError::ArityMismatch {
                expected,
                actual,
                variadic,
            }) => Err(CallFailure::Arity {
                expected,
                actual,
                variadic,
            }),
            _ => Ok(()),
        }
    }

    fn invoke(&self, args: Vec<HostValue>) -> Result<Vec<HostValue>, CallFailure> {
        (self.body)(args)
    }

    /// Adapt into an anonymous script callable
    pub fn to_script(&self) -> Function {
        debug!(descriptor = %self.descriptor, "adapting host function");
        let func = self.clone();
        Function::anonymous(move |state| func.call_from_script(state))
    }

    /// Adapt into a named script callable; the name shows up in argument errors
    pub fn to_script_named(&self, name: &str) -> Function {
        debug!(name, descriptor = %self.descriptor, "adapting host function");
        let func = self.clone();
        Function::new(name, move |state| func.call_from_script(state))
    }

    fn call_from_script(&self, state: &mut State) -> Result<usize, ScriptError> {
        let n = state.top();

        if let Err(failure) = self.check_arity(n) {
            return Err(script_failure(state, failure));
        }

        let mut args = Vec::with_capacity(n);
        for k in 1..=n {
            let value = state.get(k as isize);
            match state.converter().from_value(&value) {
                Ok(decoded) => args.push(decoded),
                Err(e) => return Err(state.arg_error(k, e.to_string())),
            }
        }

        trace!(
            function = state.current_function_name(),
            args = n,
            "invoking host function"
        );

        let results = match self.invoke(args) {
            Ok(results) => results,
            Err(failure) => return Err(script_failure(state, failure)),
        };

        let attempted = results.len();
        for result in &results {
            match state.converter().to_value(result) {
                Ok(value) => state.push(value),
                Err(e) => {
                    warn!(
                        function = state.current_function_name(),
                        error = %e,
                        "failed to encode host function result"
                    );
                    return Err(ScriptError::Runtime {
                        message: e.to_string(),
                        attempted,
                    });
                }
            }
        }

        Ok(attempted)
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.descriptor)
    }
}

impl Hash for HostFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.descriptor).hash(state);
    }
}

/// Raise a call failure in the calling function's frame
fn script_failure(state: &State, failure: CallFailure) -> ScriptError {
    match failure {
        CallFailure::Arity {
            expected,
            actual,
            variadic,
        } => ScriptError::Arity {
            function: state.current_function_name().to_string(),
            expected,
            actual,
            variadic,
        },
        CallFailure::Argument { position, error } => state.arg_error(position, error.to_string()),
        CallFailure::Host(message) => ScriptError::runtime(message),
    }
}

/// Adapt a host value into a script callable
///
/// # Errors
///
/// Returns `ConversionError::NotAFunction` unless `host` is a
/// [`HostFunction`].
pub fn to_script_function(host: impl IntoHost) -> Result<Function, ConversionError> {
    match host.into_host() {
        HostValue::Function(f) => Ok(f.to_script()),
        other => Err(ConversionError::NotAFunction {
            type_name: other.type_name().to_string(),
        }),
    }
}

/// Like [`to_script_function`], panicking on error
pub fn must_to_script_function(host: impl IntoHost) -> Function {
    match to_script_function(host) {
        Ok(f) => f,
        Err(e) => panic!("{}", e),
    }
}
