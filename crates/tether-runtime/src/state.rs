//! Runtime state
//!
//! A `State` owns a value stack, a frame per active call, globals and the
//! module tables. Native functions see only their own frame: `get(1)` is
//! their first argument and `top()` their argument count.

use crate::convert::Converter;
use crate::error::ScriptError;
use crate::value::{Function, Value};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tether_config::BridgeConfig;
use tracing::{debug, trace};

pub use tether_config::bridge::DEFAULT_CALL_DEPTH_LIMIT;

/// Builds a module value on first `require`
pub type ModuleLoader = Arc<dyn Fn(&mut State) -> Result<Value, ScriptError> + Send + Sync>;

/// How to run a call through [`State::call_by_param`]
#[derive(Debug, Clone)]
pub struct CallParams {
    /// Value to call
    pub function: Value,
    /// Number of results left on the stack; missing ones are `Nil`
    pub nret: usize,
    /// Return failures as `Err` instead of panicking
    pub protect: bool,
}

#[derive(Debug, Clone)]
struct Frame {
    base: usize,
    name: Option<Arc<str>>,
}

/// Scripting runtime state
pub struct State {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    globals: HashMap<String, Value>,
    preload: HashMap<String, ModuleLoader>,
    loaded: HashMap<String, Value>,
    converter: Converter,
    call_depth_limit: usize,
}

impl State {
    pub fn new() -> Self {
        let mut state = State {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: HashMap::new(),
            preload: HashMap::new(),
            loaded: HashMap::new(),
            converter: Converter::new(),
            call_depth_limit: DEFAULT_CALL_DEPTH_LIMIT,
        };
        state.open_base();
        state
    }

    /// State using the runtime and conversion sections of `config`
    pub fn from_config(config: &BridgeConfig) -> Self {
        State::new()
            .with_call_depth_limit(config.runtime().call_depth_limit())
            .with_converter(Converter::from_config(&config.conversion()))
    }

    pub fn with_call_depth_limit(mut self, limit: usize) -> Self {
        self.call_depth_limit = limit;
        self
    }

    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    pub fn converter(&self) -> Converter {
        self.converter
    }

    pub fn call_depth_limit(&self) -> usize {
        self.call_depth_limit
    }

    fn open_base(&mut self) {
        let require = Function::new("require", |state: &mut State| {
            let name = match state.get(1) {
                Value::String(name) => name,
                other => {
                    let message = format!("string expected, got {}", other.type_name());
                    return Err(state.arg_error(1, message));
                }
            };
            let module = state.require(&name)?;
            state.push(module);
            Ok(1)
        });
        self.set_global("require", Value::Function(require));
    }

    // ========================================================================
    // Stack
    // ========================================================================

    fn base(&self) -> usize {
        self.frames.last().map(|frame| frame.base).unwrap_or(0)
    }

    /// Number of values in the current frame
    pub fn top(&self) -> usize {
        self.stack.len() - self.base()
    }

    /// Value at `index` in the current frame
    ///
    /// Positive indices count from the bottom starting at 1; negative ones
    /// count from the top starting at -1. Out-of-range reads are `Nil`.
    pub fn get(&self, index: isize) -> Value {
        let base = self.base();
        let slot = if index > 0 {
            base + index as usize - 1
        } else if index < 0 {
            match self.stack.len().checked_sub(index.unsigned_abs()) {
                Some(slot) if slot >= base => slot,
                _ => return Value::Nil,
            }
        } else {
            return Value::Nil;
        };
        self.stack.get(slot).cloned().unwrap_or_default()
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Remove up to `n` values from the top of the current frame
    pub fn pop(&mut self, n: usize) {
        let keep = self.stack.len().saturating_sub(n).max(self.base());
        self.stack.truncate(keep);
    }

    /// Resize the current frame to exactly `n` values, padding with `Nil`
    pub fn set_top(&mut self, n: usize) {
        let len = self.base() + n;
        self.stack.resize(len, Value::Nil);
    }

    /// Name of the function whose frame is active, `"?"` when unknown
    pub fn current_function_name(&self) -> &str {
        self.frames
            .last()
            .and_then(|frame| frame.name.as_deref())
            .unwrap_or("?")
    }

    /// Argument error for the 1-based `position` in the current call
    pub fn arg_error(&self, position: usize, message: impl Into<String>) -> ScriptError {
        ScriptError::Argument {
            function: self.current_function_name().to_string(),
            position,
            message: message.into(),
        }
    }

    // ========================================================================
    // Globals
    // ========================================================================

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if value.is_nil() {
            self.globals.remove(&name);
        } else {
            self.globals.insert(name, value);
        }
    }

    /// Global `name`, or `Nil`
    pub fn get_global(&self, name: &str) -> Value {
        self.globals.get(name).cloned().unwrap_or_default()
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Install a loader that `require(name)` runs once
    pub fn preload_module<F>(&mut self, name: impl Into<String>, loader: F)
    where
        F: Fn(&mut State) -> Result<Value, ScriptError> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(module = %name, "preloading module");
        self.preload.insert(name, Arc::new(loader));
    }

    /// Load a preloaded module, caching its value
    pub fn require(&mut self, name: &str) -> Result<Value, ScriptError> {
        if let Some(module) = self.loaded.get(name) {
            return Ok(module.clone());
        }

        let loader = self
            .preload
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::ModuleNotFound {
                name: name.to_string(),
            })?;

        let module = loader(self)?;
        // A loader returning nothing still marks the module as loaded
        let module = if module.is_nil() {
            Value::Bool(true)
        } else {
            module
        };
        debug!(module = name, "module loaded");
        self.loaded.insert(name.to_string(), module.clone());
        Ok(module)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call `params.function` and leave exactly `params.nret` results on the stack
    ///
    /// # Panics
    ///
    /// Panics with the error when the call fails and `params.protect` is false.
    pub fn call_by_param(&mut self, params: CallParams, args: &[Value]) -> Result<(), ScriptError> {
        let results = if params.protect {
            self.protected_call(&params.function, args)?
        } else {
            match self.raw_call(&params.function, args) {
                Ok(results) => results,
                Err(e) => panic!("{}", e),
            }
        };

        let mut results = results;
        results.resize(params.nret, Value::Nil);
        self.stack.extend(results);
        Ok(())
    }

    /// Protected call returning exactly `nret` results
    pub fn call(
        &mut self,
        function: &Value,
        args: &[Value],
        nret: usize,
    ) -> Result<Vec<Value>, ScriptError> {
        let mut results = self.protected_call(function, args)?;
        results.resize(nret, Value::Nil);
        Ok(results)
    }

    /// Run a call, turning a panic inside the callee into a runtime error
    fn protected_call(&mut self, function: &Value, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let stack_len = self.stack.len();
        let depth = self.frames.len();

        match panic::catch_unwind(AssertUnwindSafe(|| self.raw_call(function, args))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                self.stack.truncate(stack_len);
                self.frames.truncate(depth);
                let message = payload
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "host function panicked".to_string());
                Err(ScriptError::runtime(message))
            }
        }
    }

    fn raw_call(&mut self, function: &Value, args: &[Value]) -> Result<Vec<Value>, ScriptError> {
        let function = match function {
            Value::Function(f) => f.clone(),
            other => {
                return Err(ScriptError::NotCallable {
                    type_name: other.type_name().to_string(),
                })
            }
        };

        if self.frames.len() >= self.call_depth_limit {
            return Err(ScriptError::CallDepthExceeded {
                limit: self.call_depth_limit,
            });
        }

        let base = self.stack.len();
        self.stack.extend_from_slice(args);
        self.frames.push(Frame {
            base,
            name: function.name_arc(),
        });
        trace!(
            function = self.current_function_name(),
            args = args.len(),
            depth = self.frames.len(),
            "call"
        );

        let outcome = function.invoke(self);
        self.frames.pop();

        let result = outcome.map(|count| {
            let count = count.min(self.stack.len() - base);
            self.stack.split_off(self.stack.len() - count)
        });
        self.stack.truncate(base);
        result
    }

    /// Drop everything this state holds
    pub fn close(mut self) {
        trace!(
            globals = self.globals.len(),
            modules = self.loaded.len(),
            "closing state"
        );
        self.stack.clear();
        self.frames.clear();
        self.globals.clear();
        self.loaded.clear();
        self.preload.clear();
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("stack", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("globals", &self.globals.len())
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Table;

    fn echo() -> Value {
        Value::Function(Function::new("echo", |state: &mut State| Ok(state.top())))
    }

    #[test]
    fn test_frame_relative_indexing() {
        let inspect = Function::new("inspect", |state: &mut State| {
            assert_eq!(state.top(), 3);
            assert_eq!(state.get(1), Value::Number(1.0));
            assert_eq!(state.get(-1), Value::Number(3.0));
            assert_eq!(state.get(4), Value::Nil);
            assert_eq!(state.get(-4), Value::Nil);
            Ok(0)
        });

        let mut state = State::new();
        state.push(Value::from("outside"));
        let args = [Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)];
        state.call(&Value::Function(inspect), &args, 0).unwrap();
        assert_eq!(state.top(), 1);
    }

    #[test]
    fn test_results_padded_and_truncated() {
        let mut state = State::new();
        let args = [Value::Bool(true), Value::Bool(false)];

        let padded = state.call(&echo(), &args, 3).unwrap();
        assert_eq!(padded, vec![Value::Bool(true), Value::Bool(false), Value::Nil]);

        let truncated = state.call(&echo(), &args, 1).unwrap();
        assert_eq!(truncated, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_call_by_param_leaves_results_on_stack() {
        let mut state = State::new();
        state
            .call_by_param(
                CallParams {
                    function: echo(),
                    nret: 1,
                    protect: true,
                },
                &[Value::from("x"), Value::from("y")],
            )
            .unwrap();

        assert_eq!(state.top(), 1);
        assert_eq!(state.get(-1), Value::from("x"));
        state.pop(1);
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_calling_non_function() {
        let mut state = State::new();
        let err = state.call(&Value::Number(1.0), &[], 0).unwrap_err();
        assert_eq!(
            err,
            ScriptError::NotCallable {
                type_name: "number".to_string()
            }
        );
    }

    #[test]
    #[should_panic(expected = "attempt to call a nil value")]
    fn test_unprotected_call_panics() {
        let mut state = State::new();
        let _ = state.call_by_param(
            CallParams {
                function: Value::Nil,
                nret: 0,
                protect: false,
            },
            &[],
        );
    }

    #[test]
    fn test_protected_call_catches_panic() {
        let boom = Function::new("boom", |_: &mut State| -> Result<usize, ScriptError> {
            panic!("kaboom")
        });
        let mut state = State::new();
        let err = state.call(&Value::Function(boom), &[], 0).unwrap_err();
        assert_eq!(err, ScriptError::runtime("kaboom"));
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_call_depth_limit() {
        let recurse = Function::new("recurse", |state: &mut State| {
            let me = state.get_global("recurse");
            state.call(&me, &[], 0)?;
            Ok(0)
        });

        let mut state = State::new().with_call_depth_limit(8);
        state.set_global("recurse", Value::Function(recurse.clone()));
        let err = state.call(&Value::Function(recurse), &[], 0).unwrap_err();
        assert_eq!(err, ScriptError::CallDepthExceeded { limit: 8 });
    }

    #[test]
    fn test_require_loads_once() {
        let mut state = State::new();
        state.preload_module("counter", |_| {
            let t = Table::new();
            t.raw_set(Value::from("n"), Value::Number(1.0)).unwrap();
            Ok(Value::Table(t))
        });

        let first = state.require("counter").unwrap();
        let second = state.require("counter").unwrap();
        assert_eq!(first, second);

        let err = state.require("missing").unwrap_err();
        assert_eq!(
            err,
            ScriptError::ModuleNotFound {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_require_global_function() {
        let mut state = State::new();
        state.preload_module("m", |_| Ok(Value::from("module value")));

        let require = state.get_global("require");
        let results = state.call(&require, &[Value::from("m")], 1).unwrap();
        assert_eq!(results, vec![Value::from("module value")]);

        let err = state.call(&require, &[Value::Number(1.0)], 1).unwrap_err();
        assert!(err.is_argument_error());
    }

    #[test]
    fn test_from_config() {
        let config = BridgeConfig {
            runtime: Some(tether_config::RuntimeConfig {
                call_depth_limit: Some(5),
            }),
            ..Default::default()
        };
        let state = State::from_config(&config);
        assert_eq!(state.call_depth_limit(), 5);
    }
}
