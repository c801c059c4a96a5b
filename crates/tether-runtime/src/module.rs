//! Module registration
//!
//! A `Module` maps exported names to values, usually adapted host functions.
//! Registering it installs a preload loader, so scripts reach it through
//! `require(name)`.
//!
//! # Examples
//!
//! ```
//! use tether_runtime::{HostFunction, Module, State, Value};
//!
//! let mut state = State::new();
//! Module::new("math")
//!     .function("add", HostFunction::new(|a: f64, b: f64| a + b))
//!     .register(&mut state);
//!
//! let math = state.require("math").unwrap();
//! let add = math.as_table().unwrap().raw_get(&Value::from("add"));
//! let sum = state.call(&add, &[Value::Number(1.0), Value::Number(2.0)], 1).unwrap();
//! assert_eq!(sum, vec![Value::Number(3.0)]);
//! ```

use crate::error::ConversionError;
use crate::function::{to_script_function, HostFunction};
use crate::host::IntoHost;
use crate::state::State;
use crate::value::{Table, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Named set of exports
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    exports: BTreeMap<String, Value>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            exports: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Export a host function under `export`
    pub fn function(mut self, export: impl Into<String>, function: HostFunction) -> Self {
        let export = export.into();
        let adapted = function.to_script_named(&export);
        self.exports.insert(export, Value::Function(adapted));
        self
    }

    /// Export any host value that adapts to a function
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::NotAFunction` if `host` is not a function.
    pub fn try_function(
        mut self,
        export: impl Into<String>,
        host: impl IntoHost,
    ) -> Result<Self, ConversionError> {
        let export = export.into();
        let adapted = to_script_function(host)?.with_name(export.as_str());
        self.exports.insert(export, Value::Function(adapted));
        Ok(self)
    }

    /// Export a plain value
    pub fn value(mut self, export: impl Into<String>, value: Value) -> Self {
        self.exports.insert(export.into(), value);
        self
    }

    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    /// Build a fresh table holding every export
    pub fn to_table(&self) -> Table {
        let table = Table::new();
        for (name, value) in &self.exports {
            table.raw_set_str(name, value.clone());
        }
        table
    }

    /// Make the module available to `require` on `state`
    pub fn register(self, state: &mut State) {
        debug!(module = %self.name, exports = self.exports.len(), "registering module");
        let name = self.name.clone();
        state.preload_module(name, move |_| Ok(Value::Table(self.to_table())));
    }
}
