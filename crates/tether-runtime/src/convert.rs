//! Value conversion between host and script
//!
//! - `to_value` - `HostValue` to script `Value`
//! - `from_value` - script `Value` to `HostValue`
//!
//! Host sequences always become sequence-shaped tables (keys `1..=n`, `Nil`
//! elements keeping their slot) and host maps always become general tables.
//! On the way back a table decodes as a sequence only when all of its keys
//! live in the array part; everything else, including the empty table,
//! decodes as a map. Trailing `Nil` elements of a sequence are not kept.
//!
//! # Examples
//!
//! ```
//! use tether_runtime::convert::{from_value, to_value};
//! use tether_runtime::HostValue;
//!
//! let host = HostValue::Sequence(vec![HostValue::Float(1.0), HostValue::Bool(true)]);
//! let script = to_value(&host).unwrap();
//! assert_eq!(from_value(&script).unwrap(), host);
//! ```

use crate::error::ConversionError;
use crate::host::{FromHost, HostValue, IntoHost};
use crate::value::{Table, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tether_config::ConversionConfig;

/// Converter settings
///
/// The default converter is unbounded: a self-referential table will recurse
/// until the stack overflows. A depth limit turns that into
/// `ConversionError::DepthExceeded`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Converter {
    max_depth: Option<usize>,
}

impl Converter {
    /// Unbounded converter
    pub const fn new() -> Self {
        Converter { max_depth: None }
    }

    /// Converter that fails on tables nested deeper than `limit`
    pub const fn with_max_depth(limit: usize) -> Self {
        Converter {
            max_depth: Some(limit),
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Converter {
            max_depth: config.max_depth(),
        }
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Convert a host value to a script value
    pub fn to_value(&self, host: &HostValue) -> Result<Value, ConversionError> {
        self.encode(host, 0)
    }

    /// Convert a script value to a host value
    pub fn from_value(&self, value: &Value) -> Result<HostValue, ConversionError> {
        self.decode(value, 0)
    }

    fn enter(&self, depth: usize) -> Result<usize, ConversionError> {
        match self.max_depth {
            Some(limit) if depth >= limit => Err(ConversionError::DepthExceeded { limit }),
            _ => Ok(depth + 1),
        }
    }

    fn encode(&self, host: &HostValue, depth: usize) -> Result<Value, ConversionError> {
        Ok(match host {
            HostValue::Nil => Value::Nil,
            HostValue::Bool(b) => Value::Bool(*b),
            HostValue::Int(n) => Value::Number(*n as f64),
            HostValue::UInt(n) => Value::Number(*n as f64),
            HostValue::Float(n) => Value::Number(*n),
            HostValue::String(s) => Value::String(Arc::from(s.as_str())),
            HostValue::Opaque(o) => Value::Opaque(o.clone()),
            HostValue::Sequence(items) => {
                let depth = self.enter(depth)?;
                let items = items
                    .iter()
                    .map(|item| self.encode(item, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::Table(Table::from_sequence(items))
            }
            HostValue::Map(entries) => {
                let depth = self.enter(depth)?;
                let table = Table::new();
                for (key, value) in entries {
                    let key = self.encode(key, depth)?;
                    let value = self.encode(value, depth)?;
                    table.raw_set(key, value)?;
                }
                Value::Table(table)
            }
            HostValue::Function(f) => {
                return Err(ConversionError::unknown_type(
                    "function",
                    f.descriptor().to_string(),
                ))
            }
            HostValue::Foreign(f) => {
                return Err(ConversionError::unknown_type(
                    f.type_name(),
                    "host value has no script representation",
                ))
            }
        })
    }

    fn decode(&self, value: &Value, depth: usize) -> Result<HostValue, ConversionError> {
        Ok(match value {
            Value::Nil => HostValue::Nil,
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Number(n) => HostValue::Float(*n),
            Value::String(s) => HostValue::String(s.to_string()),
            Value::Opaque(o) => HostValue::Opaque(o.clone()),
            Value::Table(table) => {
                let depth = self.enter(depth)?;
                match table.sequence_len() {
                    Some(n) => {
                        let mut items = Vec::with_capacity(n);
                        for k in 1..=n {
                            items.push(self.decode(&table.raw_get_int(k as i64), depth)?);
                        }
                        HostValue::Sequence(items)
                    }
                    None => {
                        let mut entries = HashMap::new();
                        for (key, value) in table.pairs() {
                            entries.insert(self.decode(&key, depth)?, self.decode(&value, depth)?);
                        }
                        HostValue::Map(entries)
                    }
                }
            }
            Value::Function(f) => {
                return Err(ConversionError::unknown_type(
                    "function",
                    f.name().unwrap_or("anonymous script function"),
                ))
            }
        })
    }
}

/// Convert a host value with the default converter
pub fn to_value(host: &HostValue) -> Result<Value, ConversionError> {
    Converter::new().to_value(host)
}

/// Convert a script value with the default converter
pub fn from_value(value: &Value) -> Result<HostValue, ConversionError> {
    Converter::new().from_value(value)
}

/// Like [`to_value`], panicking on error
pub fn must_to_value(host: &HostValue) -> Value {
    match to_value(host) {
        Ok(value) => value,
        Err(e) => panic!("{}", e),
    }
}

/// Like [`from_value`], panicking on error
pub fn must_from_value(value: &Value) -> HostValue {
    match from_value(value) {
        Ok(host) => host,
        Err(e) => panic!("{}", e),
    }
}

/// Convert any `IntoHost` value straight to a script value
pub fn to_script<T: IntoHost>(value: T) -> Result<Value, ConversionError> {
    to_value(&value.into_host())
}

/// Decode a script value and coerce it to `T`
pub fn from_script<T: FromHost>(value: &Value) -> Result<T, ConversionError> {
    T::from_host(from_value(value)?)
}
