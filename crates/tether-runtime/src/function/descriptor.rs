//! Function descriptors
//!
//! A descriptor records the calling convention of an adapted function:
//! fixed parameter types, the optional variadic element type and the
//! return types. It is built once and shared by every invocation.

use crate::error::ConversionError;
use crate::host::{coerce_f64, coerce_i64, coerce_u64, HostValue};
use std::collections::HashMap;
use std::fmt;

/// Declared type of a parameter or result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Accepts any value unchanged
    Any,
    Nil,
    Bool,
    Int,
    UInt,
    Float,
    String,
    Sequence(Box<ParamType>),
    Map(Box<ParamType>, Box<ParamType>),
    /// `Nil` or the inner type
    Optional(Box<ParamType>),
    /// Opaque value of the named type; "opaque" accepts any opaque value
    Opaque(&'static str),
    Function,
}

impl ParamType {
    /// Coerce a decoded value to this type
    ///
    /// Mirrors the rules the typed `FromHost` impls apply, normalising numbers
    /// to the declared representation.
    pub fn coerce(&self, value: HostValue) -> Result<HostValue, ConversionError> {
        match (self, value) {
            (ParamType::Any, value) => Ok(value),
            (ParamType::Nil, HostValue::Nil) => Ok(HostValue::Nil),
            (ParamType::Bool, value @ HostValue::Bool(_)) => Ok(value),
            (ParamType::String, value @ HostValue::String(_)) => Ok(value),
            (ParamType::Function, value @ HostValue::Function(_)) => Ok(value),
            (ParamType::Int, value) => coerce_i64(&value, self).map(HostValue::Int),
            (ParamType::UInt, value) => coerce_u64(&value, self).map(HostValue::UInt),
            (ParamType::Float, value) => coerce_f64(&value, self).map(HostValue::Float),
            (ParamType::Optional(_), HostValue::Nil) => Ok(HostValue::Nil),
            (ParamType::Optional(inner), value) => inner.coerce(value),
            (ParamType::Sequence(elem), HostValue::Sequence(items)) => items
                .into_iter()
                .map(|item| elem.coerce(item))
                .collect::<Result<Vec<_>, _>>()
                .map(HostValue::Sequence),
            // An empty table decodes as a map
            (ParamType::Sequence(_), HostValue::Map(entries)) if entries.is_empty() => {
                Ok(HostValue::Sequence(Vec::new()))
            }
            (ParamType::Map(key, val), HostValue::Map(entries)) => entries
                .into_iter()
                .map(|(k, v)| -> Result<_, ConversionError> {
                    Ok((key.coerce(k)?, val.coerce(v)?))
                })
                .collect::<Result<HashMap<_, _>, ConversionError>>()
                .map(HostValue::Map),
            (ParamType::Opaque(name), HostValue::Opaque(o))
                if *name == "opaque" || o.type_name() == *name =>
            {
                Ok(HostValue::Opaque(o))
            }
            (expected, other) => Err(ConversionError::coercion(expected, other.describe())),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => write!(f, "any"),
            ParamType::Nil => write!(f, "nil"),
            ParamType::Bool => write!(f, "bool"),
            ParamType::Int => write!(f, "int"),
            ParamType::UInt => write!(f, "uint"),
            ParamType::Float => write!(f, "float"),
            ParamType::String => write!(f, "string"),
            ParamType::Sequence(elem) => write!(f, "[{}]", elem),
            ParamType::Map(k, v) => write!(f, "{{{}: {}}}", k, v),
            ParamType::Optional(inner) => write!(f, "{}?", inner),
            ParamType::Opaque(name) => write!(f, "{}", name),
            ParamType::Function => write!(f, "function"),
        }
    }
}

/// Calling convention of an adapted function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    params: Vec<ParamType>,
    variadic: Option<ParamType>,
    returns: Vec<ParamType>,
}

impl FunctionDescriptor {
    /// Fixed-arity descriptor
    pub fn new(params: Vec<ParamType>, returns: Vec<ParamType>) -> Self {
        Self {
            params,
            variadic: None,
            returns,
        }
    }

    /// Descriptor whose trailing parameter collects every extra argument
    pub fn variadic(params: Vec<ParamType>, element: ParamType, returns: Vec<ParamType>) -> Self {
        Self {
            params,
            variadic: Some(element),
            returns,
        }
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Number of fixed parameters
    pub fn fixed(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }

    /// Element type of the variadic tail
    pub fn variadic_element(&self) -> Option<&ParamType> {
        self.variadic.as_ref()
    }

    pub fn returns(&self) -> &[ParamType] {
        &self.returns
    }

    /// Declared type for the 1-based argument `position`
    pub fn param_at(&self, position: usize) -> Option<&ParamType> {
        if position == 0 {
            return None;
        }
        self.params
            .get(position - 1)
            .or_else(|| self.variadic.as_ref())
    }

    /// Check an argument count against the declared arity
    pub fn check_arity(&self, actual: usize) -> Result<(), ConversionError> {
        let expected = self.fixed();
        let ok = if self.is_variadic() {
            actual >= expected
        } else {
            actual == expected
        };

        if ok {
            Ok(())
        } else {
            Err(ConversionError::ArityMismatch {
                expected,
                actual,
                variadic: self.is_variadic(),
            })
        }
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        if let Some(element) = &self.variadic {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...{}", element)?;
        }
        write!(f, ")")?;

        match self.returns.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " -> {}", single),
            many => {
                write!(f, " -> (")?;
                for (i, ret) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ret)?;
                }
                write!(f, ")")
            }
        }
    }
}
