//! Host-side value model and typed conversion
//!
//! `HostValue` is the dynamic host value the converter maps to and from
//! script values. The typed layer sits on top:
//! - `IntoHost` - Rust value to `HostValue` (infallible)
//! - `FromHost` - `HostValue` to Rust value (the coercion step)
//!
//! # Examples
//!
//! ```
//! use tether_runtime::{FromHost, HostValue, IntoHost};
//!
//! let host = vec![1_i64, 2, 3].into_host();
//! assert_eq!(host, HostValue::Sequence(vec![
//!     HostValue::Int(1), HostValue::Int(2), HostValue::Int(3),
//! ]));
//!
//! // Integral floats coerce to integers
//! let n: i32 = FromHost::from_host(HostValue::Float(7.0)).unwrap();
//! assert_eq!(n, 7);
//! ```

use crate::error::ConversionError;
use crate::function::{HostFunction, ParamType};
use crate::value::{Opaque, OpaqueKind, OpaqueType};
use ordered_float::OrderedFloat;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Dynamic host value
#[derive(Debug, Clone, Default)]
pub enum HostValue {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Sequence(Vec<HostValue>),
    Map(HashMap<HostValue, HostValue>),
    Opaque(Opaque),
    Function(HostFunction),
    /// Host value with no mapping rule (channels, handles, ...)
    Foreign(Foreign),
}

impl HostValue {
    /// Name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::UInt(_) => "uint",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::Sequence(_) => "sequence",
            HostValue::Map(_) => "map",
            HostValue::Opaque(o) => o.type_name(),
            HostValue::Function(_) => "function",
            HostValue::Foreign(f) => f.type_name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    /// Build a map from key/value pairs
    pub fn map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: IntoHost,
        V: IntoHost,
    {
        HostValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into_host(), v.into_host()))
                .collect(),
        )
    }

    /// Short description of the value itself, for error messages
    pub fn describe(&self) -> String {
        match self {
            HostValue::Int(n) => format!("int {}", n),
            HostValue::UInt(n) => format!("uint {}", n),
            HostValue::Float(n) => format!("float {}", n),
            HostValue::String(s) => format!("string {:?}", s),
            HostValue::Sequence(items) => format!("sequence of {}", items.len()),
            HostValue::Map(entries) => format!("map of {}", entries.len()),
            HostValue::Function(f) => format!("function {}", f.descriptor()),
            other => other.type_name().to_string(),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Nil, HostValue::Nil) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::UInt(a), HostValue::UInt(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Sequence(a), HostValue::Sequence(b)) => a == b,
            (HostValue::Map(a), HostValue::Map(b)) => a == b,
            (HostValue::Opaque(a), HostValue::Opaque(b)) => a.ptr_eq(b),
            (HostValue::Function(a), HostValue::Function(b)) => a.ptr_eq(b),
            (HostValue::Foreign(a), HostValue::Foreign(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for HostValue {}

impl Hash for HostValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            HostValue::Nil => {}
            HostValue::Bool(b) => b.hash(state),
            HostValue::Int(n) => n.hash(state),
            HostValue::UInt(n) => n.hash(state),
            HostValue::Float(n) => OrderedFloat(*n).hash(state),
            HostValue::String(s) => s.hash(state),
            HostValue::Sequence(items) => items.hash(state),
            // Entry order is unspecified; the length is order-independent
            HostValue::Map(entries) => entries.len().hash(state),
            HostValue::Opaque(o) => o.hash(state),
            HostValue::Function(f) => f.hash(state),
            HostValue::Foreign(f) => f.addr().hash(state),
        }
    }
}

/// Host value the bridge cannot map
///
/// Carried only so the converter can name it in an `UnknownType` error.
#[derive(Clone)]
pub struct Foreign {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Foreign {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Foreign {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Foreign) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }
}

impl fmt::Debug for Foreign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Foreign({})", self.type_name)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Convert a Rust value into a `HostValue`
pub trait IntoHost {
    fn into_host(self) -> HostValue;

    /// Declared type, used for function descriptors
    fn host_type() -> ParamType
    where
        Self: Sized,
    {
        ParamType::Any
    }
}

/// Coerce a `HostValue` into a Rust value
pub trait FromHost: Sized {
    /// # Errors
    ///
    /// Returns `ConversionError::TypeCoercionFailed` if the value does not fit.
    fn from_host(value: HostValue) -> Result<Self, ConversionError>;

    /// Declared type, used for function descriptors
    fn param_type() -> ParamType;
}

// ============================================================================
// Numeric coercion
// ============================================================================

/// Coerce any numeric host value to `i64`; fractional or out-of-range values fail
pub(crate) fn coerce_i64(value: &HostValue, expected: &ParamType) -> Result<i64, ConversionError> {
    match value {
        HostValue::Int(n) => Ok(*n),
        HostValue::UInt(n) => {
            i64::try_from(*n).map_err(|_| ConversionError::coercion(expected, value.describe()))
        }
        HostValue::Float(f) if f.fract() == 0.0 && *f >= -(2f64.powi(63)) && *f < 2f64.powi(63) => {
            Ok(*f as i64)
        }
        other => Err(ConversionError::coercion(expected, other.describe())),
    }
}

/// Coerce any numeric host value to `u64`; negative, fractional or too-large values fail
pub(crate) fn coerce_u64(value: &HostValue, expected: &ParamType) -> Result<u64, ConversionError> {
    match value {
        HostValue::UInt(n) => Ok(*n),
        HostValue::Int(n) => {
            u64::try_from(*n).map_err(|_| ConversionError::coercion(expected, value.describe()))
        }
        HostValue::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f < 2f64.powi(64) => Ok(*f as u64),
        other => Err(ConversionError::coercion(expected, other.describe())),
    }
}

pub(crate) fn coerce_f64(value: &HostValue, expected: &ParamType) -> Result<f64, ConversionError> {
    match value {
        HostValue::Float(f) => Ok(*f),
        HostValue::Int(n) => Ok(*n as f64),
        HostValue::UInt(n) => Ok(*n as f64),
        other => Err(ConversionError::coercion(expected, other.describe())),
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl IntoHost for $t {
            fn into_host(self) -> HostValue {
                HostValue::Int(self as i64)
            }

            fn host_type() -> ParamType {
                ParamType::Int
            }
        }

        impl FromHost for $t {
            fn from_host(value: HostValue) -> Result<Self, ConversionError> {
                let n = coerce_i64(&value, &ParamType::Int)?;
                <$t>::try_from(n).map_err(|_| {
                    ConversionError::coercion(stringify!($t), value.describe())
                })
            }

            fn param_type() -> ParamType {
                ParamType::Int
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl IntoHost for $t {
            fn into_host(self) -> HostValue {
                HostValue::UInt(self as u64)
            }

            fn host_type() -> ParamType {
                ParamType::UInt
            }
        }

        impl FromHost for $t {
            fn from_host(value: HostValue) -> Result<Self, ConversionError> {
                let n = coerce_u64(&value, &ParamType::UInt)?;
                <$t>::try_from(n).map_err(|_| {
                    ConversionError::coercion(stringify!($t), value.describe())
                })
            }

            fn param_type() -> ParamType {
                ParamType::UInt
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

impl IntoHost for f64 {
    fn into_host(self) -> HostValue {
        HostValue::Float(self)
    }

    fn host_type() -> ParamType {
        ParamType::Float
    }
}

impl FromHost for f64 {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        coerce_f64(&value, &ParamType::Float)
    }

    fn param_type() -> ParamType {
        ParamType::Float
    }
}

impl IntoHost for f32 {
    fn into_host(self) -> HostValue {
        HostValue::Float(self as f64)
    }

    fn host_type() -> ParamType {
        ParamType::Float
    }
}

impl FromHost for f32 {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        coerce_f64(&value, &ParamType::Float).map(|f| f as f32)
    }

    fn param_type() -> ParamType {
        ParamType::Float
    }
}

// ============================================================================
// Scalars
// ============================================================================

impl FromHost for () {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Nil => Ok(()),
            other => Err(ConversionError::coercion(ParamType::Nil, other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Nil
    }
}

impl IntoHost for bool {
    fn into_host(self) -> HostValue {
        HostValue::Bool(self)
    }

    fn host_type() -> ParamType {
        ParamType::Bool
    }
}

impl FromHost for bool {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Bool(b) => Ok(b),
            other => Err(ConversionError::coercion(ParamType::Bool, other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Bool
    }
}

impl IntoHost for String {
    fn into_host(self) -> HostValue {
        HostValue::String(self)
    }

    fn host_type() -> ParamType {
        ParamType::String
    }
}

impl IntoHost for &str {
    fn into_host(self) -> HostValue {
        HostValue::String(self.to_string())
    }

    fn host_type() -> ParamType {
        ParamType::String
    }
}

impl FromHost for String {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::String(s) => Ok(s),
            other => Err(ConversionError::coercion(ParamType::String, other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::String
    }
}

impl IntoHost for char {
    fn into_host(self) -> HostValue {
        HostValue::String(self.to_string())
    }

    fn host_type() -> ParamType {
        ParamType::String
    }
}

impl FromHost for char {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        if let HostValue::String(s) = &value {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(ConversionError::coercion("char", value.describe()))
    }

    fn param_type() -> ParamType {
        ParamType::String
    }
}

// ============================================================================
// Containers
// ============================================================================

impl<T: IntoHost> IntoHost for Vec<T> {
    fn into_host(self) -> HostValue {
        HostValue::Sequence(self.into_iter().map(IntoHost::into_host).collect())
    }

    fn host_type() -> ParamType {
        ParamType::Sequence(Box::new(T::host_type()))
    }
}

impl<T: IntoHost + Clone> IntoHost for &[T] {
    fn into_host(self) -> HostValue {
        HostValue::Sequence(self.iter().cloned().map(IntoHost::into_host).collect())
    }

    fn host_type() -> ParamType {
        ParamType::Sequence(Box::new(T::host_type()))
    }
}

impl<T: IntoHost, const N: usize> IntoHost for [T; N] {
    fn into_host(self) -> HostValue {
        HostValue::Sequence(self.into_iter().map(IntoHost::into_host).collect())
    }

    fn host_type() -> ParamType {
        ParamType::Sequence(Box::new(T::host_type()))
    }
}

impl<T: FromHost> FromHost for Vec<T> {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Sequence(items) => items.into_iter().map(T::from_host).collect(),
            // An empty table decodes as a map
            HostValue::Map(entries) if entries.is_empty() => Ok(Vec::new()),
            other => Err(ConversionError::coercion(Self::param_type(), other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Sequence(Box::new(T::param_type()))
    }
}

impl<T: FromHost, const N: usize> FromHost for [T; N] {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        let found = value.describe();
        let items = Vec::<T>::from_host(value)?;
        <[T; N]>::try_from(items)
            .map_err(|_| ConversionError::coercion(format!("sequence of {}", N), found))
    }

    fn param_type() -> ParamType {
        ParamType::Sequence(Box::new(T::param_type()))
    }
}

impl<T: IntoHost> IntoHost for Option<T> {
    fn into_host(self) -> HostValue {
        match self {
            Some(v) => v.into_host(),
            None => HostValue::Nil,
        }
    }

    fn host_type() -> ParamType {
        ParamType::Optional(Box::new(T::host_type()))
    }
}

impl<T: FromHost> FromHost for Option<T> {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Nil => Ok(None),
            other => T::from_host(other).map(Some),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Optional(Box::new(T::param_type()))
    }
}

impl<K: IntoHost, V: IntoHost, S> IntoHost for HashMap<K, V, S> {
    fn into_host(self) -> HostValue {
        HostValue::map(self)
    }

    fn host_type() -> ParamType {
        ParamType::Map(Box::new(K::host_type()), Box::new(V::host_type()))
    }
}

impl<K, V, S> FromHost for HashMap<K, V, S>
where
    K: FromHost + Eq + Hash,
    V: FromHost,
    S: BuildHasher + Default,
{
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| -> Result<(K, V), ConversionError> {
                    Ok((K::from_host(k)?, V::from_host(v)?))
                })
                .collect(),
            other => Err(ConversionError::coercion(Self::param_type(), other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Map(Box::new(K::param_type()), Box::new(V::param_type()))
    }
}

impl<K: IntoHost, V: IntoHost> IntoHost for BTreeMap<K, V> {
    fn into_host(self) -> HostValue {
        HostValue::map(self)
    }

    fn host_type() -> ParamType {
        ParamType::Map(Box::new(K::host_type()), Box::new(V::host_type()))
    }
}

impl<K: FromHost + Ord, V: FromHost> FromHost for BTreeMap<K, V> {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| -> Result<(K, V), ConversionError> {
                    Ok((K::from_host(k)?, V::from_host(v)?))
                })
                .collect(),
            other => Err(ConversionError::coercion(Self::param_type(), other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Map(Box::new(K::param_type()), Box::new(V::param_type()))
    }
}

// ============================================================================
// Opaque and pass-through types
// ============================================================================

impl IntoHost for Duration {
    fn into_host(self) -> HostValue {
        HostValue::Opaque(Opaque::duration(self))
    }

    fn host_type() -> ParamType {
        ParamType::Opaque("duration")
    }
}

impl FromHost for Duration {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match &value {
            HostValue::Opaque(o) if o.kind() == OpaqueKind::Duration => o
                .as_duration()
                .ok_or_else(|| ConversionError::coercion("duration", value.describe())),
            other => Err(ConversionError::coercion("duration", other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Opaque("duration")
    }
}

impl IntoHost for Opaque {
    fn into_host(self) -> HostValue {
        HostValue::Opaque(self)
    }

    fn host_type() -> ParamType {
        ParamType::Opaque("opaque")
    }
}

impl FromHost for Opaque {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Opaque(o) => Ok(o),
            other => Err(ConversionError::coercion("opaque", other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Opaque("opaque")
    }
}

impl<T: OpaqueType> IntoHost for Arc<T> {
    fn into_host(self) -> HostValue {
        HostValue::Opaque(Opaque::from_arc(self))
    }

    fn host_type() -> ParamType {
        ParamType::Opaque(T::TYPE_NAME)
    }
}

impl<T: OpaqueType> FromHost for Arc<T> {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match &value {
            HostValue::Opaque(o) => o
                .downcast::<T>()
                .ok_or_else(|| ConversionError::coercion(T::TYPE_NAME, o.type_name())),
            other => Err(ConversionError::coercion(T::TYPE_NAME, other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Opaque(T::TYPE_NAME)
    }
}

impl IntoHost for HostValue {
    fn into_host(self) -> HostValue {
        self
    }
}

impl FromHost for HostValue {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        Ok(value)
    }

    fn param_type() -> ParamType {
        ParamType::Any
    }
}

impl IntoHost for HostFunction {
    fn into_host(self) -> HostValue {
        HostValue::Function(self)
    }

    fn host_type() -> ParamType {
        ParamType::Function
    }
}

impl FromHost for HostFunction {
    fn from_host(value: HostValue) -> Result<Self, ConversionError> {
        match value {
            HostValue::Function(f) => Ok(f),
            other => Err(ConversionError::coercion(ParamType::Function, other.describe())),
        }
    }

    fn param_type() -> ParamType {
        ParamType::Function
    }
}

impl IntoHost for Foreign {
    fn into_host(self) -> HostValue {
        HostValue::Foreign(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HostValue::Int(-4), Ok(-4))]
    #[case(HostValue::UInt(9), Ok(9))]
    #[case(HostValue::Float(12.0), Ok(12))]
    #[case(HostValue::Float(1.5), Err(()))]
    #[case(HostValue::Float(1e300), Err(()))]
    #[case(HostValue::String("3".to_string()), Err(()))]
    fn test_i64_coercion(#[case] input: HostValue, #[case] expected: Result<i64, ()>) {
        assert_eq!(i64::from_host(input).map_err(|_| ()), expected);
    }

    #[test]
    fn test_narrow_integer_out_of_range() {
        assert!(u8::from_host(HostValue::Int(256)).is_err());
        assert!(u8::from_host(HostValue::Int(-1)).is_err());
        assert_eq!(i8::from_host(HostValue::Float(-128.0)).unwrap(), -128);
    }

    #[test]
    fn test_float_accepts_any_number() {
        assert_eq!(f64::from_host(HostValue::Int(3)).unwrap(), 3.0);
        assert_eq!(f64::from_host(HostValue::UInt(3)).unwrap(), 3.0);
        assert!(f64::from_host(HostValue::Bool(true)).is_err());
    }

    #[test]
    fn test_vec_accepts_empty_map() {
        let empty: Vec<String> = FromHost::from_host(HostValue::Map(HashMap::new())).unwrap();
        assert!(empty.is_empty());

        let mut non_empty = HashMap::new();
        non_empty.insert(HostValue::Int(1), HostValue::Int(1));
        assert!(Vec::<i64>::from_host(HostValue::Map(non_empty)).is_err());
    }

    #[test]
    fn test_option_maps_nil() {
        assert_eq!(Option::<bool>::from_host(HostValue::Nil).unwrap(), None);
        assert_eq!(
            Option::<bool>::from_host(HostValue::Bool(true)).unwrap(),
            Some(true)
        );
        assert_eq!(None::<i32>.into_host(), HostValue::Nil);
    }

    #[test]
    fn test_map_coercion_converts_keys_and_values() {
        let host = HostValue::map([("x", 1.0_f64)]);
        let typed: HashMap<String, i64> = FromHost::from_host(host).unwrap();
        assert_eq!(typed.get("x"), Some(&1));
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(char::from_host("z".into_host()).unwrap(), 'z');
        assert!(char::from_host("zz".into_host()).is_err());
    }

    #[test]
    fn test_fixed_array_length_checked() {
        let seq = vec![1_i64, 2].into_host();
        assert!(<[i64; 3]>::from_host(seq.clone()).is_err());
        assert_eq!(<[i64; 2]>::from_host(seq).unwrap(), [1, 2]);
    }

    #[test]
    fn test_host_value_hash_consistent_with_eq() {
        let mut map = HashMap::new();
        map.insert(HostValue::Float(1.0), "one");
        assert_eq!(map.get(&HostValue::Float(1.0)), Some(&"one"));
        assert_eq!(map.get(&HostValue::Int(1)), None);
    }

    #[test]
    fn test_foreign_keeps_type_name() {
        let (tx, _rx) = std::sync::mpsc::sync_channel::<i32>(1);
        let foreign = Foreign::new(tx);
        assert!(foreign.type_name().contains("Sender"));
    }
}
