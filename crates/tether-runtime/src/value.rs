//! Script-side value model
//!
//! `Value` is what lives on a [`State`](crate::State) stack, in globals and in
//! tables. The converter only deals with the envelope cases (`Nil`, `Bool`,
//! `Number`, `String`, `Table`, `Opaque`); `Function` values are script
//! callables and have no host-side mapping.

use crate::error::{ScriptError, TableKeyError};
use crate::state::State;
use ordered_float::OrderedFloat;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A script value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    /// IEEE 754 double-precision number
    Number(f64),
    String(Arc<str>),
    Table(Table),
    Opaque(Opaque),
    Function(Function),
}

impl Value {
    /// Script-facing type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Opaque(_) => "opaque",
            Value::Function(_) => "function",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Table(t) => write!(f, "table: {:p}", Arc::as_ptr(&t.0)),
            Value::Opaque(o) => write!(f, "{}", o),
            Value::Function(func) => match func.name() {
                Some(name) => write!(f, "function: {}", name),
                None => write!(f, "function: {:p}", Arc::as_ptr(&func.call) as *const ()),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Table(t) => t.fmt(f),
            Value::Opaque(o) => o.fmt(f),
            other => write!(f, "{}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Shared, mutable script table
///
/// Cloning a `Table` clones the handle; both handles see the same entries.
/// Integer keys `1..=n` live in an array part that keeps `Nil` slots, so a
/// sequence with holes keeps its shape. Every other key lives in the hash
/// part, where storing `Nil` removes the entry.
#[derive(Clone, Default)]
pub struct Table(Arc<Mutex<TableData>>);

#[derive(Default)]
struct TableData {
    array: Vec<Value>,
    hash: HashMap<TableKey, Value>,
}

impl TableData {
    /// Array slot for `key`, if it names one
    fn slot(&self, key: &TableKey) -> Option<usize> {
        match key {
            TableKey::Number(n) => {
                let n = n.into_inner();
                if n.fract() == 0.0 && n >= 1.0 && n <= self.array.len() as f64 {
                    Some(n as usize - 1)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn get(&self, key: &TableKey) -> Value {
        match self.slot(key) {
            Some(slot) => self.array[slot].clone(),
            None => self.hash.get(key).cloned().unwrap_or_default(),
        }
    }

    fn set(&mut self, key: TableKey, value: Value) {
        if let Some(slot) = self.slot(&key) {
            self.array[slot] = value;
            if slot + 1 == self.array.len() {
                self.trim();
            }
            return;
        }

        if value.is_nil() {
            self.hash.remove(&key);
            return;
        }

        if key == TableKey::index(self.array.len() as i64 + 1) {
            self.hash.remove(&key);
            self.array.push(value);
            self.migrate();
        } else {
            self.hash.insert(key, value);
        }
    }

    /// Move hash entries that now continue the array into it
    fn migrate(&mut self) {
        loop {
            let next = TableKey::index(self.array.len() as i64 + 1);
            match self.hash.remove(&next) {
                Some(value) => self.array.push(value),
                None => break,
            }
        }
    }

    /// Drop trailing `Nil` slots
    fn trim(&mut self) {
        while matches!(self.array.last(), Some(Value::Nil)) {
            self.array.pop();
        }
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, TableData> {
        self.0.lock().expect("Table lock poisoned")
    }

    /// Store `value` under `key`; storing `Nil` removes the entry
    pub fn raw_set(&self, key: Value, value: Value) -> Result<(), TableKeyError> {
        let key = TableKey::from_value(&key)?;
        self.data().set(key, value);
        Ok(())
    }

    /// Look up `key`; absent entries and unusable keys read as `Nil`
    pub fn raw_get(&self, key: &Value) -> Value {
        match TableKey::from_value(key) {
            Ok(key) => self.data().get(&key),
            Err(_) => Value::Nil,
        }
    }

    pub fn raw_set_int(&self, index: i64, value: Value) {
        self.data().set(TableKey::index(index), value);
    }

    pub fn raw_get_int(&self, index: i64) -> Value {
        self.data().get(&TableKey::index(index))
    }

    /// Store `value` under a string key
    pub fn raw_set_str(&self, key: &str, value: Value) {
        self.data().set(TableKey::String(Arc::from(key)), value);
    }

    pub fn raw_get_str(&self, key: &str) -> Value {
        self.data().get(&TableKey::String(Arc::from(key)))
    }

    /// Number of non-nil entries
    pub fn len(&self) -> usize {
        let data = self.data();
        data.array.iter().filter(|v| !v.is_nil()).count() + data.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Some(n)` when every key lives in the array part, `n >= 1` being its
    /// length; `Nil` slots inside the array count
    pub fn sequence_len(&self) -> Option<usize> {
        let data = self.data();
        let n = data.array.len();
        (n > 0 && data.hash.is_empty()).then_some(n)
    }

    /// Snapshot of all non-nil entries, in no particular order
    pub fn pairs(&self) -> Vec<(Value, Value)> {
        let data = self.data();
        let array = data
            .array
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nil())
            .map(|(i, v)| (Value::Number((i + 1) as f64), v.clone()));
        let hash = data.hash.iter().map(|(k, v)| (k.to_value(), v.clone()));
        array.chain(hash).collect()
    }

    /// Build a sequence-shaped table holding `values` at `1..=n`
    ///
    /// `Nil` values keep their slot; trailing ones are dropped.
    pub fn from_sequence(values: impl IntoIterator<Item = Value>) -> Self {
        let mut data = TableData {
            array: values.into_iter().collect(),
            hash: HashMap::new(),
        };
        data.trim();
        Table(Arc::new(Mutex::new(data)))
    }

    pub fn ptr_eq(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table({} entries)", self.len())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Table {}

impl Hash for Table {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const ()).hash(state);
    }
}

/// Normalised table key
///
/// Numbers compare by value, so `1` and `1.0` name the same slot.
/// Reference types compare by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(Arc<str>),
    Table(Table),
    Opaque(Opaque),
    Function(Function),
}

impl TableKey {
    pub fn from_value(value: &Value) -> Result<Self, TableKeyError> {
        Ok(match value {
            Value::Nil => return Err(TableKeyError::Nil),
            Value::Number(n) if n.is_nan() => return Err(TableKeyError::NaN),
            // -0.0 and 0.0 are one key
            Value::Number(n) if *n == 0.0 => TableKey::Number(OrderedFloat(0.0)),
            Value::Number(n) => TableKey::Number(OrderedFloat(*n)),
            Value::Bool(b) => TableKey::Bool(*b),
            Value::String(s) => TableKey::String(s.clone()),
            Value::Table(t) => TableKey::Table(t.clone()),
            Value::Opaque(o) => TableKey::Opaque(o.clone()),
            Value::Function(f) => TableKey::Function(f.clone()),
        })
    }

    /// Key for integer index `index`
    pub fn index(index: i64) -> Self {
        TableKey::Number(OrderedFloat(index as f64))
    }

    pub fn to_value(&self) -> Value {
        match self {
            TableKey::Bool(b) => Value::Bool(*b),
            TableKey::Number(n) => Value::Number(n.into_inner()),
            TableKey::String(s) => Value::String(s.clone()),
            TableKey::Table(t) => Value::Table(t.clone()),
            TableKey::Opaque(o) => Value::Opaque(o.clone()),
            TableKey::Function(f) => Value::Function(f.clone()),
        }
    }
}

// ============================================================================
// Opaque values
// ============================================================================

/// Capability an opaque value is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpaqueKind {
    Error,
    Duration,
    Custom,
}

/// Host types that may travel through scripts as custom opaque values
pub trait OpaqueType: Any + Send + Sync {
    /// Name used in descriptors and error messages
    const TYPE_NAME: &'static str;
}

/// Host value carried through script context untouched
///
/// Cloning shares the allocation; [`Opaque::ptr_eq`] is the only meaningful
/// equality.
#[derive(Clone)]
pub struct Opaque {
    kind: OpaqueKind,
    type_name: &'static str,
    label: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    /// Wrap a host error
    pub fn error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Opaque {
            kind: OpaqueKind::Error,
            type_name: std::any::type_name::<E>(),
            label: Arc::from(error.to_string()),
            inner: Arc::new(error),
        }
    }

    /// Wrap a duration
    pub fn duration(duration: Duration) -> Self {
        Opaque {
            kind: OpaqueKind::Duration,
            type_name: "duration",
            label: Arc::from(format!("{:?}", duration)),
            inner: Arc::new(duration),
        }
    }

    /// Wrap a registered custom type
    pub fn custom<T: OpaqueType>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing allocation, keeping its identity
    pub fn from_arc<T: OpaqueType>(value: Arc<T>) -> Self {
        Opaque {
            kind: OpaqueKind::Custom,
            type_name: T::TYPE_NAME,
            label: Arc::from(T::TYPE_NAME),
            inner: value,
        }
    }

    pub fn kind(&self) -> OpaqueKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Human-readable summary (error message, duration, or type name)
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Shared handle to the wrapped value
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn as_duration(&self) -> Option<Duration> {
        self.downcast_ref::<Duration>().copied()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .field("label", &self.label)
            .finish()
    }
}

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opaque<{}>: {}", self.type_name, self.label)
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Opaque {}

impl Hash for Opaque {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

// ============================================================================
// Script callables
// ============================================================================

/// Native entry point: reads its arguments from the current frame, pushes
/// results and returns how many it pushed
pub type NativeFn = Arc<dyn Fn(&mut State) -> Result<usize, ScriptError> + Send + Sync>;

/// Script-callable function value
#[derive(Clone)]
pub struct Function {
    name: Option<Arc<str>>,
    call: NativeFn,
}

impl Function {
    pub fn new<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&mut State) -> Result<usize, ScriptError> + Send + Sync + 'static,
    {
        Function {
            name: Some(name.into()),
            call: Arc::new(f),
        }
    }

    pub fn anonymous<F>(f: F) -> Self
    where
        F: Fn(&mut State) -> Result<usize, ScriptError> + Send + Sync + 'static,
    {
        Function {
            name: None,
            call: Arc::new(f),
        }
    }

    /// Same callable under another name
    pub fn with_name(&self, name: impl Into<Arc<str>>) -> Self {
        Function {
            name: Some(name.into()),
            call: Arc::clone(&self.call),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn name_arc(&self) -> Option<Arc<str>> {
        self.name.clone()
    }

    pub(crate) fn invoke(&self, state: &mut State) -> Result<usize, ScriptError> {
        (self.call)(state)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.call) as *const ()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Function({})", name),
            None => write!(f, "Function(<anonymous>)"),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}
