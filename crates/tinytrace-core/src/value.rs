//! Runtime value model for traced programs.
//!
//! [`Value`] is the dynamic representation of a traced variable. Every
//! observation carries an environment of `Value`s, and the analysis engine
//! compares and copies them to work out what changed between two steps.
//!
//! Built-in variants support deep equality and deep copy directly. Custom
//! types either derive [`ToValue`] (becoming a [`Record`]) or wrap themselves
//! in an [`Opaque`] value through the [`TraceObject`] adapter, where equality
//! and copy are optional capabilities.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A runtime value captured from a traced program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered, mutable sequence. The only variant the list diff applies to.
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Double-ended queue. Changes are reported on the whole value.
    Deque(Vec<Value>),
    /// Insertion-ordered keyed collection. The only variant the dict diff applies to.
    Dict(Dict),
    Record(Record),
    Opaque(Opaque),
}

/// Raised when a value cannot be deep-compared or deep-copied.
///
/// The engine never aborts on this: it falls back to identity semantics for
/// the affected variable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComparisonError {
    #[error("values of type `{type_name}` do not support deep equality")]
    Equality { type_name: String },

    #[error("values of type `{type_name}` do not support deep copy")]
    Copy { type_name: String },
}

impl Value {
    /// Returns the exact runtime type of this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::None => TypeTag::NoneType,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::List(_) => TypeTag::List,
            Value::Tuple(_) => TypeTag::Tuple,
            Value::Deque(_) => TypeTag::Deque,
            Value::Dict(_) => TypeTag::Dict,
            Value::Record(record) => TypeTag::Named(record.type_name.clone()),
            Value::Opaque(opaque) => TypeTag::Named(opaque.type_name.clone()),
        }
    }

    /// Structural equality.
    ///
    /// Integers and floats compare numerically, dicts ignore key order, and
    /// opaque values defer to their adapter. Fails when an opaque value
    /// somewhere inside does not support equality.
    pub fn deep_eq(&self, other: &Value) -> std::result::Result<bool, ComparisonError> {
        match (self, other) {
            (Value::None, Value::None) => Ok(true),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Float(a), Value::Float(b)) => Ok(a == b),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => Ok(*a as f64 == *b),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::List(a), Value::List(b))
            | (Value::Tuple(a), Value::Tuple(b))
            | (Value::Deque(a), Value::Deque(b)) => seq_deep_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (key, value) in a.iter() {
                    match b.get(key) {
                        Some(other) if value.deep_eq(other)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            (Value::Record(a), Value::Record(b)) => {
                if a.type_name != b.type_name || a.fields.len() != b.fields.len() {
                    return Ok(false);
                }
                for ((name_a, value_a), (name_b, value_b)) in a.fields.iter().zip(&b.fields) {
                    if name_a != name_b || !value_a.deep_eq(value_b)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Opaque(a), Value::Opaque(b)) => a.deep_eq(b),
            _ => Ok(false),
        }
    }

    /// Identity-based equality, used when [`Value::deep_eq`] is unavailable.
    ///
    /// Opaque values are equal only when they refer to the same object;
    /// everything else is compared structurally.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Opaque(a), Value::Opaque(b)) => a.identity == b.identity,
            (Value::List(a), Value::List(b))
            | (Value::Tuple(a), Value::Tuple(b))
            | (Value::Deque(a), Value::Deque(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| b.get(key).map_or(false, |other| value.same(other)))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.type_name == b.type_name
                    && a.fields.len() == b.fields.len()
                    && a.fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((name_a, x), (name_b, y))| name_a == name_b && x.same(y))
            }
            _ => self.deep_eq(other).unwrap_or(false),
        }
    }

    /// Copy this value so that later mutation of the source cannot reach it.
    ///
    /// Fails when an opaque value inside wraps a live object that cannot be
    /// copied; callers fall back to [`Clone`], which shares the object.
    pub fn deep_copy(&self) -> std::result::Result<Value, ComparisonError> {
        Ok(match self {
            Value::List(items) => Value::List(items.iter().map(Value::deep_copy).collect::<std::result::Result<_, _>>()?),
            Value::Tuple(items) => Value::Tuple(items.iter().map(Value::deep_copy).collect::<std::result::Result<_, _>>()?),
            Value::Deque(items) => Value::Deque(items.iter().map(Value::deep_copy).collect::<std::result::Result<_, _>>()?),
            Value::Dict(dict) => {
                let mut copy = Dict::with_capacity(dict.len());
                for (key, value) in dict.iter() {
                    copy.insert(key.clone(), value.deep_copy()?);
                }
                Value::Dict(copy)
            }
            Value::Record(record) => {
                let mut copy = Record::new(record.type_name.clone());
                for (name, value) in &record.fields {
                    copy.fields.push((name.clone(), value.deep_copy()?));
                }
                Value::Record(copy)
            }
            Value::Opaque(opaque) => Value::Opaque(opaque.deep_copy()?),
            scalar => scalar.clone(),
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Renders the value the way it appears nested inside a container:
    /// strings are quoted.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_repr(self, &mut out);
        out
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other).unwrap_or_else(|_| self.same(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => write_repr(other, f),
        }
    }
}

fn seq_deep_eq(a: &[Value], b: &[Value]) -> std::result::Result<bool, ComparisonError> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.deep_eq(y)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn write_repr<W: fmt::Write>(value: &Value, out: &mut W) -> fmt::Result {
    match value {
        Value::None => out.write_str("None"),
        Value::Bool(true) => out.write_str("True"),
        Value::Bool(false) => out.write_str("False"),
        Value::Int(v) => write!(out, "{}", v),
        Value::Float(v) => write_float(*v, out),
        Value::Str(s) => write!(out, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::List(items) => {
            out.write_char('[')?;
            write_items(items, out)?;
            out.write_char(']')
        }
        Value::Tuple(items) => {
            out.write_char('(')?;
            write_items(items, out)?;
            if items.len() == 1 {
                out.write_char(',')?;
            }
            out.write_char(')')
        }
        Value::Deque(items) => {
            out.write_str("deque([")?;
            write_items(items, out)?;
            out.write_str("])")
        }
        Value::Dict(dict) => {
            out.write_char('{')?;
            for (i, (key, value)) in dict.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_repr(&key.to_value(), out)?;
                out.write_str(": ")?;
                write_repr(value, out)?;
            }
            out.write_char('}')
        }
        Value::Record(record) => {
            write!(out, "{}(", record.type_name)?;
            for (i, (name, value)) in record.fields.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{}=", name)?;
                write_repr(value, out)?;
            }
            out.write_char(')')
        }
        Value::Opaque(opaque) => out.write_str(&opaque.repr),
    }
}

fn write_items<W: fmt::Write>(items: &[Value], out: &mut W) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_repr(item, out)?;
    }
    Ok(())
}

fn write_float<W: fmt::Write>(v: f64, out: &mut W) -> fmt::Result {
    if v.is_nan() {
        out.write_str("nan")
    } else if v.is_infinite() {
        out.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else {
        write!(out, "{:?}", v)
    }
}

// ============================================================================
// Type tags
// ============================================================================

/// The exact runtime type of a value, or `Undefined` when a variable held
/// values of more than one type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TypeTag {
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Deque,
    Dict,
    /// A record or opaque type, by name.
    Named(String),
    Undefined,
}

impl TypeTag {
    pub fn as_str(&self) -> &str {
        match self {
            TypeTag::NoneType => "NoneType",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::List => "list",
            TypeTag::Tuple => "tuple",
            TypeTag::Deque => "deque",
            TypeTag::Dict => "dict",
            TypeTag::Named(name) => name,
            TypeTag::Undefined => "undefined",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.as_str().to_string()
    }
}

impl From<String> for TypeTag {
    fn from(name: String) -> Self {
        match name.as_str() {
            "NoneType" => TypeTag::NoneType,
            "bool" => TypeTag::Bool,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "str" => TypeTag::Str,
            "list" => TypeTag::List,
            "tuple" => TypeTag::Tuple,
            "deque" => TypeTag::Deque,
            "dict" => TypeTag::Dict,
            "undefined" => TypeTag::Undefined,
            _ => TypeTag::Named(name),
        }
    }
}

// ============================================================================
// Dict keys and dicts
// ============================================================================

/// A hashable value usable as a dict key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Bool(bool),
    Int(i64),
    Str(String),
    Tuple(Vec<Key>),
}

impl Key {
    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Str(s) => Value::Str(s.clone()),
            Key::Tuple(keys) => Value::Tuple(keys.iter().map(Key::to_value).collect()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_value(), f)
    }
}

/// Insertion-ordered mapping from [`Key`] to [`Value`].
///
/// Serialized as a sequence of `[key, value]` pairs so non-string keys
/// survive text formats.
#[derive(Debug, Clone, Default)]
pub struct Dict(IndexMap<Key, Value>);

impl Dict {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(IndexMap::with_capacity(capacity))
    }

    pub fn insert(&mut self, key: Key, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Key, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, Key, Value> {
        self.0.keys()
    }
}

impl FromIterator<(Key, Value)> for Dict {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Dict {
    type Item = (&'a Key, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Dict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for Dict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let pairs = Vec::<(Key, Value)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

// ============================================================================
// Records and opaque objects
// ============================================================================

/// A named, field-ordered aggregate, as produced by `#[derive(ToValue)]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }
}

/// Adapter for custom types that cannot be expressed as a built-in [`Value`].
///
/// Equality and copy support are opt-in. Returning `None` from either makes
/// the engine fall back to identity semantics for the variable holding it.
pub trait TraceObject: fmt::Debug + Send + Sync + 'static {
    /// Type name reported in variable analysis.
    fn type_name(&self) -> &str;

    /// Text shown by reporters.
    fn render(&self) -> String {
        format!("{:?}", self)
    }

    /// Deep equality against another object, if supported.
    fn deep_eq(&self, _other: &dyn TraceObject) -> Option<bool> {
        None
    }

    /// An independent copy of this object, if supported.
    fn deep_copy(&self) -> Option<Arc<dyn TraceObject>> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Equality helper for [`TraceObject::deep_eq`] implementations on
/// `PartialEq` types. Objects of a different concrete type are unequal.
pub fn eq_by_downcast<T: PartialEq + 'static>(this: &T, other: &dyn TraceObject) -> Option<bool> {
    Some(other.as_any().downcast_ref::<T>().map_or(false, |other| this == other))
}

/// A value wrapping a [`TraceObject`].
///
/// Only the type name, rendered text and identity survive serialization; a
/// deserialized opaque value compares by identity.
#[derive(Clone, Serialize, Deserialize)]
pub struct Opaque {
    type_name: String,
    repr: String,
    identity: u64,
    #[serde(skip)]
    object: Option<Arc<dyn TraceObject>>,
}

impl Opaque {
    pub fn new<T: TraceObject>(object: T) -> Self {
        Self::from_arc(Arc::new(object))
    }

    /// Wraps a shared object. Two values built from the same `Arc` share an
    /// identity.
    pub fn from_arc(object: Arc<dyn TraceObject>) -> Self {
        Self {
            type_name: object.type_name().to_string(),
            repr: object.render(),
            identity: Arc::as_ptr(&object) as *const () as usize as u64,
            object: Some(object),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn repr(&self) -> &str {
        &self.repr
    }

    pub fn identity(&self) -> u64 {
        self.identity
    }

    pub fn object(&self) -> Option<&Arc<dyn TraceObject>> {
        self.object.as_ref()
    }

    fn deep_eq(&self, other: &Opaque) -> std::result::Result<bool, ComparisonError> {
        let unsupported = || ComparisonError::Equality {
            type_name: self.type_name.clone(),
        };
        match (&self.object, &other.object) {
            (Some(a), Some(b)) => a.deep_eq(b.as_ref()).ok_or_else(unsupported),
            _ => Err(unsupported()),
        }
    }

    fn deep_copy(&self) -> std::result::Result<Opaque, ComparisonError> {
        let Some(object) = &self.object else {
            return Ok(self.clone());
        };
        let copy = object.deep_copy().ok_or_else(|| ComparisonError::Copy {
            type_name: self.type_name.clone(),
        })?;
        Ok(Opaque {
            type_name: self.type_name.clone(),
            repr: self.repr.clone(),
            identity: self.identity,
            object: Some(copy),
        })
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("type_name", &self.type_name)
            .field("repr", &self.repr)
            .field("identity", &self.identity)
            .field("object", &self.object.as_ref().map(|_| "<object>"))
            .finish()
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Conversion of a Rust value into a traced [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion of a traced [`Value`] back into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

/// Conversion of a Rust value into a dict [`Key`].
pub trait ToKey {
    fn to_key(&self) -> Key;
}

/// Conversion of a dict [`Key`] back into a Rust value.
pub trait FromKey: Sized {
    fn from_key(key: &Key) -> Result<Self>;
}

fn mismatch<T>(expected: &str, found: &Value) -> Result<T> {
    Err(Error::Conversion {
        expected: expected.to_string(),
        found: found.type_tag().to_string(),
    })
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue + ?Sized> ToValue for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

macro_rules! int_conversions {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    // Values beyond i64 saturate; traced programs rarely reach them.
                    Value::Int(i64::try_from(*self).unwrap_or(i64::MAX))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(*v).map_err(|_| Error::Conversion {
                            expected: stringify!($ty).to_string(),
                            found: format!("int {}", v),
                        }),
                        other => mismatch(stringify!($ty), other),
                    }
                }
            }

            impl ToKey for $ty {
                fn to_key(&self) -> Key {
                    Key::Int(i64::try_from(*self).unwrap_or(i64::MAX))
                }
            }

            impl FromKey for $ty {
                fn from_key(key: &Key) -> Result<Self> {
                    <$ty>::from_value(&key.to_value())
                }
            }
        )*
    };
}

int_conversions!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().map_or_else(|| mismatch("float", value), Ok)
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => mismatch("bool", other),
        }
    }
}

impl ToKey for bool {
    fn to_key(&self) -> Key {
        Key::Bool(*self)
    }
}

impl FromKey for bool {
    fn from_key(key: &Key) -> Result<Self> {
        bool::from_value(&key.to_value())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => mismatch("str", other),
        }
    }
}

impl ToKey for str {
    fn to_key(&self) -> Key {
        Key::Str(self.to_string())
    }
}

impl ToKey for String {
    fn to_key(&self) -> Key {
        Key::Str(self.clone())
    }
}

impl FromKey for String {
    fn from_key(key: &Key) -> Result<Self> {
        String::from_value(&key.to_value())
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::None
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::None, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue, const N: usize> ToValue for [T; N] {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: ToValue> ToValue for VecDeque<T> {
    fn to_value(&self) -> Value {
        Value::Deque(self.iter().map(ToValue::to_value).collect())
    }
}

fn items_of<'a>(expected: &str, value: &'a Value) -> Result<&'a [Value]> {
    match value {
        Value::List(items) | Value::Tuple(items) | Value::Deque(items) => Ok(items),
        other => mismatch(expected, other),
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        items_of("list", value)?.iter().map(T::from_value).collect()
    }
}

impl<T: FromValue> FromValue for VecDeque<T> {
    fn from_value(value: &Value) -> Result<Self> {
        items_of("deque", value)?.iter().map(T::from_value).collect()
    }
}

impl<K: ToKey, V: ToValue> ToValue for IndexMap<K, V> {
    fn to_value(&self) -> Value {
        Value::Dict(self.iter().map(|(k, v)| (k.to_key(), v.to_value())).collect())
    }
}

impl<K: ToKey, V: ToValue> ToValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        Value::Dict(self.iter().map(|(k, v)| (k.to_key(), v.to_value())).collect())
    }
}

impl<K: FromKey + Hash + Eq, V: FromValue> FromValue for IndexMap<K, V> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Dict(dict) => dict.iter().map(|(k, v)| Ok((K::from_key(k)?, V::from_value(v)?))).collect(),
            other => mismatch("dict", other),
        }
    }
}

impl<K: FromKey + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Dict(dict) => dict.iter().map(|(k, v)| Ok((K::from_key(k)?, V::from_value(v)?))).collect(),
            other => mismatch("dict", other),
        }
    }
}

impl<K: ToKey + Ord, V: ToValue> ToValue for HashMap<K, V> {
    // Sorted so repeated snapshots of the same map compare equal.
    fn to_value(&self) -> Value {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Value::Dict(entries.into_iter().map(|(k, v)| (k.to_key(), v.to_value())).collect())
    }
}

impl<K: FromKey + Hash + Eq, V: FromValue> FromValue for HashMap<K, V> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Dict(dict) => dict.iter().map(|(k, v)| Ok((K::from_key(k)?, V::from_value(v)?))).collect(),
            other => mismatch("dict", other),
        }
    }
}

macro_rules! tuple_conversions {
    ($len:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: ToValue),+> ToValue for ($($name,)+) {
            fn to_value(&self) -> Value {
                Value::Tuple(vec![$(self.$idx.to_value()),+])
            }
        }

        impl<$($name: FromValue),+> FromValue for ($($name,)+) {
            fn from_value(value: &Value) -> Result<Self> {
                let items = items_of("tuple", value)?;
                if items.len() != $len {
                    return Err(Error::Conversion {
                        expected: format!("tuple of {}", $len),
                        found: format!("sequence of {}", items.len()),
                    });
                }
                Ok(($($name::from_value(&items[$idx])?,)+))
            }
        }
    };
}

tuple_conversions!(1 => A: 0);
tuple_conversions!(2 => A: 0, B: 1);
tuple_conversions!(3 => A: 0, B: 1, C: 2);
tuple_conversions!(4 => A: 0, B: 1, C: 2, D: 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Handle(u32);

    impl TraceObject for Handle {
        fn type_name(&self) -> &str {
            "Handle"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
    }

    impl TraceObject for Point {
        fn type_name(&self) -> &str {
            "Point"
        }

        fn deep_eq(&self, other: &dyn TraceObject) -> Option<bool> {
            eq_by_downcast(self, other)
        }

        fn deep_copy(&self) -> Option<Arc<dyn TraceObject>> {
            Some(Arc::new(self.clone()))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_int_float_compare_numerically() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Float(1.5));
        assert_ne!(Value::Int(1), Value::Bool(true));
    }

    #[test]
    fn test_dict_equality_ignores_order() {
        let a: Dict = [(Key::Str("a".into()), Value::Int(1)), (Key::Str("b".into()), Value::Int(2))]
            .into_iter()
            .collect();
        let b: Dict = [(Key::Str("b".into()), Value::Int(2)), (Key::Str("a".into()), Value::Int(1))]
            .into_iter()
            .collect();
        assert_eq!(Value::Dict(a), Value::Dict(b));
    }

    #[test]
    fn test_list_and_tuple_differ() {
        assert_ne!(Value::List(vec![Value::Int(1)]), Value::Tuple(vec![Value::Int(1)]));
    }

    #[test]
    fn test_opaque_without_equality_reports_error() {
        let handle = Value::Opaque(Opaque::new(Handle(1)));
        let err = handle.deep_eq(&handle.clone()).unwrap_err();
        assert_eq!(
            err,
            ComparisonError::Equality {
                type_name: "Handle".to_string()
            }
        );
        // Identity fallback still treats a clone as the same object.
        assert_eq!(handle, handle.clone());
        assert_ne!(handle, Value::Opaque(Opaque::new(Handle(1))));
        assert!(handle.deep_copy().is_err());
    }

    #[test]
    fn test_opaque_with_adapter_compares_deeply() {
        let a = Value::Opaque(Opaque::new(Point { x: 1 }));
        let b = Value::Opaque(Opaque::new(Point { x: 1 }));
        assert_eq!(a.deep_eq(&b), Ok(true));
        let copy = a.deep_copy().unwrap();
        assert_eq!(copy.deep_eq(&a), Ok(true));
        assert_eq!(a.type_tag(), TypeTag::Named("Point".to_string()));
    }

    #[test]
    fn test_display_matches_repr_rules() {
        let value = Value::List(vec![
            Value::Int(1),
            Value::Float(2.0),
            Value::Str("x".into()),
            Value::Tuple(vec![Value::None]),
            Value::Bool(true),
        ]);
        assert_eq!(value.to_string(), "[1, 2.0, 'x', (None,), True]");
        assert_eq!(Value::Str("plain".into()).to_string(), "plain");

        let dict: Dict = [(Key::Int(1), Value::List(vec![]))].into_iter().collect();
        assert_eq!(Value::Dict(dict).to_string(), "{1: []}");

        let record = Record::new("Point").field("x", Value::Int(3)).field("y", Value::Int(4));
        assert_eq!(Value::Record(record).to_string(), "Point(x=3, y=4)");
    }

    #[test]
    fn test_deque_is_its_own_type() {
        let queue: VecDeque<i64> = VecDeque::from([1, 2]);
        let value = queue.to_value();
        assert_eq!(value.type_tag(), TypeTag::Deque);
        assert_eq!(value.to_string(), "deque([1, 2])");
        assert_ne!(value, Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(VecDeque::<i64>::from_value(&value).unwrap(), queue);
        assert_eq!(TypeTag::from("deque".to_string()), TypeTag::Deque);
    }

    #[test]
    fn test_type_tag_string_round_trip() {
        for tag in [TypeTag::Int, TypeTag::Undefined, TypeTag::Named("Point".into()), TypeTag::NoneType] {
            assert_eq!(TypeTag::from(String::from(tag.clone())), tag);
        }
    }

    #[test]
    fn test_rust_conversions() {
        let graph: IndexMap<i64, Vec<i64>> = [(1, vec![2, 3]), (2, vec![])].into_iter().collect();
        let value = graph.to_value();
        assert_eq!(value.type_tag(), TypeTag::Dict);
        let back: IndexMap<i64, Vec<i64>> = FromValue::from_value(&value).unwrap();
        assert_eq!(back, graph);

        assert_eq!((1u8, "a").to_value(), Value::Tuple(vec![Value::Int(1), Value::Str("a".into())]));
        assert_eq!(Option::<i32>::None.to_value(), Value::None);
        assert!(u8::from_value(&Value::Int(300)).is_err());
        assert!(matches!(
            i64::from_value(&Value::Str("x".into())),
            Err(Error::Conversion { .. })
        ));
    }

    #[test]
    fn test_hash_map_snapshots_are_key_ordered() {
        let scores: HashMap<String, i64> = [("b".to_string(), 2), ("a".to_string(), 1)].into_iter().collect();
        let Value::Dict(dict) = scores.to_value() else {
            panic!("expected a dict");
        };
        let keys: Vec<&Key> = dict.keys().collect();
        assert_eq!(keys, vec![&Key::Str("a".into()), &Key::Str("b".into())]);

        let back: HashMap<String, i64> = FromValue::from_value(&Value::Dict(dict)).unwrap();
        assert_eq!(back, scores);
    }
}
