//! Host-side parameter values.
//!
//! [`Value`] is the tagged union stored in [`Params`](crate::Params). The
//! tag fixes the marshalling path; typed access goes through [`FromValue`].

use crate::marshal::model::ModelHandle;
use mlbind_core::{DefaultValue, ParamSpec, ParamType};
use mlbind_ffi::{ElemKind, Element};
use mlbind_host::{HostArray, Order};
use std::fmt;

// ============================================================================
// Arrays
// ============================================================================

/// A host array of either element kind.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyArray {
    /// `f64` elements.
    F64(HostArray<f64>),
    /// `u64` elements.
    U64(HostArray<u64>),
}

impl AnyArray {
    /// An empty array of the given kind: `0 x 0` for matrices, length 0
    /// otherwise.
    #[must_use]
    pub fn empty(kind: ElemKind, rank: usize) -> Self {
        match (kind, rank) {
            (ElemKind::F64, 2) => Self::F64(HostArray::empty_matrix()),
            (ElemKind::F64, _) => Self::F64(HostArray::vector(Vec::new())),
            (ElemKind::U64, 2) => Self::U64(HostArray::empty_matrix()),
            (ElemKind::U64, _) => Self::U64(HostArray::vector(Vec::new())),
        }
    }

    /// Runtime element kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ElemKind {
        match self {
            Self::F64(_) => ElemKind::F64,
            Self::U64(_) => ElemKind::U64,
        }
    }

    /// Dimensions.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        match self {
            Self::F64(a) => a.dims(),
            Self::U64(a) => a.dims(),
        }
    }

    /// Declared order.
    #[must_use]
    pub fn order(&self) -> Order {
        match self {
            Self::F64(a) => a.order(),
            Self::U64(a) => a.order(),
        }
    }

    /// Whether the array is a view into another array.
    #[must_use]
    pub fn is_view(&self) -> bool {
        match self {
            Self::F64(a) => a.is_view(),
            Self::U64(a) => a.is_view(),
        }
    }
}

/// An `f64` matrix with one categorical flag per row.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixWithInfo {
    /// `true` marks a categorical row.
    pub info: Vec<bool>,
    /// The data.
    pub matrix: HostArray<f64>,
}

impl MatrixWithInfo {
    /// Pair a matrix with its per-row flags.
    #[must_use]
    pub fn new(info: Vec<bool>, matrix: HostArray<f64>) -> Self {
        Self { info, matrix }
    }

    /// A matrix whose rows are all numeric.
    #[must_use]
    pub fn numeric(matrix: HostArray<f64>) -> Self {
        let rows = matrix.dims2().0;
        Self {
            info: vec![false; rows],
            matrix,
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new(), HostArray::empty_matrix())
    }
}

// ============================================================================
// Value
// ============================================================================

/// Runtime tag of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// [`Value::Int`].
    Int,
    /// [`Value::Double`].
    Double,
    /// [`Value::Bool`].
    Bool,
    /// [`Value::String`].
    String,
    /// [`Value::IntSeq`].
    IntSeq,
    /// [`Value::StringSeq`].
    StringSeq,
    /// [`Value::Matrix`].
    Matrix(ElemKind),
    /// [`Value::Vector`].
    Vector(ElemKind),
    /// [`Value::MatrixWithInfo`].
    MatrixWithInfo,
    /// [`Value::Model`].
    Model,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "Int"),
            Self::Double => write!(f, "Double"),
            Self::Bool => write!(f, "Bool"),
            Self::String => write!(f, "String"),
            Self::IntSeq => write!(f, "IntSeq"),
            Self::StringSeq => write!(f, "StringSeq"),
            Self::Matrix(kind) => write!(f, "Matrix<{kind}>"),
            Self::Vector(kind) => write!(f, "Vector<{kind}>"),
            Self::MatrixWithInfo => write!(f, "MatrixWithInfo"),
            Self::Model => write!(f, "Model"),
        }
    }
}

/// Who owns the memory behind a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// The value owns its data outright.
    Owned,
    /// The value borrows another array's storage.
    Borrowed,
}

/// A host-side parameter value.
#[derive(Clone, Debug)]
pub enum Value {
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit float.
    Double(f64),
    /// Flag.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Integer sequence.
    IntSeq(Vec<i32>),
    /// String sequence.
    StringSeq(Vec<String>),
    /// Rank-2 array.
    Matrix(AnyArray),
    /// Rank-1 array, or a rank-2 array with one row or one column.
    Vector(AnyArray),
    /// Matrix with per-row categorical flags.
    MatrixWithInfo(MatrixWithInfo),
    /// Opaque native model.
    Model(ModelHandle),
}

impl Value {
    /// Runtime tag.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::Bool(_) => ValueType::Bool,
            Self::String(_) => ValueType::String,
            Self::IntSeq(_) => ValueType::IntSeq,
            Self::StringSeq(_) => ValueType::StringSeq,
            Self::Matrix(a) => ValueType::Matrix(a.kind()),
            Self::Vector(a) => ValueType::Vector(a.kind()),
            Self::MatrixWithInfo(_) => ValueType::MatrixWithInfo,
            Self::Model(_) => ValueType::Model,
        }
    }

    /// Views borrow their backing storage; everything else is owned.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        match self {
            Self::Matrix(a) | Self::Vector(a) if a.is_view() => Ownership::Borrowed,
            Self::MatrixWithInfo(m) if m.matrix.is_view() => Ownership::Borrowed,
            _ => Ownership::Owned,
        }
    }

    /// The value an unset parameter takes.
    #[must_use]
    pub fn default_for(spec: &ParamSpec) -> Self {
        match (spec.ty, spec.default) {
            (ParamType::Int, DefaultValue::Int(v)) => Self::Int(v),
            (ParamType::Double, DefaultValue::Double(v)) => Self::Double(v),
            (ParamType::Double, DefaultValue::Int(v)) => Self::Double(f64::from(v)),
            (ParamType::Bool, DefaultValue::Bool(v)) => Self::Bool(v),
            (ParamType::String, DefaultValue::Str(s)) => Self::String(s.to_string()),
            (ParamType::Int, _) => Self::Int(0),
            (ParamType::Double, _) => Self::Double(0.0),
            (ParamType::Bool, _) => Self::Bool(false),
            (ParamType::String, _) => Self::String(String::new()),
            (ParamType::IntSeq, _) => Self::IntSeq(Vec::new()),
            (ParamType::StringSeq, _) => Self::StringSeq(Vec::new()),
            (ParamType::Matrix(kind), _) => Self::Matrix(AnyArray::empty(kind, 2)),
            (ParamType::Vector(kind, _), _) => Self::Vector(AnyArray::empty(kind, 1)),
            (ParamType::MatrixWithInfo, _) => Self::MatrixWithInfo(MatrixWithInfo::empty()),
            (ParamType::Model(descriptor), _) => Self::Model(ModelHandle::absent(descriptor)),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Self::IntSeq(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Self::StringSeq(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Self::StringSeq(v.into_iter().map(str::to_string).collect())
    }
}

impl From<AnyArray> for Value {
    /// Rank 1 becomes a vector, rank 2 a matrix.
    fn from(a: AnyArray) -> Self {
        if a.dims().len() == 1 {
            Self::Vector(a)
        } else {
            Self::Matrix(a)
        }
    }
}

impl From<HostArray<f64>> for Value {
    fn from(a: HostArray<f64>) -> Self {
        AnyArray::F64(a).into()
    }
}

impl From<HostArray<u64>> for Value {
    fn from(a: HostArray<u64>) -> Self {
        AnyArray::U64(a).into()
    }
}

impl From<MatrixWithInfo> for Value {
    fn from(m: MatrixWithInfo) -> Self {
        Self::MatrixWithInfo(m)
    }
}

impl From<ModelHandle> for Value {
    fn from(h: ModelHandle) -> Self {
        Self::Model(h)
    }
}

// ============================================================================
// Typed extraction
// ============================================================================

/// Types that can be read out of a [`Value`].
///
/// Only lossless conversions are accepted: an `Int` reads as `f64`, and a
/// matrix and a vector of the same element kind read as each other.
pub trait FromValue: Sized {
    /// Name of the requested type, for diagnostics.
    const EXPECTED: &'static str;

    /// Read a copy out of a borrowed value.
    fn from_value(value: &Value) -> Option<Self>;

    /// Move out of an owned value, handing it back on mismatch.
    ///
    /// # Errors
    ///
    /// Returns the untouched value when it does not hold `Self`.
    fn from_owned(value: Value) -> Result<Self, Value> {
        Self::from_value(&value).ok_or(value)
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn from_owned(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "Int";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "Double";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "Bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "String";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn from_owned(value: Value) -> Result<Self, Value> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FromValue for Vec<i32> {
    const EXPECTED: &'static str = "IntSeq";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntSeq(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn from_owned(value: Value) -> Result<Self, Value> {
        match value {
            Value::IntSeq(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl FromValue for Vec<String> {
    const EXPECTED: &'static str = "StringSeq";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringSeq(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn from_owned(value: Value) -> Result<Self, Value> {
        match value {
            Value::StringSeq(v) => Ok(v),
            other => Err(other),
        }
    }
}

/// Element types a host array can hold.
pub trait ArrayElement: Element {
    /// Borrow the typed array, if the kinds agree.
    fn peek(array: &AnyArray) -> Option<&HostArray<Self>>;

    /// Take the typed array, handing the original back on mismatch.
    ///
    /// # Errors
    ///
    /// Returns the untouched array when its kind is not `Self`.
    fn unwrap_array(array: AnyArray) -> Result<HostArray<Self>, AnyArray>;
}

impl ArrayElement for f64 {
    fn peek(array: &AnyArray) -> Option<&HostArray<Self>> {
        match array {
            AnyArray::F64(a) => Some(a),
            AnyArray::U64(_) => None,
        }
    }

    fn unwrap_array(array: AnyArray) -> Result<HostArray<Self>, AnyArray> {
        match array {
            AnyArray::F64(a) => Ok(a),
            other @ AnyArray::U64(_) => Err(other),
        }
    }
}

impl ArrayElement for u64 {
    fn peek(array: &AnyArray) -> Option<&HostArray<Self>> {
        match array {
            AnyArray::U64(a) => Some(a),
            AnyArray::F64(_) => None,
        }
    }

    fn unwrap_array(array: AnyArray) -> Result<HostArray<Self>, AnyArray> {
        match array {
            AnyArray::U64(a) => Ok(a),
            other @ AnyArray::F64(_) => Err(other),
        }
    }
}

impl<T: ArrayElement> FromValue for HostArray<T> {
    const EXPECTED: &'static str = "host array";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Matrix(a) | Value::Vector(a) => T::peek(a).cloned(),
            _ => None,
        }
    }

    fn from_owned(value: Value) -> Result<Self, Value> {
        match value {
            Value::Matrix(a) => T::unwrap_array(a).map_err(Value::Matrix),
            Value::Vector(a) => T::unwrap_array(a).map_err(Value::Vector),
            other => Err(other),
        }
    }
}

impl FromValue for MatrixWithInfo {
    const EXPECTED: &'static str = "MatrixWithInfo";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::MatrixWithInfo(m) => Some(m.clone()),
            _ => None,
        }
    }

    fn from_owned(value: Value) -> Result<Self, Value> {
        match value {
            Value::MatrixWithInfo(m) => Ok(m),
            other => Err(other),
        }
    }
}

impl FromValue for ModelHandle {
    const EXPECTED: &'static str = "Model";

    /// A deep copy; the stored handle is untouched.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Model(h) => Some(h.clone()),
            _ => None,
        }
    }

    fn from_owned(value: Value) -> Result<Self, Value> {
        match value {
            Value::Model(h) => Ok(h),
            other => Err(other),
        }
    }
}
