//! The per-dispatch native parameter store.
//!
//! The host bindings fill a [`NativeStore`] with every declared input
//! (defaults included), the binding reads them and writes its outputs, and
//! the bindings drain the outputs. A store never outlives one dispatch: its
//! lifetime parameter ties borrowed host buffers to the call.

use crate::model::Model;
use crate::{CoreError, CoreResult};
use mlbind_ffi::{ColMatrix, ElemKind, Element};
use rustc_hash::FxHashMap;

/// A matrix of either element kind.
#[derive(Debug)]
pub enum NativeMatrix<'a> {
    /// `f64` elements.
    F64(ColMatrix<'a, f64>),
    /// `u64` elements.
    U64(ColMatrix<'a, u64>),
}

impl NativeMatrix<'_> {
    /// Runtime element kind.
    #[must_use]
    pub fn kind(&self) -> ElemKind {
        match self {
            Self::F64(_) => ElemKind::F64,
            Self::U64(_) => ElemKind::U64,
        }
    }

    /// `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::F64(m) => m.shape(),
            Self::U64(m) => m.shape(),
        }
    }
}

/// Element types that can be stored in a [`NativeMatrix`].
pub trait NativeElement: Element {
    /// Wrap a typed matrix.
    fn wrap(m: ColMatrix<'_, Self>) -> NativeMatrix<'_>;

    /// Borrow the typed matrix, if the kinds agree.
    fn peek<'b, 'a>(m: &'b NativeMatrix<'a>) -> Option<&'b ColMatrix<'a, Self>>;

    /// Take the typed matrix, handing the original back if the kinds differ.
    ///
    /// # Errors
    ///
    /// Returns the untouched matrix when its element kind is not `Self`.
    fn unwrap_matrix(m: NativeMatrix<'_>) -> Result<ColMatrix<'_, Self>, NativeMatrix<'_>>;
}

impl NativeElement for f64 {
    fn wrap(m: ColMatrix<'_, Self>) -> NativeMatrix<'_> {
        NativeMatrix::F64(m)
    }

    fn peek<'b, 'a>(m: &'b NativeMatrix<'a>) -> Option<&'b ColMatrix<'a, Self>> {
        match m {
            NativeMatrix::F64(m) => Some(m),
            NativeMatrix::U64(_) => None,
        }
    }

    fn unwrap_matrix(m: NativeMatrix<'_>) -> Result<ColMatrix<'_, Self>, NativeMatrix<'_>> {
        match m {
            NativeMatrix::F64(m) => Ok(m),
            other @ NativeMatrix::U64(_) => Err(other),
        }
    }
}

impl NativeElement for u64 {
    fn wrap(m: ColMatrix<'_, Self>) -> NativeMatrix<'_> {
        NativeMatrix::U64(m)
    }

    fn peek<'b, 'a>(m: &'b NativeMatrix<'a>) -> Option<&'b ColMatrix<'a, Self>> {
        match m {
            NativeMatrix::U64(m) => Some(m),
            NativeMatrix::F64(_) => None,
        }
    }

    fn unwrap_matrix(m: NativeMatrix<'_>) -> Result<ColMatrix<'_, Self>, NativeMatrix<'_>> {
        match m {
            NativeMatrix::U64(m) => Ok(m),
            other @ NativeMatrix::F64(_) => Err(other),
        }
    }
}

/// A parameter value in native form.
#[derive(Debug)]
pub enum NativeValue<'a> {
    /// Integer.
    Int(i32),
    /// Float.
    Double(f64),
    /// Flag.
    Bool(bool),
    /// String.
    String(String),
    /// Integer sequence.
    IntVec(Vec<i32>),
    /// String sequence.
    StringVec(Vec<String>),
    /// Matrix or vector.
    Matrix(NativeMatrix<'a>),
    /// `f64` matrix with a categorical flag per row.
    MatrixWithInfo {
        /// `true` marks a categorical row.
        info: Vec<bool>,
        /// The data.
        matrix: ColMatrix<'a, f64>,
    },
    /// Opaque model.
    Model(Box<dyn Model>),
}

impl NativeValue<'_> {
    /// Native type name, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::IntVec(_) => "vector<int>",
            Self::StringVec(_) => "vector<string>",
            Self::Matrix(NativeMatrix::F64(_)) => "mat",
            Self::Matrix(NativeMatrix::U64(_)) => "umat",
            Self::MatrixWithInfo { .. } => "tuple<DatasetInfo, mat>",
            Self::Model(_) => "model",
        }
    }
}

fn matrix_type_name(kind: ElemKind) -> &'static str {
    match kind {
        ElemKind::F64 => "mat",
        ElemKind::U64 => "umat",
    }
}

/// Name-keyed native values for one dispatch.
#[derive(Debug, Default)]
pub struct NativeStore<'a> {
    values: FxHashMap<String, NativeValue<'a>>,
}

impl<'a> NativeStore<'a> {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one.
    pub fn set(&mut self, name: impl Into<String>, value: NativeValue<'a>) {
        self.values.insert(name.into(), value);
    }

    /// Whether a value is stored under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Borrow a stored value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NativeValue<'a>> {
        self.values.get(name)
    }

    /// Remove and return a stored value.
    pub fn take(&mut self, name: &str) -> Option<NativeValue<'a>> {
        self.values.remove(name)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, name: &str) -> CoreResult<&NativeValue<'a>> {
        self.values
            .get(name)
            .ok_or_else(|| CoreError::Missing(name.to_string()))
    }

    fn mismatch(name: &str, expected: &'static str, found: &NativeValue<'_>) -> CoreError {
        CoreError::NativeTypeMismatch {
            name: name.to_string(),
            expected,
            found: found.type_name(),
        }
    }

    /// Read an integer.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing or not an integer.
    pub fn int(&self, name: &str) -> CoreResult<i32> {
        match self.require(name)? {
            NativeValue::Int(v) => Ok(*v),
            other => Err(Self::mismatch(name, "int", other)),
        }
    }

    /// Read a float.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing or not a float.
    pub fn double(&self, name: &str) -> CoreResult<f64> {
        match self.require(name)? {
            NativeValue::Double(v) => Ok(*v),
            other => Err(Self::mismatch(name, "double", other)),
        }
    }

    /// Read a flag.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing or not a flag.
    pub fn flag(&self, name: &str) -> CoreResult<bool> {
        match self.require(name)? {
            NativeValue::Bool(v) => Ok(*v),
            other => Err(Self::mismatch(name, "bool", other)),
        }
    }

    /// Read a string.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing or not a string.
    pub fn string(&self, name: &str) -> CoreResult<&str> {
        match self.require(name)? {
            NativeValue::String(v) => Ok(v),
            other => Err(Self::mismatch(name, "string", other)),
        }
    }

    /// Read an integer sequence.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing or not an integer sequence.
    pub fn int_vec(&self, name: &str) -> CoreResult<&[i32]> {
        match self.require(name)? {
            NativeValue::IntVec(v) => Ok(v),
            other => Err(Self::mismatch(name, "vector<int>", other)),
        }
    }

    /// Read a string sequence.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing or not a string sequence.
    pub fn string_vec(&self, name: &str) -> CoreResult<&[String]> {
        match self.require(name)? {
            NativeValue::StringVec(v) => Ok(v),
            other => Err(Self::mismatch(name, "vector<string>", other)),
        }
    }

    /// Borrow a matrix (or vector) of element type `T`.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing, not a matrix, or of another element kind.
    pub fn matrix<T: NativeElement>(&self, name: &str) -> CoreResult<&ColMatrix<'a, T>> {
        let expected = matrix_type_name(T::KIND);
        match self.require(name)? {
            NativeValue::Matrix(m) => {
                T::peek(m).ok_or_else(|| CoreError::NativeTypeMismatch {
                    name: name.to_string(),
                    expected,
                    found: matrix_type_name(m.kind()),
                })
            }
            other => Err(Self::mismatch(name, expected, other)),
        }
    }

    /// Store a typed matrix.
    pub fn set_matrix<T: NativeElement>(&mut self, name: impl Into<String>, m: ColMatrix<'a, T>) {
        self.set(name, NativeValue::Matrix(T::wrap(m)));
    }

    /// Borrow a matrix with per-row categorical flags.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing or of another type.
    pub fn matrix_with_info(&self, name: &str) -> CoreResult<(&[bool], &ColMatrix<'a, f64>)> {
        match self.require(name)? {
            NativeValue::MatrixWithInfo { info, matrix } => Ok((info, matrix)),
            other => Err(Self::mismatch(name, "tuple<DatasetInfo, mat>", other)),
        }
    }

    /// Borrow a model; an absent model is `None`.
    ///
    /// # Errors
    ///
    /// Fails if something other than a model is stored under `name`.
    pub fn model(&self, name: &str) -> CoreResult<Option<&dyn Model>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(NativeValue::Model(m)) => Ok(Some(m.as_ref())),
            Some(other) => Err(Self::mismatch(name, "model", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GaussianKernel;

    #[test]
    fn test_scalar_round_trip() {
        let mut store = NativeStore::new();
        store.set("i", NativeValue::Int(4));
        store.set("s", NativeValue::String("x".into()));
        assert_eq!(store.int("i").unwrap(), 4);
        assert_eq!(store.string("s").unwrap(), "x");
        assert!(store.has("i"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_missing_and_mismatch() {
        let mut store = NativeStore::new();
        store.set("i", NativeValue::Int(4));
        assert_eq!(store.double("d"), Err(CoreError::Missing("d".into())));
        assert_eq!(
            store.double("i"),
            Err(CoreError::NativeTypeMismatch {
                name: "i".into(),
                expected: "double",
                found: "int",
            })
        );
    }

    #[test]
    fn test_matrix_kind_checked() {
        let data = [1u64, 2, 3, 4];
        let mut store = NativeStore::new();
        store.set_matrix("m", ColMatrix::borrowed(&data, 2, 2).unwrap());

        assert_eq!(store.matrix::<u64>("m").unwrap().get(1, 1), Some(4));
        assert!(matches!(
            store.matrix::<f64>("m"),
            Err(CoreError::NativeTypeMismatch {
                expected: "mat",
                found: "umat",
                ..
            })
        ));
    }

    #[test]
    fn test_unwrap_matrix_returns_other_kind() {
        let m = NativeMatrix::F64(ColMatrix::zeros(1, 1).unwrap());
        let back = <u64 as NativeElement>::unwrap_matrix(m).unwrap_err();
        assert_eq!(back.kind(), ElemKind::F64);
        assert_eq!(back.shape(), (1, 1));
    }

    #[test]
    fn test_model_absent_is_none() {
        let mut store = NativeStore::new();
        assert!(store.model("model_in").unwrap().is_none());
        store.set("model_in", NativeValue::Model(Box::new(GaussianKernel::new(1.0))));
        assert_eq!(
            store.model("model_in").unwrap().map(|m| m.descriptor()),
            Some("GaussianKernel")
        );
        store.set("model_in", NativeValue::Bool(true));
        assert!(store.model("model_in").is_err());
    }

    #[test]
    fn test_take_removes() {
        let mut store = NativeStore::new();
        store.set("v", NativeValue::IntVec(vec![1, 2]));
        assert!(matches!(store.take("v"), Some(NativeValue::IntVec(v)) if v == vec![1, 2]));
        assert!(store.is_empty());
    }
}
