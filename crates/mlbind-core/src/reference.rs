//! The reference binding.
//!
//! A fixed, deterministic transform over every parameter kind the bindings
//! can marshal. Each output is a simple function of one input, so a caller
//! can verify exactly what crossed the boundary in each direction.

use crate::model::{GaussianKernel, Model};
use crate::schema::{DefaultValue, ParamType, Schema};
use crate::store::{NativeElement, NativeStore, NativeValue};
use crate::{Binding, CoreError, CoreResult};
use mlbind_ffi::{ColMatrix, ElemKind, Orientation, PinnedBuffer};

/// Bandwidth of a freshly built model.
pub const BUILT_MODEL_BANDWIDTH: f64 = 10.0;

const F64: ElemKind = ElemKind::F64;
const U64: ElemKind = ElemKind::U64;

/// Elements the reference transform can scale.
trait Doubling: NativeElement {
    fn doubled(self) -> Self;
}

impl Doubling for f64 {
    fn doubled(self) -> Self {
        self * 2.0
    }
}

impl Doubling for u64 {
    // Unsigned arithmetic wraps natively.
    fn doubled(self) -> Self {
        self.wrapping_mul(2)
    }
}

/// The reference binding.
#[derive(Clone, Debug)]
pub struct ReferenceBinding {
    schema: Schema,
}

impl Default for ReferenceBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceBinding {
    /// Binding name.
    pub const NAME: &'static str = "reference";

    /// Create the binding with its full schema.
    #[must_use]
    pub fn new() -> Self {
        let model = ParamType::Model(GaussianKernel::DESCRIPTOR);
        let schema = Schema::new(Self::NAME)
            .required_input(
                "string_in",
                ParamType::String,
                DefaultValue::Str(""),
                "Input string, must be 'hello'.",
            )
            .required_input(
                "int_in",
                ParamType::Int,
                DefaultValue::Int(0),
                "Input int, must be 12.",
            )
            .required_input(
                "double_in",
                ParamType::Double,
                DefaultValue::Double(0.0),
                "Input double, must be 4.0.",
            )
            .input("flag1", ParamType::Bool, "Input flag, must be specified.")
            .input("flag2", ParamType::Bool, "Input flag, must not be specified.")
            .input("matrix_in", ParamType::Matrix(F64), "Input matrix.")
            .input("umatrix_in", ParamType::Matrix(U64), "Input unsigned matrix.")
            .input("col_in", ParamType::Vector(F64, Orientation::Column), "Input column.")
            .input("ucol_in", ParamType::Vector(U64, Orientation::Column), "Input unsigned column.")
            .input("row_in", ParamType::Vector(F64, Orientation::Row), "Input row.")
            .input("urow_in", ParamType::Vector(U64, Orientation::Row), "Input unsigned row.")
            .input("vector_in", ParamType::IntSeq, "Input vector of numbers.")
            .input("str_vector_in", ParamType::StringSeq, "Input vector of strings.")
            .input(
                "matrix_and_info_in",
                ParamType::MatrixWithInfo,
                "Input matrix and info.",
            )
            .input("row_view_in", ParamType::Vector(F64, Orientation::Row), "Input row view.")
            .input(
                "col_view_in",
                ParamType::Vector(F64, Orientation::Column),
                "Input column view.",
            )
            .input(
                "umatrix_order_in",
                ParamType::Matrix(U64),
                "Input unsigned matrix with explicit declared layout.",
            )
            .input("build_model", ParamType::Bool, "If true, a model will be returned.")
            .input("model_in", model, "Input model.")
            .output("string_out", ParamType::String, "Output string, 'hello2' if correct.")
            .output("int_out", ParamType::Int, "Output int, 13 if correct.")
            .output("double_out", ParamType::Double, "Output double, 5.0 if correct.")
            .output("matrix_out", ParamType::Matrix(F64), "Output matrix.")
            .output("umatrix_out", ParamType::Matrix(U64), "Output unsigned matrix.")
            .output("col_out", ParamType::Vector(F64, Orientation::Column), "Output column, 2x input.")
            .output(
                "ucol_out",
                ParamType::Vector(U64, Orientation::Column),
                "Output unsigned column, 2x input.",
            )
            .output("row_out", ParamType::Vector(F64, Orientation::Row), "Output row, 2x input.")
            .output(
                "urow_out",
                ParamType::Vector(U64, Orientation::Row),
                "Output unsigned row, 2x input.",
            )
            .output("vector_out", ParamType::IntSeq, "Output vector.")
            .output("str_vector_out", ParamType::StringSeq, "Output string vector.")
            .output(
                "matrix_and_info_out",
                ParamType::Matrix(F64),
                "Output matrix, numeric rows doubled.",
            )
            .output("row_view_out", ParamType::Vector(F64, Orientation::Row), "Output row view.")
            .output(
                "col_view_out",
                ParamType::Vector(F64, Orientation::Column),
                "Output column view.",
            )
            .output(
                "umatrix_order_out",
                ParamType::Matrix(U64),
                "Output unsigned matrix with explicit declared layout.",
            )
            .output("model_out", model, "Output model.")
            .output("model_bw_out", ParamType::Double, "Bandwidth of the input model, doubled.");
        Self { schema }
    }
}

/// Drop the last column and double column 2, if it survives.
fn shed_last_col<T: Doubling>(m: &ColMatrix<'_, T>) -> CoreResult<ColMatrix<'static, T>> {
    let (rows, cols) = m.shape();
    let keep = cols.saturating_sub(1);
    let kept = m.as_slice().get(..rows * keep).unwrap_or_default();
    let mut out = ColMatrix::from_col_major(rows, keep, kept)?;
    if keep > 2 {
        let data = out.make_mut()?;
        for v in &mut data[2 * rows..3 * rows] {
            *v = v.doubled();
        }
    }
    Ok(out)
}

/// Double every element, keeping the shape.
fn double_all<T: Doubling>(m: &ColMatrix<'_, T>) -> CoreResult<ColMatrix<'static, T>> {
    let src = m.as_slice();
    let buffer = PinnedBuffer::from_fn(src.len(), |i| src[i].doubled())?;
    Ok(ColMatrix::from_pinned(buffer, m.rows(), m.cols())?)
}

/// Double numeric rows; categorical rows pass through unchanged.
fn double_numeric_rows(
    name: &str,
    info: &[bool],
    m: &ColMatrix<'_, f64>,
) -> CoreResult<ColMatrix<'static, f64>> {
    let rows = m.rows();
    if info.len() != rows {
        return Err(CoreError::ShapeMismatch {
            name: name.to_string(),
            expected: rows,
            actual: info.len(),
        });
    }
    let src = m.as_slice();
    let buffer = PinnedBuffer::from_fn(src.len(), |i| {
        if info[i % rows] {
            src[i]
        } else {
            src[i].doubled()
        }
    })?;
    Ok(ColMatrix::from_pinned(buffer, rows, m.cols())?)
}

fn scale_matrix<T: Doubling>(
    store: &mut NativeStore<'_>,
    input: &str,
    output: &str,
    f: fn(&ColMatrix<'_, T>) -> CoreResult<ColMatrix<'static, T>>,
) -> CoreResult<()> {
    let out = f(store.matrix::<T>(input)?)?;
    store.set_matrix(output, out);
    Ok(())
}

fn pass_through(store: &mut NativeStore<'_>, input: &str, output: &str) {
    if let Some(value) = store.take(input) {
        store.set(output, value);
    }
}

impl Binding for ReferenceBinding {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    #[allow(clippy::float_cmp)]
    fn execute(&self, store: &mut NativeStore<'_>) -> CoreResult<()> {
        let accepted = store.flag("flag1")? && !store.flag("flag2")?;

        let string_out = if accepted && store.string("string_in")? == "hello" {
            "hello2"
        } else {
            "wrong"
        };
        let int_out = if accepted && store.int("int_in")? == 12 { 13 } else { 11 };
        let double_out = if accepted && store.double("double_in")? == 4.0 {
            5.0
        } else {
            3.0
        };
        store.set("string_out", NativeValue::String(string_out.to_string()));
        store.set("int_out", NativeValue::Int(int_out));
        store.set("double_out", NativeValue::Double(double_out));

        scale_matrix::<f64>(store, "matrix_in", "matrix_out", shed_last_col)?;
        scale_matrix::<u64>(store, "umatrix_in", "umatrix_out", shed_last_col)?;
        scale_matrix::<f64>(store, "col_in", "col_out", double_all)?;
        scale_matrix::<u64>(store, "ucol_in", "ucol_out", double_all)?;
        scale_matrix::<f64>(store, "row_in", "row_out", double_all)?;
        scale_matrix::<u64>(store, "urow_in", "urow_out", double_all)?;

        let mut ints = store.int_vec("vector_in")?.to_vec();
        ints.pop();
        store.set("vector_out", NativeValue::IntVec(ints));
        let mut strings = store.string_vec("str_vector_in")?.to_vec();
        strings.pop();
        store.set("str_vector_out", NativeValue::StringVec(strings));

        let (info, matrix) = store.matrix_with_info("matrix_and_info_in")?;
        let out = double_numeric_rows("matrix_and_info_in", info, matrix)?;
        store.set_matrix("matrix_and_info_out", out);

        pass_through(store, "row_view_in", "row_view_out");
        pass_through(store, "col_view_in", "col_view_out");
        pass_through(store, "umatrix_order_in", "umatrix_order_out");

        let (copy, bandwidth) = match store.model("model_in")? {
            Some(model) => (
                Some(model.clone_model()),
                Some(GaussianKernel::from_model("model_in", model)?.bandwidth()),
            ),
            None => (None, None),
        };
        if store.flag("build_model")? {
            let built: Box<dyn Model> = Box::new(GaussianKernel::new(BUILT_MODEL_BANDWIDTH));
            store.set("model_out", NativeValue::Model(built));
        } else if let Some(copy) = copy {
            store.set("model_out", NativeValue::Model(copy));
        }
        if let Some(bandwidth) = bandwidth {
            store.set("model_bw_out", NativeValue::Double(bandwidth * 2.0));
        }

        tracing::debug!(binding = Self::NAME, accepted, "reference transform complete");
        Ok(())
    }
}
