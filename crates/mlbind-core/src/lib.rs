//! # mlbind Native Core
//!
//! The native side of the binding boundary.
//!
//! A binding declares its parameters in a [`Schema`], receives its inputs in
//! a [`NativeStore`] that the host bindings populate, and writes its outputs
//! back into the same store. The store is created fresh for every dispatch,
//! so nothing leaks from one call into the next.
//!
//! ## Overview
//!
//! - [`schema`]: parameter declarations (name, type, direction, default).
//! - [`store`]: the per-dispatch native parameter store.
//! - [`model`]: opaque native models and their raw-handle ABI.
//! - [`reference`]: the reference binding used to verify marshalling.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod model;
pub mod reference;
pub mod schema;
pub mod store;

pub use model::{GaussianKernel, Model};
pub use reference::ReferenceBinding;
pub use schema::{DefaultValue, Direction, ParamSpec, ParamType, Schema};
pub use store::{NativeElement, NativeMatrix, NativeStore, NativeValue};

use mlbind_ffi::FfiError;
use thiserror::Error;

/// Errors raised inside the native core.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CoreError {
    /// The store holds no value under this name.
    #[error("no native value for parameter '{0}'")]
    Missing(String),

    /// The store holds a value of a different native type.
    #[error("parameter '{name}': expected native {expected}, found {found}")]
    NativeTypeMismatch {
        /// Parameter name.
        name: String,
        /// Expected native type.
        expected: &'static str,
        /// Native type actually stored.
        found: &'static str,
    },

    /// Two inputs disagree on a dimension.
    #[error("parameter '{name}': expected {expected} entries, found {actual}")]
    ShapeMismatch {
        /// Parameter name.
        name: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Model (de)serialization failed.
    #[error("model serialization failed: {0}")]
    Serialization(String),

    /// A native buffer operation failed.
    #[error(transparent)]
    Ffi(#[from] FfiError),
}

/// Result type for native core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// A native computation exposed across the boundary.
///
/// Implementations read every declared input from the store and write the
/// outputs they produce. Execution is synchronous and must be a pure
/// function of the inputs.
pub trait Binding {
    /// The parameters this binding declares.
    fn schema(&self) -> &Schema;

    /// The binding's name.
    fn name(&self) -> &'static str {
        self.schema().binding()
    }

    /// Run the computation.
    ///
    /// # Errors
    ///
    /// Returns an error if an input has an unexpected native type or shape.
    fn execute(&self, store: &mut NativeStore<'_>) -> CoreResult<()>;
}
