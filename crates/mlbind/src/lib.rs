//! # mlbind
//!
//! Typed parameter marshalling between a managed host runtime and a native
//! numeric computation core.
//!
//! ## Overview
//!
//! A caller fills a [`Params`] container with scalars, strings, flags,
//! host arrays, sequences, and model handles, then hands it to a
//! [`Dispatcher`] together with a native [`Binding`]. The dispatcher:
//!
//! 1. marshals every declared input into the native parameter store,
//!    substituting schema defaults for unset keys,
//! 2. runs the binding synchronously,
//! 3. marshals every declared output back into `Params`.
//!
//! ```text
//! Params ──put──> [inputs] ──marshal──> NativeStore ──execute──> NativeStore
//!   ^                                                                 │
//!   └──────────────get──── [outputs] <──────marshal───────────────────┘
//! ```
//!
//! ## Layout and ownership rules
//!
//! - Column-major contiguous host arrays are adopted without copying for
//!   the duration of the call; row-major arrays are transpose-copied.
//! - Row and column views are validated against their backing buffer and
//!   fail closed with [`BindError::LayoutViolation`] when they disagree.
//! - Outputs are always fresh host arrays in column-major order; no output
//!   ever aliases an input.
//! - Model handles are moved, never shared. Reading one with
//!   [`Params::get`] yields an independent deep copy.
//!
//! ## Example
//!
//! ```rust
//! use mlbind::{run, Params};
//! use mlbind_core::ReferenceBinding;
//!
//! let binding = ReferenceBinding::new();
//! let mut params = Params::for_binding(&binding);
//! params
//!     .put("string_in", "hello")?
//!     .put("int_in", 12)?
//!     .put("double_in", 4.0)?
//!     .put("flag1", true)?;
//! run(&binding, &mut params)?;
//!
//! assert_eq!(params.get::<String>("string_out")?, "hello2");
//! assert_eq!(params.get::<i32>("int_out")?, 13);
//! # Ok::<(), mlbind::BindError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod marshal;
pub mod params;
pub mod value;

pub use config::{BindingConfig, ViewPolicy};
pub use dispatch::{run, Dispatcher};
pub use marshal::model::{HandleState, ModelHandle};
pub use params::Params;
pub use value::{AnyArray, ArrayElement, FromValue, MatrixWithInfo, Ownership, Value, ValueType};

pub use mlbind_core::Binding;
pub use mlbind_host::{HostArray, Order};

use mlbind_core::CoreError;
use mlbind_ffi::FfiError;
use mlbind_host::HostError;
use thiserror::Error;

/// Errors surfaced by the bindings.
#[derive(Debug, Error)]
pub enum BindError {
    /// The key is not declared by the binding's schema.
    #[error("binding '{binding}' has no parameter '{key}'")]
    UnknownParameter {
        /// Binding name.
        binding: String,
        /// Offending key.
        key: String,
    },

    /// A value was read or marshalled as a type it does not hold.
    #[error("parameter '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Parameter key.
        key: String,
        /// Requested or declared type.
        expected: String,
        /// Type actually held.
        found: String,
    },

    /// An array's declared order disagrees with its memory layout.
    #[error("parameter '{key}': layout violation: {reason}")]
    LayoutViolation {
        /// Parameter key.
        key: String,
        /// What disagreed.
        reason: String,
    },

    /// An array or companion sequence has the wrong shape.
    #[error("parameter '{key}': expected shape {expected}, found {found}")]
    ShapeMismatch {
        /// Parameter key.
        key: String,
        /// Expected shape.
        expected: String,
        /// Actual shape.
        found: String,
    },

    /// A released model handle was passed as input.
    #[error("parameter '{key}': model handle has already been released")]
    HandleReleased {
        /// Parameter key.
        key: String,
    },

    /// Params were created for another binding.
    #[error("params were created for binding '{found}', not '{expected}'")]
    BindingMismatch {
        /// Binding being dispatched.
        expected: String,
        /// Binding the params belong to.
        found: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The native core rejected its inputs.
    #[error("native core error: {0}")]
    Core(#[from] CoreError),

    /// A native buffer operation failed.
    #[error("FFI error: {0}")]
    Ffi(#[from] FfiError),

    /// A host array operation failed.
    #[error("host array error: {0}")]
    Host(#[from] HostError),
}

/// Result type for binding operations.
pub type BindResult<T> = Result<T, BindError>;
