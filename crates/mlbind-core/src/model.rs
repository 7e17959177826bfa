//! Opaque native models.
//!
//! A model is native state produced by one dispatch and consumable by a
//! later one. The host only ever sees it through an exclusively owned box;
//! copies are deep ([`Model::clone_model`]).
//!
//! Foreign callers that need to hold a model outside of the bindings can
//! export it with [`into_raw`] and must release it exactly once, either with
//! [`from_raw`] or with the `mlbind_model_free` deleter.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Native model state.
pub trait Model: fmt::Debug + Send + Sync {
    /// Type descriptor, matched against the declared parameter type.
    fn descriptor(&self) -> &'static str;

    /// A deep copy sharing no memory with `self`.
    fn clone_model(&self) -> Box<dyn Model>;

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Serialize the model state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if the state cannot be encoded.
    fn to_json(&self) -> CoreResult<String>;
}

/// A Gaussian kernel `k(d) = exp(-d^2 / (2 * bandwidth^2))`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianKernel {
    bandwidth: f64,
}

impl GaussianKernel {
    /// Type descriptor.
    pub const DESCRIPTOR: &'static str = "GaussianKernel";

    /// A kernel with the given bandwidth.
    #[must_use]
    pub const fn new(bandwidth: f64) -> Self {
        Self { bandwidth }
    }

    /// The kernel bandwidth.
    #[inline]
    #[must_use]
    pub const fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Kernel value at distance `distance`.
    #[must_use]
    pub fn evaluate(&self, distance: f64) -> f64 {
        (-(distance * distance) / (2.0 * self.bandwidth * self.bandwidth)).exp()
    }

    /// Restore a kernel serialized with [`Model::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] on malformed input.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Downcast a model, naming the expected type on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NativeTypeMismatch`] if `model` is not a kernel.
    pub fn from_model<'m>(name: &str, model: &'m dyn Model) -> CoreResult<&'m Self> {
        model
            .as_any()
            .downcast_ref::<Self>()
            .ok_or_else(|| CoreError::NativeTypeMismatch {
                name: name.to_string(),
                expected: Self::DESCRIPTOR,
                found: model.descriptor(),
            })
    }
}

impl Model for GaussianKernel {
    fn descriptor(&self) -> &'static str {
        Self::DESCRIPTOR
    }

    fn clone_model(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

// ============================================================================
// Raw handles
// ============================================================================

/// Thin, opaque pointer target for an exported model.
#[derive(Debug)]
pub struct RawModel(Box<dyn Model>);

/// Export a model to foreign code.
#[must_use]
pub fn into_raw(model: Box<dyn Model>) -> *mut RawModel {
    Box::into_raw(Box::new(RawModel(model)))
}

/// Reclaim a model exported with [`into_raw`]; null yields `None`.
///
/// # Safety
///
/// `ptr` must be null or come from [`into_raw`] and not have been
/// reclaimed before.
#[must_use]
pub unsafe fn from_raw(ptr: *mut RawModel) -> Option<Box<dyn Model>> {
    if ptr.is_null() {
        None
    } else {
        Some(Box::from_raw(ptr).0)
    }
}

/// Free a model exported with [`into_raw`]. Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or an unreleased pointer from [`into_raw`].
#[no_mangle]
pub unsafe extern "C" fn mlbind_model_free(ptr: *mut RawModel) {
    if let Some(model) = from_raw(ptr) {
        tracing::trace!(model = model.descriptor(), "releasing exported model");
        drop(model);
    }
}
