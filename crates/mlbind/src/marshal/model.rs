//! Exclusively owned model handles.
//!
//! A [`ModelHandle`] carries at most one native model and tracks who holds
//! it. During a dispatch the model is lent to the native store and the
//! handle reads [`HandleState::OwnedByCore`]; it is reclaimed before the
//! dispatch returns, whether or not the binding succeeded.

use crate::{BindError, BindResult};
use mlbind_core::model::{self, RawModel};
use mlbind_core::Model;
use std::fmt;

/// Who currently holds the model behind a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    /// No model was ever attached.
    Absent,
    /// The caller holds the model.
    OwnedByCaller,
    /// The model is lent to the native core for one dispatch.
    OwnedByCore,
    /// The model has been freed.
    Released,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::OwnedByCaller => "owned by caller",
            Self::OwnedByCore => "owned by core",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

/// A host handle to an opaque native model.
///
/// Cloning a handle deep-copies the model; two handles never share one.
#[derive(Debug)]
pub struct ModelHandle {
    descriptor: &'static str,
    state: HandleState,
    model: Option<Box<dyn Model>>,
}

impl ModelHandle {
    /// A handle with no model, typed by `descriptor`.
    #[must_use]
    pub fn absent(descriptor: &'static str) -> Self {
        Self {
            descriptor,
            state: HandleState::Absent,
            model: None,
        }
    }

    /// Take ownership of a native model.
    #[must_use]
    pub fn new(model: Box<dyn Model>) -> Self {
        Self {
            descriptor: model.descriptor(),
            state: HandleState::OwnedByCaller,
            model: Some(model),
        }
    }

    /// The model's type descriptor.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &'static str {
        self.descriptor
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Whether no model was ever attached.
    #[inline]
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.state == HandleState::Absent
    }

    /// Whether the model has been freed.
    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state == HandleState::Released
    }

    /// Borrow the model, if the caller holds one.
    #[must_use]
    pub fn model(&self) -> Option<&dyn Model> {
        self.model.as_deref()
    }

    /// Borrow the model as a concrete type.
    #[must_use]
    pub fn downcast_ref<M: Model + 'static>(&self) -> Option<&M> {
        self.model()?.as_any().downcast_ref::<M>()
    }

    /// Free the model now. Returns `false` if there was nothing to free.
    ///
    /// Releasing twice is harmless.
    pub fn release(&mut self) -> bool {
        match self.model.take() {
            Some(model) => {
                tracing::debug!(model = self.descriptor, "releasing model handle");
                drop(model);
                self.state = HandleState::Released;
                true
            }
            None => false,
        }
    }

    /// Serialize the model, or `None` if the handle holds none.
    ///
    /// # Errors
    ///
    /// Propagates the model's serialization error.
    pub fn to_json(&self) -> BindResult<Option<String>> {
        self.model
            .as_ref()
            .map(|m| m.to_json())
            .transpose()
            .map_err(BindError::from)
    }

    /// Export the model to foreign code; absent and released handles
    /// export null. Free the pointer with `mlbind_model_free` or
    /// [`ModelHandle::from_raw`].
    #[must_use]
    pub fn into_raw(mut self) -> *mut RawModel {
        match self.model.take() {
            Some(m) => model::into_raw(m),
            None => std::ptr::null_mut(),
        }
    }

    /// Reclaim a model exported with [`ModelHandle::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an unreleased pointer from `into_raw`.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut RawModel, descriptor: &'static str) -> Self {
        match model::from_raw(ptr) {
            Some(m) => Self::new(m),
            None => Self::absent(descriptor),
        }
    }

    /// Hand the model to the core for one dispatch.
    pub(crate) fn lend(&mut self) -> Option<Box<dyn Model>> {
        let model = self.model.take()?;
        self.state = HandleState::OwnedByCore;
        Some(model)
    }

    /// Take the model back after a dispatch.
    pub(crate) fn reclaim(&mut self, model: Box<dyn Model>) {
        self.model = Some(model);
        self.state = HandleState::OwnedByCaller;
    }

    /// The core did not hand the model back.
    pub(crate) fn forfeit(&mut self) {
        tracing::warn!(model = self.descriptor, "native core kept a lent model");
        self.state = HandleState::Released;
    }
}

impl Clone for ModelHandle {
    fn clone(&self) -> Self {
        let model = self.model.as_ref().map(|m| m.clone_model());
        let state = match (&model, self.state) {
            (Some(_), _) => HandleState::OwnedByCaller,
            (None, HandleState::Released) => HandleState::Released,
            (None, _) => HandleState::Absent,
        };
        Self {
            descriptor: self.descriptor,
            state,
            model,
        }
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        if let Some(model) = self.model.take() {
            tracing::trace!(model = model.descriptor(), "model handle dropped");
        }
    }
}
