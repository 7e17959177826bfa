//! Running a binding against a [`Params`] container.
//!
//! A dispatch goes through four phases:
//!
//! 1. **Lend**: model inputs are moved out of `Params` and into a fresh
//!    native store.
//! 2. **Marshal in**: every other declared input is converted, with schema
//!    defaults standing in for unset keys. Column-major arrays are borrowed
//!    from `Params` for the duration of the call.
//! 3. **Execute**: the binding runs synchronously.
//! 4. **Marshal out**: every declared output is converted into a fresh
//!    host value, lent models are reclaimed, and the results are written
//!    back into `Params`.
//!
//! Lent models are handed back even when a later phase fails.

use crate::config::BindingConfig;
use crate::marshal::{self, model::{HandleState, ModelHandle}};
use crate::params::Params;
use crate::value::Value;
use crate::{BindError, BindResult};
use mlbind_core::{Binding, NativeStore, NativeValue, ParamSpec, ParamType};
use rustc_hash::FxHashMap;
use std::time::Instant;

/// Runs bindings with a fixed configuration.
#[derive(Clone, Debug, Default)]
pub struct Dispatcher {
    config: BindingConfig,
}

/// A model input moved out of `Params` for one dispatch.
struct Lent {
    key: &'static str,
    handle: ModelHandle,
}

impl Dispatcher {
    /// A dispatcher with the given configuration.
    #[must_use]
    pub fn new(config: BindingConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Marshal inputs, run `binding`, and marshal every declared output back
    /// into `params`.
    ///
    /// # Errors
    ///
    /// Any marshalling error, [`BindError::BindingMismatch`] if `params`
    /// belong to another binding, [`BindError::HandleReleased`] for a
    /// released model input, and whatever the binding itself reports.
    /// On error no output is written and model inputs are left in place.
    pub fn run(&self, binding: &dyn Binding, params: &mut Params) -> BindResult<()> {
        if params.binding() != binding.name() {
            return Err(BindError::BindingMismatch {
                expected: binding.name().to_string(),
                found: params.binding().to_string(),
            });
        }

        let span = tracing::debug_span!("dispatch", binding = binding.name());
        let _enter = span.enter();
        let started = Instant::now();

        let mut lent = lend_models(binding, params)?;
        let result = self.execute(binding, params, &mut lent);
        for Lent { key, handle } in lent {
            params.put(key, handle)?;
        }
        let outputs = result?;

        let produced = outputs.len();
        for (key, value) in outputs {
            params.put(key, value)?;
        }

        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        if self.config.verbose {
            tracing::info!(
                binding = binding.name(),
                outputs = produced,
                elapsed_us,
                "dispatch complete"
            );
        } else {
            tracing::debug!(outputs = produced, elapsed_us, "dispatch complete");
        }
        Ok(())
    }

    fn execute(
        &self,
        binding: &dyn Binding,
        params: &Params,
        lent: &mut [Lent],
    ) -> BindResult<Vec<(&'static str, Value)>> {
        let schema = binding.schema();

        let mut defaults: FxHashMap<&'static str, Value> = FxHashMap::default();
        for spec in schema.inputs() {
            if params.stored(spec.name)?.is_none() && !is_model(spec) {
                if spec.required {
                    tracing::warn!(
                        binding = binding.name(),
                        param = spec.name,
                        "required input not set; using its default"
                    );
                }
                defaults.insert(spec.name, Value::default_for(spec));
            }
        }

        let mut store = NativeStore::new();
        for entry in lent.iter_mut() {
            if let Some(model) = entry.handle.lend() {
                store.set(entry.key, NativeValue::Model(model));
            }
        }

        let result = self.marshal_and_run(binding, params, &defaults, &mut store);

        for entry in lent.iter_mut() {
            if entry.handle.state() == HandleState::OwnedByCore {
                match store.take(entry.key) {
                    Some(NativeValue::Model(model)) => entry.handle.reclaim(model),
                    _ => entry.handle.forfeit(),
                }
            }
        }
        result
    }

    fn marshal_and_run<'a>(
        &self,
        binding: &dyn Binding,
        params: &'a Params,
        defaults: &'a FxHashMap<&'static str, Value>,
        store: &mut NativeStore<'a>,
    ) -> BindResult<Vec<(&'static str, Value)>> {
        let schema = binding.schema();

        for spec in schema.inputs() {
            let value = match params.stored(spec.name)? {
                Some(value) => value,
                None => match defaults.get(spec.name) {
                    Some(value) => value,
                    None => continue,
                },
            };
            if let Some(native) = marshal::input(spec, value, &self.config)? {
                store.set(spec.name, native);
            }
        }

        binding.execute(store)?;

        let mut outputs = Vec::with_capacity(schema.outputs().count());
        for spec in schema.outputs() {
            let value = match store.take(spec.name) {
                Some(native) => marshal::output(spec, native, &self.config)?,
                None => Value::default_for(spec),
            };
            outputs.push((spec.name, value));
        }
        Ok(outputs)
    }
}

fn is_model(spec: &ParamSpec) -> bool {
    matches!(spec.ty, ParamType::Model(_))
}

/// Move every set model input out of `params`, validating it first.
fn lend_models(binding: &dyn Binding, params: &mut Params) -> BindResult<Vec<Lent>> {
    let specs: Vec<&ParamSpec> = binding.schema().inputs().filter(|s| is_model(s)).collect();

    for spec in &specs {
        match params.stored(spec.name)? {
            None => {}
            Some(Value::Model(handle)) => {
                if handle.is_released() {
                    return Err(BindError::HandleReleased {
                        key: spec.name.to_string(),
                    });
                }
                if !handle.is_absent() && ParamType::Model(handle.descriptor()) != spec.ty {
                    return Err(BindError::TypeMismatch {
                        key: spec.name.to_string(),
                        expected: spec.ty.to_string(),
                        found: format!("Model<{}>", handle.descriptor()),
                    });
                }
            }
            Some(other) => {
                return Err(BindError::TypeMismatch {
                    key: spec.name.to_string(),
                    expected: spec.ty.to_string(),
                    found: other.value_type().to_string(),
                });
            }
        }
    }

    let mut lent = Vec::new();
    for spec in specs {
        if params.is_set(spec.name)? {
            let handle = params.take::<ModelHandle>(spec.name)?;
            lent.push(Lent {
                key: spec.name,
                handle,
            });
        }
    }
    Ok(lent)
}

/// Run `binding` with the default configuration.
///
/// # Errors
///
/// As for [`Dispatcher::run`].
pub fn run(binding: &dyn Binding, params: &mut Params) -> BindResult<()> {
    Dispatcher::default().run(binding, params)
}
