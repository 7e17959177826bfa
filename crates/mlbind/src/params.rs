//! The host parameter container.

use crate::value::{FromValue, Value, ValueType};
use crate::{BindError, BindResult};
use indexmap::IndexMap;
use mlbind_core::{Binding, ParamSpec, Schema};

/// Name-keyed parameter values for one binding.
///
/// The key set is fixed at construction: every parameter the schema
/// declares is present, initially unset, in declaration order.
#[derive(Clone, Debug)]
pub struct Params {
    schema: Schema,
    values: IndexMap<String, Option<Value>>,
}

impl Params {
    /// Parameters for every key `schema` declares, all unset.
    #[must_use]
    pub fn new(schema: &Schema) -> Self {
        let values = schema.iter().map(|p| (p.name.to_string(), None)).collect();
        Self {
            schema: schema.clone(),
            values,
        }
    }

    /// Parameters for a binding's schema.
    #[must_use]
    pub fn for_binding(binding: &dyn Binding) -> Self {
        Self::new(binding.schema())
    }

    /// Name of the binding these parameters belong to.
    #[inline]
    #[must_use]
    pub fn binding(&self) -> &'static str {
        self.schema.binding()
    }

    /// The schema these parameters follow.
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Declaration of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownParameter`] for undeclared keys.
    pub fn spec(&self, key: &str) -> BindResult<&ParamSpec> {
        self.schema.get(key).ok_or_else(|| BindError::UnknownParameter {
            binding: self.binding().to_string(),
            key: key.to_string(),
        })
    }

    fn slot_mut(&mut self, key: &str) -> BindResult<&mut Option<Value>> {
        self.spec(key)?;
        let binding = self.binding();
        self.values
            .get_mut(key)
            .ok_or_else(|| BindError::UnknownParameter {
                binding: binding.to_string(),
                key: key.to_string(),
            })
    }

    /// Store `value` under `key`, replacing any previous value and type.
    ///
    /// The value is not checked against the declared type here; that
    /// happens on [`Params::get`] and at dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownParameter`] for undeclared keys.
    pub fn put(&mut self, key: &str, value: impl Into<Value>) -> BindResult<&mut Self> {
        *self.slot_mut(key)? = Some(value.into());
        Ok(self)
    }

    /// Clear `key`, so that reads see its default again.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownParameter`] for undeclared keys.
    pub fn unset(&mut self, key: &str) -> BindResult<Option<Value>> {
        Ok(self.slot_mut(key)?.take())
    }

    /// Read `key` as `T`; unset keys read as their schema default.
    ///
    /// Model handles are deep-copied.
    ///
    /// # Errors
    ///
    /// [`BindError::UnknownParameter`] for undeclared keys, and
    /// [`BindError::TypeMismatch`] if the value is not losslessly
    /// convertible to `T`.
    pub fn get<T: FromValue>(&self, key: &str) -> BindResult<T> {
        let spec = self.spec(key)?;
        match self.values.get(key).and_then(Option::as_ref) {
            Some(value) => T::from_value(value).ok_or_else(|| mismatch::<T>(key, value)),
            None => T::from_owned(Value::default_for(spec)).map_err(|v| mismatch::<T>(key, &v)),
        }
    }

    /// Move `key` out as `T`, leaving it unset; unset keys yield their
    /// default.
    ///
    /// On a type mismatch the stored value is left in place.
    ///
    /// # Errors
    ///
    /// As for [`Params::get`].
    pub fn take<T: FromValue>(&mut self, key: &str) -> BindResult<T> {
        let default = Value::default_for(self.spec(key)?);
        let slot = self.slot_mut(key)?;
        match slot.take() {
            Some(value) => T::from_owned(value).map_err(|v| {
                let err = mismatch::<T>(key, &v);
                *slot = Some(v);
                err
            }),
            None => T::from_owned(default).map_err(|v| mismatch::<T>(key, &v)),
        }
    }

    /// Whether `key` holds an explicitly stored value.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownParameter`] for undeclared keys.
    pub fn is_set(&self, key: &str) -> BindResult<bool> {
        Ok(self.stored(key)?.is_some())
    }

    /// Tag of the stored value, or `None` if unset.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownParameter`] for undeclared keys.
    pub fn value_type(&self, key: &str) -> BindResult<Option<ValueType>> {
        Ok(self.stored(key)?.map(Value::value_type))
    }

    /// The stored value without default substitution.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownParameter`] for undeclared keys.
    pub fn stored(&self, key: &str) -> BindResult<Option<&Value>> {
        self.spec(key)?;
        Ok(self.values.get(key).and_then(Option::as_ref))
    }

    /// Every declared key with its stored value, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Number of declared keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the schema declares no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn mismatch<T: FromValue>(key: &str, found: &Value) -> BindError {
    BindError::TypeMismatch {
        key: key.to_string(),
        expected: T::EXPECTED.to_string(),
        found: found.value_type().to_string(),
    }
}
