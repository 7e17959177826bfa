//! Host-to-native and native-to-host conversion.
//!
//! Each declared parameter type has exactly one path in each direction:
//!
//! | Declared type     | In                          | Out                        |
//! |-------------------|-----------------------------|----------------------------|
//! | scalars, strings  | copy                        | copy                       |
//! | sequences         | [`sequence`]                | [`sequence`]               |
//! | matrices          | [`matrix`]                  | [`matrix`]                 |
//! | vectors           | [`vector`]                  | [`vector`]                 |
//! | matrix with info  | [`matrix`] + flag copy      | [`matrix`] + flag copy     |
//! | models            | lent by the dispatcher      | [`model`] handle           |

pub mod matrix;
pub mod model;
pub mod sequence;
pub mod vector;

use crate::config::BindingConfig;
use crate::value::{AnyArray, MatrixWithInfo, Value};
use crate::{BindError, BindResult};
use mlbind_core::{NativeMatrix, NativeValue, ParamSpec, ParamType};
use mlbind_ffi::ElemKind;
use model::ModelHandle;

fn mismatch(spec: &ParamSpec, found: impl ToString) -> BindError {
    BindError::TypeMismatch {
        key: spec.name.to_string(),
        expected: spec.ty.to_string(),
        found: found.to_string(),
    }
}

/// Marshal one input value.
///
/// Model inputs are not marshalled here; the dispatcher lends them to the
/// store directly and this returns `Ok(None)` for them.
///
/// # Errors
///
/// Type mismatches against the declared type, plus any layout or shape
/// error from the array paths.
pub fn input<'a>(
    spec: &ParamSpec,
    value: &'a Value,
    config: &BindingConfig,
) -> BindResult<Option<NativeValue<'a>>> {
    let key = spec.name;
    let native = match (spec.ty, value) {
        (ParamType::Int, Value::Int(v)) => NativeValue::Int(*v),
        (ParamType::Double, Value::Double(v)) => NativeValue::Double(*v),
        (ParamType::Double, Value::Int(v)) => NativeValue::Double(f64::from(*v)),
        (ParamType::Bool, Value::Bool(v)) => NativeValue::Bool(*v),
        (ParamType::String, Value::String(s)) => NativeValue::String(s.clone()),
        (ParamType::IntSeq, Value::IntSeq(v)) => NativeValue::IntVec(sequence::to_native(key, v)),
        (ParamType::StringSeq, Value::StringSeq(v)) => {
            NativeValue::StringVec(sequence::to_native(key, v))
        }
        (ParamType::Matrix(kind), Value::Matrix(a) | Value::Vector(a)) if a.kind() == kind => {
            let m = match a {
                AnyArray::F64(a) => NativeMatrix::F64(matrix::to_native(key, a, config)?),
                AnyArray::U64(a) => NativeMatrix::U64(matrix::to_native(key, a, config)?),
            };
            NativeValue::Matrix(m)
        }
        (ParamType::Vector(kind, orientation), Value::Vector(a) | Value::Matrix(a))
            if a.kind() == kind =>
        {
            let m = match a {
                AnyArray::F64(a) => {
                    NativeMatrix::F64(vector::to_native(key, a, orientation, config)?)
                }
                AnyArray::U64(a) => {
                    NativeMatrix::U64(vector::to_native(key, a, orientation, config)?)
                }
            };
            NativeValue::Matrix(m)
        }
        (ParamType::MatrixWithInfo, Value::MatrixWithInfo(m)) => {
            let rows = m.matrix.dims2().0;
            if m.info.len() != rows {
                return Err(BindError::ShapeMismatch {
                    key: key.to_string(),
                    expected: format!("{rows} info flags"),
                    found: format!("{} info flags", m.info.len()),
                });
            }
            NativeValue::MatrixWithInfo {
                info: m.info.clone(),
                matrix: matrix::to_native(key, &m.matrix, config)?,
            }
        }
        (ParamType::Model(_), _) => return Ok(None),
        (_, other) => return Err(mismatch(spec, other.value_type())),
    };
    Ok(Some(native))
}

fn check_kind(spec: &ParamSpec, declared: ElemKind, found: &NativeMatrix<'_>) -> BindResult<()> {
    if found.kind() == declared {
        Ok(())
    } else {
        Err(mismatch(spec, found_name(found)))
    }
}

fn found_name(m: &NativeMatrix<'_>) -> &'static str {
    match m {
        NativeMatrix::F64(_) => "mat",
        NativeMatrix::U64(_) => "umat",
    }
}

/// Marshal one output value produced by the core.
///
/// # Errors
///
/// Type mismatches between the declared type and what the core produced,
/// plus shape errors from the vector path.
pub fn output(spec: &ParamSpec, native: NativeValue<'_>, config: &BindingConfig) -> BindResult<Value> {
    let key = spec.name;
    let value = match (spec.ty, native) {
        (ParamType::Int, NativeValue::Int(v)) => Value::Int(v),
        (ParamType::Double, NativeValue::Double(v)) => Value::Double(v),
        (ParamType::Bool, NativeValue::Bool(v)) => Value::Bool(v),
        (ParamType::String, NativeValue::String(s)) => Value::String(s),
        (ParamType::IntSeq, NativeValue::IntVec(v)) => Value::IntSeq(sequence::from_native(key, v)),
        (ParamType::StringSeq, NativeValue::StringVec(v)) => {
            Value::StringSeq(sequence::from_native(key, v))
        }
        (ParamType::Matrix(kind), NativeValue::Matrix(m)) => {
            check_kind(spec, kind, &m)?;
            Value::Matrix(match m {
                NativeMatrix::F64(m) => AnyArray::F64(matrix::from_native(key, m, config)?),
                NativeMatrix::U64(m) => AnyArray::U64(matrix::from_native(key, m, config)?),
            })
        }
        (ParamType::Vector(kind, orientation), NativeValue::Matrix(m)) => {
            check_kind(spec, kind, &m)?;
            Value::Vector(match m {
                NativeMatrix::F64(m) => {
                    AnyArray::F64(vector::from_native(key, m, orientation, config)?)
                }
                NativeMatrix::U64(m) => {
                    AnyArray::U64(vector::from_native(key, m, orientation, config)?)
                }
            })
        }
        (ParamType::MatrixWithInfo, NativeValue::MatrixWithInfo { info, matrix: m }) => {
            Value::MatrixWithInfo(MatrixWithInfo::new(info, matrix::from_native(key, m, config)?))
        }
        (ParamType::Model(descriptor), NativeValue::Model(m)) => {
            if m.descriptor() != descriptor {
                return Err(mismatch(spec, format!("Model<{}>", m.descriptor())));
            }
            Value::Model(ModelHandle::new(m))
        }
        (_, other) => return Err(mismatch(spec, other.type_name())),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlbind_core::{DefaultValue, Direction, GaussianKernel};
    use mlbind_ffi::{ColMatrix, Orientation};
    use mlbind_host::{HostArray, Order};

    fn spec(name: &'static str, ty: ParamType) -> ParamSpec {
        ParamSpec {
            name,
            ty,
            direction: Direction::Input,
            required: false,
            default: DefaultValue::zero_for(ty),
            description: "",
        }
    }

    #[test]
    fn test_scalar_type_mismatch() {
        let err = input(&spec("int_in", ParamType::Int), &Value::Double(1.0), &BindingConfig::default())
            .unwrap_err();
        match err {
            BindError::TypeMismatch { key, expected, found } => {
                assert_eq!(key, "int_in");
                assert_eq!(expected, "Int");
                assert_eq!(found, "Double");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_int_widens_to_double() {
        let native = input(&spec("d", ParamType::Double), &Value::Int(4), &BindingConfig::default())
            .unwrap()
            .unwrap();
        assert!(matches!(native, NativeValue::Double(v) if v == 4.0));
    }

    #[test]
    fn test_element_kind_is_checked() {
        let v = Value::from(HostArray::<u64>::from_vec(vec![1, 2], &[1, 2], Order::RowMajor).unwrap());
        let err = input(
            &spec("m", ParamType::Matrix(ElemKind::F64)),
            &v,
            &BindingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { .. }));
    }

    #[test]
    fn test_info_length_is_checked() {
        let m = HostArray::<f64>::from_fn(3, 2, Order::ColMajor, |r, c| (r + c) as f64).unwrap();
        let v = Value::MatrixWithInfo(MatrixWithInfo::new(vec![false, true], m));
        let err = input(&spec("mi", ParamType::MatrixWithInfo), &v, &BindingConfig::default())
            .unwrap_err();
        assert!(matches!(err, BindError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_models_are_skipped_inbound() {
        let v = Value::Model(ModelHandle::absent(GaussianKernel::DESCRIPTOR));
        let out = input(
            &spec("model_in", ParamType::Model(GaussianKernel::DESCRIPTOR)),
            &v,
            &BindingConfig::default(),
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_output_kind_is_checked() {
        let native = NativeValue::Matrix(NativeMatrix::F64(ColMatrix::zeros(1, 1).unwrap()));
        let err = output(
            &spec("urow_out", ParamType::Vector(ElemKind::U64, Orientation::Row)),
            native,
            &BindingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { ref found, .. } if found == "mat"));
    }

    #[test]
    fn test_model_output_becomes_owned_handle() {
        let native = NativeValue::Model(Box::new(GaussianKernel::new(3.0)));
        let v = output(
            &spec("model_out", ParamType::Model(GaussianKernel::DESCRIPTOR)),
            native,
            &BindingConfig::default(),
        )
        .unwrap();
        match v {
            Value::Model(h) => {
                assert_eq!(h.downcast_ref::<GaussianKernel>().unwrap().bandwidth(), 3.0);
            }
            other => panic!("expected a model, got {:?}", other.value_type()),
        }
    }
}
