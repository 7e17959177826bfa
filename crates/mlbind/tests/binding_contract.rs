//! Binding contract tests
//!
//! End-to-end dispatches of the reference binding through `Params`:
//!
//! 1. Scalars are accepted only with the exact inputs and `flag1` set
//! 2. Matrices of both element kinds round-trip from either layout
//! 3. Vectors and sequences keep order, kind, and orientation rules
//! 4. Views round-trip when consistent and fail closed when relabelled
//! 5. Models move in and out without sharing state

use mlbind::{
    run, BindError, BindingConfig, Dispatcher, HandleState, HostArray, MatrixWithInfo,
    ModelHandle, Order, Params, ViewPolicy,
};
use mlbind_core::{Binding, GaussianKernel, ReferenceBinding};

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Params with the scalar inputs the reference binding accepts.
fn accepted(binding: &ReferenceBinding) -> Params {
    init_tracing();
    let mut params = Params::for_binding(binding);
    params
        .put("int_in", 12)
        .unwrap()
        .put("double_in", 4.0)
        .unwrap()
        .put("string_in", "hello")
        .unwrap()
        .put("flag1", true)
        .unwrap();
    params
}

fn scalars(params: &Params) -> (String, i32, f64) {
    (
        params.get("string_out").unwrap(),
        params.get("int_out").unwrap(),
        params.get("double_out").unwrap(),
    )
}

fn counting(rows: usize, cols: usize, order: Order) -> HostArray<f64> {
    HostArray::from_fn(rows, cols, order, |r, c| (r * cols + c) as f64 * 0.5).unwrap()
}

/// The 5x5 grid 1..=25 laid out in `order`.
fn grid25(order: Order) -> HostArray<f64> {
    let data: Vec<f64> = (1..=25i32).map(f64::from).collect();
    HostArray::from_vec(data, &[5, 5], order).unwrap()
}

// ============================================================================
// Scalars
// ============================================================================

mod scalar_tests {
    use super::*;

    #[test]
    fn test_run_correctly() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        run(&binding, &mut params).unwrap();
        assert_eq!(scalars(&params), ("hello2".to_string(), 13, 5.0));
    }

    #[test]
    fn test_forgot_flag() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.unset("flag1").unwrap();
        run(&binding, &mut params).unwrap();
        let (s, i, d) = scalars(&params);
        assert_ne!(s, "hello2");
        assert_ne!(i, 13);
        assert!((d - 5.0).abs() > 1e-4);
    }

    #[test]
    fn test_wrong_string() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("string_in", "goodbye").unwrap();
        run(&binding, &mut params).unwrap();
        assert_ne!(params.get::<String>("string_out").unwrap(), "hello2");
    }

    #[test]
    fn test_wrong_int() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("int_in", 15).unwrap();
        run(&binding, &mut params).unwrap();
        assert_ne!(params.get::<i32>("int_out").unwrap(), 13);
    }

    #[test]
    fn test_wrong_double() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("double_in", 10.0).unwrap();
        run(&binding, &mut params).unwrap();
        assert!((params.get::<f64>("double_out").unwrap() - 5.0).abs() > 1e-4);
    }

    #[test]
    fn test_wrong_flag() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("flag2", true).unwrap();
        run(&binding, &mut params).unwrap();
        let (s, i, d) = scalars(&params);
        assert_ne!(s, "hello2");
        assert_ne!(i, 13);
        assert!((d - 5.0).abs() > 1e-4);
    }

    #[test]
    fn test_omitted_equals_explicit_default() {
        let binding = ReferenceBinding::new();
        let mut omitted = accepted(&binding);
        let mut explicit = accepted(&binding);
        explicit
            .put("flag2", false)
            .unwrap()
            .put("build_model", false)
            .unwrap()
            .put("vector_in", Vec::<i32>::new())
            .unwrap();
        run(&binding, &mut omitted).unwrap();
        run(&binding, &mut explicit).unwrap();
        assert_eq!(scalars(&omitted), scalars(&explicit));
        assert_eq!(
            omitted.get::<Vec<i32>>("vector_out").unwrap(),
            explicit.get::<Vec<i32>>("vector_out").unwrap()
        );
    }

    #[test]
    fn test_int_accepted_for_double() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("double_in", 4).unwrap();
        run(&binding, &mut params).unwrap();
        assert_eq!(params.get::<f64>("double_out").unwrap(), 5.0);
    }
}

// ============================================================================
// Matrices
// ============================================================================

mod matrix_tests {
    use super::*;

    fn check_shed(input: &HostArray<f64>, out: &HostArray<f64>) {
        let (rows, cols) = input.dims2();
        assert_eq!(out.dims(), &[rows, cols - 1]);
        assert_eq!(out.order(), Order::ColMajor);
        for r in 0..rows {
            for c in 0..cols - 1 {
                let scale = if c == 2 { 2.0 } else { 1.0 };
                assert_eq!(out.get2(r, c), input.get2(r, c).map(|v| v * scale));
            }
        }
    }

    #[test]
    fn test_matrix_row_major() {
        let binding = ReferenceBinding::new();
        let input = counting(100, 5, Order::RowMajor);
        let mut params = accepted(&binding);
        params.put("matrix_in", input.clone()).unwrap();
        run(&binding, &mut params).unwrap();
        check_shed(&input, &params.get("matrix_out").unwrap());
    }

    #[test]
    fn test_matrix_col_major() {
        let binding = ReferenceBinding::new();
        let input = counting(100, 5, Order::ColMajor);
        let mut params = accepted(&binding);
        params.put("matrix_in", input.clone()).unwrap();
        run(&binding, &mut params).unwrap();
        let out: HostArray<f64> = params.get("matrix_out").unwrap();
        check_shed(&input, &out);
        assert!(!out.shares_storage(&input));
    }

    #[test]
    fn test_input_left_untouched() {
        let binding = ReferenceBinding::new();
        let input = counting(10, 4, Order::ColMajor);
        let before = input.to_vec();
        let mut params = accepted(&binding);
        params.put("matrix_in", input.clone()).unwrap();
        run(&binding, &mut params).unwrap();
        assert_eq!(params.get::<HostArray<f64>>("matrix_in").unwrap().to_vec(), before);
    }

    #[test]
    fn test_umatrix_both_layouts() {
        let binding = ReferenceBinding::new();
        for order in [Order::RowMajor, Order::ColMajor] {
            let data: Vec<u64> = (1..=25).collect();
            let input = HostArray::from_vec(data, &[5, 5], order).unwrap();
            let mut params = accepted(&binding);
            params.put("umatrix_in", input.clone()).unwrap();
            run(&binding, &mut params).unwrap();
            let out: HostArray<u64> = params.get("umatrix_out").unwrap();
            assert_eq!(out.dims(), &[5, 4]);
            for r in 0..5 {
                for c in 0..4 {
                    let scale = if c == 2 { 2 } else { 1 };
                    assert_eq!(out.get2(r, c), input.get2(r, c).map(|v| v * scale));
                }
            }
        }
    }

    #[test]
    fn test_umatrix_is_exact() {
        let binding = ReferenceBinding::new();
        let big = (1u64 << 60) + 1;
        let input = HostArray::from_vec(vec![big; 6], &[2, 3], Order::RowMajor).unwrap();
        let mut params = accepted(&binding);
        params.put("umatrix_in", input).unwrap();
        run(&binding, &mut params).unwrap();
        let out: HostArray<u64> = params.get("umatrix_out").unwrap();
        assert_eq!(out.to_vec(), vec![big; 4]);
    }

    #[test]
    fn test_one_dimensional_matrix_is_a_column() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("matrix_in", HostArray::vector(vec![1.0, 2.0, 3.0])).unwrap();
        run(&binding, &mut params).unwrap();
        let out: HostArray<f64> = params.get("matrix_out").unwrap();
        assert_eq!(out.dims(), &[3, 0]);
    }

    #[test]
    fn test_matrix_and_info() {
        let binding = ReferenceBinding::new();
        let matrix = counting(100, 10, Order::RowMajor);
        let mut params = accepted(&binding);
        params
            .put("matrix_and_info_in", MatrixWithInfo::numeric(matrix.clone()))
            .unwrap();
        run(&binding, &mut params).unwrap();
        let out: HostArray<f64> = params.get("matrix_and_info_out").unwrap();
        assert_eq!(out.dims(), matrix.dims());
        for r in 0..100 {
            for c in 0..10 {
                assert_eq!(out.get2(r, c), matrix.get2(r, c).map(|v| v * 2.0));
            }
        }
    }

    #[test]
    fn test_categorical_rows_pass_through() {
        let binding = ReferenceBinding::new();
        let matrix = counting(3, 2, Order::ColMajor);
        let mut params = accepted(&binding);
        params
            .put(
                "matrix_and_info_in",
                MatrixWithInfo::new(vec![false, true, false], matrix.clone()),
            )
            .unwrap();
        run(&binding, &mut params).unwrap();
        let out: HostArray<f64> = params.get("matrix_and_info_out").unwrap();
        assert_eq!(out.get2(1, 1), matrix.get2(1, 1));
        assert_eq!(out.get2(2, 1), matrix.get2(2, 1).map(|v| v * 2.0));
    }

    #[test]
    fn test_info_length_mismatch() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params
            .put(
                "matrix_and_info_in",
                MatrixWithInfo::new(vec![false; 4], counting(3, 2, Order::RowMajor)),
            )
            .unwrap();
        let err = run(&binding, &mut params).unwrap_err();
        assert!(matches!(err, BindError::ShapeMismatch { ref key, .. } if key == "matrix_and_info_in"));
    }
}

// ============================================================================
// Vectors and sequences
// ============================================================================

mod vector_tests {
    use super::*;

    #[test]
    fn test_col_and_row() {
        let binding = ReferenceBinding::new();
        let data: Vec<f64> = (0..100i32).map(|i| f64::from(i) * 1.5).collect();
        for (input, output) in [("col_in", "col_out"), ("row_in", "row_out")] {
            let mut params = accepted(&binding);
            params.put(input, HostArray::vector(data.clone())).unwrap();
            run(&binding, &mut params).unwrap();
            let out: HostArray<f64> = params.get(output).unwrap();
            assert_eq!(out.rank(), 1);
            let doubled: Vec<f64> = data.iter().map(|v| v * 2.0).collect();
            assert_eq!(out.to_vec(), doubled);
        }
    }

    #[test]
    fn test_ucol_and_urow() {
        let binding = ReferenceBinding::new();
        let data: Vec<u64> = (0..100).collect();
        for (input, output) in [("ucol_in", "ucol_out"), ("urow_in", "urow_out")] {
            let mut params = accepted(&binding);
            params.put(input, HostArray::vector(data.clone())).unwrap();
            run(&binding, &mut params).unwrap();
            let out: HostArray<u64> = params.get(output).unwrap();
            let doubled: Vec<u64> = data.iter().map(|v| v * 2).collect();
            assert_eq!(out.to_vec(), doubled);
        }
    }

    #[test]
    fn test_shaped_row_accepted() {
        let binding = ReferenceBinding::new();
        let row = HostArray::<f64>::from_fn(1, 4, Order::RowMajor, |_, c| c as f64).unwrap();
        let mut params = accepted(&binding);
        params.put("row_in", row).unwrap();
        run(&binding, &mut params).unwrap();
        let out: HostArray<f64> = params.get("row_out").unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_wrong_orientation() {
        let binding = ReferenceBinding::new();
        let column = HostArray::<f64>::from_fn(4, 1, Order::ColMajor, |r, _| r as f64).unwrap();
        let mut params = accepted(&binding);
        params.put("row_in", column).unwrap();
        let err = run(&binding, &mut params).unwrap_err();
        assert!(matches!(err, BindError::ShapeMismatch { ref key, .. } if key == "row_in"));
    }

    #[test]
    fn test_int_sequence() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("vector_in", vec![1, 2, 3, 4, 5]).unwrap();
        run(&binding, &mut params).unwrap();
        assert_eq!(params.get::<Vec<i32>>("vector_out").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_string_sequence() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params
            .put("str_vector_in", vec!["one", "two", "three", "four", "five"])
            .unwrap();
        run(&binding, &mut params).unwrap();
        assert_eq!(
            params.get::<Vec<String>>("str_vector_out").unwrap(),
            vec!["one", "two", "three", "four"]
        );
    }
}

// ============================================================================
// Views and declared order
// ============================================================================

mod view_tests {
    use super::*;

    #[test]
    fn test_row_view_both_backings() {
        let binding = ReferenceBinding::new();
        for order in [Order::RowMajor, Order::ColMajor] {
            let matrix = grid25(order);
            let view = matrix.row(0).unwrap();
            let mut params = accepted(&binding);
            params.put("row_view_in", view).unwrap();
            run(&binding, &mut params).unwrap();
            let out: HostArray<f64> = params.get("row_view_out").unwrap();
            assert_eq!(out.to_vec(), matrix.row(0).unwrap().to_vec(), "{order} backing");
        }
    }

    #[test]
    fn test_col_view_both_backings() {
        let binding = ReferenceBinding::new();
        for order in [Order::RowMajor, Order::ColMajor] {
            let matrix = grid25(order);
            let mut params = accepted(&binding);
            params.put("col_view_in", matrix.col(3).unwrap()).unwrap();
            run(&binding, &mut params).unwrap();
            let out: HostArray<f64> = params.get("col_view_out").unwrap();
            assert_eq!(out.to_vec(), matrix.col(3).unwrap().to_vec(), "{order} backing");
            assert!(!out.shares_storage(&matrix));
        }
    }

    #[test]
    fn test_relabelled_view_fails_closed() {
        let binding = ReferenceBinding::new();
        let matrix = grid25(Order::ColMajor);
        let mut view = matrix.row(0).unwrap();
        view.set_order(Order::RowMajor);
        let mut params = accepted(&binding);
        params.put("row_view_in", view).unwrap();
        let err = run(&binding, &mut params).unwrap_err();
        assert!(matches!(err, BindError::LayoutViolation { ref key, .. } if key == "row_view_in"));
        assert!(!params.is_set("row_view_out").unwrap());
    }

    #[test]
    fn test_gather_policy_reads_strides() {
        let binding = ReferenceBinding::new();
        let matrix = grid25(Order::ColMajor);
        let mut view = matrix.row(0).unwrap();
        view.set_order(Order::RowMajor);
        let mut params = accepted(&binding);
        params.put("row_view_in", view).unwrap();
        let config = BindingConfig {
            view_policy: ViewPolicy::Gather,
            ..BindingConfig::default()
        };
        Dispatcher::new(config).run(&binding, &mut params).unwrap();
        let out: HostArray<f64> = params.get("row_view_out").unwrap();
        assert_eq!(out.to_vec(), vec![1.0, 6.0, 11.0, 16.0, 21.0]);
    }

    #[test]
    fn test_relabelled_matrix_fails_closed() {
        let binding = ReferenceBinding::new();
        let data: Vec<u64> = (0..25).collect();
        let mut matrix = HostArray::from_vec(data, &[5, 5], Order::RowMajor).unwrap();
        assert_eq!(matrix.order().as_char(), 'c');
        matrix.set_order(Order::ColMajor);
        assert_eq!(matrix.order().as_char(), 'f');
        let mut params = accepted(&binding);
        params.put("umatrix_order_in", matrix).unwrap();
        let err = run(&binding, &mut params).unwrap_err();
        assert!(matches!(err, BindError::LayoutViolation { ref key, .. } if key == "umatrix_order_in"));
    }

    #[test]
    fn test_order_round_trip_and_drop() {
        let binding = ReferenceBinding::new();
        let data: Vec<u64> = (0..100).collect();
        let matrix = HostArray::from_vec(data, &[10, 10], Order::RowMajor).unwrap();
        let mut params = accepted(&binding);
        params.put("umatrix_order_in", matrix.clone()).unwrap();
        run(&binding, &mut params).unwrap();
        let result: HostArray<u64> = params.get("umatrix_order_out").unwrap();
        assert_eq!(result, matrix);
        assert!(!result.shares_storage(&matrix));
        drop(params);
        drop(result);
        assert_eq!(matrix.storage_refs(), 1);
    }
}

// ============================================================================
// Models
// ============================================================================

mod model_tests {
    use super::*;

    fn model_address(h: &ModelHandle) -> usize {
        h.model()
            .map_or(0, |m| std::ptr::addr_of!(*m).cast::<u8>() as usize)
    }

    #[test]
    fn test_build_then_consume() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("build_model", true).unwrap();
        run(&binding, &mut params).unwrap();

        let built: ModelHandle = params.get("model_out").unwrap();
        assert_eq!(built.state(), HandleState::OwnedByCaller);
        params
            .put("build_model", false)
            .unwrap()
            .put("model_in", built)
            .unwrap();
        run(&binding, &mut params).unwrap();

        assert_eq!(params.get::<f64>("model_bw_out").unwrap(), 20.0);
        let input: ModelHandle = params.take("model_in").unwrap();
        let output: ModelHandle = params.take("model_out").unwrap();
        assert_eq!(input.state(), HandleState::OwnedByCaller);
        assert_ne!(model_address(&input), model_address(&output));
        assert_eq!(
            output.downcast_ref::<GaussianKernel>().unwrap().bandwidth(),
            10.0
        );
    }

    #[test]
    fn test_no_model_without_build() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        run(&binding, &mut params).unwrap();
        assert!(params.get::<ModelHandle>("model_out").unwrap().is_absent());
        assert_eq!(params.get::<f64>("model_bw_out").unwrap(), 0.0);
    }

    #[test]
    fn test_released_handle_is_rejected() {
        let binding = ReferenceBinding::new();
        let mut handle = ModelHandle::new(Box::new(GaussianKernel::new(4.0)));
        assert!(handle.release());
        assert!(!handle.release());
        let mut params = accepted(&binding);
        params.put("model_in", handle).unwrap();
        let err = run(&binding, &mut params).unwrap_err();
        assert!(matches!(err, BindError::HandleReleased { ref key } if key == "model_in"));
    }

    #[test]
    fn test_raw_export() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("build_model", true).unwrap();
        run(&binding, &mut params).unwrap();
        let ptr = params.take::<ModelHandle>("model_out").unwrap().into_raw();
        assert!(!ptr.is_null());
        unsafe { mlbind_core::model::mlbind_model_free(ptr) };
    }

    #[test]
    fn test_model_json() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("build_model", true).unwrap();
        run(&binding, &mut params).unwrap();
        let json = params.get::<ModelHandle>("model_out").unwrap().to_json().unwrap();
        assert_eq!(json.as_deref(), Some(r#"{"bandwidth":10.0}"#));
    }
}

// ============================================================================
// Errors
// ============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_unknown_parameter() {
        let binding = ReferenceBinding::new();
        let mut params = Params::for_binding(&binding);
        let err = params.put("Int_In", 3).unwrap_err();
        assert!(matches!(err, BindError::UnknownParameter { .. }));
        assert!(err.to_string().contains("Int_In"));
    }

    #[test]
    fn test_type_mismatch_at_dispatch() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("flag1", 1).unwrap();
        let err = run(&binding, &mut params).unwrap_err();
        match err {
            BindError::TypeMismatch { key, expected, found } => {
                assert_eq!(key, "flag1");
                assert_eq!(expected, "Bool");
                assert_eq!(found, "Int");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!params.is_set("string_out").unwrap());
    }

    #[test]
    fn test_fresh_store_per_dispatch() {
        let binding = ReferenceBinding::new();
        let mut params = accepted(&binding);
        params.put("vector_in", vec![7, 8]).unwrap();
        run(&binding, &mut params).unwrap();
        params.unset("vector_in").unwrap();
        run(&binding, &mut params).unwrap();
        assert!(params.get::<Vec<i32>>("vector_out").unwrap().is_empty());
    }

    #[test]
    fn test_schema_has_every_key() {
        let binding = ReferenceBinding::new();
        let params = Params::for_binding(&binding);
        assert_eq!(params.len(), binding.schema().len());
    }
}
