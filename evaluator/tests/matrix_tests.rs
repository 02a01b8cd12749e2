//! Matrix operands: shape checking, element-wise math, scaling, external
//! backing.

use evaluator::{CompileError, ExecutionMode, RuntimeEvaluator};
use types::MatrixSize;

#[test]
fn matching_shapes_add_elementwise() {
    let mut a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut b = [10.0f32, 20.0, 30.0, 40.0, 50.0, 60.0];
    let mut ev = RuntimeEvaluator::new("READ A\nREAD B\nADD\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("A", a.as_mut_ptr(), 2, 3).unwrap();
        ev.set_input_matrix_memory("B", b.as_mut_ptr(), 2, 3).unwrap();
    }
    ev.compile().unwrap();
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    let (size, out) = ev.output_matrix_value::<f32>("OUT").unwrap();
    assert_eq!(size, MatrixSize::new(2, 3));
    assert_eq!(out, vec![11.0, 22.0, 33.0, 44.0, 55.0, 66.0]);
}

#[test]
fn mismatched_shapes_fail_at_compile_time() {
    let mut a = [0.0f32; 6];
    let mut b = [0.0f32; 6];
    let mut ev = RuntimeEvaluator::new("READ A\nREAD B\nADD\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("A", a.as_mut_ptr(), 2, 3).unwrap();
        ev.set_input_matrix_memory("B", b.as_mut_ptr(), 3, 2).unwrap();
    }
    assert!(matches!(
        ev.compile(),
        Err(CompileError::ShapeMismatch { .. })
    ));
}

#[test]
fn scalar_factor_scales_a_matrix() {
    let mut m = [1.0f64, -2.0, 3.0, -4.0];
    let mut ev = RuntimeEvaluator::new("READ M\nCONST float64 2.0\nMUL\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("M", m.as_mut_ptr(), 2, 2).unwrap();
    }
    ev.compile().unwrap();
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    let (size, out) = ev.output_matrix_value::<f64>("OUT").unwrap();
    assert_eq!(size, MatrixSize::new(2, 2));
    assert_eq!(out, vec![2.0, -4.0, 6.0, -8.0]);
}

#[test]
fn scalar_factor_resolves_in_either_order() {
    let mut m = [1.0f32, 2.0];
    let mut ev = RuntimeEvaluator::new("CONST float32 3.0\nREAD M\nMUL\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("M", m.as_mut_ptr(), 1, 2).unwrap();
    }
    ev.compile().unwrap();
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    let (_, out) = ev.output_matrix_value::<f32>("OUT").unwrap();
    assert_eq!(out, vec![3.0, 6.0]);
}

#[test]
fn result_lands_in_externally_bound_output() {
    let mut a = [1.0f32, 2.0];
    let mut b = [3.0f32, 4.0];
    let mut out = [0.0f32; 2];
    let mut ev = RuntimeEvaluator::new("READ A\nREAD B\nADD\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("A", a.as_mut_ptr(), 1, 2).unwrap();
        ev.set_input_matrix_memory("B", b.as_mut_ptr(), 1, 2).unwrap();
        ev.set_output_matrix_memory("OUT", out.as_mut_ptr(), 1, 2).unwrap();
    }
    ev.compile().unwrap();
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    assert_eq!(out, [4.0, 6.0]);
}

#[test]
fn rebinding_an_external_matrix_between_runs() {
    let mut first = [1.0f64, 1.0];
    let mut second = [5.0f64, 7.0];
    let mut ev = RuntimeEvaluator::new("READ M\nCONST float64 2.0\nMUL\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("M", first.as_mut_ptr(), 1, 2).unwrap();
    }
    ev.compile().unwrap();
    ev.execute(ExecutionMode::Fast);
    assert_eq!(ev.output_matrix_value::<f64>("OUT").unwrap().1, vec![2.0, 2.0]);

    unsafe {
        ev.set_input_matrix_memory("M", second.as_mut_ptr(), 1, 2).unwrap();
    }
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    assert_eq!(ev.output_matrix_value::<f64>("OUT").unwrap().1, vec![10.0, 14.0]);
}

#[test]
fn rebinding_with_a_different_shape_fails() {
    let mut first = [0.0f32; 4];
    let mut other = [0.0f32; 6];
    let mut ev = RuntimeEvaluator::new("READ M\nCONST float32 1.0\nMUL\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("M", first.as_mut_ptr(), 2, 2).unwrap();
    }
    ev.compile().unwrap();
    let result = unsafe { ev.set_input_matrix_memory("M", other.as_mut_ptr(), 2, 3) };
    assert!(result.is_err());
}

#[test]
fn element_types_do_not_mix() {
    let mut m = [0.0f32; 4];
    let mut ev = RuntimeEvaluator::new("READ M\nCONST float64 2.0\nMUL\nWRITE OUT\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_matrix_memory("M", m.as_mut_ptr(), 2, 2).unwrap();
    }
    assert!(matches!(
        ev.compile(),
        Err(CompileError::NoMatchingOverload { .. })
    ));
}
