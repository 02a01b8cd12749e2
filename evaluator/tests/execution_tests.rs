//! Execution modes, external memory, and repeated runs.

use evaluator::{CompileError, ExecutionMode, RuntimeEvaluator};
use types::{TypeDescriptor, VariableDescriptor};

#[test]
fn executing_an_uncompiled_program_is_a_setup_error() {
    let mut ev = RuntimeEvaluator::new("CONST uint8 1\nWRITE X\n");
    let flags = ev.execute(ExecutionMode::Fast);
    assert!(flags.internal_setup_error);
}

#[test]
fn repeated_execution_is_idempotent_and_allocation_free() {
    let mut ev = RuntimeEvaluator::new("CONST uint32 2\nCONST uint32 3\nADD\nWRITE RES\n");
    ev.extract_variables().unwrap();
    ev.compile().unwrap();

    let code = ev.code_size();
    let data = ev.data_size();
    let stack = ev.stack_capacity();
    for _ in 0..3 {
        assert!(ev.execute(ExecutionMode::Fast).is_clear());
        assert_eq!(ev.output_value::<u32>("RES").unwrap(), 5);
    }
    assert_eq!(ev.code_size(), code);
    assert_eq!(ev.data_size(), data);
    assert_eq!(ev.stack_capacity(), stack);
}

#[test]
fn read_modify_write_resolves_the_input_before_the_store() {
    // `X` is read before it is written, so the READ must bind to the input
    // entry, not the not-yet-written output of the same name.
    let mut ev = RuntimeEvaluator::new("READ X\nCONST uint32 1\nADD\nWRITE X\n");
    ev.extract_variables().unwrap();
    ev.set_input_variable_type("X", VariableDescriptor::scalar(TypeDescriptor::UInt32))
        .unwrap();
    ev.compile().unwrap();

    ev.set_input_value("X", 41u32).unwrap();
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    assert_eq!(ev.output_value::<u32>("X").unwrap(), 42);

    // The input slot is distinct from the output slot.
    ev.set_input_value("X", 10u32).unwrap();
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    assert_eq!(ev.output_value::<u32>("X").unwrap(), 11);
}

#[test]
fn external_scalars_are_read_and_written_through_pointers() {
    let mut x = 2.0f32;
    let mut y = 0.0f32;
    let mut ev = RuntimeEvaluator::new("READ X\nCONST float32 1.0\nADD\nWRITE Y\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_variable_memory("X", &mut x as *mut f32).unwrap();
        ev.set_output_variable_memory("Y", &mut y as *mut f32).unwrap();
    }
    ev.compile().unwrap();
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    assert_eq!(y, 3.0);

    // The binding reads the caller's memory on every run.
    x = 5.0;
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    assert_eq!(y, 6.0);
}

#[test]
fn external_scalars_can_be_rebound_after_compilation() {
    let mut first = 1.0f64;
    let mut second = 10.0f64;
    let mut ev = RuntimeEvaluator::new("READ X\nCONST float64 1.0\nADD\nWRITE Y\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_variable_memory("X", &mut first as *mut f64).unwrap();
    }
    ev.compile().unwrap();
    ev.execute(ExecutionMode::Fast);
    assert_eq!(ev.output_value::<f64>("Y").unwrap(), 2.0);

    unsafe {
        ev.set_input_variable_memory("X", &mut second as *mut f64).unwrap();
    }
    assert!(ev.execute(ExecutionMode::Fast).is_clear());
    assert_eq!(ev.output_value::<f64>("Y").unwrap(), 11.0);
}

#[test]
fn engine_owned_variables_cannot_be_bound_late() {
    let mut ev = RuntimeEvaluator::new("READ X\nWRITE Y\n");
    ev.extract_variables().unwrap();
    ev.set_input_variable_type("X", VariableDescriptor::scalar(TypeDescriptor::UInt32))
        .unwrap();
    ev.compile().unwrap();

    let mut x = 7u32;
    let result = unsafe { ev.set_input_variable_memory("X", &mut x as *mut u32) };
    assert!(matches!(result, Err(CompileError::LateBinding { .. })));
}

#[test]
fn typed_accessors_reject_externally_bound_variables() {
    let mut x = 7u32;
    let mut ev = RuntimeEvaluator::new("READ X\nWRITE Y\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_variable_memory("X", &mut x as *mut u32).unwrap();
    }
    ev.compile().unwrap();
    assert!(matches!(
        ev.set_input_value("X", 1u32),
        Err(CompileError::NotEngineOwned { .. })
    ));
}

#[test]
fn safe_mode_stops_at_the_first_fault() {
    let mut ev = RuntimeEvaluator::new(
        "CONST int32 1\n\
         CONST int32 0\n\
         DIV\n\
         WRITE A\n\
         CONST int32 5\n\
         WRITE B\n",
    );
    ev.extract_variables().unwrap();
    ev.compile().unwrap();

    let flags = ev.execute(ExecutionMode::Safe);
    assert!(flags.overflow);
    assert!(flags.not_completed);
    // B was never stored.
    assert_eq!(ev.output_value::<i32>("B").unwrap(), 0);
}

#[test]
fn fast_mode_runs_through_faults() {
    let mut ev = RuntimeEvaluator::new(
        "CONST int32 1\n\
         CONST int32 0\n\
         DIV\n\
         WRITE A\n\
         CONST int32 5\n\
         WRITE B\n",
    );
    ev.extract_variables().unwrap();
    ev.compile().unwrap();

    let flags = ev.execute(ExecutionMode::Fast);
    assert!(flags.overflow);
    assert!(!flags.not_completed);
    assert_eq!(ev.output_value::<i32>("B").unwrap(), 5);
}

#[test]
fn flags_reset_between_runs() {
    let mut x = 0i32;
    let mut ev = RuntimeEvaluator::new("CONST int32 7\nREAD X\nDIV\nWRITE RES\n");
    ev.extract_variables().unwrap();
    unsafe {
        ev.set_input_variable_memory("X", &mut x as *mut i32).unwrap();
    }
    ev.compile().unwrap();

    assert!(ev.execute(ExecutionMode::Fast).overflow);
    x = 7;
    let flags = ev.execute(ExecutionMode::Fast);
    assert!(flags.is_clear());
    assert_eq!(ev.output_value::<i32>("RES").unwrap(), 1);
}
