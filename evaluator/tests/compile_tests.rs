//! Variable extraction and compilation behavior.

use evaluator::{CompileError, RuntimeEvaluator};
use types::{TypeDescriptor, VariableDescriptor};

fn extracted(program: &str) -> RuntimeEvaluator {
    let mut ev = RuntimeEvaluator::new(program);
    ev.extract_variables().unwrap();
    ev
}

#[test]
fn extraction_lists_variables_in_discovery_order() {
    let ev = extracted("READ A\nREAD B\nADD\nWRITE OUT\n");
    let inputs: Vec<&str> = ev.browse_input_variables().map(|v| v.name.as_str()).collect();
    let outputs: Vec<&str> = ev.browse_output_variables().map(|v| v.name.as_str()).collect();
    assert_eq!(inputs, ["A", "B"]);
    assert_eq!(outputs, ["OUT"]);
}

#[test]
fn constants_become_ordinal_input_variables() {
    let ev = extracted("CONST float32 1.5\nCONST uint8 2\nADD\nWRITE OUT\n");
    let inputs: Vec<&str> = ev.browse_input_variables().map(|v| v.name.as_str()).collect();
    assert_eq!(inputs, ["Constant@0", "Constant@1"]);
    assert_eq!(
        ev.browse_input_variables().next().unwrap().descriptor,
        Some(VariableDescriptor::scalar(TypeDescriptor::Float32))
    );
}

#[test]
fn a_written_name_reads_back_from_the_output_table() {
    let mut ev = extracted("CONST uint32 7\nWRITE X\nREAD X\nWRITE Y\n");
    assert!(ev.browse_input_variables().all(|v| v.name != "X"));
    ev.compile().unwrap();
    ev.execute(evaluator::ExecutionMode::Fast);
    assert_eq!(ev.output_value::<u32>("Y").unwrap(), 7);
}

#[test]
fn reserved_commands_cannot_appear_in_source() {
    let mut ev = RuntimeEvaluator::new("RREAD X\nWRITE Y\n");
    assert!(matches!(
        ev.extract_variables(),
        Err(CompileError::ReservedCommand { .. })
    ));
}

#[test]
fn malformed_lines_are_rejected() {
    for program in ["READ\n", "READ A B\n", "CONST uint8\n", "ADD 1\n"] {
        let mut ev = RuntimeEvaluator::new(program);
        assert!(
            matches!(ev.extract_variables(), Err(CompileError::MalformedLine { .. })),
            "{program:?} should be malformed"
        );
    }
}

#[test]
fn unknown_type_names_are_rejected() {
    let mut ev = RuntimeEvaluator::new("CONST wibble 1\nWRITE X\n");
    assert!(matches!(
        ev.extract_variables(),
        Err(CompileError::UnknownType { .. })
    ));
}

#[test]
fn invalid_constant_text_is_rejected_at_compile() {
    let mut ev = extracted("CONST uint8 999\nWRITE X\n");
    assert!(matches!(
        ev.compile(),
        Err(CompileError::InvalidConstant { .. })
    ));
}

#[test]
fn compile_requires_extraction_first() {
    let mut ev = RuntimeEvaluator::new("CONST uint8 1\nWRITE X\n");
    assert!(matches!(
        ev.compile(),
        Err(CompileError::VariablesNotExtracted)
    ));
}

#[test]
fn undeclared_input_type_fails_compilation() {
    let mut ev = extracted("READ A\nWRITE B\n");
    assert!(matches!(
        ev.compile(),
        Err(CompileError::UntypedVariable { .. })
    ));
}

#[test]
fn declaring_an_unknown_variable_fails() {
    let mut ev = extracted("READ A\nWRITE B\n");
    assert!(matches!(
        ev.set_input_variable_type("missing", VariableDescriptor::scalar(TypeDescriptor::UInt32)),
        Err(CompileError::UnknownVariable { .. })
    ));
}

#[test]
fn conflicting_redeclaration_fails() {
    let mut ev = extracted("READ A\nWRITE B\n");
    ev.set_input_variable_type("A", VariableDescriptor::scalar(TypeDescriptor::UInt32))
        .unwrap();
    assert!(matches!(
        ev.set_input_variable_type("A", VariableDescriptor::scalar(TypeDescriptor::Float32)),
        Err(CompileError::VariableTypeConflict { .. })
    ));
}

#[test]
fn leftover_stack_entries_fail_compilation() {
    let mut ev = extracted("CONST uint32 1\nCONST uint32 2\n");
    assert!(matches!(
        ev.compile(),
        Err(CompileError::UnbalancedExpression { leftover: 2 })
    ));
}

#[test]
fn no_overload_reports_command_and_stack() {
    let mut ev = extracted("CONST uint32 1\nCONST float32 2.0\nADD\nWRITE X\n");
    let err = ev.compile().unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, CompileError::NoMatchingOverload { .. }));
    assert!(msg.contains("ADD"));
    assert!(msg.contains("float32"));
}

#[test]
fn operator_on_an_empty_stack_is_an_underflow() {
    let mut ev = extracted("ADD\n");
    assert!(matches!(
        ev.compile(),
        Err(CompileError::TypeStackUnderflow { .. })
    ));
}

#[test]
fn compiled_program_geometry() {
    let mut ev = extracted("CONST uint32 2\nCONST uint32 3\nADD\nWRITE RES\n");
    ev.compile().unwrap();
    // Two constants, the result variable, all uint32.
    assert_eq!(ev.data_size(), 12);
    // Peak stack: both constants loaded.
    assert_eq!(ev.stack_capacity(), 8);
    // Two loads and a store carry an inline address; ADD does not.
    assert_eq!(ev.code_size(), 7);
}

#[test]
fn failed_compile_leaves_no_program() {
    let mut ev = extracted("CONST uint32 1\nCONST float32 2.0\nADD\nWRITE X\n");
    assert!(ev.compile().is_err());
    assert!(ev
        .execute(evaluator::ExecutionMode::Fast)
        .internal_setup_error);
}
