//! Operator overload registry.
//!
//! Each [`FunctionRecord`] binds a command name and an ordered type
//! signature to an executable action and a stack-bookkeeping strategy.
//! Resolution is a linear scan in registration order and the first
//! structural match wins, so registration order is the overload-priority
//! rule: exact same-type records are registered before converting ones.

use smallvec::SmallVec;
use types::{MatrixSize, VariableDescriptor};

use crate::error::CompileError;
use crate::evaluator::RuntimeEvaluator;
use crate::variables::VariableInformation;
use crate::{CodeElement, MATRIX_REF_SIZE};

/// One entry on the compile-time type stack: an abstract operand type plus,
/// for matrices, the shape it was declared or produced with.
#[derive(Debug, Clone)]
pub struct StackedType {
    pub descriptor: VariableDescriptor,
    pub dims: Option<MatrixSize>,
}

impl StackedType {
    pub fn scalar(descriptor: VariableDescriptor) -> StackedType {
        StackedType {
            descriptor,
            dims: None,
        }
    }
}

/// Compile-time type stack. Top of stack is the last element.
pub type TypeStack = SmallVec<[StackedType; 16]>;

/// Peek `depth` entries below the top.
pub fn peek(stack: &TypeStack, depth: usize) -> Option<&StackedType> {
    stack.len().checked_sub(depth + 1).map(|i| &stack[i])
}

/// Render a type stack top first, for diagnostics.
pub fn describe_stack(stack: &TypeStack) -> String {
    let mut out = String::new();
    for (i, entry) in stack.iter().rev().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&entry.descriptor.to_string());
        if let Some(dims) = entry.dims {
            out.push_str(&format!(" {dims}"));
        }
    }
    out
}

/// Executable behavior of a record.
pub type ActionFn = fn(&mut RuntimeEvaluator);

/// Compile-time context handed to custom stack-update routines.
pub struct UpdateContext<'a> {
    pub type_stack: &'a mut TypeStack,
    /// Running data-stack byte depth; its maximum sizes the stack buffer.
    pub stack_size: &'a mut usize,
    /// Temporaries the routine wants materialized (matrix results). The
    /// compiler allocates them, appends their address to the code stream,
    /// and pushes their type.
    pub temporaries: &'a mut Vec<VariableInformation>,
    pub next_temp_id: &'a mut u32,
}

/// Custom stack-bookkeeping routine.
pub type UpdateFn = fn(&FunctionRecord, &mut UpdateContext<'_>) -> Result<(), CompileError>;

/// How a record maintains the type stack and the size accounting.
pub enum StackUpdate {
    /// Generic pop-inputs/push-outputs byte accounting.
    Default,
    /// Matrix operators: shape validation and temporary allocation.
    Custom(UpdateFn),
}

/// One registered overload.
pub struct FunctionRecord {
    pub name: &'static str,
    /// Consumed stack entries, listed top of stack first.
    pub inputs: Vec<VariableDescriptor>,
    /// Produced stack entries.
    pub outputs: Vec<VariableDescriptor>,
    /// For memory-writing records with no stack output (WRITE/RWRITE): the
    /// destination type matched against the pending output entry.
    pub memory_output: Option<VariableDescriptor>,
    pub action: ActionFn,
    pub update: StackUpdate,
}

impl FunctionRecord {
    pub fn new(
        name: &'static str,
        inputs: Vec<VariableDescriptor>,
        outputs: Vec<VariableDescriptor>,
        action: ActionFn,
    ) -> FunctionRecord {
        FunctionRecord {
            name,
            inputs,
            outputs,
            memory_output: None,
            action,
            update: StackUpdate::Default,
        }
    }

    pub fn with_memory_output(mut self, descriptor: VariableDescriptor) -> FunctionRecord {
        self.memory_output = Some(descriptor);
        self
    }

    pub fn with_update(mut self, update: UpdateFn) -> FunctionRecord {
        self.update = StackUpdate::Custom(update);
        self
    }

    /// The type matched against the top of stack when resolving with
    /// `match_output`.
    pub fn matched_output(&self) -> Option<&VariableDescriptor> {
        self.outputs.first().or(self.memory_output.as_ref())
    }

    /// Structural match against the current type stack. A type mismatch is
    /// a normal "try the next candidate" outcome; running out of stack
    /// entries is a hard error.
    pub fn check(
        &self,
        name: &str,
        stack: &TypeStack,
        match_output: bool,
    ) -> Result<bool, CompileError> {
        if self.name != name {
            return Ok(false);
        }
        let mut depth = 0;
        if match_output {
            let Some(expected) = self.matched_output() else {
                return Ok(false);
            };
            let Some(entry) = peek(stack, depth) else {
                return Err(CompileError::TypeStackUnderflow {
                    command: name.to_string(),
                });
            };
            if !entry.descriptor.same_as(expected) {
                return Ok(false);
            }
            depth += 1;
        }
        for input in &self.inputs {
            let Some(entry) = peek(stack, depth) else {
                return Err(CompileError::TypeStackUnderflow {
                    command: name.to_string(),
                });
            };
            if !entry.descriptor.same_as(input) {
                return Ok(false);
            }
            depth += 1;
        }
        Ok(true)
    }

    /// Generic bookkeeping: drop the matched output entry, pop the inputs
    /// (matrix references cost `MATRIX_REF_SIZE`, scalars their exact
    /// width), push the scalar outputs.
    pub fn default_update(
        &self,
        ctx: &mut UpdateContext<'_>,
        match_output: bool,
    ) -> Result<(), CompileError> {
        if match_output && ctx.type_stack.pop().is_none() {
            return Err(CompileError::TypeStackUnderflow {
                command: self.name.to_string(),
            });
        }
        for _ in &self.inputs {
            let Some(entry) = ctx.type_stack.pop() else {
                return Err(CompileError::TypeStackUnderflow {
                    command: self.name.to_string(),
                });
            };
            let cost = if entry.descriptor.is_scalar() {
                entry.descriptor.type_descriptor.storage_size()
            } else {
                MATRIX_REF_SIZE
            };
            *ctx.stack_size = ctx.stack_size.checked_sub(cost).ok_or(CompileError::Internal {
                detail: "data stack accounting underflow",
            })?;
        }
        for output in &self.outputs {
            if !output.is_scalar() {
                return Err(CompileError::Internal {
                    detail: "matrix output reached the generic stack update",
                });
            }
            *ctx.stack_size += output.type_descriptor.storage_size();
            ctx.type_stack.push(StackedType::scalar(output.clone()));
        }
        Ok(())
    }
}

/// The overload table. Built explicitly (no static registration), growable,
/// read-only once compilation starts.
#[derive(Default)]
pub struct FunctionRegistry {
    records: Vec<FunctionRecord>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::default()
    }

    /// A registry populated with the full builtin operator set.
    pub fn standard() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        crate::builtins::register_builtins(&mut registry);
        registry
    }

    /// Append a record and return its opcode. The table grows as needed;
    /// registration never silently drops. Exceeding the opcode range is a
    /// construction-time programming error and panics rather than
    /// truncating the returned opcode.
    pub fn register(&mut self, record: FunctionRecord) -> CodeElement {
        assert!(
            self.records.len() < CodeElement::MAX as usize,
            "function registry exceeds the opcode range"
        );
        self.records.push(record);
        (self.records.len() - 1) as CodeElement
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, code: CodeElement) -> Option<&FunctionRecord> {
        self.records.get(code as usize)
    }

    /// Resolve a command against the type stack. First match in
    /// registration order wins; on failure the error reports the command
    /// and the stack contents, top first.
    pub fn find(
        &self,
        name: &str,
        stack: &TypeStack,
        match_output: bool,
    ) -> Result<CodeElement, CompileError> {
        for (code, record) in self.records.iter().enumerate() {
            if record.check(name, stack, match_output)? {
                return Ok(code as CodeElement);
            }
        }
        Err(CompileError::NoMatchingOverload {
            command: name.to_string(),
            stack: describe_stack(stack),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::TypeDescriptor;

    fn noop(_: &mut RuntimeEvaluator) {}

    fn scalar(td: TypeDescriptor) -> VariableDescriptor {
        VariableDescriptor::scalar(td)
    }

    fn stack_of(types: &[TypeDescriptor]) -> TypeStack {
        types
            .iter()
            .map(|t| StackedType::scalar(scalar(*t)))
            .collect()
    }

    #[test]
    fn first_registered_match_wins() {
        let mut reg = FunctionRegistry::new();
        let narrow = reg.register(FunctionRecord::new(
            "OP",
            vec![scalar(TypeDescriptor::UInt8)],
            vec![scalar(TypeDescriptor::UInt8)],
            noop,
        ));
        reg.register(FunctionRecord::new(
            "OP",
            vec![scalar(TypeDescriptor::UInt8)],
            vec![scalar(TypeDescriptor::UInt32)],
            noop,
        ));

        let stack = stack_of(&[TypeDescriptor::UInt8]);
        assert_eq!(reg.find("OP", &stack, false).unwrap(), narrow);
    }

    #[test]
    #[should_panic(expected = "opcode range")]
    fn registering_past_the_opcode_range_panics() {
        let mut reg = FunctionRegistry::new();
        for _ in 0..=CodeElement::MAX as usize {
            reg.register(FunctionRecord::new("OP", vec![], vec![], noop));
        }
    }

    #[test]
    fn mismatch_tries_next_candidate() {
        let mut reg = FunctionRegistry::new();
        reg.register(FunctionRecord::new(
            "OP",
            vec![scalar(TypeDescriptor::Float32)],
            vec![],
            noop,
        ));
        let wanted = reg.register(FunctionRecord::new(
            "OP",
            vec![scalar(TypeDescriptor::Int16)],
            vec![],
            noop,
        ));

        let stack = stack_of(&[TypeDescriptor::Int16]);
        assert_eq!(reg.find("OP", &stack, false).unwrap(), wanted);
    }

    #[test]
    fn underflow_is_a_hard_error() {
        let mut reg = FunctionRegistry::new();
        reg.register(FunctionRecord::new(
            "OP",
            vec![
                scalar(TypeDescriptor::UInt32),
                scalar(TypeDescriptor::UInt32),
            ],
            vec![scalar(TypeDescriptor::UInt32)],
            noop,
        ));

        let stack = stack_of(&[TypeDescriptor::UInt32]);
        assert!(matches!(
            reg.find("OP", &stack, false),
            Err(CompileError::TypeStackUnderflow { .. })
        ));
    }

    #[test]
    fn not_found_reports_stack_contents() {
        let reg = FunctionRegistry::new();
        let stack = stack_of(&[TypeDescriptor::Float32, TypeDescriptor::UInt8]);
        let err = reg.find("MYSTERY", &stack, false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("MYSTERY"));
        // Top first: uint8 was pushed last.
        assert!(msg.contains("uint8, float32"));
    }

    #[test]
    fn default_update_accounts_exact_bytes() {
        let record = FunctionRecord::new(
            "OP",
            vec![scalar(TypeDescriptor::UInt8), scalar(TypeDescriptor::Float64)],
            vec![scalar(TypeDescriptor::UInt32)],
            noop,
        );
        let mut stack = stack_of(&[TypeDescriptor::Float64, TypeDescriptor::UInt8]);
        let mut size = 9usize; // 8 + 1 already pushed
        let mut temps = Vec::new();
        let mut next_id = 0u32;
        let mut ctx = UpdateContext {
            type_stack: &mut stack,
            stack_size: &mut size,
            temporaries: &mut temps,
            next_temp_id: &mut next_id,
        };
        record.default_update(&mut ctx, false).unwrap();
        assert_eq!(size, 4);
        assert_eq!(stack.len(), 1);
        assert_eq!(
            stack[0].descriptor,
            scalar(TypeDescriptor::UInt32)
        );
    }
}
