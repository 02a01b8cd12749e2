//! A typed RPN stack machine for cyclic real-time evaluation.
//!
//! Expression text is a line-oriented postfix program (`READ a`, `CONST
//! float32 1.5`, `ADD`, `WRITE out`). [`RuntimeEvaluator`] compiles it in two
//! passes — variable discovery, then type-stack-driven code generation
//! against a [`FunctionRegistry`] of operator overloads — and executes the
//! resulting opcode stream on a byte-addressed data stack. Execution never
//! allocates, never throws, and reports arithmetic faults through
//! [`RuntimeErrorFlags`].
//!
//! ```
//! use evaluator::{ExecutionMode, RuntimeEvaluator};
//!
//! let mut ev = RuntimeEvaluator::new(
//!     "CONST uint32 2\n\
//!      CONST uint32 3\n\
//!      ADD\n\
//!      WRITE out\n",
//! );
//! ev.extract_variables().unwrap();
//! ev.compile().unwrap();
//! assert!(ev.execute(ExecutionMode::Fast).is_clear());
//! assert_eq!(ev.output_value::<u32>("out").unwrap(), 5);
//! ```

pub mod builtins;
pub mod error;
pub mod memory;
pub mod registry;
pub mod stack;
pub mod variables;

mod compiler;
mod evaluator;

pub use error::{CompileError, RuntimeErrorFlags};
pub use evaluator::{ExecutionMode, MatrixElem, RuntimeEvaluator};
pub use registry::{
    FunctionRecord, FunctionRegistry, StackUpdate, StackedType, TypeStack, UpdateContext,
};

/// One element of the compiled code stream: a registry index or an inline
/// operand (a data-memory address).
pub type CodeElement = u16;

/// Byte offset into variable data memory.
pub type DataAddr = u16;

/// Data-stack footprint of a matrix reference. Matrix values travel on the
/// stack as the address of their variable slot, never as payload.
pub const MATRIX_REF_SIZE: usize = std::mem::size_of::<DataAddr>();
