use std::fmt;

use thiserror::Error;
use types::{MatrixSize, TypeDescriptor, VariableDescriptor};

/// Errors raised while extracting variables or compiling expression text.
///
/// A failed compile reports one of these and leaves any previously compiled
/// program untouched.
#[derive(Debug, Error)]
pub enum CompileError {
    /// No registered overload of `command` accepts the types currently on
    /// the stack. `stack` lists the entries top first.
    #[error("no overload of `{command}` matches the type stack [{stack}]")]
    NoMatchingOverload { command: String, stack: String },

    /// The type stack held fewer entries than `command` consumes.
    #[error("type stack underflow while resolving `{command}`")]
    TypeStackUnderflow { command: String },

    /// A line did not have the shape `COMMAND [param [param]]`.
    #[error("malformed line `{line}`")]
    MalformedLine { line: String },

    #[error("unknown type name `{name}`")]
    UnknownType { name: String },

    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },

    /// `RREAD`/`RWRITE` are internal opcodes, substituted by the compiler
    /// for externally bound variables; they cannot appear in source text.
    #[error("`{name}` is reserved and cannot appear in expression text")]
    ReservedCommand { name: String },

    #[error("variable `{name}` declared as {declared}, now referenced as {requested}")]
    VariableTypeConflict {
        name: String,
        declared: VariableDescriptor,
        requested: VariableDescriptor,
    },

    /// An input variable was never given a type before `compile()`.
    #[error("input variable `{name}` has no declared type")]
    UntypedVariable { name: String },

    #[error("`{value}` is not a valid {ty} constant")]
    InvalidConstant { value: String, ty: TypeDescriptor },

    /// A matrix operator was resolved against an operand that is not a
    /// supported matrix (modifier `M`/`m`, float element type).
    #[error("`{command}` expects a matrix operand, found {operand}")]
    NotMatrix { command: String, operand: String },

    #[error("`{command}`: matrix shapes {left} and {right} do not match")]
    ShapeMismatch {
        command: String,
        left: MatrixSize,
        right: MatrixSize,
    },

    /// A variable carries a modifier the engine cannot allocate storage
    /// for (only `M`/`m` over a float element type is supported).
    #[error("variable `{name}` has unsupported type {descriptor}")]
    UnsupportedVariableType {
        name: String,
        descriptor: VariableDescriptor,
    },

    /// A matrix variable reached `compile()` without known extents.
    #[error("matrix variable `{name}` has no known dimensions")]
    UnknownDimensions { name: String },

    /// Values were produced but never consumed: the type stack must be
    /// empty when the last token has been compiled.
    #[error("expression incomplete: {leftover} value(s) left on the type stack")]
    UnbalancedExpression { leftover: usize },

    #[error("extract_variables() must run before compile()")]
    VariablesNotExtracted,

    #[error("the program has not been compiled")]
    NotCompiled,

    /// Memory was bound to a variable the compiled program treats as
    /// engine-owned; the binding would never be dereferenced.
    #[error("variable `{name}` was compiled with engine-owned storage and cannot be rebound")]
    LateBinding { name: String },

    /// A typed value accessor was used on an externally bound variable.
    #[error("variable `{name}` is bound to external memory")]
    NotEngineOwned { name: String },

    #[error("data memory exhausted (addresses are 16 bit)")]
    DataMemoryExhausted,

    /// An internal bookkeeping invariant failed; indicates a bug in the
    /// compiler, not in the expression.
    #[error("internal compiler error: {detail}")]
    Internal { detail: &'static str },
}

/// Runtime fault flags, aggregated across one `execute()` call.
///
/// Execution never raises; actions set flags and always leave the data
/// stack balanced. Once any flag is set the overflow-checked arithmetic
/// family skips its computation and pushes a zero placeholder.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeErrorFlags {
    /// Arithmetic overflow, including integer division by zero.
    pub overflow: bool,
    /// A narrowing conversion lost the value; the result is saturated.
    pub out_of_range: bool,
    /// An operation reached a combination the engine does not support.
    pub unsupported_feature: bool,
    /// Compile-time accounting and runtime behavior disagreed; indicates a
    /// bug in the engine, not in the inputs.
    pub internal_setup_error: bool,
    /// Safe-mode execution stopped before the last opcode.
    pub not_completed: bool,
}

impl RuntimeErrorFlags {
    pub fn is_clear(self) -> bool {
        self == RuntimeErrorFlags::default()
    }

    pub fn merge(&mut self, other: RuntimeErrorFlags) {
        self.overflow |= other.overflow;
        self.out_of_range |= other.out_of_range;
        self.unsupported_feature |= other.unsupported_feature;
        self.internal_setup_error |= other.internal_setup_error;
        self.not_completed |= other.not_completed;
    }
}

impl fmt::Display for RuntimeErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clear() {
            return f.write_str("no error");
        }
        let mut first = true;
        let mut put = |f: &mut fmt::Formatter<'_>, name: &str| -> fmt::Result {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            f.write_str(name)
        };
        if self.overflow {
            put(f, "overflow")?;
        }
        if self.out_of_range {
            put(f, "out-of-range")?;
        }
        if self.unsupported_feature {
            put(f, "unsupported-feature")?;
        }
        if self.internal_setup_error {
            put(f, "internal-setup-error")?;
        }
        if self.not_completed {
            put(f, "not-completed")?;
        }
        Ok(())
    }
}
