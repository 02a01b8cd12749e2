//! The builtin operator set.
//!
//! Registration order is the overload-priority order: exact-type records
//! come before converting ones, so a same-type operand pair always resolves
//! to its dedicated record and the promoting/narrowing records only catch
//! the mixed cases.

use types::{TypeDescriptor, VariableDescriptor};

use crate::registry::FunctionRegistry;

mod arithmetic;
mod cast;
mod comparison;
mod logical;
mod math;
mod matrix;
mod readwrite;

pub(crate) fn scalar(td: TypeDescriptor) -> VariableDescriptor {
    VariableDescriptor::scalar(td)
}

pub(crate) fn matrix(td: TypeDescriptor) -> VariableDescriptor {
    VariableDescriptor::matrix(td)
}

/// Populate `registry` with the full builtin table.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    readwrite::register(registry);
    cast::register(registry);
    math::register(registry);
    comparison::register_same_type(registry);
    logical::register(registry);
    arithmetic::register(registry);
    comparison::register_widened(registry);
    readwrite::register_converting(registry);
    matrix::register(registry);
}
