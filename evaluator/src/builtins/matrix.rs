//! Matrix records.
//!
//! Matrix values travel on the data stack as the 16-bit address of the
//! variable slot holding their pool index, so every record here carries a
//! custom stack update: shape checking happens at compile time and the
//! results of `ADD`/`MUL` are materialized as `Temp@<n>` output variables.

use types::{MatrixSize, TypeDescriptor, VariableDescriptor};

use super::{matrix, scalar};
use crate::error::CompileError;
use crate::evaluator::{MatrixElem, RuntimeEvaluator};
use crate::registry::{
    FunctionRecord, FunctionRegistry, StackedType, UpdateContext,
};
use crate::variables::VariableInformation;
use crate::{DataAddr, MATRIX_REF_SIZE};

// ---- actions ------------------------------------------------------------

fn matrix_read(ev: &mut RuntimeEvaluator) {
    let addr = ev.next_code() as DataAddr;
    ev.push(addr);
}

fn matrix_write<T: MatrixElem>(ev: &mut RuntimeEvaluator) {
    let src: DataAddr = ev.pop();
    let dest = ev.next_code() as DataAddr;
    ev.matrix_copy_into::<T>(src, dest);
}

fn matrix_add<T: MatrixElem>(ev: &mut RuntimeEvaluator) {
    let y1: DataAddr = ev.pop();
    let y2: DataAddr = ev.pop();
    let out = ev.next_code() as DataAddr;
    ev.matrix_add_into::<T>(y2, y1, out);
    ev.push(out);
}

/// `MUL` with the scalar factor on top of the stack.
fn matrix_scale_scalar_top<T: MatrixElem>(ev: &mut RuntimeEvaluator) {
    let k: T = ev.pop();
    let m: DataAddr = ev.pop();
    let out = ev.next_code() as DataAddr;
    ev.matrix_scale_into::<T>(m, k, out);
    ev.push(out);
}

/// `MUL` with the matrix on top of the stack.
fn matrix_scale_matrix_top<T: MatrixElem>(ev: &mut RuntimeEvaluator) {
    let m: DataAddr = ev.pop();
    let k: T = ev.pop();
    let out = ev.next_code() as DataAddr;
    ev.matrix_scale_into::<T>(m, k, out);
    ev.push(out);
}

// ---- compile-time stack updates -----------------------------------------

fn pop_entry(command: &str, ctx: &mut UpdateContext<'_>) -> Result<StackedType, CompileError> {
    ctx.type_stack
        .pop()
        .ok_or_else(|| CompileError::TypeStackUnderflow {
            command: command.to_string(),
        })
}

fn matrix_dims(command: &str, entry: &StackedType) -> Result<MatrixSize, CompileError> {
    if !entry.descriptor.is_valid_matrix() {
        return Err(CompileError::NotMatrix {
            command: command.to_string(),
            operand: entry.descriptor.to_string(),
        });
    }
    entry.dims.ok_or(CompileError::Internal {
        detail: "matrix entry without dimensions",
    })
}

fn charge(ctx: &mut UpdateContext<'_>, cost: usize) -> Result<(), CompileError> {
    *ctx.stack_size = ctx
        .stack_size
        .checked_sub(cost)
        .ok_or(CompileError::Internal {
            detail: "data stack accounting underflow",
        })?;
    Ok(())
}

fn make_temp(ctx: &mut UpdateContext<'_>, descriptor: VariableDescriptor, dims: MatrixSize) {
    let id = *ctx.next_temp_id;
    *ctx.next_temp_id += 1;
    let mut temp = VariableInformation::new(&format!("Temp@{id}"));
    temp.descriptor = Some(descriptor);
    temp.dims = Some(dims);
    ctx.temporaries.push(temp);
    // The compiler pushes the temporary's type entry; its stack cost is a
    // matrix reference.
    *ctx.stack_size += MATRIX_REF_SIZE;
}

fn matrix_read_update(
    record: &FunctionRecord,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), CompileError> {
    let entry = pop_entry(record.name, ctx)?;
    matrix_dims(record.name, &entry)?;
    ctx.type_stack.push(entry);
    *ctx.stack_size += MATRIX_REF_SIZE;
    Ok(())
}

fn matrix_write_update(
    record: &FunctionRecord,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), CompileError> {
    let dest = pop_entry(record.name, ctx)?;
    let value = pop_entry(record.name, ctx)?;
    let dest_dims = matrix_dims(record.name, &dest)?;
    let value_dims = matrix_dims(record.name, &value)?;
    if dest_dims != value_dims {
        return Err(CompileError::ShapeMismatch {
            command: record.name.to_string(),
            left: value_dims,
            right: dest_dims,
        });
    }
    charge(ctx, MATRIX_REF_SIZE)
}

fn matrix_add_update(
    record: &FunctionRecord,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), CompileError> {
    let right = pop_entry(record.name, ctx)?;
    let left = pop_entry(record.name, ctx)?;
    let right_dims = matrix_dims(record.name, &right)?;
    let left_dims = matrix_dims(record.name, &left)?;
    if left_dims != right_dims {
        return Err(CompileError::ShapeMismatch {
            command: record.name.to_string(),
            left: left_dims,
            right: right_dims,
        });
    }
    charge(ctx, 2 * MATRIX_REF_SIZE)?;
    let out = record.outputs.first().ok_or(CompileError::Internal {
        detail: "matrix record without an output type",
    })?;
    make_temp(ctx, out.clone(), left_dims);
    Ok(())
}

fn matrix_scale_update(
    record: &FunctionRecord,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), CompileError> {
    let top = pop_entry(record.name, ctx)?;
    let under = pop_entry(record.name, ctx)?;
    let (matrix_entry, scalar_entry) = if top.descriptor.is_scalar() {
        (under, top)
    } else {
        (top, under)
    };
    let dims = matrix_dims(record.name, &matrix_entry)?;
    if !scalar_entry.descriptor.is_scalar() {
        return Err(CompileError::NotMatrix {
            command: record.name.to_string(),
            operand: scalar_entry.descriptor.to_string(),
        });
    }
    let scalar_cost = scalar_entry.descriptor.type_descriptor.storage_size();
    charge(ctx, MATRIX_REF_SIZE + scalar_cost)?;
    let out = record.outputs.first().ok_or(CompileError::Internal {
        detail: "matrix record without an output type",
    })?;
    make_temp(ctx, out.clone(), dims);
    Ok(())
}

// ---- registration -------------------------------------------------------

macro_rules! register_matrix_ops {
    ($reg:ident, $t:ty, $td:ident) => {
        for name in ["READ", "RREAD"] {
            $reg.register(
                FunctionRecord::new(name, vec![], vec![matrix(TypeDescriptor::$td)], matrix_read)
                    .with_update(matrix_read_update),
            );
        }
        for name in ["WRITE", "RWRITE"] {
            $reg.register(
                FunctionRecord::new(
                    name,
                    vec![matrix(TypeDescriptor::$td)],
                    vec![],
                    matrix_write::<$t>,
                )
                .with_memory_output(matrix(TypeDescriptor::$td))
                .with_update(matrix_write_update),
            );
        }
        $reg.register(
            FunctionRecord::new(
                "ADD",
                vec![matrix(TypeDescriptor::$td), matrix(TypeDescriptor::$td)],
                vec![matrix(TypeDescriptor::$td)],
                matrix_add::<$t>,
            )
            .with_update(matrix_add_update),
        );
        $reg.register(
            FunctionRecord::new(
                "MUL",
                vec![scalar(TypeDescriptor::$td), matrix(TypeDescriptor::$td)],
                vec![matrix(TypeDescriptor::$td)],
                matrix_scale_scalar_top::<$t>,
            )
            .with_update(matrix_scale_update),
        );
        $reg.register(
            FunctionRecord::new(
                "MUL",
                vec![matrix(TypeDescriptor::$td), scalar(TypeDescriptor::$td)],
                vec![matrix(TypeDescriptor::$td)],
                matrix_scale_matrix_top::<$t>,
            )
            .with_update(matrix_scale_update),
        );
    };
}

pub(super) fn register(reg: &mut FunctionRegistry) {
    register_matrix_ops!(reg, f32, Float32);
    register_matrix_ops!(reg, f64, Float64);
}
