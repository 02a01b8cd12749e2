//! The two compilation passes: variable discovery and code generation.

use types::{MatrixSize, TypeDescriptor, VariableDescriptor};

use crate::error::{CompileError, RuntimeErrorFlags};
use crate::evaluator::RuntimeEvaluator;
use crate::memory::{DataMemory, MatrixPool, MatrixStorage, PTR_SIZE};
use crate::registry::{peek, StackUpdate, StackedType, TypeStack, UpdateContext};
use crate::variables::{VariableInformation, VariableTable};
use crate::{CodeElement, DataAddr};

impl RuntimeEvaluator {
    /// First pass: walk the expression once and enumerate every free
    /// variable name, so the caller can declare types and bind memory
    /// before [`RuntimeEvaluator::compile`].
    ///
    /// `CONST` tokens materialize as typed input variables named
    /// `Constant@<n>`; a name that is written before it is read belongs to
    /// the output table only.
    pub fn extract_variables(&mut self) -> Result<(), CompileError> {
        self.inputs.clear();
        self.outputs.clear();
        self.extracted = false;
        self.compiled = false;

        let mut constants = 0u32;
        for line in self.rpn_code.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(&command) = tokens.first() else {
                continue;
            };
            match command {
                "READ" => {
                    let name = expect_params(&tokens, 1, line)?[0];
                    if !self.outputs.contains(name) && !self.inputs.contains(name) {
                        self.inputs.add(VariableInformation::new(name));
                    }
                }
                "WRITE" => {
                    let name = expect_params(&tokens, 1, line)?[0];
                    if !self.outputs.contains(name) {
                        self.outputs.add(VariableInformation::new(name));
                    }
                }
                "CONST" => {
                    let params = expect_params(&tokens, 2, line)?;
                    let td = parse_type(params[0])?;
                    let name = format!("Constant@{constants}");
                    constants += 1;
                    let var = self.inputs.add(VariableInformation::new(&name));
                    var.descriptor = Some(VariableDescriptor::scalar(td));
                }
                "CAST" => {
                    let params = expect_params(&tokens, 1, line)?;
                    parse_type(params[0])?;
                }
                "RREAD" | "RWRITE" => {
                    return Err(CompileError::ReservedCommand {
                        name: command.to_string(),
                    });
                }
                _ => {
                    // Bare operator.
                    expect_params(&tokens, 0, line)?;
                }
            }
        }
        self.extracted = true;
        Ok(())
    }

    /// Second pass: resolve every token against the registry, thread the
    /// type stack, lay out data memory, and emit the code stream.
    ///
    /// Compilation builds into fresh buffers and commits only on success:
    /// a failed compile leaves a previously compiled program runnable.
    pub fn compile(&mut self) -> Result<(), CompileError> {
        if !self.extracted {
            return Err(CompileError::VariablesNotExtracted);
        }

        let mut inputs = self.inputs.clone();
        let mut outputs = self.outputs.clone();
        reset_layout(&mut inputs);
        reset_layout(&mut outputs);

        let mut memory = DataMemory::new();
        let mut pool_f32: MatrixPool<f32> = MatrixPool::new();
        let mut pool_f64: MatrixPool<f64> = MatrixPool::new();
        let mut code: Vec<CodeElement> = Vec::new();
        let mut type_stack = TypeStack::new();
        let mut stack_size = 0usize;
        let mut max_stack = 0usize;
        let mut next_temp = 0u32;
        let mut const_index = 0u32;

        for var in inputs.iter() {
            if var.descriptor.is_none() {
                return Err(CompileError::UntypedVariable {
                    name: var.name.clone(),
                });
            }
        }

        for line in self.rpn_code.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(&command) = tokens.first() else {
                continue;
            };

            let lookup: &str;
            let match_output: bool;
            let mut operand: Option<DataAddr> = None;

            match command {
                "CONST" => {
                    let params = expect_params(&tokens, 2, line)?;
                    let td = parse_type(params[0])?;
                    let name = format!("Constant@{const_index}");
                    const_index += 1;
                    let addr = memory.allocate(td.storage_size())?;
                    parse_constant(&mut memory, addr, td, params[1])?;
                    let var = inputs.find_mut(&name).ok_or(CompileError::Internal {
                        detail: "constant table out of step with the expression",
                    })?;
                    var.location = Some(addr);
                    type_stack.push(StackedType::scalar(VariableDescriptor::scalar(td)));
                    lookup = "READ";
                    match_output = true;
                    operand = Some(addr);
                }
                "CAST" => {
                    let params = expect_params(&tokens, 1, line)?;
                    let td = parse_type(params[0])?;
                    type_stack.push(StackedType::scalar(VariableDescriptor::scalar(td)));
                    lookup = "CAST";
                    match_output = true;
                }
                "WRITE" => {
                    let name = expect_params(&tokens, 1, line)?[0];
                    let var = outputs.find_mut(name).ok_or(CompileError::Internal {
                        detail: "output table out of step with the expression",
                    })?;
                    if var.descriptor.is_none() {
                        // Untyped destination takes the type of the value
                        // about to be stored.
                        let top = peek(&type_stack, 0).ok_or_else(|| {
                            CompileError::TypeStackUnderflow {
                                command: "WRITE".to_string(),
                            }
                        })?;
                        var.descriptor = Some(top.descriptor.clone());
                        var.dims = top.dims;
                    }
                    let descriptor = var.descriptor.clone().ok_or(CompileError::Internal {
                        detail: "descriptor vanished during WRITE",
                    })?;
                    ensure_allocated(var, &descriptor, &mut memory, &mut pool_f32, &mut pool_f64)?;
                    type_stack.push(StackedType {
                        descriptor,
                        dims: var.dims,
                    });
                    lookup = if var.is_external() { "RWRITE" } else { "WRITE" };
                    match_output = true;
                    operand = var.location;
                    var.written = true;
                }
                "READ" => {
                    let name = expect_params(&tokens, 1, line)?[0];
                    // An already-written output is read back in place; a name
                    // whose WRITE is still ahead resolves to the input table.
                    let written = outputs.find(name).map(|v| v.written).unwrap_or(false);
                    let var = if written {
                        outputs.find_mut(name).ok_or(CompileError::Internal {
                            detail: "output lookup raced its own table",
                        })?
                    } else {
                        inputs.find_mut(name).ok_or_else(|| CompileError::UnknownVariable {
                            name: name.to_string(),
                        })?
                    };
                    let descriptor =
                        var.descriptor.clone().ok_or_else(|| CompileError::UntypedVariable {
                            name: name.to_string(),
                        })?;
                    ensure_allocated(var, &descriptor, &mut memory, &mut pool_f32, &mut pool_f64)?;
                    type_stack.push(StackedType {
                        descriptor,
                        dims: var.dims,
                    });
                    lookup = if var.is_external() { "RREAD" } else { "READ" };
                    match_output = true;
                    operand = var.location;
                }
                other => {
                    expect_params(&tokens, 0, line)?;
                    lookup = other;
                    match_output = false;
                }
            }

            let pc = self.registry.find(lookup, &type_stack, match_output)?;
            let record = self.registry.record(pc).ok_or(CompileError::Internal {
                detail: "resolved opcode out of registry range",
            })?;

            let mut temps: Vec<VariableInformation> = Vec::new();
            {
                let mut ctx = UpdateContext {
                    type_stack: &mut type_stack,
                    stack_size: &mut stack_size,
                    temporaries: &mut temps,
                    next_temp_id: &mut next_temp,
                };
                match record.update {
                    StackUpdate::Default => record.default_update(&mut ctx, match_output)?,
                    StackUpdate::Custom(update) => update(record, &mut ctx)?,
                }
            }

            code.push(pc);
            if let Some(addr) = operand {
                code.push(addr);
            }
            for mut temp in temps {
                let descriptor = temp.descriptor.clone().ok_or(CompileError::Internal {
                    detail: "temporary without a descriptor",
                })?;
                ensure_allocated(&mut temp, &descriptor, &mut memory, &mut pool_f32, &mut pool_f64)?;
                let addr = temp.location.ok_or(CompileError::Internal {
                    detail: "temporary without a slot",
                })?;
                code.push(addr);
                type_stack.push(StackedType {
                    descriptor,
                    dims: temp.dims,
                });
                outputs.add(temp);
            }

            if stack_size > max_stack {
                max_stack = stack_size;
            }
        }

        if !type_stack.is_empty() {
            return Err(CompileError::UnbalancedExpression {
                leftover: type_stack.len(),
            });
        }

        self.inputs = inputs;
        self.outputs = outputs;
        self.memory = memory;
        self.pool_f32 = pool_f32;
        self.pool_f64 = pool_f64;
        self.code = code;
        self.stack.resize(max_stack);
        self.compiled = true;
        self.runtime_error = RuntimeErrorFlags::default();
        Ok(())
    }
}

fn reset_layout(table: &mut VariableTable) {
    for var in table.iter_mut() {
        var.location = None;
        var.matrix_index = None;
        var.written = false;
    }
}

fn expect_params<'a>(
    tokens: &[&'a str],
    count: usize,
    line: &str,
) -> Result<Vec<&'a str>, CompileError> {
    if tokens.len() != count + 1 {
        return Err(CompileError::MalformedLine {
            line: line.trim().to_string(),
        });
    }
    Ok(tokens[1..].to_vec())
}

fn parse_type(name: &str) -> Result<TypeDescriptor, CompileError> {
    TypeDescriptor::from_name(name).ok_or_else(|| CompileError::UnknownType {
        name: name.to_string(),
    })
}

fn parse_constant(
    memory: &mut DataMemory,
    addr: DataAddr,
    td: TypeDescriptor,
    text: &str,
) -> Result<(), CompileError> {
    macro_rules! store {
        ($ty:ty) => {{
            let value: $ty = text.parse().map_err(|_| CompileError::InvalidConstant {
                value: text.to_string(),
                ty: td,
            })?;
            memory.write(addr, value);
        }};
    }
    match td {
        TypeDescriptor::Float64 => store!(f64),
        TypeDescriptor::Float32 => store!(f32),
        TypeDescriptor::UInt64 => store!(u64),
        TypeDescriptor::Int64 => store!(i64),
        TypeDescriptor::UInt32 => store!(u32),
        TypeDescriptor::Int32 => store!(i32),
        TypeDescriptor::UInt16 => store!(u16),
        TypeDescriptor::Int16 => store!(i16),
        TypeDescriptor::UInt8 => store!(u8),
        TypeDescriptor::Int8 => store!(i8),
    }
    Ok(())
}

/// Assign a data-memory slot (and, for matrices, a payload pool entry) on
/// first use. Externally bound scalars get a pointer slot; matrices get a
/// slot holding their pool index.
fn ensure_allocated(
    var: &mut VariableInformation,
    descriptor: &VariableDescriptor,
    memory: &mut DataMemory,
    pool_f32: &mut MatrixPool<f32>,
    pool_f64: &mut MatrixPool<f64>,
) -> Result<(), CompileError> {
    if var.location.is_some() {
        return Ok(());
    }
    if descriptor.is_scalar() {
        if let Some(ptr) = var.external {
            let addr = memory.allocate(PTR_SIZE)?;
            memory.write_ptr(addr, ptr);
            var.location = Some(addr);
        } else {
            var.location = Some(memory.allocate(descriptor.type_descriptor.storage_size())?);
        }
        return Ok(());
    }
    if !descriptor.is_valid_matrix() {
        return Err(CompileError::UnsupportedVariableType {
            name: var.name.clone(),
            descriptor: descriptor.clone(),
        });
    }
    let dims = var.dims.ok_or_else(|| CompileError::UnknownDimensions {
        name: var.name.clone(),
    })?;
    let index = match descriptor.type_descriptor {
        TypeDescriptor::Float32 => pool_f32.add(matrix_storage::<f32>(dims, var.external)),
        TypeDescriptor::Float64 => pool_f64.add(matrix_storage::<f64>(dims, var.external)),
        _ => {
            return Err(CompileError::Internal {
                detail: "valid matrix with non-float element type",
            })
        }
    };
    var.matrix_index = Some(index);
    let addr = memory.allocate(std::mem::size_of::<u16>())?;
    memory.write::<u16>(addr, index);
    var.location = Some(addr);
    Ok(())
}

fn matrix_storage<T: Copy + Default>(dims: MatrixSize, external: Option<usize>) -> MatrixStorage<T> {
    match external {
        Some(ptr) => MatrixStorage::external(dims, ptr as *mut T),
        None => MatrixStorage::owned(dims),
    }
}
