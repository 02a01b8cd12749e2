use types::{MatrixSize, StackValue, TypeDescriptor, VariableDescriptor};

use crate::error::{CompileError, RuntimeErrorFlags};
use crate::memory::{DataMemory, MatrixPool};
use crate::registry::FunctionRegistry;
use crate::stack::DataStack;
use crate::variables::{VariableInformation, VariableTable};
use crate::{CodeElement, DataAddr};

/// Per-call execution policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run the whole code stream, check invariants once at the end.
    #[default]
    Fast,
    /// Verify the stack and the error flags after every opcode and stop at
    /// the first fault.
    Safe,
}

/// A matrix element type with a payload pool on the evaluator.
pub trait MatrixElem: StackValue + num_traits::Float {
    fn pool(ev: &RuntimeEvaluator) -> &MatrixPool<Self>;
    fn pool_mut(ev: &mut RuntimeEvaluator) -> &mut MatrixPool<Self>;
}

impl MatrixElem for f32 {
    fn pool(ev: &RuntimeEvaluator) -> &MatrixPool<f32> {
        &ev.pool_f32
    }
    fn pool_mut(ev: &mut RuntimeEvaluator) -> &mut MatrixPool<f32> {
        &mut ev.pool_f32
    }
}

impl MatrixElem for f64 {
    fn pool(ev: &RuntimeEvaluator) -> &MatrixPool<f64> {
        &ev.pool_f64
    }
    fn pool_mut(ev: &mut RuntimeEvaluator) -> &mut MatrixPool<f64> {
        &mut ev.pool_f64
    }
}

/// The evaluator: expression text in, compiled program, repeated execution.
///
/// Lifecycle: [`RuntimeEvaluator::extract_variables`] discovers the free
/// variable names; the caller declares types and binds memory; `compile()`
/// produces the opcode stream; `execute()` runs it any number of times
/// without further allocation.
pub struct RuntimeEvaluator {
    pub(crate) rpn_code: String,
    pub(crate) registry: FunctionRegistry,
    pub(crate) inputs: VariableTable,
    pub(crate) outputs: VariableTable,
    pub(crate) extracted: bool,
    pub(crate) compiled: bool,
    pub(crate) code: Vec<CodeElement>,
    pub(crate) memory: DataMemory,
    pub(crate) stack: DataStack,
    pub(crate) pool_f32: MatrixPool<f32>,
    pub(crate) pool_f64: MatrixPool<f64>,
    ip: usize,
    /// Fault flags of the most recent `execute()`.
    pub runtime_error: RuntimeErrorFlags,
}

impl RuntimeEvaluator {
    /// An evaluator over `rpn_code` with the standard builtin operator set.
    pub fn new(rpn_code: &str) -> RuntimeEvaluator {
        RuntimeEvaluator::with_registry(rpn_code, FunctionRegistry::standard())
    }

    /// An evaluator with a caller-supplied registry.
    pub fn with_registry(rpn_code: &str, registry: FunctionRegistry) -> RuntimeEvaluator {
        RuntimeEvaluator {
            rpn_code: rpn_code.to_string(),
            registry,
            inputs: VariableTable::new(),
            outputs: VariableTable::new(),
            extracted: false,
            compiled: false,
            code: Vec::new(),
            memory: DataMemory::new(),
            stack: DataStack::new(),
            pool_f32: MatrixPool::new(),
            pool_f64: MatrixPool::new(),
            ip: 0,
            runtime_error: RuntimeErrorFlags::default(),
        }
    }

    pub fn expression(&self) -> &str {
        &self.rpn_code
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    // ---- variable declaration and binding -------------------------------

    pub fn browse_input_variables(&self) -> impl Iterator<Item = &VariableInformation> {
        self.inputs.iter()
    }

    pub fn browse_output_variables(&self) -> impl Iterator<Item = &VariableInformation> {
        self.outputs.iter()
    }

    pub fn set_input_variable_type(
        &mut self,
        name: &str,
        descriptor: VariableDescriptor,
    ) -> Result<(), CompileError> {
        Self::declare(&mut self.inputs, name, descriptor)
    }

    pub fn set_output_variable_type(
        &mut self,
        name: &str,
        descriptor: VariableDescriptor,
    ) -> Result<(), CompileError> {
        Self::declare(&mut self.outputs, name, descriptor)
    }

    fn declare(
        table: &mut VariableTable,
        name: &str,
        descriptor: VariableDescriptor,
    ) -> Result<(), CompileError> {
        let var = table.find_mut(name).ok_or_else(|| CompileError::UnknownVariable {
            name: name.to_string(),
        })?;
        if let Some(existing) = &var.descriptor {
            if !existing.same_as(&descriptor) {
                return Err(CompileError::VariableTypeConflict {
                    name: name.to_string(),
                    declared: existing.clone(),
                    requested: descriptor,
                });
            }
        }
        var.descriptor = Some(descriptor);
        Ok(())
    }

    /// Bind caller-owned memory to a scalar input variable.
    ///
    /// # Safety
    /// `ptr` must be valid, aligned, and writable for the life of the
    /// binding; the evaluator dereferences it on every execution and never
    /// frees it.
    pub unsafe fn set_input_variable_memory<T: StackValue>(
        &mut self,
        name: &str,
        ptr: *mut T,
    ) -> Result<(), CompileError> {
        self.bind_scalar(false, name, ptr as usize, T::TYPE)
    }

    /// Bind caller-owned memory to a scalar output variable.
    ///
    /// # Safety
    /// Same contract as [`Self::set_input_variable_memory`].
    pub unsafe fn set_output_variable_memory<T: StackValue>(
        &mut self,
        name: &str,
        ptr: *mut T,
    ) -> Result<(), CompileError> {
        self.bind_scalar(true, name, ptr as usize, T::TYPE)
    }

    fn bind_scalar(
        &mut self,
        output: bool,
        name: &str,
        ptr: usize,
        td: TypeDescriptor,
    ) -> Result<(), CompileError> {
        let compiled = self.compiled;
        let table = if output { &mut self.outputs } else { &mut self.inputs };
        let var = table.find_mut(name).ok_or_else(|| CompileError::UnknownVariable {
            name: name.to_string(),
        })?;
        let descriptor = VariableDescriptor::scalar(td);
        if let Some(existing) = &var.descriptor {
            if !existing.same_as(&descriptor) {
                return Err(CompileError::VariableTypeConflict {
                    name: name.to_string(),
                    declared: existing.clone(),
                    requested: descriptor,
                });
            }
        }
        if compiled {
            // Rebinding between executions: refresh the pointer slot the
            // program already reads through.
            if !var.is_external() {
                return Err(CompileError::LateBinding {
                    name: name.to_string(),
                });
            }
            let location = var.location.ok_or(CompileError::Internal {
                detail: "external variable without a slot",
            })?;
            var.external = Some(ptr);
            self.memory.write_ptr(location, ptr);
            return Ok(());
        }
        var.descriptor = Some(descriptor);
        var.external = Some(ptr);
        Ok(())
    }

    /// Bind caller-owned memory to a matrix input variable, declaring its
    /// shape.
    ///
    /// # Safety
    /// `ptr` must be valid, aligned, and cover `rows * cols` elements for
    /// the life of the binding.
    pub unsafe fn set_input_matrix_memory<T: MatrixElem>(
        &mut self,
        name: &str,
        ptr: *mut T,
        rows: usize,
        cols: usize,
    ) -> Result<(), CompileError> {
        self.bind_matrix::<T>(false, name, ptr as usize, MatrixSize::new(rows, cols))
    }

    /// Bind caller-owned memory to a matrix output variable.
    ///
    /// # Safety
    /// Same contract as [`Self::set_input_matrix_memory`].
    pub unsafe fn set_output_matrix_memory<T: MatrixElem>(
        &mut self,
        name: &str,
        ptr: *mut T,
        rows: usize,
        cols: usize,
    ) -> Result<(), CompileError> {
        self.bind_matrix::<T>(true, name, ptr as usize, MatrixSize::new(rows, cols))
    }

    fn bind_matrix<T: MatrixElem>(
        &mut self,
        output: bool,
        name: &str,
        ptr: usize,
        dims: MatrixSize,
    ) -> Result<(), CompileError> {
        let compiled = self.compiled;
        let descriptor = VariableDescriptor::matrix(T::TYPE);
        let table = if output { &mut self.outputs } else { &mut self.inputs };
        let var = table.find_mut(name).ok_or_else(|| CompileError::UnknownVariable {
            name: name.to_string(),
        })?;
        if let Some(existing) = &var.descriptor {
            if !existing.same_as(&descriptor) {
                return Err(CompileError::VariableTypeConflict {
                    name: name.to_string(),
                    declared: existing.clone(),
                    requested: descriptor,
                });
            }
        }
        if compiled {
            if !var.is_external() {
                return Err(CompileError::LateBinding {
                    name: name.to_string(),
                });
            }
            let index = var.matrix_index.ok_or(CompileError::Internal {
                detail: "external matrix without a pool entry",
            })?;
            let name = name.to_string();
            var.external = Some(ptr);
            let rebound = T::pool_mut(self)
                .get_mut(index)
                .map(|m| m.rebind(ptr as *mut T, dims))
                .unwrap_or(false);
            if !rebound {
                return Err(CompileError::UnknownDimensions { name });
            }
            return Ok(());
        }
        var.descriptor = Some(descriptor);
        var.dims = Some(dims);
        var.external = Some(ptr);
        Ok(())
    }

    // ---- typed access to engine-owned storage ---------------------------

    /// Store a value into an engine-owned scalar input variable.
    pub fn set_input_value<T: StackValue>(
        &mut self,
        name: &str,
        value: T,
    ) -> Result<(), CompileError> {
        if !self.compiled {
            return Err(CompileError::NotCompiled);
        }
        let location = Self::owned_scalar_location(&self.inputs, name, T::TYPE)?;
        self.memory.write(location, value);
        Ok(())
    }

    /// Read the value of an engine-owned scalar output variable.
    pub fn output_value<T: StackValue>(&self, name: &str) -> Result<T, CompileError> {
        if !self.compiled {
            return Err(CompileError::NotCompiled);
        }
        let location = Self::owned_scalar_location(&self.outputs, name, T::TYPE)?;
        Ok(self.memory.read(location))
    }

    /// Copy out the elements of an engine-owned matrix output variable.
    pub fn output_matrix_value<T: MatrixElem>(
        &self,
        name: &str,
    ) -> Result<(MatrixSize, Vec<T>), CompileError> {
        if !self.compiled {
            return Err(CompileError::NotCompiled);
        }
        let var = self.outputs.find(name).ok_or_else(|| CompileError::UnknownVariable {
            name: name.to_string(),
        })?;
        let index = var.matrix_index.ok_or_else(|| CompileError::NotMatrix {
            command: "output_matrix_value".to_string(),
            operand: name.to_string(),
        })?;
        let storage = T::pool(self).get(index).ok_or(CompileError::Internal {
            detail: "matrix variable without a pool entry",
        })?;
        Ok((storage.size(), storage.as_slice().to_vec()))
    }

    fn owned_scalar_location(
        table: &VariableTable,
        name: &str,
        td: TypeDescriptor,
    ) -> Result<DataAddr, CompileError> {
        let var = table.find(name).ok_or_else(|| CompileError::UnknownVariable {
            name: name.to_string(),
        })?;
        if var.is_external() {
            return Err(CompileError::NotEngineOwned {
                name: name.to_string(),
            });
        }
        let descriptor = VariableDescriptor::scalar(td);
        match &var.descriptor {
            Some(existing) if existing.same_as(&descriptor) => {}
            Some(existing) => {
                return Err(CompileError::VariableTypeConflict {
                    name: name.to_string(),
                    declared: existing.clone(),
                    requested: descriptor,
                })
            }
            None => {
                return Err(CompileError::UntypedVariable {
                    name: name.to_string(),
                })
            }
        }
        var.location.ok_or(CompileError::Internal {
            detail: "variable without a slot after compile",
        })
    }

    // ---- program geometry ----------------------------------------------

    /// Number of elements in the compiled code stream.
    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    /// Bytes of variable data memory.
    pub fn data_size(&self) -> usize {
        self.memory.len()
    }

    /// Bytes allocated for the data stack.
    pub fn stack_capacity(&self) -> usize {
        self.stack.capacity()
    }

    // ---- execution ------------------------------------------------------

    /// Run the compiled program once. Returns (and stores) the fault flags.
    pub fn execute(&mut self, mode: ExecutionMode) -> RuntimeErrorFlags {
        self.runtime_error = RuntimeErrorFlags::default();
        if !self.compiled {
            self.runtime_error.internal_setup_error = true;
            return self.runtime_error;
        }
        self.stack.reset();
        self.memory.clear_fault();
        self.ip = 0;
        let mut completed = true;
        while self.ip < self.code.len() {
            let pc = self.code[self.ip];
            self.ip += 1;
            let Some(action) = self.registry.record(pc).map(|r| r.action) else {
                self.runtime_error.internal_setup_error = true;
                completed = false;
                break;
            };
            action(self);
            if mode == ExecutionMode::Safe
                && (self.stack.fault() || self.memory.fault() || !self.runtime_error.is_clear())
            {
                if self.ip < self.code.len() {
                    self.runtime_error.not_completed = true;
                    completed = false;
                }
                break;
            }
        }
        if self.stack.fault() || self.memory.fault() {
            self.runtime_error.internal_setup_error = true;
        }
        // A balanced program ends with the cursor back at origin.
        if completed && self.stack.cursor() != 0 {
            self.runtime_error.internal_setup_error = true;
        }
        self.runtime_error
    }

    // ---- action-side primitives ----------------------------------------

    #[inline(always)]
    pub fn push<T: StackValue>(&mut self, value: T) {
        self.stack.push(value);
    }

    #[inline(always)]
    pub fn pop<T: StackValue>(&mut self) -> T {
        self.stack.pop()
    }

    /// Fetch the next inline operand from the code stream.
    pub fn next_code(&mut self) -> CodeElement {
        match self.code.get(self.ip) {
            Some(&element) => {
                self.ip += 1;
                element
            }
            None => {
                self.runtime_error.internal_setup_error = true;
                0
            }
        }
    }

    #[inline(always)]
    pub fn variable_read<T: StackValue>(&self, addr: DataAddr) -> T {
        self.memory.read(addr)
    }

    #[inline(always)]
    pub fn variable_write<T: StackValue>(&mut self, addr: DataAddr, value: T) {
        self.memory.write(addr, value);
    }

    pub fn remote_read<T: StackValue>(&self, addr: DataAddr) -> T {
        self.memory.remote_read(addr)
    }

    pub fn remote_write<T: StackValue>(&mut self, addr: DataAddr, value: T) {
        self.memory.remote_write(addr, value);
    }

    fn matrix_pool_index(&self, addr: DataAddr) -> u16 {
        self.memory.read::<u16>(addr)
    }

    /// Element-wise `out = a + b` over three matrix variable slots.
    pub fn matrix_add_into<T: MatrixElem>(
        &mut self,
        a: DataAddr,
        b: DataAddr,
        out: DataAddr,
    ) {
        let (ia, ib, io) = (
            self.matrix_pool_index(a),
            self.matrix_pool_index(b),
            self.matrix_pool_index(out),
        );
        let ok = {
            let pool = T::pool_mut(self);
            match pool.pair_and_dest(ia, ib, io) {
                Some((sa, sb, sd)) if sa.len() == sd.len() && sb.len() == sd.len() => {
                    for i in 0..sd.len() {
                        sd[i] = sa[i] + sb[i];
                    }
                    true
                }
                _ => false,
            }
        };
        if !ok {
            self.runtime_error.internal_setup_error = true;
        }
    }

    /// Element-wise `out = m * k`.
    pub fn matrix_scale_into<T: MatrixElem>(&mut self, m: DataAddr, k: T, out: DataAddr) {
        let (im, io) = (self.matrix_pool_index(m), self.matrix_pool_index(out));
        let ok = {
            let pool = T::pool_mut(self);
            match pool.src_and_dest(im, io) {
                Some((src, dest)) if src.len() == dest.len() => {
                    for i in 0..dest.len() {
                        dest[i] = src[i] * k;
                    }
                    true
                }
                _ => false,
            }
        };
        if !ok {
            self.runtime_error.internal_setup_error = true;
        }
    }

    /// `out = src`, element for element.
    pub fn matrix_copy_into<T: MatrixElem>(&mut self, src: DataAddr, out: DataAddr) {
        let (is, io) = (self.matrix_pool_index(src), self.matrix_pool_index(out));
        if is == io {
            // Writing a matrix onto itself is a no-op, not a fault.
            return;
        }
        let ok = {
            let pool = T::pool_mut(self);
            match pool.src_and_dest(is, io) {
                Some((src, dest)) if src.len() == dest.len() => {
                    dest.copy_from_slice(src);
                    true
                }
                _ => false,
            }
        };
        if !ok {
            self.runtime_error.internal_setup_error = true;
        }
    }
}
