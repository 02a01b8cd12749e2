//! Variable data memory and matrix payload storage.
//!
//! Scalar variables live inline in a flat byte area addressed by 16-bit
//! offsets assigned at compile time. Externally bound scalars store the
//! caller's pointer in their slot instead; matrix variables store an index
//! into a typed payload pool. Every raw-pointer dereference in the engine
//! happens in this module, under the validity contract the `unsafe` binding
//! calls on [`crate::RuntimeEvaluator`] establish.

use std::cell::Cell;

use types::{MatrixSize, StackValue};

use crate::error::CompileError;
use crate::DataAddr;

/// Byte footprint of an external-pointer slot.
pub const PTR_SIZE: usize = std::mem::size_of::<usize>();

/// Flat, compile-time-allocated variable area.
///
/// An access outside the image indicates a compiler or engine bookkeeping
/// bug; like [`crate::stack::DataStack`], it never panics, it latches a
/// fault the engine reports as an internal setup error.
#[derive(Debug, Default, Clone)]
pub struct DataMemory {
    bytes: Vec<u8>,
    fault: Cell<bool>,
}

impl DataMemory {
    pub fn new() -> DataMemory {
        DataMemory::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True once any access fell outside the image.
    pub fn fault(&self) -> bool {
        self.fault.get()
    }

    pub fn clear_fault(&self) {
        self.fault.set(false);
    }

    /// Reserve `size` bytes and return their offset. Only the compiler
    /// allocates; execution works on a fixed image.
    pub fn allocate(&mut self, size: usize) -> Result<DataAddr, CompileError> {
        let addr = self.bytes.len();
        if addr + size > DataAddr::MAX as usize {
            return Err(CompileError::DataMemoryExhausted);
        }
        self.bytes.resize(addr + size, 0);
        Ok(addr as DataAddr)
    }

    #[inline(always)]
    pub fn read<T: StackValue>(&self, addr: DataAddr) -> T {
        let at = addr as usize;
        if at + T::SIZE <= self.bytes.len() {
            T::read_from(&self.bytes[at..])
        } else {
            self.fault.set(true);
            T::default()
        }
    }

    #[inline(always)]
    pub fn write<T: StackValue>(&mut self, addr: DataAddr, value: T) {
        let at = addr as usize;
        if at + T::SIZE <= self.bytes.len() {
            value.write_to(&mut self.bytes[at..]);
        } else {
            self.fault.set(true);
        }
    }

    pub fn read_ptr(&self, addr: DataAddr) -> usize {
        let at = addr as usize;
        if at + PTR_SIZE > self.bytes.len() {
            self.fault.set(true);
            return 0;
        }
        let mut raw = [0u8; PTR_SIZE];
        raw.copy_from_slice(&self.bytes[at..at + PTR_SIZE]);
        usize::from_ne_bytes(raw)
    }

    pub fn write_ptr(&mut self, addr: DataAddr, ptr: usize) {
        let at = addr as usize;
        if at + PTR_SIZE <= self.bytes.len() {
            self.bytes[at..at + PTR_SIZE].copy_from_slice(&ptr.to_ne_bytes());
        } else {
            self.fault.set(true);
        }
    }

    /// Read a scalar through an external-pointer slot.
    pub fn remote_read<T: StackValue>(&self, addr: DataAddr) -> T {
        let ptr = self.read_ptr(addr) as *const T;
        if ptr.is_null() {
            return T::default();
        }
        // Validity and lifetime guaranteed by the unsafe binding call.
        unsafe { ptr.read_unaligned() }
    }

    /// Write a scalar through an external-pointer slot.
    pub fn remote_write<T: StackValue>(&mut self, addr: DataAddr, value: T) {
        let ptr = self.read_ptr(addr) as *mut T;
        if ptr.is_null() {
            return;
        }
        unsafe { ptr.write_unaligned(value) }
    }
}

/// Backing store of one matrix variable.
#[derive(Debug)]
enum MatrixBacking<T> {
    Owned(Vec<T>),
    External(*mut T),
}

/// A matrix payload: fixed shape, engine-owned or caller-owned elements.
#[derive(Debug)]
pub struct MatrixStorage<T> {
    size: MatrixSize,
    backing: MatrixBacking<T>,
}

impl<T: Copy + Default> MatrixStorage<T> {
    pub fn owned(size: MatrixSize) -> MatrixStorage<T> {
        MatrixStorage {
            size,
            backing: MatrixBacking::Owned(vec![T::default(); size.elements()]),
        }
    }

    /// Caller-owned elements; `ptr` must stay valid, aligned, and cover
    /// `size.elements()` values for the life of the binding.
    pub fn external(size: MatrixSize, ptr: *mut T) -> MatrixStorage<T> {
        MatrixStorage {
            size,
            backing: MatrixBacking::External(ptr),
        }
    }

    pub fn size(&self) -> MatrixSize {
        self.size
    }

    /// Swap the backing pointer of an external matrix; shape must match.
    pub fn rebind(&mut self, ptr: *mut T, size: MatrixSize) -> bool {
        if self.size != size || !matches!(self.backing, MatrixBacking::External(_)) {
            return false;
        }
        self.backing = MatrixBacking::External(ptr);
        true
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.backing {
            MatrixBacking::Owned(data) => data,
            MatrixBacking::External(ptr) => unsafe {
                std::slice::from_raw_parts(*ptr, self.size.elements())
            },
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.backing {
            MatrixBacking::Owned(data) => data,
            MatrixBacking::External(ptr) => unsafe {
                std::slice::from_raw_parts_mut(*ptr, self.size.elements())
            },
        }
    }
}

/// All matrix payloads of one element type, indexed by the 16-bit value a
/// matrix variable's memory slot holds.
#[derive(Debug, Default)]
pub struct MatrixPool<T> {
    entries: Vec<MatrixStorage<T>>,
}

impl<T: Copy + Default> MatrixPool<T> {
    pub fn new() -> MatrixPool<T> {
        MatrixPool {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, storage: MatrixStorage<T>) -> u16 {
        self.entries.push(storage);
        (self.entries.len() - 1) as u16
    }

    pub fn get(&self, index: u16) -> Option<&MatrixStorage<T>> {
        self.entries.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u16) -> Option<&mut MatrixStorage<T>> {
        self.entries.get_mut(index as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Two sources and a destination distinct from both. Sources may
    /// coincide. Returns `None` on any out-of-range or aliasing index.
    pub fn pair_and_dest(
        &mut self,
        a: u16,
        b: u16,
        dest: u16,
    ) -> Option<(&[T], &[T], &mut [T])> {
        let n = self.entries.len();
        let (a, b, dest) = (a as usize, b as usize, dest as usize);
        if a >= n || b >= n || dest >= n || dest == a || dest == b {
            return None;
        }
        let base = self.entries.as_mut_ptr();
        // Disjointness of `dest` from `a` and `b` checked above.
        unsafe {
            let sa = (*base.add(a)).as_slice();
            let sb = (*base.add(b)).as_slice();
            let sd = (*base.add(dest)).as_mut_slice();
            Some((sa, sb, sd))
        }
    }

    /// One source and a distinct destination.
    pub fn src_and_dest(&mut self, src: u16, dest: u16) -> Option<(&[T], &mut [T])> {
        let n = self.entries.len();
        let (src, dest) = (src as usize, dest as usize);
        if src >= n || dest >= n || dest == src {
            return None;
        }
        let base = self.entries.as_mut_ptr();
        unsafe {
            let ss = (*base.add(src)).as_slice();
            let sd = (*base.add(dest)).as_mut_slice();
            Some((ss, sd))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_sequential() {
        let mut mem = DataMemory::new();
        assert_eq!(mem.allocate(4).unwrap(), 0);
        assert_eq!(mem.allocate(1).unwrap(), 4);
        assert_eq!(mem.allocate(8).unwrap(), 5);
        assert_eq!(mem.len(), 13);
    }

    #[test]
    fn scalar_round_trip() {
        let mut mem = DataMemory::new();
        let a = mem.allocate(8).unwrap();
        mem.write(a, -2.5f64);
        assert_eq!(mem.read::<f64>(a), -2.5);
    }

    #[test]
    fn out_of_bounds_access_latches_fault() {
        let mut mem = DataMemory::new();
        let a = mem.allocate(4).unwrap();
        mem.write(a, 1u32);
        assert!(!mem.fault());

        assert_eq!(mem.read::<u32>(2), 0);
        assert!(mem.fault());
        mem.clear_fault();

        mem.write(2, 1u32);
        assert!(mem.fault());
        mem.clear_fault();
        // The stray write touched nothing.
        assert_eq!(mem.read::<u32>(a), 1);
        assert!(!mem.fault());
    }

    #[test]
    fn remote_round_trip() {
        let mut mem = DataMemory::new();
        let slot = mem.allocate(PTR_SIZE).unwrap();
        let mut target = 11u32;
        mem.write_ptr(slot, &mut target as *mut u32 as usize);
        assert_eq!(mem.remote_read::<u32>(slot), 11);
        mem.remote_write(slot, 42u32);
        assert_eq!(target, 42);
    }

    #[test]
    fn pool_rejects_aliased_destination() {
        let mut pool: MatrixPool<f32> = MatrixPool::new();
        let a = pool.add(MatrixStorage::owned(MatrixSize::new(2, 2)));
        let b = pool.add(MatrixStorage::owned(MatrixSize::new(2, 2)));
        assert!(pool.pair_and_dest(a, b, a).is_none());
        assert!(pool.pair_and_dest(a, a, b).is_some());
    }

    #[test]
    fn pool_pair_and_dest_writes_through() {
        let mut pool: MatrixPool<f64> = MatrixPool::new();
        let a = pool.add(MatrixStorage::owned(MatrixSize::new(1, 2)));
        let b = pool.add(MatrixStorage::owned(MatrixSize::new(1, 2)));
        let c = pool.add(MatrixStorage::owned(MatrixSize::new(1, 2)));
        pool.get_mut(a).unwrap().as_mut_slice().copy_from_slice(&[1.0, 2.0]);
        pool.get_mut(b).unwrap().as_mut_slice().copy_from_slice(&[10.0, 20.0]);
        let (sa, sb, sc) = pool.pair_and_dest(a, b, c).unwrap();
        for i in 0..sc.len() {
            sc[i] = sa[i] + sb[i];
        }
        assert_eq!(pool.get(c).unwrap().as_slice(), &[11.0, 22.0]);
    }
}
