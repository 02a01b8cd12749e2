//! The byte-addressed operand stack.
//!
//! This is the one module that turns typed values into raw stack offsets.
//! There are no runtime type tags: the compiler's size accounting is the
//! sole guarantee that a `pop::<T>` sees bytes a matching `push::<T>` wrote.
//! An access outside the pre-sized buffer therefore indicates a compiler or
//! engine bug; it never panics or wraps, it latches a fault that the engine
//! reports as an internal setup error.

use types::StackValue;

/// LIFO byte buffer sized once at compile time and reused across runs.
#[derive(Debug, Default)]
pub struct DataStack {
    bytes: Vec<u8>,
    cursor: usize,
    fault: bool,
}

impl DataStack {
    pub fn new() -> DataStack {
        DataStack::default()
    }

    /// Size the buffer for a freshly compiled program and reset the cursor.
    pub fn resize(&mut self, size: usize) {
        self.bytes.clear();
        self.bytes.resize(size, 0);
        self.cursor = 0;
        self.fault = false;
    }

    /// Rewind to origin at the start of an execution.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.fault = false;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// True once any push or pop fell outside the buffer.
    pub fn fault(&self) -> bool {
        self.fault
    }

    #[inline(always)]
    pub fn push<T: StackValue>(&mut self, value: T) {
        let end = self.cursor + T::SIZE;
        if end > self.bytes.len() {
            self.fault = true;
            return;
        }
        value.write_to(&mut self.bytes[self.cursor..end]);
        self.cursor = end;
    }

    #[inline(always)]
    pub fn pop<T: StackValue>(&mut self) -> T {
        if self.cursor < T::SIZE {
            self.fault = true;
            return T::default();
        }
        self.cursor -= T::SIZE;
        T::read_from(&self.bytes[self.cursor..])
    }
}
