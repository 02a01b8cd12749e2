//! Leaf crate of the rteval workspace: the numeric type system shared by the
//! compiler and the execution engine.
//!
//! Everything here is a small copy type or a pure function: scalar type
//! descriptors, variable descriptors with matrix modifiers, the byte codec
//! that moves primitives on and off the untyped data stack, and the
//! saturating numeric conversion used by casts and narrowing writes.

pub mod descriptor;
pub mod safe;
pub mod value;

pub use descriptor::{MatrixSize, TypeDescriptor, VariableDescriptor};
pub use safe::safe_cast;
pub use value::StackValue;
