//! Variable load and store records.
//!
//! `READ`/`WRITE` move values between data memory and the stack; the
//! reserved `RREAD`/`RWRITE` variants go through an external-pointer slot
//! instead and are substituted by the compiler for externally bound
//! variables. The converting stores land after the exact ones so a matching
//! store never narrows.

use num_traits::{Bounded, NumCast, ToPrimitive, Zero};
use types::{safe_cast, StackValue, TypeDescriptor};

use super::scalar;
use crate::evaluator::RuntimeEvaluator;
use crate::registry::{FunctionRecord, FunctionRegistry};

fn read<T: StackValue>(ev: &mut RuntimeEvaluator) {
    let addr = ev.next_code();
    let value: T = ev.variable_read(addr);
    ev.push(value);
}

fn write<T: StackValue>(ev: &mut RuntimeEvaluator) {
    let addr = ev.next_code();
    let value: T = ev.pop();
    ev.variable_write(addr, value);
}

fn rread<T: StackValue>(ev: &mut RuntimeEvaluator) {
    let addr = ev.next_code();
    let value: T = ev.remote_read(addr);
    ev.push(value);
}

fn rwrite<T: StackValue>(ev: &mut RuntimeEvaluator) {
    let addr = ev.next_code();
    let value: T = ev.pop();
    ev.remote_write(addr, value);
}

fn convert<Tin, Tout>(ev: &mut RuntimeEvaluator, value: Tin) -> Tout
where
    Tin: StackValue + ToPrimitive + Zero + PartialOrd,
    Tout: StackValue + NumCast + Bounded,
{
    let (out, ok) = safe_cast::<Tin, Tout>(value);
    if !ok {
        ev.runtime_error.out_of_range = true;
    }
    out
}

fn write_conv<Tin, Tout>(ev: &mut RuntimeEvaluator)
where
    Tin: StackValue + ToPrimitive + Zero + PartialOrd,
    Tout: StackValue + NumCast + Bounded,
{
    let addr = ev.next_code();
    let value: Tin = ev.pop();
    let out: Tout = convert(ev, value);
    ev.variable_write(addr, out);
}

fn rwrite_conv<Tin, Tout>(ev: &mut RuntimeEvaluator)
where
    Tin: StackValue + ToPrimitive + Zero + PartialOrd,
    Tout: StackValue + NumCast + Bounded,
{
    let addr = ev.next_code();
    let value: Tin = ev.pop();
    let out: Tout = convert(ev, value);
    ev.remote_write(addr, out);
}

macro_rules! register_access {
    ($reg:ident, $t:ty, $td:ident) => {
        $reg.register(FunctionRecord::new(
            "READ",
            vec![],
            vec![scalar(TypeDescriptor::$td)],
            read::<$t>,
        ));
        $reg.register(
            FunctionRecord::new("WRITE", vec![scalar(TypeDescriptor::$td)], vec![], write::<$t>)
                .with_memory_output(scalar(TypeDescriptor::$td)),
        );
        $reg.register(FunctionRecord::new(
            "RREAD",
            vec![],
            vec![scalar(TypeDescriptor::$td)],
            rread::<$t>,
        ));
        $reg.register(
            FunctionRecord::new("RWRITE", vec![scalar(TypeDescriptor::$td)], vec![], rwrite::<$t>)
                .with_memory_output(scalar(TypeDescriptor::$td)),
        );
    };
}

pub(super) fn register(reg: &mut FunctionRegistry) {
    register_access!(reg, f64, Float64);
    register_access!(reg, f32, Float32);
    register_access!(reg, u64, UInt64);
    register_access!(reg, i64, Int64);
    register_access!(reg, u32, UInt32);
    register_access!(reg, i32, Int32);
    register_access!(reg, u16, UInt16);
    register_access!(reg, i16, Int16);
    register_access!(reg, u8, UInt8);
    register_access!(reg, i8, Int8);
}

macro_rules! register_store_conv {
    ($reg:ident, $tin:ty, $tdin:ident, $tout:ty, $tdout:ident) => {
        $reg.register(
            FunctionRecord::new(
                "WRITE",
                vec![scalar(TypeDescriptor::$tdin)],
                vec![],
                write_conv::<$tin, $tout>,
            )
            .with_memory_output(scalar(TypeDescriptor::$tdout)),
        );
        $reg.register(
            FunctionRecord::new(
                "RWRITE",
                vec![scalar(TypeDescriptor::$tdin)],
                vec![],
                rwrite_conv::<$tin, $tout>,
            )
            .with_memory_output(scalar(TypeDescriptor::$tdout)),
        );
    };
}

/// Narrowing stores: a wide stack value into a narrower destination, with
/// saturation and the out-of-range flag on loss.
pub(super) fn register_converting(reg: &mut FunctionRegistry) {
    register_store_conv!(reg, u64, UInt64, u8, UInt8);
    register_store_conv!(reg, u64, UInt64, u16, UInt16);
    register_store_conv!(reg, u64, UInt64, u32, UInt32);
    register_store_conv!(reg, i64, Int64, u8, UInt8);
    register_store_conv!(reg, i64, Int64, u16, UInt16);
    register_store_conv!(reg, i64, Int64, u32, UInt32);
    register_store_conv!(reg, i64, Int64, u64, UInt64);
    register_store_conv!(reg, i64, Int64, i8, Int8);
    register_store_conv!(reg, i64, Int64, i16, Int16);
    register_store_conv!(reg, i64, Int64, i32, Int32);
    register_store_conv!(reg, u32, UInt32, u8, UInt8);
    register_store_conv!(reg, u32, UInt32, u16, UInt16);
    register_store_conv!(reg, i32, Int32, u8, UInt8);
    register_store_conv!(reg, i32, Int32, u16, UInt16);
    register_store_conv!(reg, i32, Int32, u32, UInt32);
    register_store_conv!(reg, i32, Int32, i8, Int8);
    register_store_conv!(reg, i32, Int32, i16, Int16);
}
