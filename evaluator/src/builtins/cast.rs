//! Explicit type conversion: the full source-by-target grid.
//!
//! A `CAST type` line pushes the target type and resolves against the
//! current stack top, so every (source, target) pair gets its own record.
//! Lossy conversions saturate and raise the out-of-range flag.

use num_traits::{Bounded, NumCast, ToPrimitive, Zero};
use types::{safe_cast, StackValue, TypeDescriptor};

use super::scalar;
use crate::evaluator::RuntimeEvaluator;
use crate::registry::{FunctionRecord, FunctionRegistry};

fn casting<T1, T2>(ev: &mut RuntimeEvaluator)
where
    T1: StackValue + ToPrimitive + Zero + PartialOrd,
    T2: StackValue + NumCast + Bounded,
{
    let value: T1 = ev.pop();
    let (out, ok) = safe_cast::<T1, T2>(value);
    if !ok {
        ev.runtime_error.out_of_range = true;
    }
    ev.push(out);
}

macro_rules! register_cast {
    ($reg:ident, $t1:ty, $td1:ident, $t2:ty, $td2:ident) => {
        $reg.register(FunctionRecord::new(
            "CAST",
            vec![scalar(TypeDescriptor::$td1)],
            vec![scalar(TypeDescriptor::$td2)],
            casting::<$t1, $t2>,
        ));
    };
}

macro_rules! register_cast_sources {
    ($reg:ident, $t2:ty, $td2:ident) => {
        register_cast!($reg, f64, Float64, $t2, $td2);
        register_cast!($reg, f32, Float32, $t2, $td2);
        register_cast!($reg, u64, UInt64, $t2, $td2);
        register_cast!($reg, i64, Int64, $t2, $td2);
        register_cast!($reg, u32, UInt32, $t2, $td2);
        register_cast!($reg, i32, Int32, $t2, $td2);
        register_cast!($reg, u16, UInt16, $t2, $td2);
        register_cast!($reg, i16, Int16, $t2, $td2);
        register_cast!($reg, u8, UInt8, $t2, $td2);
        register_cast!($reg, i8, Int8, $t2, $td2);
    };
}

pub(super) fn register(reg: &mut FunctionRegistry) {
    register_cast_sources!(reg, f64, Float64);
    register_cast_sources!(reg, f32, Float32);
    register_cast_sources!(reg, u64, UInt64);
    register_cast_sources!(reg, i64, Int64);
    register_cast_sources!(reg, u32, UInt32);
    register_cast_sources!(reg, i32, Int32);
    register_cast_sources!(reg, u16, UInt16);
    register_cast_sources!(reg, i16, Int16);
    register_cast_sources!(reg, u8, UInt8);
    register_cast_sources!(reg, i8, Int8);
}
