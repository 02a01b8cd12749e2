//! Relational operators, producing a `uint8` truth value.
//!
//! Same-type records compare directly. Mixed integer pairs widen both
//! operands into a common test type first; if a value does not fit the test
//! type the comparison reports out-of-range and yields false.

use num_traits::{Bounded, NumCast, ToPrimitive, Zero};
use types::{safe_cast, StackValue, TypeDescriptor};

use super::scalar;
use crate::evaluator::RuntimeEvaluator;
use crate::registry::{FunctionRecord, FunctionRegistry};

macro_rules! cmp_fn {
    ($f:ident, $op:tt) => {
        fn $f<T: StackValue + PartialOrd>(ev: &mut RuntimeEvaluator) {
            let x1: T = ev.pop();
            let x2: T = ev.pop();
            ev.push(if x2 $op x1 { 1u8 } else { 0u8 });
        }
    };
}

cmp_fn!(gt, >);
cmp_fn!(lt, <);
cmp_fn!(gte, >=);
cmp_fn!(lte, <=);
cmp_fn!(eq, ==);
cmp_fn!(neq, !=);

macro_rules! widened_cmp_fn {
    ($f:ident, $op:tt) => {
        fn $f<T1, T2, TT>(ev: &mut RuntimeEvaluator)
        where
            T1: StackValue + ToPrimitive + Zero + PartialOrd,
            T2: StackValue + ToPrimitive + Zero + PartialOrd,
            TT: NumCast + Bounded + PartialOrd,
        {
            let x1: T1 = ev.pop();
            let x2: T2 = ev.pop();
            let (z1, ok1) = safe_cast::<T1, TT>(x1);
            let (z2, ok2) = safe_cast::<T2, TT>(x2);
            if ok1 && ok2 {
                ev.push(if z2 $op z1 { 1u8 } else { 0u8 });
            } else {
                ev.runtime_error.out_of_range = true;
                ev.push(0u8);
            }
        }
    };
}

widened_cmp_fn!(gt_w, >);
widened_cmp_fn!(lt_w, <);
widened_cmp_fn!(gte_w, >=);
widened_cmp_fn!(lte_w, <=);
widened_cmp_fn!(eq_w, ==);
widened_cmp_fn!(neq_w, !=);

macro_rules! register_cmp_same {
    ($reg:ident, $name:literal, $f:ident, $t:ty, $td:ident) => {
        $reg.register(FunctionRecord::new(
            $name,
            vec![scalar(TypeDescriptor::$td), scalar(TypeDescriptor::$td)],
            vec![scalar(TypeDescriptor::UInt8)],
            $f::<$t>,
        ));
    };
}

macro_rules! register_cmp_same_all {
    ($reg:ident, $name:literal, $f:ident) => {
        register_cmp_same!($reg, $name, $f, f64, Float64);
        register_cmp_same!($reg, $name, $f, f32, Float32);
        register_cmp_same!($reg, $name, $f, u64, UInt64);
        register_cmp_same!($reg, $name, $f, i64, Int64);
        register_cmp_same!($reg, $name, $f, u32, UInt32);
        register_cmp_same!($reg, $name, $f, i32, Int32);
        register_cmp_same!($reg, $name, $f, u16, UInt16);
        register_cmp_same!($reg, $name, $f, i16, Int16);
        register_cmp_same!($reg, $name, $f, u8, UInt8);
        register_cmp_same!($reg, $name, $f, i8, Int8);
    };
}

pub(super) fn register_same_type(reg: &mut FunctionRegistry) {
    register_cmp_same_all!(reg, "GT", gt);
    register_cmp_same_all!(reg, "LT", lt);
    register_cmp_same_all!(reg, "GTE", gte);
    register_cmp_same_all!(reg, "LTE", lte);
    register_cmp_same_all!(reg, "EQ", eq);
    register_cmp_same_all!(reg, "NEQ", neq);
}

macro_rules! register_cmp_pair {
    ($reg:ident, $name:literal, $f:ident, $t1:ty, $td1:ident, $t2:ty, $td2:ident, $tt:ty) => {
        $reg.register(FunctionRecord::new(
            $name,
            vec![scalar(TypeDescriptor::$td1), scalar(TypeDescriptor::$td2)],
            vec![scalar(TypeDescriptor::UInt8)],
            $f::<$t1, $t2, $tt>,
        ));
        $reg.register(FunctionRecord::new(
            $name,
            vec![scalar(TypeDescriptor::$td2), scalar(TypeDescriptor::$td1)],
            vec![scalar(TypeDescriptor::UInt8)],
            $f::<$t2, $t1, $tt>,
        ));
    };
}

macro_rules! register_cmp_grid {
    ($reg:ident, $name:literal, $f:ident) => {
        register_cmp_pair!($reg, $name, $f, i8, Int8, i32, Int32, i32);
        register_cmp_pair!($reg, $name, $f, i16, Int16, i32, Int32, i32);
        register_cmp_pair!($reg, $name, $f, u8, UInt8, i32, Int32, i32);
        register_cmp_pair!($reg, $name, $f, u16, UInt16, i32, Int32, i32);
        register_cmp_pair!($reg, $name, $f, u32, UInt32, i32, Int32, i32);
        register_cmp_pair!($reg, $name, $f, i8, Int8, i64, Int64, i64);
        register_cmp_pair!($reg, $name, $f, i16, Int16, i64, Int64, i64);
        register_cmp_pair!($reg, $name, $f, i32, Int32, i64, Int64, i64);
        register_cmp_pair!($reg, $name, $f, u8, UInt8, i64, Int64, i64);
        register_cmp_pair!($reg, $name, $f, u16, UInt16, i64, Int64, i64);
        register_cmp_pair!($reg, $name, $f, u32, UInt32, i64, Int64, i64);
        register_cmp_pair!($reg, $name, $f, u64, UInt64, i64, Int64, i64);
        register_cmp_pair!($reg, $name, $f, u8, UInt8, u32, UInt32, u32);
        register_cmp_pair!($reg, $name, $f, u16, UInt16, u32, UInt32, u32);
        register_cmp_pair!($reg, $name, $f, i8, Int8, u64, UInt64, u64);
        register_cmp_pair!($reg, $name, $f, i16, Int16, u64, UInt64, u64);
        register_cmp_pair!($reg, $name, $f, i32, Int32, u64, UInt64, u64);
        register_cmp_pair!($reg, $name, $f, u8, UInt8, u64, UInt64, u64);
        register_cmp_pair!($reg, $name, $f, u16, UInt16, u64, UInt64, u64);
        register_cmp_pair!($reg, $name, $f, u32, UInt32, u64, UInt64, u64);
    };
}

pub(super) fn register_widened(reg: &mut FunctionRegistry) {
    register_cmp_grid!(reg, "GT", gt_w);
    register_cmp_grid!(reg, "LT", lt_w);
    register_cmp_grid!(reg, "GTE", gte_w);
    register_cmp_grid!(reg, "LTE", lte_w);
    register_cmp_grid!(reg, "EQ", eq_w);
    register_cmp_grid!(reg, "NEQ", neq_w);
}
