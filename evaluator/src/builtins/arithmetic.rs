//! Arithmetic records: plain float math, lossless integer promotions, and
//! the checked families.
//!
//! Naming follows the action families:
//! - plain ops promote through a wide-enough result type and cannot lose;
//! - `s_*` ops are overflow-checked; on overflow they raise the flag and
//!   yield the wrapped value, and once any flag is set they skip the
//!   computation and yield a zero placeholder so the stack stays balanced;
//! - `ss_*` ops additionally range-check the operand conversions;
//! - integer division is zero-checked everywhere: division by zero raises
//!   overflow and yields zero.

use num_traits::{
    AsPrimitive, Bounded, CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Float, NumCast,
    ToPrimitive, WrappingAdd, WrappingMul, WrappingSub, Zero,
};
use types::{safe_cast, StackValue, TypeDescriptor};

use super::scalar;
use crate::evaluator::RuntimeEvaluator;
use crate::registry::{FunctionRecord, FunctionRegistry};

fn addition<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
where
    T1: StackValue + AsPrimitive<Tout>,
    T2: StackValue + AsPrimitive<Tout>,
    Tout: StackValue + std::ops::Add<Output = Tout>,
{
    let x1: T1 = ev.pop();
    let x2: T2 = ev.pop();
    ev.push(x2.as_() + x1.as_());
}

fn subtraction<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
where
    T1: StackValue + AsPrimitive<Tout>,
    T2: StackValue + AsPrimitive<Tout>,
    Tout: StackValue + std::ops::Sub<Output = Tout>,
{
    let x1: T1 = ev.pop();
    let x2: T2 = ev.pop();
    ev.push(x2.as_() - x1.as_());
}

fn multiplication<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
where
    T1: StackValue + AsPrimitive<Tout>,
    T2: StackValue + AsPrimitive<Tout>,
    Tout: StackValue + std::ops::Mul<Output = Tout>,
{
    let x1: T1 = ev.pop();
    let x2: T2 = ev.pop();
    ev.push(x2.as_() * x1.as_());
}

fn division_float<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
where
    T1: StackValue + AsPrimitive<Tout>,
    T2: StackValue + AsPrimitive<Tout>,
    Tout: StackValue + Float,
{
    let x1: T1 = ev.pop();
    let x2: T2 = ev.pop();
    let (divisor, dividend): (Tout, Tout) = (x1.as_(), x2.as_());
    ev.push(dividend / divisor);
}

fn division<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
where
    T1: StackValue + AsPrimitive<Tout>,
    T2: StackValue + AsPrimitive<Tout>,
    Tout: StackValue + CheckedDiv + Zero,
{
    let x1: T1 = ev.pop();
    let x2: T2 = ev.pop();
    let (divisor, dividend): (Tout, Tout) = (x1.as_(), x2.as_());
    match dividend.checked_div(&divisor) {
        Some(q) => ev.push(q),
        None => {
            ev.runtime_error.overflow = true;
            ev.push(Tout::zero());
        }
    }
}

macro_rules! checked_op_fn {
    ($f:ident, $checked:ident, $checked_m:ident, $wrapping:ident, $wrapping_m:ident) => {
        fn $f<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
        where
            T1: StackValue + AsPrimitive<Tout>,
            T2: StackValue + AsPrimitive<Tout>,
            Tout: StackValue + $checked + $wrapping + Zero,
        {
            let x1: T1 = ev.pop();
            let x2: T2 = ev.pop();
            if !ev.runtime_error.is_clear() {
                ev.push(Tout::zero());
                return;
            }
            let (z1, z2): (Tout, Tout) = (x1.as_(), x2.as_());
            match z2.$checked_m(&z1) {
                Some(r) => ev.push(r),
                None => {
                    ev.runtime_error.overflow = true;
                    ev.push(z2.$wrapping_m(&z1));
                }
            }
        }
    };
}

checked_op_fn!(s_addition, CheckedAdd, checked_add, WrappingAdd, wrapping_add);
checked_op_fn!(s_subtraction, CheckedSub, checked_sub, WrappingSub, wrapping_sub);
checked_op_fn!(s_multiplication, CheckedMul, checked_mul, WrappingMul, wrapping_mul);

macro_rules! converting_checked_op_fn {
    ($f:ident, $checked:ident, $checked_m:ident, $wrapping:ident, $wrapping_m:ident) => {
        fn $f<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
        where
            T1: StackValue + ToPrimitive + Zero + PartialOrd,
            T2: StackValue + ToPrimitive + Zero + PartialOrd,
            Tout: StackValue + NumCast + Bounded + $checked + $wrapping + Zero,
        {
            let x1: T1 = ev.pop();
            let x2: T2 = ev.pop();
            if !ev.runtime_error.is_clear() {
                ev.push(Tout::zero());
                return;
            }
            let (z1, ok1) = safe_cast::<T1, Tout>(x1);
            let (z2, ok2) = safe_cast::<T2, Tout>(x2);
            if !(ok1 && ok2) {
                ev.runtime_error.overflow = true;
            }
            match z2.$checked_m(&z1) {
                Some(r) => ev.push(r),
                None => {
                    ev.runtime_error.overflow = true;
                    ev.push(z2.$wrapping_m(&z1));
                }
            }
        }
    };
}

converting_checked_op_fn!(ss_addition, CheckedAdd, checked_add, WrappingAdd, wrapping_add);
converting_checked_op_fn!(ss_subtraction, CheckedSub, checked_sub, WrappingSub, wrapping_sub);
converting_checked_op_fn!(ss_multiplication, CheckedMul, checked_mul, WrappingMul, wrapping_mul);

fn s_division<T1, T2, Tout>(ev: &mut RuntimeEvaluator)
where
    T1: StackValue + ToPrimitive + Zero + PartialOrd,
    T2: StackValue + ToPrimitive + Zero + PartialOrd,
    Tout: StackValue + NumCast + Bounded + CheckedDiv + Zero,
{
    let x1: T1 = ev.pop();
    let x2: T2 = ev.pop();
    let (z1, ok1) = safe_cast::<T1, Tout>(x1);
    let (z2, ok2) = safe_cast::<T2, Tout>(x2);
    if !(ok1 && ok2) {
        ev.runtime_error.overflow = true;
    }
    match z2.checked_div(&z1) {
        Some(q) => ev.push(q),
        None => {
            ev.runtime_error.overflow = true;
            ev.push(Tout::zero());
        }
    }
}

macro_rules! op_same {
    ($reg:ident, $name:literal, $f:ident, $t:ty, $td:ident, $tout:ty, $tdo:ident) => {
        $reg.register(FunctionRecord::new(
            $name,
            vec![scalar(TypeDescriptor::$td), scalar(TypeDescriptor::$td)],
            vec![scalar(TypeDescriptor::$tdo)],
            $f::<$t, $t, $tout>,
        ));
    };
}

macro_rules! op_mixed {
    ($reg:ident, $name:literal, $f:ident, $t1:ty, $td1:ident, $t2:ty, $td2:ident, $tout:ty, $tdo:ident) => {
        $reg.register(FunctionRecord::new(
            $name,
            vec![scalar(TypeDescriptor::$td1), scalar(TypeDescriptor::$td2)],
            vec![scalar(TypeDescriptor::$tdo)],
            $f::<$t1, $t2, $tout>,
        ));
        $reg.register(FunctionRecord::new(
            $name,
            vec![scalar(TypeDescriptor::$td2), scalar(TypeDescriptor::$td1)],
            vec![scalar(TypeDescriptor::$tdo)],
            $f::<$t2, $t1, $tout>,
        ));
    };
}

fn register_add(reg: &mut FunctionRegistry) {
    op_same!(reg, "ADD", addition, f32, Float32, f32, Float32);
    op_same!(reg, "ADD", addition, f64, Float64, f64, Float64);
    op_same!(reg, "ADD", addition, i8, Int8, i32, Int32);
    op_same!(reg, "ADD", addition, i16, Int16, i32, Int32);
    op_same!(reg, "ADD", s_addition, i32, Int32, i32, Int32);
    op_same!(reg, "ADD", addition, i32, Int32, i64, Int64);
    op_same!(reg, "ADD", s_addition, i64, Int64, i64, Int64);
    op_same!(reg, "ADD", addition, u8, UInt8, u32, UInt32);
    op_same!(reg, "ADD", addition, u16, UInt16, u32, UInt32);
    op_same!(reg, "ADD", s_addition, u32, UInt32, u32, UInt32);
    op_same!(reg, "ADD", addition, u32, UInt32, u64, UInt64);
    op_same!(reg, "ADD", s_addition, u64, UInt64, u64, UInt64);

    op_mixed!(reg, "ADD", s_addition, i8, Int8, i32, Int32, i32, Int32);
    op_mixed!(reg, "ADD", s_addition, i16, Int16, i32, Int32, i32, Int32);
    op_mixed!(reg, "ADD", s_addition, u8, UInt8, i32, Int32, i32, Int32);
    op_mixed!(reg, "ADD", s_addition, u16, UInt16, i32, Int32, i32, Int32);
    op_mixed!(reg, "ADD", ss_addition, u32, UInt32, i32, Int32, i32, Int32);
    op_mixed!(reg, "ADD", s_addition, i8, Int8, i64, Int64, i64, Int64);
    op_mixed!(reg, "ADD", s_addition, i16, Int16, i64, Int64, i64, Int64);
    op_mixed!(reg, "ADD", s_addition, i32, Int32, i64, Int64, i64, Int64);
    op_mixed!(reg, "ADD", s_addition, u8, UInt8, i64, Int64, i64, Int64);
    op_mixed!(reg, "ADD", s_addition, u16, UInt16, i64, Int64, i64, Int64);
    op_mixed!(reg, "ADD", s_addition, u32, UInt32, i64, Int64, i64, Int64);
    op_mixed!(reg, "ADD", ss_addition, u64, UInt64, i64, Int64, i64, Int64);
    op_mixed!(reg, "ADD", s_addition, u8, UInt8, u32, UInt32, u32, UInt32);
    op_mixed!(reg, "ADD", s_addition, u16, UInt16, u32, UInt32, u32, UInt32);
    op_mixed!(reg, "ADD", s_addition, u8, UInt8, u64, UInt64, u64, UInt64);
    op_mixed!(reg, "ADD", s_addition, u16, UInt16, u64, UInt64, u64, UInt64);
    op_mixed!(reg, "ADD", s_addition, u32, UInt32, u64, UInt64, u64, UInt64);
}

fn register_sub(reg: &mut FunctionRegistry) {
    op_same!(reg, "SUB", subtraction, f32, Float32, f32, Float32);
    op_same!(reg, "SUB", subtraction, f64, Float64, f64, Float64);
    op_same!(reg, "SUB", subtraction, i8, Int8, i32, Int32);
    op_same!(reg, "SUB", subtraction, i16, Int16, i32, Int32);
    op_same!(reg, "SUB", s_subtraction, i32, Int32, i32, Int32);
    op_same!(reg, "SUB", s_subtraction, i64, Int64, i64, Int64);
    op_same!(reg, "SUB", subtraction, u8, UInt8, i32, Int32);
    op_same!(reg, "SUB", subtraction, u16, UInt16, i32, Int32);
    op_same!(reg, "SUB", ss_subtraction, u32, UInt32, i32, Int32);
    op_same!(reg, "SUB", ss_subtraction, u64, UInt64, i64, Int64);

    op_mixed!(reg, "SUB", s_subtraction, i8, Int8, i32, Int32, i32, Int32);
    op_mixed!(reg, "SUB", s_subtraction, i16, Int16, i32, Int32, i32, Int32);
    op_mixed!(reg, "SUB", s_subtraction, u8, UInt8, i32, Int32, i32, Int32);
    op_mixed!(reg, "SUB", s_subtraction, u16, UInt16, i32, Int32, i32, Int32);
    op_mixed!(reg, "SUB", ss_subtraction, u32, UInt32, i32, Int32, i32, Int32);
    op_mixed!(reg, "SUB", s_subtraction, i8, Int8, i64, Int64, i64, Int64);
    op_mixed!(reg, "SUB", s_subtraction, i16, Int16, i64, Int64, i64, Int64);
    op_mixed!(reg, "SUB", s_subtraction, i32, Int32, i64, Int64, i64, Int64);
    op_mixed!(reg, "SUB", s_subtraction, u8, UInt8, i64, Int64, i64, Int64);
    op_mixed!(reg, "SUB", s_subtraction, u16, UInt16, i64, Int64, i64, Int64);
    op_mixed!(reg, "SUB", s_subtraction, u32, UInt32, i64, Int64, i64, Int64);
    op_mixed!(reg, "SUB", ss_subtraction, u64, UInt64, i64, Int64, i64, Int64);
    op_mixed!(reg, "SUB", ss_subtraction, u8, UInt8, u32, UInt32, i32, Int32);
    op_mixed!(reg, "SUB", ss_subtraction, u16, UInt16, u32, UInt32, i32, Int32);
    op_mixed!(reg, "SUB", ss_subtraction, u8, UInt8, u64, UInt64, i64, Int64);
    op_mixed!(reg, "SUB", ss_subtraction, u16, UInt16, u64, UInt64, i64, Int64);
    op_mixed!(reg, "SUB", ss_subtraction, u32, UInt32, u64, UInt64, i64, Int64);
}

fn register_mul(reg: &mut FunctionRegistry) {
    op_same!(reg, "MUL", multiplication, f32, Float32, f32, Float32);
    op_same!(reg, "MUL", multiplication, f64, Float64, f64, Float64);
    op_same!(reg, "MUL", multiplication, i8, Int8, i32, Int32);
    op_same!(reg, "MUL", multiplication, i16, Int16, i32, Int32);
    op_same!(reg, "MUL", s_multiplication, i32, Int32, i32, Int32);
    op_same!(reg, "MUL", multiplication, i32, Int32, i64, Int64);
    op_same!(reg, "MUL", s_multiplication, i64, Int64, i64, Int64);
    op_same!(reg, "MUL", multiplication, u8, UInt8, u32, UInt32);
    op_same!(reg, "MUL", multiplication, u16, UInt16, u32, UInt32);
    op_same!(reg, "MUL", s_multiplication, u32, UInt32, u32, UInt32);
    op_same!(reg, "MUL", multiplication, u32, UInt32, u64, UInt64);
    op_same!(reg, "MUL", s_multiplication, u64, UInt64, u64, UInt64);

    op_mixed!(reg, "MUL", s_multiplication, i8, Int8, i32, Int32, i32, Int32);
    op_mixed!(reg, "MUL", s_multiplication, i16, Int16, i32, Int32, i32, Int32);
    op_mixed!(reg, "MUL", s_multiplication, u8, UInt8, i32, Int32, i32, Int32);
    op_mixed!(reg, "MUL", s_multiplication, u16, UInt16, i32, Int32, i32, Int32);
    op_mixed!(reg, "MUL", ss_multiplication, u32, UInt32, i32, Int32, i32, Int32);
    op_mixed!(reg, "MUL", s_multiplication, i8, Int8, i64, Int64, i64, Int64);
    op_mixed!(reg, "MUL", s_multiplication, i16, Int16, i64, Int64, i64, Int64);
    op_mixed!(reg, "MUL", s_multiplication, i32, Int32, i64, Int64, i64, Int64);
    op_mixed!(reg, "MUL", s_multiplication, u8, UInt8, i64, Int64, i64, Int64);
    op_mixed!(reg, "MUL", s_multiplication, u16, UInt16, i64, Int64, i64, Int64);
    op_mixed!(reg, "MUL", s_multiplication, u32, UInt32, i64, Int64, i64, Int64);
    op_mixed!(reg, "MUL", ss_multiplication, u64, UInt64, i64, Int64, i64, Int64);
    op_mixed!(reg, "MUL", s_multiplication, u8, UInt8, u32, UInt32, u32, UInt32);
    op_mixed!(reg, "MUL", s_multiplication, u16, UInt16, u32, UInt32, u32, UInt32);
    op_mixed!(reg, "MUL", s_multiplication, u8, UInt8, u64, UInt64, u64, UInt64);
    op_mixed!(reg, "MUL", s_multiplication, u16, UInt16, u64, UInt64, u64, UInt64);
    op_mixed!(reg, "MUL", s_multiplication, u32, UInt32, u64, UInt64, u64, UInt64);
}

fn register_div(reg: &mut FunctionRegistry) {
    op_same!(reg, "DIV", division_float, f32, Float32, f32, Float32);
    op_same!(reg, "DIV", division_float, f64, Float64, f64, Float64);
    op_same!(reg, "DIV", division, i8, Int8, i32, Int32);
    op_same!(reg, "DIV", division, i16, Int16, i32, Int32);
    op_same!(reg, "DIV", division, i32, Int32, i32, Int32);
    op_same!(reg, "DIV", division, i64, Int64, i64, Int64);
    op_same!(reg, "DIV", division, u8, UInt8, u32, UInt32);
    op_same!(reg, "DIV", division, u16, UInt16, u32, UInt32);
    op_same!(reg, "DIV", division, u32, UInt32, u32, UInt32);
    op_same!(reg, "DIV", division, u64, UInt64, u64, UInt64);

    op_mixed!(reg, "DIV", division, i8, Int8, i32, Int32, i32, Int32);
    op_mixed!(reg, "DIV", division, i16, Int16, i32, Int32, i32, Int32);
    op_mixed!(reg, "DIV", division, u8, UInt8, i32, Int32, i32, Int32);
    op_mixed!(reg, "DIV", division, u16, UInt16, i32, Int32, i32, Int32);
    op_mixed!(reg, "DIV", s_division, u32, UInt32, i32, Int32, i32, Int32);
    op_mixed!(reg, "DIV", division, i8, Int8, i64, Int64, i64, Int64);
    op_mixed!(reg, "DIV", division, i16, Int16, i64, Int64, i64, Int64);
    op_mixed!(reg, "DIV", division, i32, Int32, i64, Int64, i64, Int64);
    op_mixed!(reg, "DIV", division, u8, UInt8, i64, Int64, i64, Int64);
    op_mixed!(reg, "DIV", division, u16, UInt16, i64, Int64, i64, Int64);
    op_mixed!(reg, "DIV", division, u32, UInt32, i64, Int64, i64, Int64);
    op_mixed!(reg, "DIV", s_division, u64, UInt64, i64, Int64, i64, Int64);
    op_mixed!(reg, "DIV", division, u8, UInt8, u32, UInt32, u32, UInt32);
    op_mixed!(reg, "DIV", division, u16, UInt16, u32, UInt32, u32, UInt32);
    op_mixed!(reg, "DIV", division, u8, UInt8, u64, UInt64, u64, UInt64);
    op_mixed!(reg, "DIV", division, u16, UInt16, u64, UInt64, u64, UInt64);
    op_mixed!(reg, "DIV", division, u32, UInt32, u64, UInt64, u64, UInt64);
}

pub(super) fn register(reg: &mut FunctionRegistry) {
    register_add(reg);
    register_sub(reg);
    register_mul(reg);
    register_div(reg);
}
