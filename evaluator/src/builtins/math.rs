//! Floating-point transcendentals.

use num_traits::Float;
use types::{StackValue, TypeDescriptor};

use super::scalar;
use crate::evaluator::RuntimeEvaluator;
use crate::registry::{FunctionRecord, FunctionRegistry};

macro_rules! unary_float_fn {
    ($f:ident, $method:ident) => {
        fn $f<T: StackValue + Float>(ev: &mut RuntimeEvaluator) {
            let x: T = ev.pop();
            ev.push(x.$method());
        }
    };
}

unary_float_fn!(sin, sin);
unary_float_fn!(cos, cos);
unary_float_fn!(tan, tan);
unary_float_fn!(exp, exp);
unary_float_fn!(log, ln);
unary_float_fn!(log10, log10);

fn pow<T: StackValue + Float>(ev: &mut RuntimeEvaluator) {
    let exponent: T = ev.pop();
    let base: T = ev.pop();
    ev.push(base.powf(exponent));
}

macro_rules! register_float_math {
    ($reg:ident, $t:ty, $td:ident) => {
        for (name, action) in [
            ("SIN", sin::<$t> as crate::registry::ActionFn),
            ("COS", cos::<$t>),
            ("TAN", tan::<$t>),
            ("EXP", exp::<$t>),
            ("LOG", log::<$t>),
            ("LOG10", log10::<$t>),
        ] {
            $reg.register(FunctionRecord::new(
                name,
                vec![scalar(TypeDescriptor::$td)],
                vec![scalar(TypeDescriptor::$td)],
                action,
            ));
        }
        $reg.register(FunctionRecord::new(
            "POW",
            vec![scalar(TypeDescriptor::$td), scalar(TypeDescriptor::$td)],
            vec![scalar(TypeDescriptor::$td)],
            pow::<$t>,
        ));
    };
}

pub(super) fn register(reg: &mut FunctionRegistry) {
    register_float_math!(reg, f32, Float32);
    register_float_math!(reg, f64, Float64);
}
