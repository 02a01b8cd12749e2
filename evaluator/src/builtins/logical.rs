//! Boolean connectives over `uint8` truth values (zero is false, anything
//! else is true). Comparisons produce `uint8`, so these compose directly.

use types::TypeDescriptor;

use super::scalar;
use crate::evaluator::RuntimeEvaluator;
use crate::registry::{FunctionRecord, FunctionRegistry};

fn and(ev: &mut RuntimeEvaluator) {
    let x1: u8 = ev.pop();
    let x2: u8 = ev.pop();
    ev.push(u8::from((x2 != 0) && (x1 != 0)));
}

fn or(ev: &mut RuntimeEvaluator) {
    let x1: u8 = ev.pop();
    let x2: u8 = ev.pop();
    ev.push(u8::from((x2 != 0) || (x1 != 0)));
}

fn xor(ev: &mut RuntimeEvaluator) {
    let x1: u8 = ev.pop();
    let x2: u8 = ev.pop();
    ev.push(u8::from((x2 != 0) != (x1 != 0)));
}

pub(super) fn register(reg: &mut FunctionRegistry) {
    let bool_td = scalar(TypeDescriptor::UInt8);
    for (name, action) in [
        ("AND", and as crate::registry::ActionFn),
        ("OR", or),
        ("XOR", xor),
    ] {
        reg.register(FunctionRecord::new(
            name,
            vec![bool_td.clone(), bool_td.clone()],
            vec![bool_td.clone()],
            action,
        ));
    }
}
