//! `Math.*` functions

use serde_json::Value;

use super::{arg, not_whitelisted_math};
use crate::error::Result;
use crate::expression::coerce::{number_value, to_number};

fn unary(args: &[Value], f: impl Fn(f64) -> f64) -> Value {
    number_value(f(to_number(arg(args, 0))))
}

/// JS rounding: halves round towards +Infinity
fn round_half_up(n: f64) -> f64 {
    (n + 0.5).floor()
}

fn sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

pub fn call(name: &str, args: &[Value]) -> Result<Value> {
    let numbers = || args.iter().map(to_number);
    Ok(match name {
        "abs" => unary(args, f64::abs),
        "ceil" => unary(args, f64::ceil),
        "floor" => unary(args, f64::floor),
        "round" => unary(args, round_half_up),
        "sqrt" => unary(args, f64::sqrt),
        "sign" => unary(args, sign),
        "trunc" => unary(args, f64::trunc),
        "pow" => number_value(to_number(arg(args, 0)).powf(to_number(arg(args, 1)))),
        "max" => {
            if numbers().any(f64::is_nan) {
                Value::Null
            } else {
                number_value(numbers().fold(f64::NEG_INFINITY, f64::max))
            }
        }
        "min" => {
            if numbers().any(f64::is_nan) {
                Value::Null
            } else {
                number_value(numbers().fold(f64::INFINITY, f64::min))
            }
        }
        other => return Err(not_whitelisted_math(other)),
    })
}
