//! Math library nodes

use super::{arg, colors};
use crate::error::ComputeError;
use crate::nodes::factory::{NodeRegistry, NodeTypeDef, ParamDef};
use crate::value::Value;

const GROUP: &str = "Math";

type Unary = fn(f64) -> Result<Value, ComputeError>;

fn float(x: f64) -> Result<Value, ComputeError> {
    Ok(Value::Float(x))
}

/// Reject inputs outside `[-1, 1]` for the inverse trig functions
fn unit_domain(x: f64, name: &'static str) -> Result<f64, ComputeError> {
    if (-1.0..=1.0).contains(&x) {
        Ok(x)
    } else {
        Err(ComputeError::MathDomain(name))
    }
}

fn integral(x: f64) -> Result<Value, ComputeError> {
    if x.is_finite() {
        Ok(Value::Int(x as i64))
    } else {
        Err(ComputeError::Message(format!("cannot convert {} to integer", x)))
    }
}

fn pow(base: f64, exponent: f64) -> Result<Value, ComputeError> {
    let result = base.powf(exponent);
    if !result.is_finite() && base.is_finite() && exponent.is_finite() {
        return Err(ComputeError::MathDomain("pow"));
    }
    Ok(Value::Float(result))
}

fn math_node(node_type: &str, arity: usize) -> NodeTypeDef {
    NodeTypeDef::pure(node_type)
        .with_group(GROUP)
        .with_colors(&colors::LIBRARY_FILL, &colors::LIBRARY_BORDER)
        .with_args(vec![ParamDef::new("number"); arity])
        .with_results(vec![ParamDef::new("number")])
}

pub fn register(registry: &mut NodeRegistry) {
    let unary: [(&str, Unary); 10] = [
        ("Get Cos", |x| float(x.cos())),
        ("Get Sin", |x| float(x.sin())),
        ("Get Tan", |x| float(x.tan())),
        ("Get ACos", |x| float(unit_domain(x, "acos")?.acos())),
        ("Get ASin", |x| float(unit_domain(x, "asin")?.asin())),
        ("Get ATan", |x| float(x.atan())),
        ("Get Ceil", |x| integral(x.ceil())),
        ("Get Floor", |x| integral(x.floor())),
        ("Get Fabs", |x| float(x.abs())),
        ("Get Sqrt", |x| {
            if x < 0.0 {
                return Err(ComputeError::MathDomain("sqrt"));
            }
            float(x.sqrt())
        }),
    ];
    for (node_type, f) in unary {
        registry.register(
            math_node(node_type, 1).with_compute(move |args, _| Ok(vec![f(arg(args, 0)?.expect_f64()?)?])),
        );
    }

    registry.register(math_node("Get Pow", 2).with_compute(|args, _| {
        let base = arg(args, 0)?.expect_f64()?;
        let exponent = arg(args, 1)?.expect_f64()?;
        Ok(vec![pow(base, exponent)?])
    }));
}
