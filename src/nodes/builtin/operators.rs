//! Operation nodes: arithmetic, comparison, logic and sequence helpers
//!
//! Binary operations fold their positional arguments from the left, so
//! adding ports extends the expression: `Minus(10, 3, 2)` is `(10 - 3) - 2`.
//! Comparisons chain instead: `Less Than(1, 2, 3)` holds when every
//! neighbouring pair does.

use super::{arg, colors, kwarg};
use crate::error::ComputeError;
use crate::nodes::factory::{Kwargs, NodeRegistry, NodeTypeDef, ParamDef};
use crate::value::Value;
use std::cmp::Ordering;

const GROUP: &str = "Operation";

type Operation = fn(&Value, &Value) -> Result<Value, ComputeError>;
type Test = fn(&Value, &Value) -> Result<bool, ComputeError>;

/// Two-argument node with an addable port of the argument type
fn binary(node_type: &str, arg_tag: &str, result_tag: &str, visible: bool) -> NodeTypeDef {
    NodeTypeDef::pure(node_type)
        .with_group(GROUP)
        .with_colors(&colors::OPERATION_FILL, &colors::OPERATION_BORDER)
        .with_args(vec![
            ParamDef::new(arg_tag).visible(visible),
            ParamDef::new(arg_tag).visible(visible),
        ])
        .with_results(vec![ParamDef::new(result_tag)])
        .with_addable_port(arg_tag)
}

fn fold(op: Operation) -> impl Fn(&[Value], &Kwargs) -> Result<Vec<Value>, ComputeError> + Send + Sync {
    move |args, _| {
        let mut acc = arg(args, 0)?.clone();
        for value in &args[1..] {
            acc = op(&acc, value)?;
        }
        Ok(vec![acc])
    }
}

fn chain(test: Test) -> impl Fn(&[Value], &Kwargs) -> Result<Vec<Value>, ComputeError> + Send + Sync {
    move |args, _| {
        arg(args, 0)?;
        for pair in args.windows(2) {
            if !test(&pair[0], &pair[1])? {
                return Ok(vec![Value::Bool(false)]);
            }
        }
        Ok(vec![Value::Bool(true)])
    }
}

const MAX_RANGE_LEN: usize = 1 << 24;

/// `range(stop)`, `range(start, stop)` or `range(start, stop, step)`
fn range(args: &[Value]) -> Result<Value, ComputeError> {
    let ints = args
        .iter()
        .map(Value::expect_i64)
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        [] => return Err(ComputeError::MissingArgument("arg".to_string())),
        _ => return Err(ComputeError::Message(format!("range expected at most 3 arguments, got {}", ints.len()))),
    };
    if step == 0 {
        return Err(ComputeError::Message("range() arg 3 must not be zero".to_string()));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let stride = i128::from(step).abs();
    let len = if span > 0 { (span + stride - 1) / stride } else { 0 };
    if len > MAX_RANGE_LEN as i128 {
        return Err(ComputeError::Message(format!("range of {} items is too long", len)));
    }
    let mut items = Vec::with_capacity(len as usize);
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

fn optional_index(value: Option<&Value>) -> Result<Option<i64>, ComputeError> {
    match value {
        None | Some(Value::None) => Ok(None),
        Some(v) => v.expect_i64().map(Some),
    }
}

pub fn register(registry: &mut NodeRegistry) {
    let folds: [(&str, &str, bool, &[&str], Operation); 10] = [
        ("Plus", "object", false, &[], Value::add),
        ("Plus String", "str", true, &["Plus"], Value::add),
        ("Plus Number", "number", true, &["Plus"], Value::add),
        ("Minus", "object", false, &[], Value::sub),
        ("Multiply", "object", false, &[], Value::mul),
        ("Multiply Number", "number", true, &["Multiply"], Value::mul),
        ("Divide", "object", false, &[], Value::div),
        ("Divide Number", "number", true, &["Divide"], Value::div),
        ("Max", "object", false, &[], Value::max_with),
        ("Min", "object", false, &[], Value::min_with),
    ];
    for (node_type, tag, visible, parents, op) in folds {
        registry.register(
            binary(node_type, tag, "object", visible)
                .with_parents(parents)
                .with_compute(fold(op)),
        );
    }

    let comparisons: [(&str, &str, bool, &[&str], Test); 9] = [
        ("More Than", "object", false, &[], |a, b| Ok(a.compare(b)? == Ordering::Greater)),
        ("More Than Or Equal", "object", false, &[], |a, b| Ok(a.compare(b)? != Ordering::Less)),
        ("Less Than", "object", false, &[], |a, b| Ok(a.compare(b)? == Ordering::Less)),
        ("Less Than Or Equal", "object", false, &[], |a, b| Ok(a.compare(b)? != Ordering::Greater)),
        ("Equal", "object", false, &[], |a, b| Ok(a.loose_eq(b))),
        ("Equal String", "str", true, &["Equal"], |a, b| Ok(a.loose_eq(b))),
        ("Is", "object", false, &[], |a, b| Ok(a.is(b))),
        ("In", "object", false, &[], |a, b| b.contains(a)),
        ("In String", "str", true, &["In"], |a, b| b.contains(a)),
    ];
    for (node_type, tag, visible, parents, test) in comparisons {
        registry.register(
            binary(node_type, tag, "bool", visible)
                .with_parents(parents)
                .with_compute(chain(test)),
        );
    }

    // `and` / `or` yield the deciding operand, which the bool result coerces
    let logic: [(&str, Operation); 2] = [
        ("And", |a, b| Ok(if a.truthy() { b.clone() } else { a.clone() })),
        ("Or", |a, b| Ok(if a.truthy() { a.clone() } else { b.clone() })),
    ];
    for (node_type, op) in logic {
        registry.register(binary(node_type, "bool", "bool", false).with_compute(fold(op)));
    }

    let unary: [(&str, &str, fn(&Value) -> bool); 3] = [
        ("Not", "bool", |v| !v.truthy()),
        ("Is None", "object", Value::is_none),
        ("Is Not None", "object", |v| !v.is_none()),
    ];
    for (node_type, tag, test) in unary {
        registry.register(
            NodeTypeDef::pure(node_type)
                .with_group(GROUP)
                .with_colors(&colors::OPERATION_FILL, &colors::OPERATION_BORDER)
                .with_args(vec![ParamDef::new(tag).hidden()])
                .with_results(vec![ParamDef::new("bool")])
                .with_compute(move |args, _| Ok(vec![Value::Bool(test(arg(args, 0)?))])),
        );
    }

    let sequence = |node_type: &str| {
        NodeTypeDef::pure(node_type)
            .with_group(GROUP)
            .with_colors(&colors::PURE_FILL, &colors::PURE_BORDER)
    };
    registry.register(
        sequence("Sum")
            .with_args(vec![ParamDef::new("number[]")])
            .with_results(vec![ParamDef::new("number")])
            .with_compute(|args, _| {
                let mut total = Value::Int(0);
                for item in arg(args, 0)?.expect_list()? {
                    total = total.add(item)?;
                }
                Ok(vec![total])
            }),
    );
    registry.register(
        sequence("Range")
            .with_args(vec![ParamDef::new("int")])
            .with_results(vec![ParamDef::new("int[]")])
            .with_compute(|args, _| Ok(vec![range(args)?])),
    );
    registry.register(
        sequence("Get Length")
            .with_args(vec![ParamDef::new("object")])
            .with_results(vec![ParamDef::new("int")])
            .with_compute(|args, _| Ok(vec![Value::from(arg(args, 0)?.len()?)])),
    );
    // Unset bounds leave that side of the slice open
    registry.register(
        sequence("Slice")
            .with_args(vec![
                ParamDef::new("object").hidden(),
                ParamDef::named("start", "int").with_default(Value::None),
                ParamDef::named("end", "int").with_default(Value::None),
            ])
            .with_results(vec![ParamDef::new("object")])
            .with_compute(|args, kwargs| {
                let start = optional_index(kwargs.get("start"))?;
                let end = optional_index(kwargs.get("end"))?;
                Ok(vec![arg(args, 0)?.slice(start, end)?])
            }),
    );
    registry.register(
        sequence("Slice One")
            .with_args(vec![
                ParamDef::new("object").hidden(),
                ParamDef::named("index", "int"),
            ])
            .with_results(vec![ParamDef::new("object")])
            .with_compute(|args, kwargs| {
                let index = kwarg(kwargs, "index")?.expect_i64()?;
                Ok(vec![arg(args, 0)?.index(index)?])
            }),
    );
}
