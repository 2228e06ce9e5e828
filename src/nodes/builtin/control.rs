//! Control flow nodes: the entry point, printing, loops, branches and
//! exception boundaries

use super::colors;
use crate::constants::port::{FINALLY, IN, OUT};
use crate::error::{ComputeError, GraphError};
use crate::nodes::execution_engine::RunContext;
use crate::nodes::factory::{NodeRegistry, NodeTypeDef, ParamDef};
use crate::nodes::port::PortType;
use crate::nodes::NodeId;
use crate::value::Value;

const LOGIC_GROUP: &str = "Logic";

pub const FOR_EACH: &str = "For Each Loop";
pub const TRUE: &str = "True";
pub const FALSE: &str = "False";
pub const TRY: &str = "Try";
pub const EXCEPT: &str = "Except";

/// Items a loop walks: list elements or the characters of a string
fn iteration_items(value: &Value) -> Result<Vec<Value>, ComputeError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(ComputeError::UnexpectedType {
            expected: "list or str",
            found: other.type_name(),
        }),
    }
}

fn for_loop(ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError> {
    let array = ctx.flow_value(node, "inputs:array")?;
    let items = iteration_items(&array).map_err(|err| ctx.fail(node, err))?;
    for (index, each) in items.into_iter().enumerate() {
        ctx.set_output(node, "outputs:index", index)?;
        ctx.set_output(node, "outputs:each", each)?;
        ctx.goto_next(node, FOR_EACH)?;
    }
    ctx.goto_next(node, FINALLY)
}

fn branch(ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError> {
    let condition = ctx.flow_value(node, "inputs:arg")?;
    ctx.goto_next(node, if condition.truthy() { TRUE } else { FALSE })
}

/// Node failures below `Try` divert to `Except`; `Finally` always follows.
/// Structural errors such as a broken pass-through or the depth limit are
/// not caught. An error raised on the `Except` branch surfaces once
/// `Finally` has run.
fn try_except(ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError> {
    let mut pending = None;
    if let Err(err) = ctx.goto_next(node, TRY) {
        if !ctx.catches_try_errors() || !err.is_computation() {
            return Err(err);
        }
        ctx.record_caught_error(node, &err);
        pending = ctx.goto_next(node, EXCEPT).err();
    }
    ctx.goto_next(node, FINALLY)?;
    pending.map_or(Ok(()), Err)
}

fn print(ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError> {
    let value = ctx.flow_value(node, "inputs:arg")?;
    ctx.print(value.to_string());
    ctx.goto_next(node, OUT)
}

pub fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeTypeDef::flow("Main")
            .with_flow_ports(&[(OUT, PortType::Output)])
            .with_colors(&colors::MAIN_FILL, &colors::MAIN_BORDER)
            .with_body(|ctx, node| ctx.goto_next(node, OUT)),
    );
    registry.register(
        NodeTypeDef::flow("Print")
            .with_colors(&colors::PRINT_FILL, &colors::PRINT_BORDER)
            .with_args(vec![ParamDef::new("object").hidden()])
            .with_body(print),
    );

    let logic = |node_type: &str, outputs: &[&str]| {
        let mut ports = vec![(IN, PortType::Input)];
        ports.extend(outputs.iter().map(|name| (*name, PortType::Output)));
        NodeTypeDef::flow(node_type)
            .with_group(LOGIC_GROUP)
            .with_colors(&colors::LOGIC_FILL, &colors::OPERATION_BORDER)
            .with_flow_ports(&ports)
    };
    registry.register(
        logic("For Loop", &[FOR_EACH, FINALLY])
            .with_args(vec![ParamDef::named("array", "object[]").hidden()])
            .with_results(vec![ParamDef::named("index", "int"), ParamDef::named("each", "object")])
            .with_body(for_loop),
    );
    registry.register(
        logic("If", &[TRUE, FALSE])
            .with_args(vec![ParamDef::new("bool").hidden()])
            .with_body(branch),
    );
    registry.register(logic("Try", &[TRY, EXCEPT, FINALLY]).with_body(try_except));

    registry.register(
        NodeTypeDef::pure("Get Current File")
            .with_colors(&colors::PURE_FILL, &colors::PURE_BORDER)
            .with_results(vec![ParamDef::new("str")])
            .with_body(|ctx, node| {
                let file = ctx
                    .graph()
                    .path()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ctx.write_results(node, vec![Value::from(file)])
            }),
    );
    registry.register(
        NodeTypeDef::pure("Get Current Dir")
            .with_colors(&colors::PURE_FILL, &colors::PURE_BORDER)
            .with_results(vec![ParamDef::new("str")])
            .with_body(|ctx, node| {
                let dir = ctx
                    .graph()
                    .path()
                    .and_then(|p| p.parent())
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ctx.write_results(node, vec![Value::from(dir)])
            }),
    );
}
