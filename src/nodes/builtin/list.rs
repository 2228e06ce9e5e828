//! List mutation nodes
//!
//! These flow nodes modify the list their `inputs:array` reads and write it
//! back to wherever it came from, so the producer sees the change.

use crate::constants::port::OUT;
use crate::error::{ComputeError, GraphError};
use crate::nodes::execution_engine::RunContext;
use crate::nodes::factory::{NodeRegistry, NodeTypeDef, ParamDef};
use crate::nodes::NodeId;
use crate::value::Value;

const GROUP: &str = "List";
const ARRAY: &str = "inputs:array";

type Mutation = fn(&mut RunContext<'_>, NodeId, &mut Vec<Value>) -> Result<(), GraphError>;

/// Read the list, apply `mutate`, store it back and continue on `Out`
fn mutate_list(ctx: &mut RunContext<'_>, node: NodeId, mutate: Mutation) -> Result<(), GraphError> {
    let mut items = match ctx.flow_value(node, ARRAY)? {
        Value::List(items) => items,
        other => {
            let err = ComputeError::UnexpectedType {
                expected: "list",
                found: other.type_name(),
            };
            return Err(ctx.fail(node, err));
        }
    };
    mutate(ctx, node, &mut items)?;
    ctx.update_flow_value(node, ARRAY, Value::List(items))?;
    ctx.goto_next(node, OUT)
}

fn append(ctx: &mut RunContext<'_>, node: NodeId, items: &mut Vec<Value>) -> Result<(), GraphError> {
    items.push(ctx.flow_value(node, "inputs:add")?);
    Ok(())
}

fn extend(ctx: &mut RunContext<'_>, node: NodeId, items: &mut Vec<Value>) -> Result<(), GraphError> {
    match ctx.flow_value(node, "inputs:add")? {
        Value::List(more) => items.extend(more),
        Value::String(s) => items.extend(s.chars().map(|c| Value::String(c.to_string()))),
        other => {
            let err = ComputeError::UnexpectedType {
                expected: "list or str",
                found: other.type_name(),
            };
            return Err(ctx.fail(node, err));
        }
    }
    Ok(())
}

/// Insert before `index`; negative indices count from the end and
/// out-of-range ones clamp
fn insert(ctx: &mut RunContext<'_>, node: NodeId, items: &mut Vec<Value>) -> Result<(), GraphError> {
    let index = ctx.flow_value(node, "inputs:index")?;
    let index = index.expect_i64().map_err(|err| ctx.fail(node, err))?;
    let len = items.len() as i64;
    let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
    items.insert(at as usize, ctx.flow_value(node, "inputs:obj")?);
    Ok(())
}

fn remove(ctx: &mut RunContext<'_>, node: NodeId, items: &mut Vec<Value>) -> Result<(), GraphError> {
    let target = ctx.flow_value(node, "inputs:obj")?;
    match items.iter().position(|item| item.loose_eq(&target)) {
        Some(at) => {
            items.remove(at);
            Ok(())
        }
        None => Err(ctx.fail(node, ComputeError::ValueNotFound)),
    }
}

pub fn register(registry: &mut NodeRegistry) {
    let array = || ParamDef::named("array", "object[]").hidden();
    let nodes: [(&str, Vec<ParamDef>, Mutation); 4] = [
        ("List Append", vec![array(), ParamDef::named("add", "object")], append),
        ("List Extend", vec![array(), ParamDef::named("add", "object[]").hidden()], extend),
        (
            "List Insert",
            vec![array(), ParamDef::named("obj", "object").hidden(), ParamDef::named("index", "int")],
            insert,
        ),
        ("List Remove", vec![array(), ParamDef::named("obj", "object").hidden()], remove),
    ];
    for (node_type, args, mutation) in nodes {
        registry.register(
            NodeTypeDef::flow(node_type)
                .with_group(GROUP)
                .with_args(args)
                .with_body(move |ctx, node| mutate_list(ctx, node, mutation)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{graph, node_with};
    use crate::error::{ComputeError, GraphError};
    use crate::nodes::{ExecutionEngine, NodeGraph, NodeId};
    use crate::value::Value;

    fn ints(items: &[i64]) -> Value {
        Value::List(items.iter().map(|i| Value::Int(*i)).collect())
    }

    /// A Var Object holding `initial`, feeding the list node run from Main
    fn list_graph(node_type: &str, initial: Value, inputs: &[(&str, Value)]) -> (NodeGraph, NodeId) {
        let mut g = graph();
        let var = node_with(&mut g, "Var Object", &[("outputs:result", initial)]);
        let op = node_with(&mut g, node_type, inputs);
        let main = g.create_node("Main", None, None).unwrap();
        g.connect(var, "outputs:result", op, "inputs:array").unwrap();
        g.connect(main, "Out", op, "In").unwrap();
        (g, var)
    }

    fn run_list(node_type: &str, initial: Value, inputs: &[(&str, Value)]) -> Result<Value, GraphError> {
        let (mut g, var) = list_graph(node_type, initial, inputs);
        ExecutionEngine::new().run(&mut g)?;
        g.resolved_value(var, "outputs:result")
    }

    #[test]
    fn test_append_writes_back_to_producer() {
        let result = run_list("List Append", ints(&[1]), &[("inputs:add", Value::Int(2))]).unwrap();
        assert_eq!(result, ints(&[1, 2]));
    }

    #[test]
    fn test_extend() {
        let result = run_list("List Extend", ints(&[1]), &[("inputs:add", ints(&[2, 3]))]).unwrap();
        assert_eq!(result, ints(&[1, 2, 3]));
    }

    #[test]
    fn test_insert_clamps_out_of_range_indices() {
        let front = run_list("List Insert", ints(&[1, 2]), &[("inputs:obj", Value::Int(0)), ("inputs:index", Value::Int(-10))]);
        assert_eq!(front.unwrap(), ints(&[0, 1, 2]));
        let back = run_list("List Insert", ints(&[1, 2]), &[("inputs:obj", Value::Int(9)), ("inputs:index", Value::Int(99))]);
        assert_eq!(back.unwrap(), ints(&[1, 2, 9]));
        let middle = run_list("List Insert", ints(&[1, 2]), &[("inputs:obj", Value::Int(5)), ("inputs:index", Value::Int(-1))]);
        assert_eq!(middle.unwrap(), ints(&[1, 5, 2]));
    }

    #[test]
    fn test_remove_first_match_or_fail() {
        let result = run_list("List Remove", ints(&[1, 2, 1]), &[("inputs:obj", Value::Int(1))]).unwrap();
        assert_eq!(result, ints(&[2, 1]));

        let err = run_list("List Remove", ints(&[1]), &[("inputs:obj", Value::Int(7))]).unwrap_err();
        assert!(matches!(err, GraphError::Computation { source: ComputeError::ValueNotFound, .. }));
    }

    #[test]
    fn test_unconnected_list_is_updated_in_place() {
        let mut g = graph();
        let op = node_with(&mut g, "List Append", &[("inputs:array", ints(&[4])), ("inputs:add", Value::Int(5))]);
        ExecutionEngine::new().execute_node(&mut g, op).unwrap();
        assert_eq!(g.resolved_value(op, "inputs:array").unwrap(), ints(&[4, 5]));
    }
}
