//! Variable nodes: constants, array builders and conversions

use super::{arg, colors};
use crate::nodes::factory::{NodeRegistry, NodeTypeDef, ParamDef};
use crate::value::Value;

const GROUP: &str = "Var";

/// Constant holders: the value lives on the visible result, the body does nothing
const VARIABLES: [(&str, &str); 6] = [
    ("Var Object", "object"),
    ("Var String", "str"),
    ("Var Text", "text"),
    ("Var Int", "int"),
    ("Var Float", "float"),
    ("Var Bool", "bool"),
];

/// Array builders: (type, element type, result type, parents)
const ARRAYS: [(&str, &str, &str, &[&str]); 5] = [
    ("Var Object Array", "object", "object[]", &[]),
    ("Var String Array", "str", "str[]", &["Var Object Array"]),
    ("Var Number Array", "number", "number[]", &["Var Object Array"]),
    ("Var Int Array", "int", "int[]", &["Var Number Array", "Var Object Array"]),
    ("Var Float Array", "float", "float[]", &["Var Number Array", "Var Object Array"]),
];

pub fn register(registry: &mut NodeRegistry) {
    for (node_type, tag) in VARIABLES {
        registry.register(
            NodeTypeDef::pure(node_type)
                .with_group(GROUP)
                .with_colors(&colors::VAR_FILL, &colors::VAR_BORDER)
                .with_results(vec![ParamDef::new(tag).visible(true)])
                .with_body(|_, _| Ok(())),
        );
    }

    // Collect every positional input, in port order, into one list
    for (node_type, element, result, parents) in ARRAYS {
        registry.register(
            NodeTypeDef::flow(node_type)
                .with_group(GROUP)
                .with_parents(parents)
                .with_colors(&colors::VAR_FILL, &colors::VAR_BORDER)
                .with_results(vec![ParamDef::new(result).hidden()])
                .with_addable_port(element)
                .with_compute(|args, _| Ok(vec![Value::List(args.to_vec())])),
        );
    }

    registry.register(
        NodeTypeDef::pure("To Str")
            .with_group(GROUP)
            .with_colors(&colors::VAR_FILL, &colors::VAR_BORDER)
            .with_args(vec![ParamDef::new("object")])
            .with_results(vec![ParamDef::new("str")])
            .with_compute(|args, _| Ok(vec![Value::from(arg(args, 0)?.to_string())])),
    );
}

#[cfg(test)]
mod tests {
    use super::super::testing::{compute, eval, graph, node_with};
    use crate::nodes::ExecutionEngine;
    use crate::value::Value;

    #[test]
    fn test_variable_result_is_visible_and_typed() {
        let mut g = graph();
        let var = node_with(&mut g, "Var Int", &[("outputs:result", Value::from("42"))]);
        let param = g.node(var).unwrap().parameter("outputs:result").unwrap();
        assert!(param.is_visible());
        assert_eq!(param.type_tag(), "int");
        assert_eq!(compute(&mut g, var).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_array_collects_added_ports_in_order() {
        let mut g = graph();
        let array = g.create_node("Var Int Array", None, None).unwrap();
        let main = g.create_node("Main", None, None).unwrap();
        g.connect(main, "Out", array, "In").unwrap();
        for value in [3, 1, 2] {
            let port = g.add_input_port(array).unwrap();
            g.set_value(array, &port, value).unwrap();
        }
        assert_eq!(g.node(array).unwrap().parameter("inputs:arg1").unwrap().type_tag(), "int");

        ExecutionEngine::new().run(&mut g).unwrap();
        assert_eq!(
            g.resolved_value(array, "outputs:result").unwrap(),
            Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_to_str_renders_plain_text() {
        assert_eq!(eval("To Str", &[("inputs:arg", Value::Float(1.5))]).unwrap(), Value::from("1.5"));
        let list = Value::List(vec![Value::from("a"), Value::None]);
        assert_eq!(eval("To Str", &[("inputs:arg", list)]).unwrap(), Value::from("['a', None]"));
    }
}
