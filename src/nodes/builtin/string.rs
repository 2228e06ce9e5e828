//! String nodes
//!
//! Strip and split treat an empty separator as "any whitespace".

use super::{arg, kwarg};
use crate::error::ComputeError;
use crate::nodes::factory::{Kwargs, NodeRegistry, NodeTypeDef, ParamDef};
use crate::value::Value;

const GROUP: &str = "String";

fn text<'a>(kwargs: &'a Kwargs, name: &str) -> Result<&'a str, ComputeError> {
    kwarg(kwargs, name)?.expect_str()
}

/// Separator argument; `None` and `""` both mean whitespace
fn separator<'a>(kwargs: &'a Kwargs, name: &str) -> Result<Option<&'a str>, ComputeError> {
    match kwarg(kwargs, name)? {
        Value::None => Ok(None),
        value => Ok(Some(value.expect_str()?).filter(|s| !s.is_empty())),
    }
}

#[derive(Clone, Copy)]
enum Side {
    Both,
    Left,
    Right,
}

fn strip(s: &str, chars: Option<&str>, side: Side) -> String {
    let strip_char = |c: char| match chars {
        Some(set) => set.contains(c),
        None => c.is_whitespace(),
    };
    match side {
        Side::Both => s.trim_matches(strip_char),
        Side::Left => s.trim_start_matches(strip_char),
        Side::Right => s.trim_end_matches(strip_char),
    }
    .to_string()
}

fn split(s: &str, sep: Option<&str>) -> Value {
    let parts: Vec<Value> = match sep {
        Some(sep) => s.split(sep).map(Value::from).collect(),
        None => s.split_whitespace().map(Value::from).collect(),
    };
    Value::List(parts)
}

/// Character index of the first occurrence, or -1
fn find(s: &str, sub: &str) -> i64 {
    s.find(sub)
        .map_or(-1, |byte| s[..byte].chars().count() as i64)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

fn swapcase(s: &str) -> String {
    s.chars()
        .flat_map(|c| -> Box<dyn Iterator<Item = char>> {
            if c.is_uppercase() {
                Box::new(c.to_lowercase())
            } else if c.is_lowercase() {
                Box::new(c.to_uppercase())
            } else {
                Box::new(std::iter::once(c))
            }
        })
        .collect()
}

fn string_node(node_type: &str, args: &[(&str, &str)], result: &str) -> NodeTypeDef {
    NodeTypeDef::pure(node_type)
        .with_group(GROUP)
        .with_args(
            args.iter()
                .map(|(name, tag)| ParamDef::named(name, tag))
                .collect(),
        )
        .with_results(vec![ParamDef::new(result)])
}

pub fn register(registry: &mut NodeRegistry) {
    registry.register(
        string_node("Starts With", &[("string", "str"), ("prefix", "str")], "bool").with_compute(|_, kw| {
            Ok(vec![Value::Bool(text(kw, "string")?.starts_with(text(kw, "prefix")?))])
        }),
    );
    registry.register(
        string_node("Ends With", &[("string", "str"), ("suffix", "str")], "bool").with_compute(|_, kw| {
            Ok(vec![Value::Bool(text(kw, "string")?.ends_with(text(kw, "suffix")?))])
        }),
    );
    registry.register(
        string_node("Find String", &[("string", "str"), ("sub", "str")], "int").with_compute(|_, kw| {
            Ok(vec![Value::Int(find(text(kw, "string")?, text(kw, "sub")?))])
        }),
    );

    let strips = [
        ("Strip String", Side::Both, &[][..]),
        ("Strip String Left", Side::Left, &["Strip String"][..]),
        ("Strip String Right", Side::Right, &["Strip String"][..]),
    ];
    for (node_type, side, parents) in strips {
        registry.register(
            string_node(node_type, &[("string", "str"), ("sub", "str")], "str")
                .with_parents(parents)
                .with_compute(move |_, kw| {
                    Ok(vec![Value::from(strip(text(kw, "string")?, separator(kw, "sub")?, side))])
                }),
        );
    }

    registry.register(
        string_node("Split", &[("string", "str"), ("split", "str")], "str[]").with_compute(|_, kw| {
            Ok(vec![split(text(kw, "string")?, separator(kw, "split")?)])
        }),
    );
    registry.register(
        string_node("Replace", &[("string", "str"), ("from", "str"), ("to", "str")], "str").with_compute(|_, kw| {
            let replaced = text(kw, "string")?.replace(text(kw, "from")?, text(kw, "to")?);
            Ok(vec![Value::from(replaced)])
        }),
    );
    registry.register(
        NodeTypeDef::pure("Join")
            .with_group(GROUP)
            .with_args(vec![
                ParamDef::named("split", "str"),
                ParamDef::named("array", "str[]").hidden(),
            ])
            .with_results(vec![ParamDef::new("str")])
            .with_compute(|_, kw| {
                let parts: Vec<String> = kwarg(kw, "array")?
                    .expect_list()?
                    .iter()
                    .map(Value::to_string)
                    .collect();
                Ok(vec![Value::from(parts.join(text(kw, "split")?))])
            }),
    );

    let conversions: [(&str, fn(&str) -> String); 4] = [
        ("Capitalize String", capitalize),
        ("Lower String", str::to_lowercase),
        ("Upper String", str::to_uppercase),
        ("Swapcase String", swapcase),
    ];
    for (node_type, convert) in conversions {
        registry.register(
            NodeTypeDef::pure(node_type)
                .with_group(GROUP)
                .with_args(vec![ParamDef::new("str")])
                .with_results(vec![ParamDef::new("str")])
                .with_compute(move |args, _| Ok(vec![Value::from(convert(arg(args, 0)?.expect_str()?))])),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::eval;
    use super::*;

    fn s(value: &str) -> Value {
        Value::from(value)
    }

    #[test]
    fn test_prefix_suffix_and_find() {
        let starts = eval("Starts With", &[("inputs:string", s("nodeflow")), ("inputs:prefix", s("node"))]);
        assert_eq!(starts.unwrap(), Value::Bool(true));
        let ends = eval("Ends With", &[("inputs:string", s("nodeflow")), ("inputs:suffix", s("node"))]);
        assert_eq!(ends.unwrap(), Value::Bool(false));
        assert_eq!(find("héllo", "llo"), 2);
        assert_eq!(find("hello", "z"), -1);
    }

    #[test]
    fn test_strip_variants() {
        let input = [("inputs:string", s("xxabcxx")), ("inputs:sub", s("x"))];
        assert_eq!(eval("Strip String", &input).unwrap(), s("abc"));
        assert_eq!(eval("Strip String Left", &input).unwrap(), s("abcxx"));
        assert_eq!(eval("Strip String Right", &input).unwrap(), s("xxabc"));
        assert_eq!(eval("Strip String", &[("inputs:string", s("  pad \n"))]).unwrap(), s("pad"));
    }

    #[test]
    fn test_split_and_join() {
        let parts = eval("Split", &[("inputs:string", s("a,b,,c")), ("inputs:split", s(","))]).unwrap();
        assert_eq!(parts, Value::List(vec![s("a"), s("b"), s(""), s("c")]));
        let words = eval("Split", &[("inputs:string", s(" one  two "))]).unwrap();
        assert_eq!(words, Value::List(vec![s("one"), s("two")]));

        let joined = eval("Join", &[("inputs:split", s("-")), ("inputs:array", parts)]).unwrap();
        assert_eq!(joined, s("a-b--c"));
    }

    #[test]
    fn test_replace() {
        let input = [("inputs:string", s("a.b.c")), ("inputs:from", s(".")), ("inputs:to", s("/"))];
        assert_eq!(eval("Replace", &input).unwrap(), s("a/b/c"));
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(capitalize("hELLO world"), "Hello world");
        assert_eq!(swapcase("Hello ß"), "hELLO SS");
        assert_eq!(eval("Upper String", &[("inputs:arg", s("abc"))]).unwrap(), s("ABC"));
        assert_eq!(eval("Lower String", &[("inputs:arg", s("ABC"))]).unwrap(), s("abc"));
    }
}
