//! Filesystem, platform and clock nodes

use super::{arg, colors, kwarg};
use crate::constants::port::{FINALLY, IN};
use crate::error::{ComputeError, GraphError};
use crate::nodes::execution_engine::RunContext;
use crate::nodes::factory::{Kwargs, NodeRegistry, NodeTypeDef, ParamDef};
use crate::nodes::port::PortType;
use crate::nodes::NodeId;
use crate::value::Value;
use log::warn;
use std::fs;
use std::path::{is_separator, Path};
use std::time::{SystemTime, UNIX_EPOCH};

pub const FOR_EACH_ROOT: &str = "For Each Root";
pub const FOR_EACH_DIR: &str = "For Each Dir";
pub const FOR_EACH_FILE: &str = "For Each File";

fn path_arg<'a>(kwargs: &'a Kwargs, name: &str) -> Result<&'a Path, ComputeError> {
    Ok(Path::new(kwarg(kwargs, name)?.expect_str()?))
}

/// Everything before the final separator, trailing separators trimmed
fn dirname(path: &str) -> String {
    match path.rfind(is_separator) {
        Some(at) => {
            let head = &path[..at + 1];
            let trimmed = head.trim_end_matches(is_separator);
            let dir = if trimmed.is_empty() { head } else { trimmed };
            dir.to_string()
        }
        None => String::new(),
    }
}

/// Everything after the final separator
fn basename(path: &str) -> String {
    path.rfind(is_separator)
        .map_or(path, |at| &path[at + 1..])
        .to_string()
}

/// Entry names of a directory split into (directories, files), each sorted
fn list_dir(dir: &Path) -> std::io::Result<(Vec<String>, Vec<String>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

/// Top-down walk: each root fires, then its directories, then its files,
/// then the walk descends. Unreadable directories are skipped.
fn walk(ctx: &mut RunContext<'_>, node: NodeId, root: &Path) -> Result<(), GraphError> {
    let (dirs, files) = match list_dir(root) {
        Ok(listing) => listing,
        Err(err) => {
            warn!("Skipping {}: {}", root.display(), err);
            return Ok(());
        }
    };
    ctx.set_output(node, "outputs:root", root.to_string_lossy().into_owned())?;
    ctx.goto_next(node, FOR_EACH_ROOT)?;
    for dir in &dirs {
        ctx.set_output(node, "outputs:dir", dir.as_str())?;
        ctx.goto_next(node, FOR_EACH_DIR)?;
    }
    for file in &files {
        ctx.set_output(node, "outputs:file", file.as_str())?;
        ctx.goto_next(node, FOR_EACH_FILE)?;
    }
    for dir in &dirs {
        let child = root.join(dir);
        if !child.is_symlink() {
            walk(ctx, node, &child)?;
        }
    }
    Ok(())
}

fn walk_dir(ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError> {
    let path = ctx.flow_value(node, "inputs:path")?;
    let path = path.expect_str().map_err(|err| ctx.fail(node, err))?.to_string();
    walk(ctx, node, Path::new(&path))?;
    ctx.goto_next(node, FINALLY)
}

fn user_name() -> Result<String, ComputeError> {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .ok_or_else(|| ComputeError::Message("could not determine the user name".to_string()))
}

fn system_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn platform_system() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "windows" => "Windows".to_string(),
        other => other.to_string(),
    }
}

fn platform_version() -> String {
    fs::read_to_string("/proc/sys/kernel/version")
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn seconds_since_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn library_node(node_type: &str, group: &str, flow: bool) -> NodeTypeDef {
    let def = if flow {
        NodeTypeDef::flow(node_type)
    } else {
        NodeTypeDef::pure(node_type)
    };
    def.with_group(group)
        .with_colors(&colors::LIBRARY_FILL, &colors::LIBRARY_BORDER)
}

fn register_os(registry: &mut NodeRegistry) {
    let pure = |node_type: &str| library_node(node_type, "os", false);
    let flow = |node_type: &str| library_node(node_type, "os", true);

    registry.register(
        pure("Get Join Path")
            .with_args(vec![ParamDef::new("str"), ParamDef::new("str")])
            .with_results(vec![ParamDef::new("str")])
            .with_compute(|args, _| {
                let joined = Path::new(arg(args, 0)?.expect_str()?).join(arg(args, 1)?.expect_str()?);
                Ok(vec![Value::from(joined.to_string_lossy().into_owned())])
            }),
    );
    registry.register(
        pure("Get Path Dirname")
            .with_args(vec![ParamDef::new("str")])
            .with_results(vec![ParamDef::new("str")])
            .with_compute(|args, _| Ok(vec![Value::from(dirname(arg(args, 0)?.expect_str()?))])),
    );
    registry.register(
        pure("Get Path Basename")
            .with_args(vec![ParamDef::new("str")])
            .with_results(vec![ParamDef::new("str")])
            .with_compute(|args, _| Ok(vec![Value::from(basename(arg(args, 0)?.expect_str()?))])),
    );
    registry.register(
        pure("Does Path Exists")
            .with_args(vec![ParamDef::new("str")])
            .with_results(vec![ParamDef::new("bool")])
            .with_compute(|args, _| Ok(vec![Value::Bool(Path::new(arg(args, 0)?.expect_str()?).exists())])),
    );
    registry.register(
        pure("Get Dir Content")
            .with_args(vec![ParamDef::named("dir", "str")])
            .with_results(vec![ParamDef::new("str[]")])
            .with_compute(|_, kwargs| {
                let (dirs, files) = list_dir(path_arg(kwargs, "dir")?)?;
                let mut names: Vec<String> = dirs.into_iter().chain(files).collect();
                names.sort();
                Ok(vec![Value::List(names.into_iter().map(Value::from).collect())])
            }),
    );

    // Existing folders are accepted
    registry.register(
        flow("Create Folder")
            .with_args(vec![ParamDef::named("path", "str")])
            .with_compute(|_, kwargs| {
                fs::create_dir_all(path_arg(kwargs, "path")?)?;
                Ok(Vec::new())
            }),
    );
    registry.register(
        flow("Remove File")
            .with_args(vec![ParamDef::named("path", "str")])
            .with_compute(|_, kwargs| {
                fs::remove_file(path_arg(kwargs, "path")?)?;
                Ok(Vec::new())
            }),
    );
    registry.register(
        flow("Rename File")
            .with_args(vec![ParamDef::named("src", "str"), ParamDef::named("dst", "str")])
            .with_compute(|_, kwargs| {
                fs::rename(path_arg(kwargs, "src")?, path_arg(kwargs, "dst")?)?;
                Ok(Vec::new())
            }),
    );
    registry.register(
        flow("Walk Dir")
            .with_flow_ports(&[
                (IN, PortType::Input),
                (FOR_EACH_ROOT, PortType::Output),
                (FOR_EACH_DIR, PortType::Output),
                (FOR_EACH_FILE, PortType::Output),
                (FINALLY, PortType::Output),
            ])
            .with_args(vec![ParamDef::named("path", "str")])
            .with_results(vec![
                ParamDef::named("root", "str"),
                ParamDef::named("dir", "str"),
                ParamDef::named("file", "str"),
            ])
            .with_body(walk_dir),
    );
}

fn register_shutil(registry: &mut NodeRegistry) {
    let flow = |node_type: &str| {
        NodeTypeDef::flow(node_type)
            .with_group("shutil")
            .with_colors(&colors::SHUTIL_FILL, &colors::SHUTIL_BORDER)
    };
    registry.register(
        flow("Copy File")
            .with_args(vec![ParamDef::named("src", "str"), ParamDef::named("dst", "str")])
            .with_compute(|_, kwargs| {
                fs::copy(path_arg(kwargs, "src")?, path_arg(kwargs, "dst")?)?;
                Ok(Vec::new())
            }),
    );
    registry.register(
        flow("Remove Tree")
            .with_args(vec![ParamDef::named("src", "str")])
            .with_compute(|_, kwargs| {
                fs::remove_dir_all(path_arg(kwargs, "src")?)?;
                Ok(Vec::new())
            }),
    );
}

fn register_platform(registry: &mut NodeRegistry) {
    let text = |node_type: &str| library_node(node_type, "System", false).with_results(vec![ParamDef::new("str")]);
    registry.register(text("Get User").with_compute(|_, _| Ok(vec![Value::from(user_name()?)])));
    registry.register(text("Get System Platform").with_compute(|_, _| Ok(vec![Value::from(system_platform())])));
    registry.register(text("Get Platform System").with_compute(|_, _| Ok(vec![Value::from(platform_system())])));
    registry.register(text("Get Platform Version").with_compute(|_, _| Ok(vec![Value::from(platform_version())])));

    registry.register(
        library_node("Get Time", "Time", false)
            .with_results(vec![ParamDef::new("float")])
            .with_compute(|_, _| Ok(vec![Value::Float(seconds_since_epoch())])),
    );
}

pub fn register(registry: &mut NodeRegistry) {
    register_os(registry);
    register_shutil(registry);
    register_platform(registry);
}

#[cfg(test)]
mod tests {
    use super::super::testing::{eval, graph, node_with};
    use super::*;
    use crate::constants::port::OUT;
    use crate::nodes::ExecutionEngine;
    use tempfile::TempDir;

    fn s(value: &str) -> Value {
        Value::from(value)
    }

    fn path_str(path: &Path) -> Value {
        Value::from(path.to_string_lossy().into_owned())
    }

    #[test]
    fn test_dirname_and_basename() {
        assert_eq!(dirname("a/b/c.txt"), "a/b");
        assert_eq!(dirname("/top"), "/");
        assert_eq!(dirname("name"), "");
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("a/b/"), "");
        let joined = eval("Get Join Path", &[("inputs:arg1", s("a")), ("inputs:arg2", s("b"))]).unwrap();
        assert_eq!(joined, path_str(&Path::new("a").join("b")));
    }

    #[test]
    fn test_flow_file_operations() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("nested").join("deeper");
        let source = tmp.path().join("a.txt");
        let copy = tmp.path().join("b.txt");
        let moved = folder.join("c.txt");
        fs::write(&source, "payload").unwrap();

        let mut g = graph();
        let main = g.create_node("Main", None, None).unwrap();
        let create = node_with(&mut g, "Create Folder", &[("inputs:path", path_str(&folder))]);
        let copy_file = node_with(&mut g, "Copy File", &[("inputs:src", path_str(&source)), ("inputs:dst", path_str(&copy))]);
        let rename = node_with(&mut g, "Rename File", &[("inputs:src", path_str(&copy)), ("inputs:dst", path_str(&moved))]);
        let remove = node_with(&mut g, "Remove File", &[("inputs:path", path_str(&source))]);
        let mut previous = main;
        for next in [create, copy_file, rename, remove] {
            g.connect(previous, OUT, next, IN).unwrap();
            previous = next;
        }

        ExecutionEngine::new().run(&mut g).unwrap();
        assert!(!source.exists());
        assert!(!copy.exists());
        assert_eq!(fs::read_to_string(&moved).unwrap(), "payload");

        let exists = eval("Does Path Exists", &[("inputs:arg", path_str(&moved))]).unwrap();
        assert_eq!(exists, Value::Bool(true));
        let content = eval("Get Dir Content", &[("inputs:dir", path_str(tmp.path()))]).unwrap();
        assert_eq!(content, Value::List(vec![s("nested")]));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let mut g = graph();
        let remove = node_with(&mut g, "Remove File", &[("inputs:path", path_str(&tmp.path().join("nope")))]);
        let err = ExecutionEngine::new().execute_node(&mut g, remove).unwrap_err();
        assert!(matches!(err, GraphError::Computation { source: ComputeError::Io(_), .. }));
        assert!(g.node(remove).unwrap().has_error());
    }

    #[test]
    fn test_walk_dir_is_top_down_and_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b").join("inner")).unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("z.txt"), "").unwrap();
        fs::write(tmp.path().join("b").join("x.txt"), "").unwrap();

        let mut g = graph();
        let main = g.create_node("Main", None, None).unwrap();
        let walker = node_with(&mut g, "Walk Dir", &[("inputs:path", path_str(tmp.path()))]);
        g.connect(main, OUT, walker, IN).unwrap();
        for (port, output) in [
            (FOR_EACH_DIR, "outputs:dir"),
            (FOR_EACH_FILE, "outputs:file"),
        ] {
            let print = g.create_node("Print", None, None).unwrap();
            g.connect(walker, port, print, IN).unwrap();
            g.connect(walker, output, print, "inputs:arg").unwrap();
        }
        let done = node_with(&mut g, "Print", &[("inputs:arg", s("done"))]);
        g.connect(walker, FINALLY, done, IN).unwrap();

        let mut engine = ExecutionEngine::new();
        engine.run(&mut g).unwrap();
        assert_eq!(engine.console(), &["a", "b", "z.txt", "inner", "x.txt", "done"]);
    }

    #[test]
    fn test_platform_nodes() {
        assert_eq!(eval("Get System Platform", &[]).unwrap(), s(system_platform()));
        let now = eval("Get Time", &[]).unwrap();
        assert!(now.as_f64().unwrap() > 1.0e9);
    }
}
