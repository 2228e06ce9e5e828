//! Nodeflow command line
//!
//! Runs, checks and inspects graph documents without an editor.

use clap::{Parser, Subcommand};
use log::{error, info};
use nodeflow::{ExecutionEngine, GraphConfig, GraphError, NodeGraph, NodeRegistry, PluginManager};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "nodeflow", version, about = "Run and inspect node graph documents")]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a graph from its Main node
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Load a graph and report its nodes and connections
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List registered node types
    Types {
        /// Only list this group
        #[arg(long)]
        group: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<GraphConfig, GraphError> {
    let mut config = match path {
        Some(path) => GraphConfig::load(path)?,
        None => GraphConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn registry(config: &GraphConfig) -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::with_builtins();
    PluginManager::with_config(config).load_all(&mut registry);
    Arc::new(registry)
}

fn open(file: &Path, config: &GraphConfig) -> Result<NodeGraph, GraphError> {
    let mut graph = NodeGraph::with_config(registry(config), config);
    graph.open(file)?;
    Ok(graph)
}

fn run(file: &Path, mut config: GraphConfig) -> Result<(), GraphError> {
    config.echo_print = true;
    let mut graph = open(file, &config)?;
    let mut engine = ExecutionEngine::with_config(&config);
    let result = engine.run(&mut graph);
    let stats = engine.stats();
    info!(
        "Executed {} nodes, {} errors caught",
        stats.nodes_executed, stats.caught_errors
    );
    result
}

fn check(file: &Path, config: &GraphConfig) -> Result<(), GraphError> {
    let graph = open(file, config)?;
    for node in graph.nodes() {
        println!("{} ({})", node.name(), node.node_type());
    }
    println!("{} nodes, {} connections", graph.len(), graph.pipes().len());
    Ok(())
}

fn types(group: Option<&str>, config: &GraphConfig) {
    let registry = registry(config);
    for (name, node_types) in registry.nodes_by_group() {
        if group.map_or(false, |g| g != name) {
            continue;
        }
        println!("{}", name);
        for node_type in node_types {
            println!("  {}", node_type);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            process::exit(2);
        }
    };

    let result = match &args.command {
        Command::Run { file } => run(file, config),
        Command::Check { file } => check(file, &config),
        Command::Types { group } => {
            types(group.as_deref(), &config);
            Ok(())
        }
    };
    if let Err(err) = result {
        error!("{}", err);
        process::exit(1);
    }
}
