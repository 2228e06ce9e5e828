//! Node graph execution engine
//!
//! Execution is synchronous and recursive on the calling thread:
//! - Flow nodes run when control reaches them through a flow edge
//! - Pure (non-flow) nodes run each time a consumer reads one of their outputs
//! - Pass-through nodes are skipped in both directions
//! - Failures mark the node and unwind to the caller
//!
//! A depth guard turns runaway recursion from cyclic graphs into an error.

use crate::config::GraphConfig;
use crate::constants::engine::DEFAULT_MAX_DEPTH;
use crate::constants::node::ENTRY_TYPE;
use crate::constants::{ARG_PREFIX, INPUT_PREFIX, OUTPUT_PREFIX};
use crate::error::{ComputeError, GraphError, Result};
use crate::nodes::factory::Kwargs;
use crate::nodes::hooks::NodeExecutionHooks;
use crate::nodes::{Node, NodeGraph, NodeId};
use crate::value::Value;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Counters collected while running
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStats {
    pub nodes_executed: usize,
    /// Pure nodes executed because a consumer read them
    pub pure_evaluations: usize,
    pub flow_transfers: usize,
    /// Failures diverted by exception boundaries
    pub caught_errors: usize,
    pub max_depth: usize,
    per_node: HashMap<NodeId, usize>,
}

impl ExecutionStats {
    /// How many times a node's body ran
    pub fn executions(&self, id: NodeId) -> usize {
        self.per_node.get(&id).copied().unwrap_or(0)
    }
}

/// Execution engine for node graphs
pub struct ExecutionEngine {
    max_depth: usize,
    echo_print: bool,
    catch_try_errors: bool,
    /// Node-specific execution hooks
    execution_hooks: HashMap<String, Box<dyn NodeExecutionHooks>>,
    global_hooks: Vec<Box<dyn NodeExecutionHooks>>,
    stats: ExecutionStats,
    console: Vec<String>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    /// Create a new execution engine
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            echo_print: false,
            catch_try_errors: true,
            execution_hooks: HashMap::new(),
            global_hooks: Vec::new(),
            stats: ExecutionStats::default(),
            console: Vec::new(),
        }
    }

    pub fn with_config(config: &GraphConfig) -> Self {
        let mut engine = Self::new();
        engine.max_depth = config.max_execution_depth;
        engine.echo_print = config.echo_print;
        engine.catch_try_errors = config.catch_try_errors;
        engine
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn set_echo_print(&mut self, echo: bool) {
        self.echo_print = echo;
    }

    /// Whether Try nodes divert failures of their Try branch to Except
    pub fn set_catch_try_errors(&mut self, catch: bool) {
        self.catch_try_errors = catch;
    }

    /// Register hooks for one node type, replacing earlier ones
    pub fn register_hooks(&mut self, node_type: &str, hooks: Box<dyn NodeExecutionHooks>) {
        self.execution_hooks.insert(node_type.to_string(), hooks);
    }

    /// Register hooks that see every node
    pub fn add_hooks(&mut self, hooks: Box<dyn NodeExecutionHooks>) {
        self.global_hooks.push(hooks);
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ExecutionStats::default();
    }

    /// Lines written by Print nodes
    pub fn console(&self) -> &[String] {
        &self.console
    }

    pub fn take_console(&mut self) -> Vec<String> {
        std::mem::take(&mut self.console)
    }

    /// Run the graph from its entry node (the first `Main` created)
    pub fn run(&mut self, graph: &mut NodeGraph) -> Result<()> {
        let entry = graph
            .nodes_of_type(ENTRY_TYPE)
            .first()
            .copied()
            .ok_or_else(|| GraphError::NoEntryPoint(ENTRY_TYPE.to_string()))?;
        self.reset_stats();
        info!("Executing graph from node {}", entry);
        let result = self.execute_node(graph, entry);
        match &result {
            Ok(()) => info!(
                "Execution finished: {} node runs, {} flow transfers",
                self.stats.nodes_executed, self.stats.flow_transfers
            ),
            Err(err) => error!("Execution aborted: {}", err),
        }
        result
    }

    /// Execute one node and whatever it transfers control to
    pub fn execute_node(&mut self, graph: &mut NodeGraph, id: NodeId) -> Result<()> {
        let mut ctx = RunContext {
            graph,
            engine: self,
            depth: 0,
        };
        ctx.execute(id)
    }

    /// Read a parameter the way a node body would, pulling pure upstream nodes
    pub fn evaluate(&mut self, graph: &mut NodeGraph, id: NodeId, parameter: &str) -> Result<Value> {
        let mut ctx = RunContext {
            graph,
            engine: self,
            depth: 0,
        };
        ctx.flow_value(id, parameter)
    }
}

/// State handed to node bodies while they run
pub struct RunContext<'a> {
    graph: &'a mut NodeGraph,
    engine: &'a mut ExecutionEngine,
    depth: usize,
}

impl<'a> RunContext<'a> {
    pub fn graph(&self) -> &NodeGraph {
        &*self.graph
    }

    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut *self.graph
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.graph
            .node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    pub fn is_flow(&self, id: NodeId) -> bool {
        self.graph.node(id).map_or(false, Node::is_flow)
    }

    fn run_hooks(&mut self, id: NodeId, before: bool) -> Result<()> {
        let Some(node) = self.graph.node(id) else {
            return Ok(());
        };
        let graph: &NodeGraph = &*self.graph;
        let engine = &mut *self.engine;
        let typed = engine.execution_hooks.get_mut(node.node_type());
        for hooks in engine.global_hooks.iter_mut().chain(typed) {
            if before {
                hooks.before_execution(node, graph)?;
            } else {
                hooks.after_execution(node, graph)?;
            }
        }
        Ok(())
    }

    fn notify_failure(&mut self, id: NodeId, err: &GraphError) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        let engine = &mut *self.engine;
        let typed = engine.execution_hooks.get_mut(node.node_type());
        for hooks in engine.global_hooks.iter_mut().chain(typed) {
            hooks.on_failure(node, err);
        }
    }

    /// before (reset error flag, hooks) -> body -> after (hooks)
    pub fn execute(&mut self, id: NodeId) -> Result<()> {
        if self.depth >= self.engine.max_depth {
            return Err(GraphError::RecursionLimit(self.engine.max_depth));
        }
        let behavior = self.node(id)?.def().behavior().cloned();
        self.graph.set_node_error(id, false);
        self.run_hooks(id, true)?;

        self.depth += 1;
        let stats = &mut self.engine.stats;
        stats.nodes_executed += 1;
        stats.max_depth = stats.max_depth.max(self.depth);
        *stats.per_node.entry(id).or_insert(0) += 1;
        debug!("Executing node {} at depth {}", id, self.depth);
        let result = match behavior {
            Some(behavior) => behavior.run_body(self, id),
            None => Ok(()),
        };
        self.depth -= 1;

        if let Err(err) = result {
            self.notify_failure(id, &err);
            return Err(err);
        }
        self.run_hooks(id, false)
    }

    /// Value of a parameter as a body sees it. A connected parameter reads
    /// its producer, executing the producer first when it is a pure node.
    pub fn flow_value(&mut self, id: NodeId, parameter: &str) -> Result<Value> {
        let node = self.node(id)?;
        let param = node
            .parameter(parameter)
            .ok_or_else(|| GraphError::ParameterNotFound {
                node: node.name().to_string(),
                parameter: parameter.to_string(),
            })?;
        let Some(reference) = param.connect().map(str::to_string) else {
            return Ok(node.value(parameter).unwrap_or_default());
        };

        let source = self.graph.resolve_source(&reference)?;
        let pure = self
            .graph
            .node(source.node)
            .map_or(false, |n| n.def().is_executable() && !n.is_flow());
        if pure {
            self.engine.stats.pure_evaluations += 1;
            self.execute(source.node)?;
        }
        let upstream = self.node(source.node)?;
        upstream
            .value(&source.port)
            .ok_or_else(|| GraphError::ParameterNotFound {
                node: upstream.name().to_string(),
                parameter: source.port.clone(),
            })
    }

    /// Write a value back to where a parameter reads from: the connected
    /// producer if any, the parameter itself otherwise
    pub fn update_flow_value(&mut self, id: NodeId, parameter: &str, value: Value) -> Result<()> {
        let reference = self.node(id)?.connect(parameter).map(str::to_string);
        match reference {
            Some(reference) => {
                let source = self.graph.resolve_source(&reference)?;
                self.graph.set_value(source.node, &source.port, value)
            }
            None => self.graph.set_value(id, parameter, value),
        }
    }

    /// Store a result on the node
    pub fn set_output(&mut self, id: NodeId, parameter: &str, value: impl Into<Value>) -> Result<()> {
        self.graph.set_value(id, parameter, value)
    }

    /// Transfer control down a flow output, running every reachable node in
    /// connection order
    pub fn goto_next(&mut self, id: NodeId, port: &str) -> Result<()> {
        let targets = self.graph.flow_targets(id, port);
        self.engine.stats.flow_transfers += 1;
        for target in targets {
            self.execute(target)?;
        }
        Ok(())
    }

    /// Resolve `inputs:arg*` parameters as positional arguments and the
    /// other inputs as keyword arguments named without the prefix
    pub fn arguments(&mut self, id: NodeId) -> Result<(Vec<Value>, Kwargs)> {
        let names: Vec<String> = self
            .node(id)?
            .parameters_with_prefix(INPUT_PREFIX)
            .map(str::to_string)
            .collect();
        let mut args = Vec::new();
        let mut kwargs = Kwargs::new();
        for name in names {
            let value = self.flow_value(id, &name)?;
            if name.starts_with(ARG_PREFIX) {
                args.push(value);
            } else {
                kwargs.insert(name[INPUT_PREFIX.len()..].to_string(), value);
            }
        }
        Ok((args, kwargs))
    }

    /// Write results to the node's output parameters by position
    pub fn write_results(&mut self, id: NodeId, results: Vec<Value>) -> Result<()> {
        let names: Vec<String> = self
            .node(id)?
            .parameters_with_prefix(OUTPUT_PREFIX)
            .map(str::to_string)
            .collect();
        if results.len() < names.len() {
            warn!("Node {} produced {} of {} results", id, results.len(), names.len());
        }
        for (name, value) in names.iter().zip(results) {
            self.graph.set_value(id, name, value)?;
        }
        Ok(())
    }

    /// Mark the node as failed and wrap the error for propagation
    pub fn fail(&mut self, id: NodeId, err: ComputeError) -> GraphError {
        self.graph.set_node_error(id, true);
        let node = self
            .graph
            .node(id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| id.to_string());
        error!("Node '{}' failed: {}", node, err);
        GraphError::Computation { node, source: err }
    }

    /// Output of a Print node
    pub fn print(&mut self, text: String) {
        if self.engine.echo_print {
            println!("{}", text);
        }
        self.engine.console.push(text);
    }

    pub fn catches_try_errors(&self) -> bool {
        self.engine.catch_try_errors
    }

    pub(crate) fn record_caught_error(&mut self, id: NodeId, err: &GraphError) {
        self.engine.stats.caught_errors += 1;
        warn!("Node {} diverted failure to its Except branch: {}", id, err);
    }

    /// Registry shared with the graph
    pub fn registry(&self) -> Arc<crate::nodes::NodeRegistry> {
        Arc::clone(self.graph.registry())
    }
}
