//! Shared combinational-dependence analysis.
//!
//! The verifiers and the fusion pass all walk the same graph: values are
//! nodes, and an edge `a -> b` means `b` combinationally depends on `a`.
//! Sequential results (registers, memories, FIFOs, CDC synchronizers) have
//! no incoming edges; they are the cut points of every traversal.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use pyc_ir::attribute::reserved;
use pyc_ir::{Function, Module, OpKind, Value};
use pyc_utils::{Error, Id, PycResult};

/// For every function: the `(input index, output index)` pairs with a purely
/// combinational path from that input port to that output port. Instances
/// contribute these edges to their caller's graph, so a comb cycle threaded
/// through a submodule is still a cycle.
pub type InstanceCombIo = HashMap<Id, Vec<(usize, usize)>>;

/// Compute [`InstanceCombIo`] for a whole module.
pub fn instance_comb_io(module: &Module) -> PycResult<InstanceCombIo> {
    let mut memo: InstanceCombIo = HashMap::new();
    for func in &module.functions {
        let mut visiting = Vec::new();
        comb_io_of(module, func.name, &mut memo, &mut visiting)?;
    }
    Ok(memo)
}

fn comb_io_of(
    module: &Module,
    name: Id,
    memo: &mut InstanceCombIo,
    visiting: &mut Vec<Id>,
) -> PycResult<()> {
    if memo.contains_key(&name) {
        return Ok(());
    }
    if visiting.contains(&name) {
        return Err(Error::malformed_structure(format!(
            "recursive instantiation of `{name}'"
        )));
    }
    visiting.push(name);
    let func = module.resolve_callee(name)?;

    // Resolve callees first.
    for (_, op) in func.iter_ops() {
        if matches!(op.kind, OpKind::Instance) {
            let callee = op
                .attributes
                .get_sym(reserved::CALLEE)
                .ok_or_else(|| Error::malformed_structure("instance without a callee"))?;
            module.resolve_callee(callee)?;
            comb_io_of(module, callee, memo, visiting)?;
        }
    }

    let inputs: Vec<Value> = func
        .input_ports()
        .map(|p| func.input_value(p.name).expect("input op exists"))
        .collect();
    let mut pairs = Vec::new();
    for (out_idx, (_, out_value)) in func.outputs.iter().enumerate() {
        let reached = comb_sources(func, *out_value, memo);
        for (in_idx, input) in inputs.iter().enumerate() {
            if reached.contains(input) {
                pairs.push((in_idx, out_idx));
            }
        }
    }
    visiting.pop();
    memo.insert(name, pairs);
    Ok(())
}

/// All values reachable from `root` walking backwards through combinational
/// dependences (including comb paths through instances).
fn comb_sources(func: &Function, root: Value, memo: &InstanceCombIo) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::new();
    let mut stack = vec![root];
    while let Some(v) = stack.pop() {
        if seen.contains(&v) {
            continue;
        }
        seen.push(v);
        let op = func.op(v.op);
        match &op.kind {
            k if k.is_pure_comb() => stack.extend(op.operands.iter().copied()),
            OpKind::Instance => {
                if let Some(callee) = op.attributes.get_sym(reserved::CALLEE) {
                    if let Some(pairs) = memo.get(&callee) {
                        for &(i, j) in pairs {
                            if j == v.result as usize {
                                stack.push(op.operands[i]);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    seen
}

/// Value-level combinational dependence graph of one function.
pub struct CombGraph {
    pub graph: DiGraph<Value, ()>,
    pub nodes: HashMap<Value, NodeIndex>,
}

impl CombGraph {
    pub fn build(func: &Function, comb_io: &InstanceCombIo) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<Value, NodeIndex> = HashMap::new();
        // Insert nodes in arena order so traversal results are
        // deterministic.
        for (idx, op) in func.iter_ops() {
            for result in 0..op.widths.len() {
                let v = Value::new(idx, result as u8);
                nodes.insert(v, graph.add_node(v));
            }
        }
        for (idx, op) in func.iter_ops() {
            if op.kind.is_pure_comb() {
                for operand in &op.operands {
                    for result in 0..op.widths.len() {
                        let dst = nodes[&Value::new(idx, result as u8)];
                        graph.add_edge(nodes[operand], dst, ());
                    }
                }
            } else if matches!(op.kind, OpKind::Instance) {
                let Some(callee) = op.attributes.get_sym(reserved::CALLEE) else {
                    continue;
                };
                if let Some(pairs) = comb_io.get(&callee) {
                    for &(i, j) in pairs {
                        let dst = nodes[&Value::new(idx, j as u8)];
                        graph.add_edge(nodes[&op.operands[i]], dst, ());
                    }
                }
            }
        }
        CombGraph { graph, nodes }
    }

    /// Find one combinational cycle, returned as the values involved.
    /// Deterministic: the first strongly connected component (in node order)
    /// with more than one member, or a self-loop.
    pub fn find_cycle(&self) -> Option<Vec<Value>> {
        for scc in petgraph::algo::kosaraju_scc(&self.graph) {
            if scc.len() > 1 {
                let mut cycle: Vec<Value> =
                    scc.iter().map(|&n| self.graph[n]).collect();
                cycle.sort();
                return Some(cycle);
            }
            let n = scc[0];
            if self.graph.find_edge(n, n).is_some() {
                return Some(vec![self.graph[n]]);
            }
        }
        None
    }
}

/// Per-value combinational depth: the number of logic ops on the longest
/// path from a sequential boundary (input, constant, or sequential result)
/// to the value. Constants and plain renames contribute no depth.
pub fn logic_depths(func: &Function, comb_io: &InstanceCombIo) -> PycResult<HashMap<Value, i64>> {
    let cg = CombGraph::build(func, comb_io);
    let order = petgraph::algo::toposort(&cg.graph, None).map_err(|cyc| {
        Error::comb_cycle(format!(
            "cannot compute logic depth: combinational cycle through `{}'",
            func.value_name(cg.graph[cyc.node_id()])
        ))
        .with_location(func.name)
    })?;

    let mut depths: HashMap<Value, i64> = HashMap::new();
    for node in order {
        let v = cg.graph[node];
        let op = func.op(v.op);
        let weight = match op.kind {
            OpKind::Const(..) | OpKind::Wire | OpKind::Input => 0,
            ref k if k.is_pure_comb() => 1,
            _ => 0,
        };
        let pred_max = cg
            .graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|p| depths[&cg.graph[p]])
            .max()
            .unwrap_or(0);
        let depth = if op.kind.is_pure_comb() {
            pred_max + weight
        } else {
            // Sequential results and instance outputs restart the count.
            0
        };
        depths.insert(v, depth);
    }
    Ok(depths)
}

/// The timing endpoints of a function: operands of sequential ops and
/// output ports, in discovery order.
pub fn timing_endpoints(func: &Function) -> Vec<(String, Value)> {
    let mut endpoints = Vec::new();
    for (idx, op) in func.iter_ops() {
        if op.kind.is_sequential() {
            for (slot, operand) in op.operands.iter().enumerate() {
                endpoints.push((
                    format!("{}#{slot}", func.value_name(Value::from(idx))),
                    *operand,
                ));
            }
        }
    }
    for (port, value) in &func.outputs {
        endpoints.push((port.to_string(), *value));
    }
    endpoints
}
