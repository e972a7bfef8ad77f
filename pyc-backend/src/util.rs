//! Emission helpers shared by the two back-ends.

use std::collections::{BTreeSet, HashMap};

use pyc_ir::attribute::reserved;
use pyc_ir::{Function, Module, OpIdx, OpKind};
use pyc_utils::{Error, Id, PycResult};

/// One schedulable piece of a function body: a fused comb block, a single
/// comb op, or a stateful/instance op.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Unit {
    Block(usize),
    Op(OpIdx),
}

/// The emission schedule of a function: units in a deterministic
/// topological order of their combinational dependences, ties broken by
/// identity (block number, then op index).
pub fn schedule(func: &Function) -> PycResult<Vec<Unit>> {
    // Map each op to its unit id. Blocks come first so their ids are stable.
    let mut unit_of: HashMap<OpIdx, usize> = HashMap::new();
    let mut units: Vec<Unit> = Vec::new();
    for (number, block) in func.comb_blocks.iter().enumerate() {
        units.push(Unit::Block(number));
        for &op in &block.ops {
            unit_of.insert(op, number);
        }
    }
    for &idx in &func.body {
        let op = func.op(idx);
        if matches!(op.kind, OpKind::Input | OpKind::Nop) {
            continue;
        }
        if unit_of.contains_key(&idx) {
            continue;
        }
        unit_of.insert(idx, units.len());
        units.push(Unit::Op(idx));
    }

    // Dependence edges between units. Sequential results cut the graph:
    // only combinationally computed values order their consumers after
    // their producers. Instances order after their operand producers so
    // combinationally forwarded inputs are current when they evaluate.
    let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); units.len()];
    for (&idx, &unit) in &unit_of {
        let op = func.op(idx);
        for operand in &op.operands {
            let Some(&producer) = unit_of.get(&operand.op) else {
                continue;
            };
            if producer == unit {
                continue;
            }
            let producer_op = func.op(operand.op);
            // A sequential producer's output is stable across the pass; it
            // imposes no ordering.
            if producer_op.kind.is_sequential() && !matches!(producer_op.kind, OpKind::Instance) {
                continue;
            }
            // Instance consumers only wait for combinationally forwarded
            // inputs; registered inputs are re-sampled at tick time.
            if op.kind.is_sequential() && !matches!(op.kind, OpKind::Instance) {
                continue;
            }
            deps[unit].insert(producer);
        }
    }

    // Deterministic Kahn: ready units taken in id order.
    let mut pending: Vec<usize> = deps.iter().map(|d| d.len()).collect();
    let mut scheduled: Vec<bool> = vec![false; units.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    for (unit, dep_set) in deps.iter().enumerate() {
        for &dep in dep_set {
            dependents[dep].push(unit);
        }
    }
    let mut ready: BTreeSet<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, &count)| count == 0)
        .map(|(unit, _)| unit)
        .collect();
    let mut order = Vec::with_capacity(units.len());
    while order.len() < units.len() {
        let Some(&next) = ready.iter().next() else {
            // Instances feeding each other through registered paths look
            // like a cycle to the conservative operand edges; the
            // comb-cycle verifier already proved there is no real one.
            // Release the lowest instance unit still pending.
            let stalled = (0..units.len()).find(|&u| {
                !scheduled[u]
                    && matches!(units[u], Unit::Op(idx) if matches!(func.op(idx).kind, OpKind::Instance))
            });
            match stalled {
                Some(unit) => {
                    ready.insert(unit);
                    continue;
                }
                None => {
                    return Err(Error::emission(format!(
                        "could not schedule `{}': residual combinational ordering cycle",
                        func.name
                    )));
                }
            }
        };
        ready.remove(&next);
        if scheduled[next] {
            continue;
        }
        scheduled[next] = true;
        order.push(units[next]);
        for &user in &dependents[next] {
            if scheduled[user] {
                continue;
            }
            pending[user] = pending[user].saturating_sub(1);
            if pending[user] == 0 {
                ready.insert(user);
            }
        }
    }
    Ok(order)
}

/// The callee of an instance op.
pub fn callee_of(func: &Function, idx: OpIdx) -> PycResult<Id> {
    func.op(idx)
        .attributes
        .get_sym(reserved::CALLEE)
        .ok_or_else(|| {
            Error::malformed_structure("instance without a `callee' attribute")
                .with_location(func.name)
        })
}

/// Functions in dependency order, callees before callers, each exactly
/// once. Single-stream emission uses this so a module is defined before it
/// is instantiated.
pub fn functions_postorder(module: &Module) -> PycResult<Vec<Id>> {
    let mut order: Vec<Id> = Vec::new();
    let mut visited: Vec<Id> = Vec::new();
    fn visit(
        module: &Module,
        name: Id,
        visited: &mut Vec<Id>,
        order: &mut Vec<Id>,
    ) -> PycResult<()> {
        if order.contains(&name) {
            return Ok(());
        }
        if visited.contains(&name) {
            return Err(Error::malformed_structure(format!(
                "recursive instantiation of `{name}'"
            )));
        }
        visited.push(name);
        let func = module.resolve_callee(name)?;
        for (idx, op) in func.iter_ops() {
            if matches!(op.kind, OpKind::Instance) {
                visit(module, callee_of(func, idx)?, visited, order)?;
            }
        }
        order.push(name);
        Ok(())
    }
    for func in &module.functions {
        visit(module, func.name, &mut visited, &mut order)?;
    }
    Ok(order)
}

/// Direct instance dependencies of a function, sorted and deduplicated.
pub fn direct_deps(func: &Function) -> PycResult<Vec<Id>> {
    let mut deps = Vec::new();
    for (idx, op) in func.iter_ops() {
        if matches!(op.kind, OpKind::Instance) {
            let callee = callee_of(func, idx)?;
            if !deps.contains(&callee) {
                deps.push(callee);
            }
        }
    }
    deps.sort();
    Ok(deps)
}
