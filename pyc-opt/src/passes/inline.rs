//! Inlining of purely combinational instances.

use std::collections::HashMap;

use pyc_ir::attribute::reserved;
use pyc_ir::{Function, Module, Op, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{Named, Pass};

/// Inlines `instance` ops whose callee contains no sequential or structural
/// state: the callee's comb network is cloned into the caller and the
/// instance disappears. Stateful callees stay as module instances.
#[derive(Default)]
pub struct Inline;

impl Named for Inline {
    fn name() -> &'static str {
        "inline"
    }

    fn description() -> &'static str {
        "inline purely combinational instances"
    }
}

fn is_comb_only(func: &Function) -> bool {
    func.iter_ops().all(|(_, op)| {
        matches!(op.kind, OpKind::Input) || op.kind.is_pure_comb()
    })
}

fn inline_into(caller: &mut Function, callee: &Function) -> PycResult<bool> {
    // Collect the instances of this callee first; cloning appends ops and
    // would otherwise invalidate the iteration.
    let sites: Vec<_> = caller
        .iter_ops()
        .filter(|(_, op)| {
            matches!(op.kind, OpKind::Instance)
                && op.attributes.get_sym(reserved::CALLEE) == Some(callee.name)
        })
        .map(|(idx, _)| idx)
        .collect();
    if sites.is_empty() {
        return Ok(false);
    }

    for site in sites {
        let args: Vec<Value> = caller.op(site).operands.to_vec();
        // Map callee values to caller values, seeded with the inputs.
        let mut map: HashMap<Value, Value> = HashMap::new();
        for (i, port) in callee.input_ports().enumerate() {
            let formal = callee.input_value(port.name).expect("input op exists");
            map.insert(formal, args[i]);
        }
        // Clone in two steps so a use may precede its def in arena order:
        // first allocate every clone, then remap operands.
        let mut cloned = Vec::new();
        for (callee_idx, op) in callee.iter_ops() {
            if matches!(op.kind, OpKind::Input) {
                continue;
            }
            let clone = Op::new(op.kind.clone(), op.operands.clone(), op.widths.clone());
            let new_idx = caller.push_op(clone);
            cloned.push(new_idx);
            for result in 0..op.widths.len() {
                map.insert(
                    Value::new(callee_idx, result as u8),
                    Value::new(new_idx, result as u8),
                );
            }
        }
        for new_idx in cloned {
            let op = caller.op_mut(new_idx);
            for operand in &mut op.operands {
                if let Some(mapped) = map.get(operand) {
                    *operand = *mapped;
                }
            }
        }
        for (j, (_, out_value)) in callee.outputs.iter().enumerate() {
            caller.replace_uses(Value::new(site, j as u8), map[out_value]);
        }
        caller.erase_op(site);
        log::debug!(
            "inlined `{}' into `{}'",
            callee.name,
            caller.name
        );
    }
    Ok(true)
}

impl Pass for Inline {
    fn run(&mut self, module: &mut Module) -> PycResult<()> {
        // Snapshot the combinational callees in program order; they are
        // small by definition.
        let comb_callees: Vec<Function> = module
            .functions
            .iter()
            .filter(|f| is_comb_only(f))
            .cloned()
            .collect();
        if comb_callees.is_empty() {
            return Ok(());
        }
        for func in &mut module.functions {
            for callee in &comb_callees {
                if callee.name == func.name {
                    continue;
                }
                inline_into(func, callee)?;
            }
        }
        Ok(())
    }
}
