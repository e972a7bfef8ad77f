//! Removal of unobserved registers.

use std::collections::HashSet;

use pyc_ir::{Function, OpIdx, OpKind};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Erases registers whose outputs no output port, live op, or
/// side-effecting op transitively reads. The whole cone of logic that only
/// fed dead registers goes with them.
#[derive(Default)]
pub struct EliminateDeadState;

impl Named for EliminateDeadState {
    fn name() -> &'static str {
        "eliminate-dead-state"
    }

    fn description() -> &'static str {
        "remove registers whose outputs are unobservable"
    }
}

/// Backward closure from the roots: through pure comb ops and through live
/// sequential ops' operands. Register liveness feeds back into the root
/// set, so iterate to a fixpoint.
fn live_ops(func: &Function) -> HashSet<OpIdx> {
    let mut live_regs: HashSet<OpIdx> = HashSet::new();
    loop {
        let mut roots: Vec<OpIdx> = Vec::new();
        for (_, value) in &func.outputs {
            roots.push(value.op);
        }
        for (idx, op) in func.iter_ops() {
            let keeps_operands_alive = op.kind.is_side_effecting()
                || (matches!(op.kind, OpKind::Reg { .. }) && live_regs.contains(&idx));
            if keeps_operands_alive {
                roots.push(idx);
            }
        }
        let live = func.reachable_from(roots);
        let next_live_regs: HashSet<OpIdx> = func
            .iter_ops()
            .filter(|(idx, op)| {
                matches!(op.kind, OpKind::Reg { .. }) && live.contains(idx)
            })
            .map(|(idx, _)| idx)
            .collect();
        if next_live_regs == live_regs {
            return live;
        }
        live_regs = next_live_regs;
    }
}

impl FunctionPass for EliminateDeadState {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        let live = live_ops(func);
        let dead: Vec<OpIdx> = func
            .iter_ops()
            .filter(|(idx, op)| {
                !live.contains(idx)
                    && !matches!(op.kind, OpKind::Input)
                    && !op.kind.is_side_effecting()
            })
            .map(|(idx, _)| idx)
            .collect();
        if dead.is_empty() {
            return Ok(());
        }
        let removed_regs = dead
            .iter()
            .filter(|idx| matches!(func.op(**idx).kind, OpKind::Reg { .. }))
            .count();
        // Dead ops may reference one another (a feedback loop of dead
        // registers); detach every operand before erasing.
        for &idx in &dead {
            func.op_mut(idx).operands.clear();
        }
        for &idx in &dead {
            func.erase_op(idx);
        }
        if removed_regs > 0 {
            log::info!(
                "eliminate-dead-state removed {removed_regs} register(s) from `{}'",
                func.name
            );
        }
        Ok(())
    }
}
