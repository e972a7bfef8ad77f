//! Removal of identity wires.

use pyc_ir::{Function, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Rewrites every consumer of a `wire` to read the wire's source directly
/// and erases the wire. A wire's name survives where it matters: it moves
/// onto an anonymous source op, and output-port names live on the port
/// itself.
#[derive(Default)]
pub struct EliminateWires;

impl Named for EliminateWires {
    fn name() -> &'static str {
        "eliminate-wires"
    }

    fn description() -> &'static str {
        "rewrite consumers of identity wires to their source"
    }
}

impl FunctionPass for EliminateWires {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        let wires: Vec<_> = func
            .iter_ops()
            .filter(|(_, op)| matches!(op.kind, OpKind::Wire))
            .map(|(idx, _)| idx)
            .collect();
        for idx in wires {
            // Re-read the source: an earlier elimination may have forwarded
            // it. A wire that now feeds itself is a combinational cycle;
            // leave it for the cycle checker.
            let source = func.op(idx).operands[0];
            if source.op == idx {
                continue;
            }
            if let Some(name) = func.op(idx).name {
                let source_op = func.op_mut(source.op);
                if source_op.name.is_none() && source_op.widths.len() == 1 {
                    source_op.name = Some(name);
                }
            }
            func.replace_uses(Value::from(idx), source);
            func.erase_op(idx);
        }
        Ok(())
    }
}
