//! Superword packing of parallel scalar operations.

use pyc_ir::{Function, IndexRef, Op, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Packs element-wise bitwise lanes that meet in a `concat` into one wide
/// operation: `concat(f(a2,b2), f(a1,b1), f(a0,b0))` becomes
/// `f(concat(a2,a1,a0), concat(b2,b1,b0))` for `and`/`or`/`xor`/`not`.
/// Ports and visible values never change; the rewrite only fires when every
/// lane is private to the concat, so the emitted operator count strictly
/// drops.
#[derive(Default)]
pub struct SlpPackWires;

impl Named for SlpPackWires {
    fn name() -> &'static str {
        "slp-pack-wires"
    }

    fn description() -> &'static str {
        "pack parallel scalar bitwise lanes into wide ops"
    }
}

fn packable_kind(kind: &OpKind) -> bool {
    matches!(kind, OpKind::And | OpKind::Or | OpKind::Xor | OpKind::Not)
}

impl FunctionPass for SlpPackWires {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        let candidates: Vec<_> = func
            .iter_ops()
            .filter(|(_, op)| matches!(op.kind, OpKind::Concat) && op.operands.len() >= 2)
            .map(|(idx, _)| idx)
            .collect();

        for concat_idx in candidates {
            // Recount per candidate: an earlier rewrite changes both the
            // arena and the use counts.
            let use_counts = func.use_counts();
            let lanes = func.op(concat_idx).operands.clone();
            // Every lane: the same bitwise kind, the same width, and no
            // other consumer.
            let first_kind = func.op(lanes[0].op).kind.clone();
            if !packable_kind(&first_kind) {
                continue;
            }
            let lane_width = func.value_width(lanes[0]);
            let uniform = lanes.iter().all(|lane| {
                let op = func.op(lane.op);
                op.kind.mnemonic() == first_kind.mnemonic()
                    && op.widths[0] == lane_width
                    && use_counts[lane.op.index()] == 1
                    && lane.result == 0
            });
            if !uniform {
                continue;
            }

            let arity = func.op(lanes[0].op).operands.len();
            let total_width = func.value_width(Value::from(concat_idx));
            // One concat per operand position, then one wide op.
            let mut wide_operands = Vec::with_capacity(arity);
            for slot in 0..arity {
                let parts: smallvec::SmallVec<[Value; 4]> = lanes
                    .iter()
                    .map(|lane| func.op(lane.op).operands[slot])
                    .collect();
                let packed = func.push_op(Op::new(
                    OpKind::Concat,
                    parts,
                    smallvec::smallvec![total_width],
                ));
                wide_operands.push(Value::from(packed));
            }
            let wide = func.push_op(Op::new(
                first_kind.clone(),
                wide_operands.into_iter().collect(),
                smallvec::smallvec![total_width],
            ));
            log::debug!(
                "slp-pack-wires packed {} `{}' lanes in `{}'",
                lanes.len(),
                first_kind.mnemonic(),
                func.name
            );
            func.replace_uses(Value::from(concat_idx), Value::from(wide));
            func.erase_op(concat_idx);
            // The lanes are now dead; dead-value-removal sweeps them.
        }
        Ok(())
    }
}
