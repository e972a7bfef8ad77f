//! Merging of single-bit registers into wide registers.

use std::collections::HashMap;

use pyc_ir::{Function, Op, OpIdx, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Merges width-1 registers that share the same clock, reset, and
/// clock-enable into one wide register. Every original bit stays
/// observable under its original name through a named `extract`.
#[derive(Default)]
pub struct PackI1Regs;

impl Named for PackI1Regs {
    fn name() -> &'static str {
        "pack-i1-regs"
    }

    fn description() -> &'static str {
        "merge width-1 registers sharing clock, reset, and enable"
    }
}

impl FunctionPass for PackI1Regs {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        // Group by (clk, rst, en) operand identity.
        let mut groups: HashMap<(Value, Value, Value), Vec<OpIdx>> = HashMap::new();
        for (idx, op) in func.iter_ops() {
            if matches!(op.kind, OpKind::Reg { .. }) && op.widths[0] == 1 {
                groups
                    .entry((op.operands[0], op.operands[1], op.operands[2]))
                    .or_default()
                    .push(idx);
            }
        }
        let mut groups: Vec<_> = groups.into_iter().collect();
        // Deterministic order: by the first member of each group.
        groups.sort_by_key(|(_, members)| members[0]);

        for ((clk, rst, en), members) in groups {
            if members.len() < 2 || members.len() > 64 {
                continue;
            }
            let width = members.len() as u8;
            let mut init = 0u64;
            for (bit, &member) in members.iter().enumerate() {
                if let OpKind::Reg { init: i } = func.op(member).kind {
                    init |= (i & 1) << bit;
                }
            }
            // Bit k of the packed register is member k; concat operands are
            // most-significant-first.
            let d_parts: smallvec::SmallVec<[Value; 4]> = members
                .iter()
                .rev()
                .map(|&m| func.op(m).operands[3])
                .collect();
            let packed_d = func.push_op(Op::new(
                OpKind::Concat,
                d_parts,
                smallvec::smallvec![width],
            ));
            let packed = func.push_op(Op::new(
                OpKind::Reg { init },
                smallvec::smallvec![clk, rst, en, Value::from(packed_d)],
                smallvec::smallvec![width],
            ));
            let packed_name = func.gen_name("pyc_packed_regs");
            func.op_mut(packed).name = Some(packed_name);

            for (bit, &member) in members.iter().enumerate() {
                let name = func.op(member).name;
                let slice = func.push_op(Op::new(
                    OpKind::Extract { lsb: bit as u8 },
                    smallvec::smallvec![Value::from(packed)],
                    smallvec::smallvec![1],
                ));
                if let Some(name) = name {
                    // The packed register owns the storage; the original
                    // name now labels the extracted bit.
                    func.op_mut(member).name = None;
                    func.op_mut(slice).name = Some(name);
                }
                func.replace_uses(Value::from(member), Value::from(slice));
            }
            for &member in &members {
                func.op_mut(member).operands.clear();
                func.erase_op(member);
            }
            log::debug!(
                "pack-i1-regs packed {} registers into `{packed_name}' in `{}'",
                members.len(),
                func.name
            );
        }
        Ok(())
    }
}
