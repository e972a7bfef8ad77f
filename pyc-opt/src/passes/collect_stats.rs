//! Per-function compile statistics.

use pyc_ir::attribute::reserved;
use pyc_ir::{Function, OpKind};
use pyc_utils::{sat_add, PycResult};

use crate::traversal::{FunctionPass, Named, SigContext};

/// Counts registers and memory primitives and records the totals as
/// function attributes. The driver aggregates functions into the
/// module-wide summary with saturating addition.
#[derive(Default)]
pub struct CollectCompileStats;

impl Named for CollectCompileStats {
    fn name() -> &'static str {
        "collect-compile-stats"
    }

    fn description() -> &'static str {
        "record register and memory counts as function attributes"
    }
}

impl FunctionPass for CollectCompileStats {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        let mut reg_count = 0i64;
        let mut reg_bits = 0i64;
        let mut mem_count = 0i64;
        let mut mem_bits = 0i64;
        for (_, op) in func.iter_ops() {
            let width = op.widths.first().copied().unwrap_or(0) as i64;
            match op.kind {
                OpKind::Reg { .. } => {
                    reg_count = sat_add(reg_count, 1);
                    reg_bits = sat_add(reg_bits, width);
                }
                // A synchronizer is a chain of registers.
                OpKind::CdcSync { stages } => {
                    reg_count = sat_add(reg_count, stages as i64);
                    reg_bits = sat_add(reg_bits, width * stages as i64);
                }
                OpKind::MemSync { depth } | OpKind::MemSyncDp { depth } => {
                    mem_count = sat_add(mem_count, 1);
                    mem_bits = sat_add(mem_bits, width * depth as i64);
                }
                OpKind::ByteMem { size } => {
                    mem_count = sat_add(mem_count, 1);
                    mem_bits = sat_add(mem_bits, 8 * size as i64);
                }
                OpKind::Fifo { depth } | OpKind::AsyncFifo { depth } => {
                    mem_count = sat_add(mem_count, 1);
                    mem_bits = sat_add(mem_bits, width * depth as i64);
                }
                _ => {}
            }
        }
        func.attributes.insert_int(reserved::REG_COUNT, reg_count);
        func.attributes.insert_int(reserved::REG_BITS, reg_bits);
        func.attributes.insert_int(reserved::MEM_COUNT, mem_count);
        func.attributes.insert_int(reserved::MEM_BITS, mem_bits);
        Ok(())
    }
}
