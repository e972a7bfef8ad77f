//! Width-discipline checking over already-constructed ops.
//!
//! The [`Builder`](crate::Builder) enforces these rules during construction;
//! this module re-checks them for IR that arrives from the frontend and for
//! the flat-types verifier.

use crate::bits::MAX_WIDTH;
use crate::{Function, OpIdx, OpKind};
use pyc_utils::{bits_needed_for, Error, PycResult};

fn err(func: &Function, idx: OpIdx, msg: String) -> Error {
    Error::malformed_structure(msg)
        .with_location(format!("{}.{}", func.name, func.value_name(idx.into())))
}

/// Check one op against the operator table.
pub fn check_op(func: &Function, idx: OpIdx) -> PycResult<()> {
    let op = func.op(idx);
    for &w in &op.widths {
        if w < 1 || w > MAX_WIDTH {
            return Err(Error::unknown_width(format!(
                "result width w{w} outside 1..=64"
            ))
            .with_location(format!("{}.{}", func.name, func.value_name(idx.into()))));
        }
    }
    // Arity first, so the width checks below can index operands freely.
    let expected_arity = match &op.kind {
        OpKind::Nop | OpKind::Input | OpKind::Const(..) | OpKind::IndVar | OpKind::IterArg { .. } => Some(0),
        OpKind::Wire | OpKind::Not | OpKind::Trunc | OpKind::Zext | OpKind::Sext
        | OpKind::Extract { .. } => Some(1),
        OpKind::Add | OpKind::Sub | OpKind::And | OpKind::Or | OpKind::Xor | OpKind::Eq
        | OpKind::Ult | OpKind::Shl | OpKind::Lshr | OpKind::Ashr => Some(2),
        OpKind::Mux | OpKind::CdcSync { .. } => Some(3),
        OpKind::Reg { .. } | OpKind::MemSync { .. } | OpKind::ByteMem { .. } => Some(4),
        OpKind::Fifo { .. } => Some(5),
        OpKind::MemSyncDp { .. } => Some(6),
        OpKind::AsyncFifo { .. } => Some(7),
        OpKind::Concat | OpKind::Instance | OpKind::If { .. } | OpKind::For { .. }
        | OpKind::Yield => None,
    };
    if let Some(expected) = expected_arity {
        if op.operands.len() != expected {
            return Err(err(
                func,
                idx,
                format!(
                    "`{}' takes {expected} operand(s), found {}",
                    op.kind.mnemonic(),
                    op.operands.len()
                ),
            ));
        }
    }
    if matches!(op.kind, OpKind::Concat) && op.operands.is_empty() {
        return Err(err(func, idx, "concat of zero values".to_string()));
    }
    let ow = |i: usize| func.value_width(op.operands[i]);
    let w0 = op.widths.first().copied().unwrap_or(1);
    match &op.kind {
        OpKind::Nop | OpKind::Input | OpKind::Const(..) => {}
        OpKind::Wire => {
            if ow(0) != w0 {
                return Err(err(func, idx, format!("wire changes width w{} -> w{w0}", ow(0))));
            }
        }
        OpKind::Add | OpKind::Sub | OpKind::And | OpKind::Or | OpKind::Xor => {
            if ow(0) != w0 || ow(1) != w0 {
                return Err(err(
                    func,
                    idx,
                    format!(
                        "`{}' operands w{}, w{} do not match result w{w0}",
                        op.kind.mnemonic(),
                        ow(0),
                        ow(1)
                    ),
                ));
            }
        }
        OpKind::Not => {
            if ow(0) != w0 {
                return Err(err(func, idx, format!("not operand w{} vs result w{w0}", ow(0))));
            }
        }
        OpKind::Eq | OpKind::Ult => {
            if w0 != 1 || ow(0) != ow(1) {
                return Err(err(
                    func,
                    idx,
                    format!(
                        "`{}' wants equal operand widths and a w1 result, found w{}, w{} -> w{w0}",
                        op.kind.mnemonic(),
                        ow(0),
                        ow(1)
                    ),
                ));
            }
        }
        OpKind::Shl | OpKind::Lshr | OpKind::Ashr => {
            if ow(0) != w0 {
                return Err(err(func, idx, format!("shift operand w{} vs result w{w0}", ow(0))));
            }
        }
        OpKind::Mux => {
            if ow(0) != 1 || ow(1) != w0 || ow(2) != w0 {
                return Err(err(
                    func,
                    idx,
                    format!("mux wants (w1, w{w0}, w{w0}), found (w{}, w{}, w{})", ow(0), ow(1), ow(2)),
                ));
            }
        }
        OpKind::Trunc => {
            if ow(0) < w0 {
                return Err(err(func, idx, format!("trunc widens w{} -> w{w0}", ow(0))));
            }
        }
        OpKind::Zext | OpKind::Sext => {
            if ow(0) > w0 {
                return Err(err(
                    func,
                    idx,
                    format!("{} narrows w{} -> w{w0}", op.kind.mnemonic(), ow(0)),
                ));
            }
        }
        OpKind::Extract { lsb } => {
            if *lsb as u16 + w0 as u16 > ow(0) as u16 {
                return Err(err(
                    func,
                    idx,
                    format!("extract [{}:{lsb}] out of range for w{}", lsb + w0 - 1, ow(0)),
                ));
            }
        }
        OpKind::Concat => {
            let total: u16 = op.operands.iter().map(|v| func.value_width(*v) as u16).sum();
            if total != w0 as u16 {
                return Err(err(func, idx, format!("concat operands sum to w{total}, result is w{w0}")));
            }
        }
        OpKind::Reg { .. } => {
            for (i, what) in [(0, "clk"), (1, "rst"), (2, "en")] {
                if ow(i) != 1 {
                    return Err(err(func, idx, format!("reg {what} must be w1")));
                }
            }
            if ow(3) != w0 {
                return Err(err(func, idx, format!("reg d is w{}, q is w{w0}", ow(3))));
            }
        }
        OpKind::MemSync { depth } => {
            let aw = bits_needed_for(*depth as u64) as u8;
            if ow(0) != 1 || ow(3) != 1 || ow(1) != aw || ow(2) != w0 {
                return Err(err(func, idx, format!("mem_sync wants (w1, w{aw}, w{w0}, w1)")));
            }
        }
        OpKind::MemSyncDp { depth } => {
            let aw = bits_needed_for(*depth as u64) as u8;
            if ow(0) != 1
                || ow(1) != aw
                || ow(2) != aw
                || ow(3) != aw
                || ow(4) != w0
                || ow(5) != 1
                || op.widths[1] != w0
            {
                return Err(err(
                    func,
                    idx,
                    format!("mem_sync_dp wants (w1, w{aw}, w{aw}, w{aw}, w{w0}, w1)"),
                ));
            }
        }
        OpKind::ByteMem { size } => {
            let aw = bits_needed_for(*size as u64) as u8;
            if ow(0) != 1 || ow(3) != 1 || ow(1) != aw || ow(2) != w0 || w0 % 8 != 0 {
                return Err(err(
                    func,
                    idx,
                    format!("byte_mem wants (w1, w{aw}, w{w0}, w1) with byte-multiple data"),
                ));
            }
        }
        OpKind::Fifo { .. } => {
            if ow(0) != 1 || ow(1) != 1 || ow(2) != 1 || ow(4) != 1 || ow(3) != w0 {
                return Err(err(func, idx, "fifo control signals must be w1".to_string()));
            }
            if op.widths.as_slice() != [w0, 1, 1] {
                return Err(err(func, idx, "fifo results must be (data, w1, w1)".to_string()));
            }
        }
        OpKind::AsyncFifo { .. } => {
            for i in [0usize, 1, 2, 3, 4, 6] {
                if ow(i) != 1 {
                    return Err(err(func, idx, "async_fifo control signals must be w1".to_string()));
                }
            }
            if ow(5) != w0 || op.widths.as_slice() != [w0, 1, 1] {
                return Err(err(func, idx, "async_fifo results must be (data, w1, w1)".to_string()));
            }
        }
        OpKind::CdcSync { .. } => {
            if ow(0) != 1 || ow(1) != 1 || ow(2) != w0 {
                return Err(err(func, idx, "cdc_sync wants (w1, w1, data)".to_string()));
            }
        }
        // Instance port widths are checked against the callee by the
        // pipeline once the whole module is available.
        OpKind::Instance => {}
        // Structured control is checked during lowering.
        OpKind::If { .. } | OpKind::For { .. } | OpKind::IndVar | OpKind::IterArg { .. } | OpKind::Yield => {}
    }
    Ok(())
}

/// Check every live op in a function.
pub fn check_function(func: &Function) -> PycResult<()> {
    for (idx, _) in func.iter_ops() {
        check_op(func, idx)?;
    }
    for (port, value) in &func.outputs {
        let pw = func
            .port(*port)
            .map(|p| p.width)
            .ok_or_else(|| {
                Error::malformed_structure(format!("output wiring names unknown port `{port}'"))
                    .with_location(func.name)
            })?;
        let vw = func.value_width(*value);
        if pw != vw {
            return Err(Error::malformed_structure(format!(
                "output port `{port}' is w{pw} but its driver is w{vw}"
            ))
            .with_location(func.name));
        }
    }
    Ok(())
}
