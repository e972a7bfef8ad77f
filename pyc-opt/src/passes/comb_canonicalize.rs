//! Width-aware rewrites specific to the bit algebra.

use pyc_ir::{Function, Op, OpIdx, OpKind, Value};
use pyc_utils::PycResult;

use crate::passes::canonicalize::const_of;
use crate::traversal::{FunctionPass, Named, SigContext};

/// Bit-exact rewrites over the fixed-width algebra: mux folding, idempotent
/// `and`/`or`, double negation, slice/concat fusion, `extract` lowering
/// through `concat`, and `zext`/`trunc` merging.
#[derive(Default)]
pub struct CombCanonicalize;

impl Named for CombCanonicalize {
    fn name() -> &'static str {
        "comb-canonicalize"
    }

    fn description() -> &'static str {
        "algebraic rewrites over the fixed-width bit algebra"
    }
}

enum Rewrite {
    Value(Value),
    /// Replace with a freshly created op.
    New(Op),
    /// Keep the op but splice a fused slice over two adjacent concat
    /// operands, starting at `pair`.
    PatchConcat { pair: usize, fused: Op },
}

/// `extract` over `concat`: when the requested bit range lies entirely
/// inside one concat part, read that part directly.
fn extract_through_concat(func: &Function, idx: OpIdx) -> Option<Rewrite> {
    let op = func.op(idx);
    let OpKind::Extract { lsb } = &op.kind else {
        return None;
    };
    let lsb = *lsb;
    let width = op.widths[0];
    let concat = func.op(op.operands[0].op);
    if !matches!(concat.kind, OpKind::Concat) {
        return None;
    }
    // Parts are most-significant-first; walk from the least significant end.
    let mut offset = 0u16;
    for part in concat.operands.iter().rev() {
        let pw = func.value_width(*part) as u16;
        let lo = lsb as u16;
        if lo >= offset && lo + width as u16 <= offset + pw {
            if width as u16 == pw && lo == offset {
                return Some(Rewrite::Value(*part));
            }
            return Some(Rewrite::New(Op::new(
                OpKind::Extract {
                    lsb: (lo - offset) as u8,
                },
                smallvec::smallvec![*part],
                smallvec::smallvec![width],
            )));
        }
        offset += pw;
    }
    None
}

/// Fuse adjacent `extract`s of the same source inside a `concat`:
/// `concat(.., x[h..], x[l..], ..)` with contiguous ranges becomes a single
/// wider extract.
fn fuse_concat_slices(func: &Function, idx: OpIdx) -> Option<Rewrite> {
    let op = func.op(idx);
    if !matches!(op.kind, OpKind::Concat) {
        return None;
    }
    let slice_of = |v: Value| -> Option<(Value, u8, u8)> {
        let part = func.op(v.op);
        match &part.kind {
            OpKind::Extract { lsb } => Some((part.operands[0], *lsb, part.widths[0])),
            _ => None,
        }
    };
    for pair in 0..op.operands.len().saturating_sub(1) {
        let (hi, lo) = (op.operands[pair], op.operands[pair + 1]);
        let (Some((hi_src, hi_lsb, hi_w)), Some((lo_src, lo_lsb, lo_w))) =
            (slice_of(hi), slice_of(lo))
        else {
            continue;
        };
        if hi_src != lo_src || hi_lsb != lo_lsb + lo_w {
            continue;
        }
        let fused = Op::new(
            OpKind::Extract { lsb: lo_lsb },
            smallvec::smallvec![lo_src],
            smallvec::smallvec![hi_w + lo_w],
        );
        if op.operands.len() == 2 {
            // The whole concat is one contiguous slice.
            if lo_lsb == 0 && hi_w + lo_w == func.value_width(lo_src) {
                return Some(Rewrite::Value(lo_src));
            }
            return Some(Rewrite::New(fused));
        }
        // Wider concats keep their shape; only the adjacent pair collapses.
        return Some(Rewrite::PatchConcat { pair, fused });
    }
    None
}

fn ext_trunc_merge(func: &Function, idx: OpIdx) -> Option<Rewrite> {
    let op = func.op(idx);
    let w0 = op.widths[0];
    let inner_idx = op.operands.first()?.op;
    let inner = func.op(inner_idx);
    match (&op.kind, &inner.kind) {
        // trunc(trunc(x)) and zext(zext(x)) / sext(sext(x)) collapse.
        (OpKind::Trunc, OpKind::Trunc)
        | (OpKind::Zext, OpKind::Zext)
        | (OpKind::Sext, OpKind::Sext) => Some(Rewrite::New(Op::new(
            op.kind.clone(),
            smallvec::smallvec![inner.operands[0]],
            smallvec::smallvec![w0],
        ))),
        // trunc(zext(x)) re-expressed against x with explicit widths.
        (OpKind::Trunc, OpKind::Zext) => {
            let x = inner.operands[0];
            let wx = func.value_width(x);
            let new_kind = if w0 == wx {
                return Some(Rewrite::Value(x));
            } else if w0 < wx {
                OpKind::Trunc
            } else {
                OpKind::Zext
            };
            Some(Rewrite::New(Op::new(
                new_kind,
                smallvec::smallvec![x],
                smallvec::smallvec![w0],
            )))
        }
        _ => None,
    }
}

fn rewrite_op(func: &Function, idx: OpIdx) -> Option<Rewrite> {
    let op = func.op(idx);
    let ops = &op.operands;
    match &op.kind {
        OpKind::Mux => {
            if let Some(sel) = const_of(func, ops[0]) {
                return Some(Rewrite::Value(if sel.as_bool() { ops[1] } else { ops[2] }));
            }
            None
        }
        OpKind::And | OpKind::Or if ops[0] == ops[1] => Some(Rewrite::Value(ops[0])),
        OpKind::Not => match func.op(ops[0].op).kind {
            OpKind::Not => Some(Rewrite::Value(func.op(ops[0].op).operands[0])),
            _ => None,
        },
        OpKind::Extract { .. } => extract_through_concat(func, idx),
        OpKind::Concat => fuse_concat_slices(func, idx),
        OpKind::Trunc | OpKind::Zext | OpKind::Sext => ext_trunc_merge(func, idx),
        _ => None,
    }
}

impl FunctionPass for CombCanonicalize {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        loop {
            let mut changed = false;
            for idx in func.op_indices() {
                if !func.body.contains(&idx) || !func.has_uses(idx) {
                    continue;
                }
                let Some(rewrite) = rewrite_op(func, idx) else {
                    continue;
                };
                match rewrite {
                    Rewrite::Value(v) => {
                        // A negation loop rewrites to itself; leave it for
                        // the cycle checker.
                        if v == Value::from(idx) {
                            continue;
                        }
                        func.replace_uses(Value::from(idx), v)
                    }
                    Rewrite::New(op) => {
                        let to = Value::from(func.push_op(op));
                        func.replace_uses(Value::from(idx), to);
                    }
                    Rewrite::PatchConcat { pair, fused } => {
                        let fused_value = Value::from(func.push_op(fused));
                        let operands = &mut func.op_mut(idx).operands;
                        operands[pair] = fused_value;
                        operands.remove(pair + 1);
                    }
                }
                changed = true;
            }
            if !changed {
                return Ok(());
            }
        }
    }
}
