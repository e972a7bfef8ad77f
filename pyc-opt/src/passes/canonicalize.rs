//! Generic canonicalization: constant folding and algebraic identities,
//! run to a fixpoint.

use pyc_ir::{Bits, Function, OpIdx, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Folds constants and applies width-preserving identities until nothing
/// changes. Dead originals are left for `dead-value-removal`.
#[derive(Default)]
pub struct Canonicalize;

impl Named for Canonicalize {
    fn name() -> &'static str {
        "canonicalize"
    }

    fn description() -> &'static str {
        "fold constants and apply algebraic identities to a fixpoint"
    }
}

/// What an op canonicalizes to, when it does.
enum Rewrite {
    /// Reuse an existing value.
    Value(Value),
    /// Becomes this constant.
    Const(Bits),
}

/// Fetch the constant behind a value, looking through `wire` renames.
pub(crate) fn const_of(func: &Function, v: Value) -> Option<Bits> {
    match func.op(v.op).kind {
        OpKind::Const(b) => Some(b),
        OpKind::Wire => const_of(func, func.op(v.op).operands[0]),
        _ => None,
    }
}

fn fold(func: &Function, idx: OpIdx) -> Option<Rewrite> {
    let op = func.op(idx);
    let ops = &op.operands;
    let c = |i: usize| const_of(func, ops[i]);
    let w0 = op.widths.first().copied().unwrap_or(1);

    // All-constant pure ops evaluate in the bit algebra.
    if op.kind.is_pure_comb()
        && !matches!(op.kind, OpKind::Const(..) | OpKind::Wire)
        && !ops.is_empty()
        && ops.iter().all(|v| const_of(func, *v).is_some())
    {
        let cv: Vec<Bits> = ops.iter().map(|v| const_of(func, *v).unwrap()).collect();
        let folded = match &op.kind {
            OpKind::Add => cv[0].add(cv[1]),
            OpKind::Sub => cv[0].sub(cv[1]),
            OpKind::And => cv[0].and(cv[1]),
            OpKind::Or => cv[0].or(cv[1]),
            OpKind::Xor => cv[0].xor(cv[1]),
            OpKind::Not => cv[0].not(),
            OpKind::Eq => cv[0].eq(cv[1]),
            OpKind::Ult => cv[0].ult(cv[1]),
            OpKind::Shl => cv[0].shl(cv[1].value()),
            OpKind::Lshr => cv[0].lshr(cv[1].value()),
            OpKind::Ashr => cv[0].ashr(cv[1].value()),
            OpKind::Mux => Bits::mux(cv[0], cv[1], cv[2]),
            OpKind::Trunc => cv[0].trunc(w0),
            OpKind::Zext => cv[0].zext(w0),
            OpKind::Sext => cv[0].sext(w0),
            OpKind::Extract { lsb } => cv[0].extract(*lsb, w0),
            OpKind::Concat => Bits::concat_all(&cv),
            _ => return None,
        };
        return Some(Rewrite::Const(folded));
    }

    match &op.kind {
        OpKind::Add => {
            if c(1).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[0]));
            }
            if c(0).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[1]));
            }
        }
        OpKind::Sub => {
            if c(1).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[0]));
            }
        }
        OpKind::And => {
            if c(0).is_some_and(|b| b.is_zero()) || c(1).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Const(Bits::zero(w0)));
            }
            if c(1).is_some_and(|b| b.is_ones()) {
                return Some(Rewrite::Value(ops[0]));
            }
            if c(0).is_some_and(|b| b.is_ones()) {
                return Some(Rewrite::Value(ops[1]));
            }
        }
        OpKind::Or => {
            if c(0).is_some_and(|b| b.is_ones()) || c(1).is_some_and(|b| b.is_ones()) {
                return Some(Rewrite::Const(Bits::ones(w0)));
            }
            if c(1).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[0]));
            }
            if c(0).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[1]));
            }
        }
        OpKind::Xor => {
            if c(1).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[0]));
            }
            if c(0).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[1]));
            }
        }
        OpKind::Shl | OpKind::Lshr | OpKind::Ashr => {
            if c(1).is_some_and(|b| b.is_zero()) {
                return Some(Rewrite::Value(ops[0]));
            }
        }
        OpKind::Mux => {
            if ops[1] == ops[2] {
                return Some(Rewrite::Value(ops[1]));
            }
            if let Some(sel) = c(0) {
                return Some(Rewrite::Value(if sel.as_bool() { ops[1] } else { ops[2] }));
            }
        }
        OpKind::Not => {
            if let OpKind::Not = func.op(ops[0].op).kind {
                return Some(Rewrite::Value(func.op(ops[0].op).operands[0]));
            }
        }
        OpKind::Eq => {
            if ops[0] == ops[1] {
                return Some(Rewrite::Const(Bits::one(1)));
            }
        }
        OpKind::Ult => {
            if ops[0] == ops[1] {
                return Some(Rewrite::Const(Bits::zero(1)));
            }
        }
        OpKind::Trunc | OpKind::Zext | OpKind::Sext => {
            if func.value_width(ops[0]) == w0 {
                return Some(Rewrite::Value(ops[0]));
            }
        }
        OpKind::Extract { lsb } => {
            if *lsb == 0 && func.value_width(ops[0]) == w0 {
                return Some(Rewrite::Value(ops[0]));
            }
        }
        OpKind::Concat => {
            if ops.len() == 1 {
                return Some(Rewrite::Value(ops[0]));
            }
        }
        _ => {}
    }
    None
}

impl FunctionPass for Canonicalize {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        loop {
            let mut changed = false;
            for idx in func.op_indices() {
                // An op nothing reads has already been rewritten away (or
                // is plain dead); folding it again would spin the fixpoint.
                if !func.has_uses(idx) {
                    continue;
                }
                // Ops inside unlowered structured regions fold too; the
                // rewrite map is value-based so region membership is
                // irrelevant.
                let Some(rewrite) = fold(func, idx) else {
                    continue;
                };
                let to = match rewrite {
                    Rewrite::Value(v) => v,
                    Rewrite::Const(b) => func.add_const(b),
                };
                let from = Value::from(idx);
                if from == to {
                    continue;
                }
                func.replace_uses(from, to);
                changed = true;
            }
            if !changed {
                return Ok(());
            }
        }
    }
}

/// Erase pure ops with no remaining uses. Shared with `dead-value-removal`.
pub(crate) fn sweep_dead_pure_ops(func: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let mut removed = false;
        for idx in func.op_indices() {
            let op = func.op(idx);
            if op.kind.is_pure_comb() && !func.has_uses(idx) && func.body.contains(&idx) {
                func.erase_op(idx);
                removed = true;
            }
        }
        if !removed {
            return changed;
        }
        changed = true;
    }
}

