//! Sparse conditional constant propagation.

use std::collections::HashMap;

use pyc_ir::{Bits, Function, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Propagates constants through the netlist, including through `mux`,
/// `and`, `or`, and `not` where one known operand decides the result.
#[derive(Default)]
pub struct Sccp;

impl Named for Sccp {
    fn name() -> &'static str {
        "sccp"
    }

    fn description() -> &'static str {
        "propagate constants through mux/and/or/not"
    }
}

/// The constant lattice: unvisited, a known constant, or varying.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Lattice {
    Top,
    Const(Bits),
    Bottom,
}

fn meet_operand(state: &HashMap<Value, Lattice>, v: Value) -> Lattice {
    state.get(&v).copied().unwrap_or(Lattice::Top)
}

fn transfer(func: &Function, state: &HashMap<Value, Lattice>, v: Value) -> Lattice {
    use Lattice::*;
    let op = func.op(v.op);
    let w0 = op.widths.first().copied().unwrap_or(1);
    let operand = |i: usize| meet_operand(state, op.operands[i]);
    let known = |l: Lattice| match l {
        Const(b) => Some(b),
        _ => None,
    };

    match &op.kind {
        OpKind::Const(b) => Const(*b),
        OpKind::Wire => operand(0),
        OpKind::Mux => match operand(0) {
            Const(sel) => {
                if sel.as_bool() {
                    operand(1)
                } else {
                    operand(2)
                }
            }
            Top => Top,
            Bottom => match (operand(1), operand(2)) {
                (Const(a), Const(b)) if a == b => Const(a),
                (Top, _) | (_, Top) => Top,
                _ => Bottom,
            },
        },
        OpKind::And => match (operand(0), operand(1)) {
            (Const(a), _) if a.is_zero() => Const(Bits::zero(w0)),
            (_, Const(b)) if b.is_zero() => Const(Bits::zero(w0)),
            (Const(a), Const(b)) => Const(a.and(b)),
            (Top, _) | (_, Top) => Top,
            _ => Bottom,
        },
        OpKind::Or => match (operand(0), operand(1)) {
            (Const(a), _) if a.is_ones() => Const(Bits::ones(w0)),
            (_, Const(b)) if b.is_ones() => Const(Bits::ones(w0)),
            (Const(a), Const(b)) => Const(a.or(b)),
            (Top, _) | (_, Top) => Top,
            _ => Bottom,
        },
        OpKind::Not => match operand(0) {
            Const(a) => Const(a.not()),
            other => other,
        },
        kind if kind.is_pure_comb() => {
            let values: Option<Vec<Bits>> =
                op.operands.iter().map(|o| known(meet_operand(state, *o))).collect();
            if op.operands.iter().any(|o| meet_operand(state, *o) == Top) {
                return Top;
            }
            match values {
                Some(cv) => Const(match kind {
                    OpKind::Add => cv[0].add(cv[1]),
                    OpKind::Sub => cv[0].sub(cv[1]),
                    OpKind::Xor => cv[0].xor(cv[1]),
                    OpKind::Eq => cv[0].eq(cv[1]),
                    OpKind::Ult => cv[0].ult(cv[1]),
                    OpKind::Shl => cv[0].shl(cv[1].value()),
                    OpKind::Lshr => cv[0].lshr(cv[1].value()),
                    OpKind::Ashr => cv[0].ashr(cv[1].value()),
                    OpKind::Trunc => cv[0].trunc(w0),
                    OpKind::Zext => cv[0].zext(w0),
                    OpKind::Sext => cv[0].sext(w0),
                    OpKind::Extract { lsb } => cv[0].extract(*lsb, w0),
                    OpKind::Concat => Bits::concat_all(&cv),
                    _ => return Bottom,
                }),
                None => Bottom,
            }
        }
        // Inputs, sequential results, and instance outputs vary.
        _ => Bottom,
    }
}

impl FunctionPass for Sccp {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        let mut state: HashMap<Value, Lattice> = HashMap::new();
        // Chaotic iteration to a fixpoint; the lattice has height 2, so this
        // terminates quickly on netlist-sized functions.
        loop {
            let mut changed = false;
            for (idx, op) in func.iter_ops() {
                for result in 0..op.widths.len().max(1) {
                    let v = Value::new(idx, result as u8);
                    let next = transfer(func, &state, v);
                    let prev = state.get(&v).copied().unwrap_or(Lattice::Top);
                    let merged = match (prev, next) {
                        // Once varying, always varying.
                        (Lattice::Bottom, _) => Lattice::Bottom,
                        (Lattice::Const(a), Lattice::Const(b)) if a != b => Lattice::Bottom,
                        (Lattice::Const(a), Lattice::Top) => Lattice::Const(a),
                        _ => next,
                    };
                    if merged != prev {
                        state.insert(v, merged);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        // Materialize proven constants for values something still reads.
        // Sorted so the arena grows in the same order on every run.
        let mut proven: Vec<(Value, Bits)> = state
            .iter()
            .filter_map(|(v, l)| match l {
                Lattice::Const(b)
                    if !matches!(func.op(v.op).kind, OpKind::Const(..))
                        && func.has_uses(v.op) =>
                {
                    Some((*v, *b))
                }
                _ => None,
            })
            .collect();
        proven.sort_by_key(|(v, _)| *v);
        for (v, b) in proven {
            let c = func.add_const(b);
            func.replace_uses(v, c);
        }
        Ok(())
    }
}
