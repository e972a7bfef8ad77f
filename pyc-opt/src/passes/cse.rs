//! Common-subexpression elimination over pure combinational ops.

use std::collections::HashMap;

use pyc_ir::{Function, OpIdx, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Deduplicates pure ops with the same kind, operand identities, and
/// width/attribute payload. Stateful ops are never merged.
#[derive(Default)]
pub struct Cse;

impl Named for Cse {
    fn name() -> &'static str {
        "cse"
    }

    fn description() -> &'static str {
        "deduplicate identical pure operations"
    }
}

/// Structural key of a pure op. Two ops with equal keys compute the same
/// value.
#[derive(PartialEq, Eq, Hash)]
struct OpKey {
    mnemonic: &'static str,
    /// Kind payload that affects the result (constant bits, extract offset).
    payload: u64,
    operands: Vec<Value>,
    widths: Vec<u8>,
}

fn key_of(func: &Function, idx: OpIdx) -> Option<OpKey> {
    let op = func.op(idx);
    if !op.kind.is_pure_comb() {
        return None;
    }
    // Wires carry names; eliminate-wires owns them.
    if matches!(op.kind, OpKind::Wire) {
        return None;
    }
    let payload = match op.kind {
        OpKind::Const(b) => b.value(),
        OpKind::Extract { lsb } => lsb as u64,
        _ => 0,
    };
    Some(OpKey {
        mnemonic: op.kind.mnemonic(),
        payload,
        operands: op.operands.to_vec(),
        widths: op.widths.to_vec(),
    })
}

impl FunctionPass for Cse {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        // Iterate to a fixpoint: merging two ops can make their consumers
        // identical in turn.
        loop {
            let mut seen: HashMap<OpKey, OpIdx> = HashMap::new();
            let mut merges: Vec<(OpIdx, OpIdx)> = Vec::new();
            for idx in func.op_indices() {
                // Only deduplicate top-level ops; region bodies are erased
                // wholesale by lowering.
                if !func.body.contains(&idx) {
                    continue;
                }
                let Some(key) = key_of(func, idx) else {
                    continue;
                };
                match seen.get(&key) {
                    Some(&first) => merges.push((idx, first)),
                    None => {
                        seen.insert(key, idx);
                    }
                }
            }
            if merges.is_empty() {
                return Ok(());
            }
            for (dup, keep) in merges {
                log::debug!(
                    "cse: `{}' duplicates `{}'",
                    func.value_name(Value::from(dup)),
                    func.value_name(Value::from(keep))
                );
                func.replace_uses(Value::from(dup), Value::from(keep));
                func.erase_op(dup);
            }
        }
    }
}
