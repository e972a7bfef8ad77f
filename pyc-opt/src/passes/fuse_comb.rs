//! Grouping of combinational chains into comb blocks.

use std::collections::{BTreeSet, HashMap, HashSet};

use pyc_ir::attribute::reserved;
use pyc_ir::{CombBlock, Function, IndexRef, OpIdx, OpKind, Value};
use pyc_utils::PycResult;

use crate::traversal::{FunctionPass, Named, SigContext};

/// Groups chains of combinational ops that feed a single consumer into comb
/// blocks, which the emitters lower as one expression region or one
/// simulation procedure. Disabled entirely when op-granular simulation
/// scheduling is requested.
#[derive(Default)]
pub struct FuseComb;

impl Named for FuseComb {
    fn name() -> &'static str {
        "fuse-comb"
    }

    fn description() -> &'static str {
        "group single-consumer combinational chains into comb blocks"
    }
}

/// Ops eligible for fusion: real logic, not constants (those form their own
/// emission block) and not inputs.
fn fusable(func: &Function, idx: OpIdx) -> bool {
    let op = func.op(idx);
    op.kind.is_pure_comb() && !matches!(op.kind, OpKind::Const(..) | OpKind::Wire)
}

impl FunctionPass for FuseComb {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        func.comb_blocks.clear();

        // Count consumers per op, and remember the single consumer where
        // there is exactly one.
        let mut consumer: HashMap<OpIdx, Option<OpIdx>> = HashMap::new();
        for (user, op) in func.iter_ops() {
            for operand in &op.operands {
                consumer
                    .entry(operand.op)
                    .and_modify(|c| {
                        if *c != Some(user) {
                            *c = None;
                        }
                    })
                    .or_insert(Some(user));
            }
        }
        for (_, value) in &func.outputs {
            // An output port counts as an extra consumer.
            consumer.entry(value.op).and_modify(|c| *c = None);
        }

        // Union each op into its single consumer's cluster when both sides
        // are fusable.
        let mut cluster: Vec<usize> = (0..func.num_ops()).collect();
        fn find(cluster: &mut [usize], i: usize) -> usize {
            if cluster[i] != i {
                let parent = cluster[i];
                let root = find(cluster, parent);
                cluster[i] = root;
            }
            cluster[i]
        }
        for idx in func.op_indices() {
            if !fusable(func, idx) {
                continue;
            }
            if let Some(Some(user)) = consumer.get(&idx) {
                if fusable(func, *user) {
                    let a = find(&mut cluster, idx.index());
                    let b = find(&mut cluster, user.index());
                    cluster[a] = b;
                }
            }
        }

        // Collect clusters with at least two members.
        let mut blocks: HashMap<usize, Vec<OpIdx>> = HashMap::new();
        for idx in func.op_indices() {
            if fusable(func, idx) {
                let root = find(&mut cluster, idx.index());
                blocks.entry(root).or_default().push(idx);
            }
        }
        let mut blocks: Vec<Vec<OpIdx>> = blocks
            .into_values()
            .filter(|members| members.len() >= 2)
            .collect();
        blocks.sort_by_key(|members| members.iter().min().copied());

        for (number, mut members) in blocks.into_iter().enumerate() {
            // Emission order inside a block must be def-before-use;
            // topological sort with arena-index tie-breaking keeps it
            // deterministic.
            members = topo_order(func, &members);
            let member_set: HashSet<OpIdx> = members.iter().copied().collect();
            let mut inputs: Vec<Value> = Vec::new();
            for &m in &members {
                for operand in &func.op(m).operands {
                    if !member_set.contains(&operand.op) && !inputs.contains(operand) {
                        inputs.push(*operand);
                    }
                }
            }
            let mut outputs: Vec<Value> = Vec::new();
            for (user, op) in func.iter_ops() {
                if member_set.contains(&user) {
                    continue;
                }
                for operand in &op.operands {
                    if member_set.contains(&operand.op) && !outputs.contains(operand) {
                        outputs.push(*operand);
                    }
                }
            }
            for (_, value) in &func.outputs {
                if member_set.contains(&value.op) && !outputs.contains(value) {
                    outputs.push(*value);
                }
            }

            for &m in &members {
                func.op_mut(m)
                    .attributes
                    .insert_int(reserved::COMB_BLOCK, number as i64);
            }
            let name = func.gen_name(&format!("comb_{number}"));
            func.comb_blocks.push(CombBlock {
                name,
                ops: members,
                inputs,
                outputs,
            });
        }
        log::debug!(
            "fuse-comb built {} block(s) in `{}'",
            func.comb_blocks.len(),
            func.name
        );
        Ok(())
    }
}

/// Deterministic Kahn topological order of `members` under intra-member
/// dependences; ready ops are taken lowest-index-first.
fn topo_order(func: &Function, members: &[OpIdx]) -> Vec<OpIdx> {
    let member_set: HashSet<OpIdx> = members.iter().copied().collect();
    let mut pending: HashMap<OpIdx, usize> = HashMap::new();
    let mut dependents: HashMap<OpIdx, Vec<OpIdx>> = HashMap::new();
    for &m in members {
        let deps = func
            .op(m)
            .operands
            .iter()
            .filter(|v| member_set.contains(&v.op) && v.op != m)
            .map(|v| v.op)
            .collect::<HashSet<_>>();
        pending.insert(m, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(m);
        }
    }
    let mut ready: BTreeSet<OpIdx> = pending
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&idx, _)| idx)
        .collect();
    let mut order = Vec::with_capacity(members.len());
    while let Some(&next) = ready.iter().next() {
        ready.remove(&next);
        order.push(next);
        if let Some(users) = dependents.get(&next) {
            for &user in users {
                let count = pending.get_mut(&user).expect("member");
                *count -= 1;
                if *count == 0 {
                    ready.insert(user);
                }
            }
        }
    }
    debug_assert_eq!(order.len(), members.len(), "comb block contains a cycle");
    order
}
