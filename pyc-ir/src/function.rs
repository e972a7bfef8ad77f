//! Functions: typed ports plus an arena of ops forming a
//! combinational-plus-sequential netlist body.

use std::collections::HashSet;

use crate::idx::IndexRef;
use crate::{Direction, Op, OpIdx, OpKind, Port, Value};
use crate::{Attributes, Bits};
use pyc_utils::{GetName, Id, NameGenerator};

/// A group of combinational ops emitted as one evaluation unit.
/// Produced by `fuse-comb`; consumed by both emitters.
#[derive(Clone, Debug)]
pub struct CombBlock {
    pub name: Id,
    /// Member ops in emission order.
    pub ops: Vec<OpIdx>,
    /// Values read from outside the block.
    pub inputs: Vec<Value>,
    /// Values visible outside the block.
    pub outputs: Vec<Value>,
}

/// A function: the unit of compilation and of emission (one Verilog module
/// or one simulation struct per function).
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Id,
    /// Ports in declaration order; inputs and outputs each keep their
    /// source order.
    pub ports: Vec<Port>,
    /// Op arena. Erased ops become `Nop` tombstones so indices stay stable.
    ops: Vec<Op>,
    /// Program order of top-level ops. Ops owned by an `If`/`For` region are
    /// listed by that region instead.
    pub body: Vec<OpIdx>,
    /// Wiring of output ports: `(port name, driving value)`.
    pub outputs: Vec<(Id, Value)>,
    /// Comb blocks recorded by `fuse-comb`; empty until that pass runs.
    pub comb_blocks: Vec<CombBlock>,
    pub attributes: Attributes,
    namegen: NameGenerator,
}

impl GetName for Function {
    fn name(&self) -> Id {
        self.name
    }
}

impl Function {
    pub fn new<S: Into<Id>>(name: S, ports: Vec<Port>) -> Self {
        let name = name.into();
        let namegen = NameGenerator::with_prev_defined_names(
            ports.iter().map(|p| p.name).collect(),
        );
        let mut f = Function {
            name,
            ports,
            ops: Vec::new(),
            body: Vec::new(),
            outputs: Vec::new(),
            comb_blocks: Vec::new(),
            attributes: Attributes::default(),
            namegen,
        };
        // One `Input` op per input port so every value is (op, result).
        let inputs: Vec<Port> = f.input_ports().cloned().collect();
        for port in inputs {
            let mut op = Op::new(
                OpKind::Input,
                Default::default(),
                smallvec::smallvec![port.width],
            );
            op.name = Some(port.name);
            f.ops.push(op);
        }
        f
    }

    /// Append `op` to the arena and the top-level body. Returns its index.
    pub fn push_op(&mut self, op: Op) -> OpIdx {
        let idx = self.append_op(op);
        self.body.push(idx);
        idx
    }

    /// Append `op` to the arena only; the caller owns its placement.
    pub fn append_op(&mut self, op: Op) -> OpIdx {
        if let Some(name) = op.name {
            self.namegen.add_names([name]);
        }
        let idx = OpIdx::new(self.ops.len());
        self.ops.push(op);
        idx
    }

    pub fn op(&self, idx: OpIdx) -> &Op {
        &self.ops[idx.index()]
    }

    pub fn op_mut(&mut self, idx: OpIdx) -> &mut Op {
        &mut self.ops[idx.index()]
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Iterate over all live ops in arena order.
    pub fn iter_ops(&self) -> impl Iterator<Item = (OpIdx, &Op)> {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| !op.is_nop())
            .map(|(i, op)| (OpIdx::new(i), op))
    }

    /// Indices of all live ops, in arena order.
    pub fn op_indices(&self) -> Vec<OpIdx> {
        self.iter_ops().map(|(i, _)| i).collect()
    }

    pub fn value_width(&self, v: Value) -> u8 {
        self.op(v.op).result_width(v.result)
    }

    /// The `Input` op for a named input port.
    pub fn input_value(&self, name: Id) -> Option<Value> {
        self.iter_ops()
            .find(|(_, op)| matches!(op.kind, OpKind::Input) && op.name == Some(name))
            .map(|(idx, _)| Value::from(idx))
    }

    pub fn input_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.direction == Direction::Input)
    }

    pub fn output_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.direction == Direction::Output)
    }

    pub fn port(&self, name: Id) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Record the driver of an output port.
    pub fn set_output(&mut self, port: Id, value: Value) {
        if let Some(slot) = self.outputs.iter_mut().find(|(p, _)| *p == port) {
            slot.1 = value;
        } else {
            self.outputs.push((port, value));
        }
    }

    /// Stable emission name for a value. Named ops keep their name; anonymous
    /// ops get `pyc_<mnemonic>_<idx>`, with a result suffix for multi-result
    /// ops.
    pub fn value_name(&self, v: Value) -> String {
        let op = self.op(v.op);
        let base = match op.name {
            Some(name) => name.to_string(),
            None => format!("pyc_{}_{}", op.kind.mnemonic(), v.op),
        };
        if op.widths.len() > 1 {
            format!("{base}_{}", v.result)
        } else {
            base
        }
    }

    /// Generate a fresh name unique within this function.
    pub fn gen_name(&mut self, prefix: &str) -> Id {
        self.namegen.gen_name(prefix)
    }

    /// Rewrite every use of `from` (operands and output wiring) to `to`.
    pub fn replace_uses(&mut self, from: Value, to: Value) {
        for op in &mut self.ops {
            for operand in &mut op.operands {
                if *operand == from {
                    *operand = to;
                }
            }
        }
        for (_, value) in &mut self.outputs {
            if *value == from {
                *value = to;
            }
        }
        for block in &mut self.comb_blocks {
            for input in &mut block.inputs {
                if *input == from {
                    *input = to;
                }
            }
            for output in &mut block.outputs {
                if *output == from {
                    *output = to;
                }
            }
        }
    }

    /// Erase an op: tombstone it in the arena and drop it from the body.
    /// The caller must have rewritten all uses of its results first.
    pub fn erase_op(&mut self, idx: OpIdx) {
        debug_assert!(
            !self.has_uses(idx),
            "erasing op {idx} which still has uses"
        );
        self.ops[idx.index()] = Op::new(
            OpKind::Nop,
            Default::default(),
            Default::default(),
        );
        self.body.retain(|&i| i != idx);
    }

    /// True when any live op or output reads a result of `idx`.
    pub fn has_uses(&self, idx: OpIdx) -> bool {
        self.ops
            .iter()
            .any(|op| !op.is_nop() && op.operands.iter().any(|v| v.op == idx))
            || self.outputs.iter().any(|(_, v)| v.op == idx)
    }

    /// Count uses of each op over live operands and outputs.
    pub fn use_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.ops.len()];
        for op in self.ops.iter().filter(|op| !op.is_nop()) {
            for v in &op.operands {
                counts[v.op.index()] += 1;
            }
        }
        for (_, v) in &self.outputs {
            counts[v.op.index()] += 1;
        }
        counts
    }

    /// Ops transitively reachable (through operands) from the given roots.
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = OpIdx>) -> HashSet<OpIdx> {
        let mut seen: HashSet<OpIdx> = HashSet::new();
        let mut stack: Vec<OpIdx> = roots.into_iter().collect();
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            for v in &self.op(idx).operands {
                stack.push(v.op);
            }
        }
        seen
    }

    /// Convenience: append a constant to the body.
    pub fn add_const(&mut self, value: Bits) -> Value {
        let op = Op::new(
            OpKind::Const(value),
            Default::default(),
            smallvec::smallvec![value.width()],
        );
        Value::from(self.push_op(op))
    }
}
