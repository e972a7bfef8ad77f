//! Cycle-accurate C++ simulation backend.
//!
//! Emits one self-contained struct per function. The struct exposes
//! `eval()` to settle combinational logic and a two-phase `tick()`:
//! every sequential primitive first computes its next state from current
//! inputs, then all of them commit simultaneously, so commit order can
//! never influence results.

use std::io::Write;

use itertools::Itertools;

use pyc_ir::{Direction, Function, Module, Op, OpIdx, OpKind, Value};
use pyc_utils::{Error, OutputFile, PycResult};

use crate::traits::Backend;
use crate::util::{callee_of, direct_deps, functions_postorder, schedule, Unit};
use crate::verilog::VerilogBackend;

#[derive(Default)]
pub struct CppBackend;

impl Backend for CppBackend {
    fn name(&self) -> &'static str {
        "cpp-sim"
    }

    fn validate(module: &Module) -> PycResult<()> {
        VerilogBackend::validate(module)
    }

    fn emit(module: &Module, file: &mut OutputFile) -> PycResult<()> {
        let mut out = file.get_write()?;
        writeln!(out, "// pyCircuit C++ emission")?;
        writeln!(out, "#pragma once")?;
        writeln!(out, "#include <pyc/cpp/pyc_sim.hpp>")?;
        writeln!(out)?;
        writeln!(out, "namespace pyc::gen {{")?;
        for name in functions_postorder(module)? {
            let func = module.resolve_callee(name)?;
            writeln!(out)?;
            emit_function(module, func, &mut out)?;
        }
        writeln!(out)?;
        writeln!(out, "}} // namespace pyc::gen")?;
        out.flush()?;
        Ok(())
    }
}

fn wire_type(width: u8) -> String {
    format!("pyc::cpp::Wire<{width}>")
}

fn name_of(func: &Function, v: Value) -> String {
    func.value_name(v)
}

/// The struct member holding a stateful primitive or submodule instance.
fn inst_name(func: &Function, idx: OpIdx) -> String {
    format!("{}_inst", name_of(func, Value::from(idx)))
}

/// Render a combinational op as a C++ expression over member wires.
fn expr_of(func: &Function, op: &Op) -> String {
    let operand = |i: usize| name_of(func, op.operands[i]);
    let w0 = op.widths.first().copied().unwrap_or(1);
    // Shift amounts are compile-time constants after `check-no-dynamic`;
    // fall back to the runtime value so a hand-built pipeline still works.
    let shift_amount = || match const_value(func, op.operands[1]) {
        Some(v) => format!("{v}u"),
        None => format!("{}.value()", operand(1)),
    };
    match &op.kind {
        OpKind::Const(b) => format!("{}({{{:#x}ull}})", wire_type(b.width()), b.value()),
        OpKind::Wire => operand(0),
        OpKind::Add => format!("({} + {})", operand(0), operand(1)),
        OpKind::Sub => format!("({} - {})", operand(0), operand(1)),
        OpKind::And => format!("({} & {})", operand(0), operand(1)),
        OpKind::Or => format!("({} | {})", operand(0), operand(1)),
        OpKind::Xor => format!("({} ^ {})", operand(0), operand(1)),
        OpKind::Not => format!("(~{})", operand(0)),
        OpKind::Eq => format!(
            "pyc::cpp::Wire<1>(({} == {}) ? 1u : 0u)",
            operand(0),
            operand(1)
        ),
        OpKind::Ult => format!(
            "pyc::cpp::Wire<1>(({} < {}) ? 1u : 0u)",
            operand(0),
            operand(1)
        ),
        OpKind::Shl => format!("pyc::cpp::shl<{w0}>({}, {})", operand(0), shift_amount()),
        OpKind::Lshr => format!("pyc::cpp::lshr<{w0}>({}, {})", operand(0), shift_amount()),
        OpKind::Ashr => format!("pyc::cpp::ashr<{w0}>({}, {})", operand(0), shift_amount()),
        OpKind::Mux => format!(
            "({}.toBool() ? {} : {})",
            operand(0),
            operand(1),
            operand(2)
        ),
        OpKind::Trunc => format!(
            "pyc::cpp::trunc<{w0}, {}>({})",
            func.value_width(op.operands[0]),
            operand(0)
        ),
        OpKind::Zext => format!(
            "pyc::cpp::zext<{w0}, {}>({})",
            func.value_width(op.operands[0]),
            operand(0)
        ),
        OpKind::Sext => format!(
            "pyc::cpp::sext<{w0}, {}>({})",
            func.value_width(op.operands[0]),
            operand(0)
        ),
        OpKind::Extract { lsb } => format!(
            "pyc::cpp::extract<{w0}, {}>({}, {lsb}u)",
            func.value_width(op.operands[0]),
            operand(0)
        ),
        OpKind::Concat => format!(
            "pyc::cpp::concat({})",
            (0..op.operands.len()).map(operand).join(", ")
        ),
        kind => unreachable!("`{}' is not combinational", kind.mnemonic()),
    }
}

fn const_value(func: &Function, v: Value) -> Option<u64> {
    match func.op(v.op).kind {
        OpKind::Const(b) => Some(b.value()),
        _ => None,
    }
}

/// Constructor initializer for one sequential primitive.
fn prim_initializer(func: &Function, idx: OpIdx) -> Option<String> {
    let op = func.op(idx);
    let operand = |i: usize| name_of(func, op.operands[i]);
    let result = |i: u8| name_of(func, Value::new(idx, i));
    let width = op.widths.first().copied().unwrap_or(1);
    let inst = inst_name(func, idx);
    match &op.kind {
        OpKind::Reg { init } => Some(format!(
            "{inst}({}, {}, {}, {}, {}({{{init:#x}ull}}), {})",
            operand(0),
            operand(1),
            operand(2),
            operand(3),
            wire_type(width),
            result(0)
        )),
        OpKind::MemSync { depth } => Some(format!(
            "{inst}({}, {}, {}, {}, {}, {depth}u)",
            operand(0),
            operand(1),
            operand(2),
            operand(3),
            result(0)
        )),
        OpKind::MemSyncDp { depth } => Some(format!(
            "{inst}({}, {}, {}, {}, {}, {}, {}, {}, {depth}u)",
            operand(0),
            operand(1),
            operand(2),
            operand(3),
            operand(4),
            operand(5),
            result(0),
            result(1)
        )),
        OpKind::ByteMem { size } => Some(format!(
            "{inst}({}, {}, {}, {}, {}, {size}u)",
            operand(0),
            operand(1),
            operand(2),
            operand(3),
            result(0)
        )),
        OpKind::Fifo { depth } => Some(format!(
            "{inst}({}, {}, {}, {}, {}, {}, {}, {}, {depth}u)",
            operand(0),
            operand(1),
            operand(2),
            operand(3),
            operand(4),
            result(0),
            result(1),
            result(2)
        )),
        OpKind::AsyncFifo { depth } => Some(format!(
            "{inst}({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {depth}u)",
            operand(0),
            operand(1),
            operand(2),
            operand(3),
            operand(4),
            operand(5),
            operand(6),
            result(0),
            result(1),
            result(2)
        )),
        OpKind::CdcSync { stages } => Some(format!(
            "{inst}({}, {}, {}, {}, {stages}u)",
            operand(0),
            operand(1),
            operand(2),
            result(0)
        )),
        _ => None,
    }
}

/// Member type of a sequential primitive instance. Memories also carry
/// their address width as a template parameter.
fn prim_type(func: &Function, idx: OpIdx) -> Option<String> {
    let op = func.op(idx);
    let width = op.widths.first().copied().unwrap_or(1);
    let addr_width = || func.value_width(op.operands[1]);
    Some(match op.kind {
        OpKind::Reg { .. } => format!("pyc::cpp::pyc_reg<{width}>"),
        OpKind::MemSync { .. } => {
            format!("pyc::cpp::pyc_sync_mem<{width}, {}>", addr_width())
        }
        OpKind::MemSyncDp { .. } => {
            format!("pyc::cpp::pyc_sync_mem_dp<{width}, {}>", addr_width())
        }
        OpKind::ByteMem { .. } => {
            format!("pyc::cpp::pyc_byte_mem<{width}, {}>", addr_width())
        }
        OpKind::Fifo { .. } => format!("pyc::cpp::pyc_fifo<{width}>"),
        OpKind::AsyncFifo { .. } => format!("pyc::cpp::pyc_async_fifo<{width}>"),
        OpKind::CdcSync { .. } => format!("pyc::cpp::pyc_cdc_sync<{width}>"),
        _ => return None,
    })
}

/// Statements wiring a submodule instance inside the comb pass: inputs in,
/// one `eval`, results out.
fn emit_instance_eval(
    module: &Module,
    func: &Function,
    idx: OpIdx,
    out: &mut dyn Write,
) -> PycResult<()> {
    let op = func.op(idx);
    let callee = module.resolve_callee(callee_of(func, idx)?)?;
    let inst = inst_name(func, idx);
    for (i, port) in callee.input_ports().enumerate() {
        writeln!(
            out,
            "    {inst}.{} = {};",
            port.name,
            name_of(func, op.operands[i])
        )?;
    }
    writeln!(out, "    {inst}.eval();")?;
    for (i, port) in callee.output_ports().enumerate() {
        writeln!(
            out,
            "    {} = {inst}.{};",
            name_of(func, Value::new(idx, i as u8)),
            port.name
        )?;
    }
    Ok(())
}

/// Emit one function as one simulation struct.
pub fn emit_function(
    module: &Module,
    func: &Function,
    out: &mut dyn Write,
) -> PycResult<()> {
    writeln!(out, "struct {} {{", func.name)?;

    // Ports first, inputs then outputs, in source order.
    for port in func.ports.iter().filter(|p| p.direction == Direction::Input) {
        writeln!(out, "  {} {}{{}};", wire_type(port.width), port.name)?;
    }
    for port in func.ports.iter().filter(|p| p.direction == Direction::Output) {
        writeln!(out, "  {} {}{{}};", wire_type(port.width), port.name)?;
    }
    writeln!(out)?;

    // One storage cell per wire, sorted by name for stable output.
    let mut wires: Vec<(String, u8)> = Vec::new();
    for &idx in &func.body {
        let op = func.op(idx);
        if matches!(op.kind, OpKind::Input | OpKind::Nop) {
            continue;
        }
        for result in 0..op.widths.len() {
            wires.push((
                name_of(func, Value::new(idx, result as u8)),
                op.widths[result],
            ));
        }
    }
    wires.sort();
    for (name, width) in &wires {
        writeln!(out, "  {} {name}{{}};", wire_type(*width))?;
    }
    writeln!(out)?;

    // One primitive instance per stateful op, one member per submodule.
    let mut prim_ops: Vec<OpIdx> = Vec::new();
    let mut instance_ops: Vec<OpIdx> = Vec::new();
    for &idx in &func.body {
        let op = func.op(idx);
        if prim_type(func, idx).is_some() {
            prim_ops.push(idx);
        } else if matches!(op.kind, OpKind::Instance) {
            instance_ops.push(idx);
        }
    }
    for &idx in &prim_ops {
        writeln!(
            out,
            "  {} {};",
            prim_type(func, idx).expect("stateful"),
            inst_name(func, idx)
        )?;
    }
    for &idx in &instance_ops {
        writeln!(
            out,
            "  {} {}{{}};",
            callee_of(func, idx)?,
            inst_name(func, idx)
        )?;
    }
    writeln!(out)?;

    // Constructor: wire the primitives, then settle.
    if prim_ops.is_empty() {
        writeln!(out, "  {}() {{ eval(); }}", func.name)?;
    } else {
        let inits = prim_ops
            .iter()
            .map(|&idx| prim_initializer(func, idx).expect("stateful"))
            .join(",\n      ");
        writeln!(out, "  {}() :\n      {inits} {{", func.name)?;
        writeln!(out, "    eval();")?;
        writeln!(out, "  }}")?;
    }
    writeln!(out)?;

    // Numbered comb blocks: the fused blocks, then a constants block.
    let order = schedule(func)?;
    for (number, block) in func.comb_blocks.iter().enumerate() {
        writeln!(out, "  inline void eval_comb_{number}() {{")?;
        for &idx in &block.ops {
            writeln!(
                out,
                "    {} = {};",
                name_of(func, Value::from(idx)),
                expr_of(func, func.op(idx))
            )?;
        }
        writeln!(out, "  }}")?;
        writeln!(out)?;
    }
    let const_block = func.comb_blocks.len();
    let const_ops: Vec<OpIdx> = func
        .body
        .iter()
        .copied()
        .filter(|&idx| matches!(func.op(idx).kind, OpKind::Const(..)))
        .collect();
    writeln!(out, "  inline void eval_comb_{const_block}() {{")?;
    for &idx in &const_ops {
        writeln!(
            out,
            "    {} = {};",
            name_of(func, Value::from(idx)),
            expr_of(func, func.op(idx))
        )?;
    }
    writeln!(out, "  }}")?;
    writeln!(out)?;

    // The comb pass: constants, then every unit in topological order.
    writeln!(out, "  inline void eval_comb_pass() {{")?;
    writeln!(out, "    eval_comb_{const_block}();")?;
    for unit in &order {
        match unit {
            Unit::Block(number) => writeln!(out, "    eval_comb_{number}();")?,
            Unit::Op(idx) => {
                let op = func.op(*idx);
                match &op.kind {
                    OpKind::Const(..) => {}
                    OpKind::Instance => emit_instance_eval(module, func, *idx, out)?,
                    kind if kind.is_pure_comb() => {
                        writeln!(
                            out,
                            "    {} = {};",
                            name_of(func, Value::from(*idx)),
                            expr_of(func, op)
                        )?;
                    }
                    // Sequential outputs only change at commit time.
                    _ => {}
                }
            }
        }
    }
    // Refresh submodule inputs so tick_compute samples this cycle's
    // values even on registered-only paths.
    for &idx in &instance_ops {
        let op = func.op(idx);
        let callee = module.resolve_callee(callee_of(func, idx)?)?;
        for (i, port) in callee.input_ports().enumerate() {
            writeln!(
                out,
                "    {}.{} = {};",
                inst_name(func, idx),
                port.name,
                name_of(func, op.operands[i])
            )?;
        }
    }
    writeln!(out, "  }}")?;
    writeln!(out)?;

    // eval: settle, then propagate to module outputs.
    writeln!(out, "  void eval() {{")?;
    writeln!(out, "    eval_comb_pass();")?;
    for (port, value) in &func.outputs {
        writeln!(out, "    {port} = {};", name_of(func, *value))?;
    }
    writeln!(out, "  }}")?;
    writeln!(out)?;

    // Two-phase update: compute next state for all sequential elements,
    // then commit together. This avoids ordering artifacts between regs.
    writeln!(out, "  void tick_compute() {{")?;
    for &idx in &prim_ops {
        writeln!(out, "    {}.tick_compute();", inst_name(func, idx))?;
    }
    for &idx in &instance_ops {
        writeln!(out, "    {}.tick_compute();", inst_name(func, idx))?;
    }
    writeln!(out, "  }}")?;
    writeln!(out)?;
    writeln!(out, "  void tick_commit() {{")?;
    for &idx in &prim_ops {
        writeln!(out, "    {}.tick_commit();", inst_name(func, idx))?;
    }
    for &idx in &instance_ops {
        writeln!(out, "    {}.tick_commit();", inst_name(func, idx))?;
    }
    writeln!(out, "  }}")?;
    writeln!(out)?;
    writeln!(out, "  void tick() {{")?;
    writeln!(out, "    tick_compute();")?;
    writeln!(out, "    tick_commit();")?;
    writeln!(out, "  }}")?;
    writeln!(out, "}};")?;
    Ok(())
}

/// Emit one function to a string as a standalone header. Split-output mode
/// writes one file per function, including its direct dependencies.
pub fn function_to_string(module: &Module, func: &Function) -> PycResult<String> {
    let mut buf = Vec::new();
    writeln!(buf, "// pyCircuit C++ emission")?;
    writeln!(buf, "#pragma once")?;
    writeln!(buf, "#include <pyc/cpp/pyc_sim.hpp>")?;
    for dep in direct_deps(func)? {
        writeln!(buf, "#include \"{dep}.hpp\"")?;
    }
    writeln!(buf)?;
    writeln!(buf, "namespace pyc::gen {{")?;
    writeln!(buf)?;
    emit_function(module, func, &mut buf)?;
    writeln!(buf)?;
    writeln!(buf, "}} // namespace pyc::gen")?;
    String::from_utf8(buf).map_err(|_| Error::emission("cpp emitter produced non-UTF-8"))
}
