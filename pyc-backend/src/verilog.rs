//! Verilog backend for the pyCircuit compiler.
//!
//! Transforms a legalized [`Module`] into synthesizable SystemVerilog: one
//! `module` per function, continuous assignments for free-standing comb
//! ops, one `always_comb` region per fused comb block, and library
//! primitive instances for all stateful ops.

use std::io::Write;

use itertools::Itertools;

use pyc_ir::{Direction, Function, Module, Op, OpIdx, OpKind, Value};
use pyc_utils::{Error, OutputFile, PycResult};

use crate::traits::Backend;
use crate::util::{callee_of, functions_postorder, schedule, Unit};

#[derive(Default)]
pub struct VerilogBackend;

impl Backend for VerilogBackend {
    fn name(&self) -> &'static str {
        "verilog"
    }

    fn validate(module: &Module) -> PycResult<()> {
        for func in &module.functions {
            for (_, op) in func.iter_ops() {
                if op.kind.is_structured_control() {
                    return Err(Error::emission(format!(
                        "`{}' still contains structured control; run the legalization pipeline first",
                        func.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn emit(module: &Module, file: &mut OutputFile) -> PycResult<()> {
        let mut out = file.get_write()?;
        writeln!(out, "// Generated by pyc-compile")?;
        for name in functions_postorder(module)? {
            let func = module.resolve_callee(name)?;
            writeln!(out)?;
            emit_function(module, func, &mut out)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Verilog literal of a constant.
fn literal(width: u8, value: u64) -> String {
    format!("{width}'d{value}")
}

/// The wire (or logic) name carrying a value.
fn name_of(func: &Function, v: Value) -> String {
    func.value_name(v)
}

fn decl_type(width: u8) -> String {
    if width == 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

/// Render a combinational op as a Verilog expression over its operand
/// names.
fn expr_of(func: &Function, op: &Op) -> String {
    let operand = |i: usize| name_of(func, op.operands[i]);
    match &op.kind {
        OpKind::Const(b) => literal(b.width(), b.value()),
        OpKind::Wire => operand(0),
        OpKind::Add => format!("{} + {}", operand(0), operand(1)),
        OpKind::Sub => format!("{} - {}", operand(0), operand(1)),
        OpKind::And => format!("{} & {}", operand(0), operand(1)),
        OpKind::Or => format!("{} | {}", operand(0), operand(1)),
        OpKind::Xor => format!("{} ^ {}", operand(0), operand(1)),
        OpKind::Not => format!("~{}", operand(0)),
        OpKind::Eq => format!("{} == {}", operand(0), operand(1)),
        OpKind::Ult => format!("{} < {}", operand(0), operand(1)),
        OpKind::Shl => format!("{} << {}", operand(0), operand(1)),
        OpKind::Lshr => format!("{} >> {}", operand(0), operand(1)),
        OpKind::Ashr => format!("$signed({}) >>> {}", operand(0), operand(1)),
        OpKind::Mux => format!("{} ? {} : {}", operand(0), operand(1), operand(2)),
        OpKind::Trunc => format!("{}[{}:0]", operand(0), op.widths[0] - 1),
        OpKind::Zext => {
            let pad = op.widths[0] - func.value_width(op.operands[0]);
            format!("{{{{{pad}{{1'b0}}}}, {}}}", operand(0))
        }
        OpKind::Sext => {
            let in_width = func.value_width(op.operands[0]);
            let pad = op.widths[0] - in_width;
            format!(
                "{{{{{pad}{{{}[{}]}}}}, {}}}",
                operand(0),
                in_width - 1,
                operand(0)
            )
        }
        OpKind::Extract { lsb } => {
            if op.widths[0] == 1 {
                format!("{}[{lsb}]", operand(0))
            } else {
                format!("{}[{}:{lsb}]", operand(0), lsb + op.widths[0] - 1)
            }
        }
        OpKind::Concat => format!(
            "{{{}}}",
            (0..op.operands.len()).map(operand).join(", ")
        ),
        kind => unreachable!("`{}' is not combinational", kind.mnemonic()),
    }
}

fn emit_stateful(
    module: &Module,
    func: &Function,
    idx: OpIdx,
    out: &mut dyn Write,
) -> PycResult<()> {
    let op = func.op(idx);
    let operand = |i: usize| name_of(func, op.operands[i]);
    let result = |i: u8| name_of(func, Value::new(idx, i));
    let inst = format!("pyc_{}_{idx}_i", op.kind.mnemonic());
    let width = op.widths.first().copied().unwrap_or(1);
    match &op.kind {
        OpKind::Reg { init } => {
            writeln!(
                out,
                "  pyc_reg #(.WIDTH({width}), .INIT({})) {inst} (\n    \
                 .clk({}), .rst({}), .en({}), .d({}), .q({})\n  );",
                literal(width, *init),
                operand(0),
                operand(1),
                operand(2),
                operand(3),
                result(0)
            )?;
        }
        OpKind::MemSync { depth } => {
            writeln!(
                out,
                "  pyc_sync_mem #(.WIDTH({width}), .DEPTH({depth})) {inst} (\n    \
                 .clk({}), .addr({}), .wdata({}), .wen({}), .rdata({})\n  );",
                operand(0),
                operand(1),
                operand(2),
                operand(3),
                result(0)
            )?;
        }
        OpKind::MemSyncDp { depth } => {
            writeln!(
                out,
                "  pyc_sync_mem_dp #(.WIDTH({width}), .DEPTH({depth})) {inst} (\n    \
                 .clk({}), .raddr0({}), .raddr1({}), .waddr({}), .wdata({}), .wen({}),\n    \
                 .rdata0({}), .rdata1({})\n  );",
                operand(0),
                operand(1),
                operand(2),
                operand(3),
                operand(4),
                operand(5),
                result(0),
                result(1)
            )?;
        }
        OpKind::ByteMem { size } => {
            writeln!(
                out,
                "  pyc_byte_mem #(.WIDTH({width}), .SIZE({size})) {inst} (\n    \
                 .clk({}), .addr({}), .wdata({}), .wen({}), .rdata({})\n  );",
                operand(0),
                operand(1),
                operand(2),
                operand(3),
                result(0)
            )?;
        }
        OpKind::Fifo { depth } => {
            writeln!(
                out,
                "  pyc_fifo #(.WIDTH({width}), .DEPTH({depth})) {inst} (\n    \
                 .clk({}), .rst({}),\n    \
                 .push_valid({}), .push_data({}), .push_ready({}),\n    \
                 .pop_valid({}), .pop_data({}), .pop_ready({})\n  );",
                operand(0),
                operand(1),
                operand(2),
                operand(3),
                result(2),
                result(1),
                result(0),
                operand(4)
            )?;
        }
        OpKind::AsyncFifo { depth } => {
            writeln!(
                out,
                "  pyc_async_fifo #(.WIDTH({width}), .DEPTH({depth})) {inst} (\n    \
                 .wclk({}), .wrst({}), .rclk({}), .rrst({}),\n    \
                 .push_valid({}), .push_data({}), .push_ready({}),\n    \
                 .pop_valid({}), .pop_data({}), .pop_ready({})\n  );",
                operand(0),
                operand(1),
                operand(2),
                operand(3),
                operand(4),
                operand(5),
                result(2),
                result(1),
                result(0),
                operand(6)
            )?;
        }
        OpKind::CdcSync { stages } => {
            writeln!(
                out,
                "  pyc_cdc_sync #(.WIDTH({width}), .STAGES({stages})) {inst} (\n    \
                 .clk({}), .rst({}), .d({}), .q({})\n  );",
                operand(0),
                operand(1),
                operand(2),
                result(0)
            )?;
        }
        OpKind::Instance => {
            let callee_name = callee_of(func, idx)?;
            let callee = module.resolve_callee(callee_name)?;
            let mut conns: Vec<String> = Vec::new();
            for (i, port) in callee.input_ports().enumerate() {
                conns.push(format!(".{}({})", port.name, operand(i)));
            }
            for (i, port) in callee.output_ports().enumerate() {
                conns.push(format!(".{}({})", port.name, result(i as u8)));
            }
            writeln!(
                out,
                "  {callee_name} {inst} (\n    {}\n  );",
                conns.join(",\n    ")
            )?;
        }
        kind => unreachable!("`{}' is not stateful", kind.mnemonic()),
    }
    Ok(())
}

/// Emit one function as one Verilog module.
pub fn emit_function(
    module: &Module,
    func: &Function,
    out: &mut dyn Write,
) -> PycResult<()> {
    // Ports: inputs first in source order, then outputs in source order.
    let ports = func
        .ports
        .iter()
        .filter(|p| p.direction == Direction::Input)
        .map(|p| format!("  input wire {}{}", decl_type(p.width), p.name))
        .chain(
            func.ports
                .iter()
                .filter(|p| p.direction == Direction::Output)
                .map(|p| format!("  output wire {}{}", decl_type(p.width), p.name)),
        )
        .join(",\n");
    writeln!(out, "module {}(\n{ports}\n);", func.name)?;

    // Declarations: `logic` for values assigned inside an always_comb
    // block, `wire` for everything else.
    let fused: std::collections::HashSet<OpIdx> = func
        .comb_blocks
        .iter()
        .flat_map(|b| b.ops.iter().copied())
        .collect();
    for &idx in &func.body {
        let op = func.op(idx);
        if matches!(op.kind, OpKind::Input | OpKind::Nop) {
            continue;
        }
        for result in 0..op.widths.len() {
            let v = Value::new(idx, result as u8);
            let keyword = if fused.contains(&idx) { "logic" } else { "wire" };
            writeln!(
                out,
                "  {keyword} {}{};",
                decl_type(op.widths[result]),
                name_of(func, v)
            )?;
        }
    }
    writeln!(out)?;

    // Body in schedule order: assigns, fused blocks, primitive instances.
    for unit in schedule(func)? {
        match unit {
            Unit::Block(number) => {
                let block = &func.comb_blocks[number];
                writeln!(out, "  // {}", block.name)?;
                writeln!(out, "  always_comb begin")?;
                for &idx in &block.ops {
                    let op = func.op(idx);
                    writeln!(
                        out,
                        "    {} = {};",
                        name_of(func, Value::from(idx)),
                        expr_of(func, op)
                    )?;
                }
                writeln!(out, "  end")?;
            }
            Unit::Op(idx) => {
                let op = func.op(idx);
                if op.kind.is_pure_comb() {
                    writeln!(
                        out,
                        "  assign {} = {};",
                        name_of(func, Value::from(idx)),
                        expr_of(func, op)
                    )?;
                } else {
                    emit_stateful(module, func, idx, out)?;
                }
            }
        }
    }

    writeln!(out)?;
    for (port, value) in &func.outputs {
        writeln!(out, "  assign {port} = {};", name_of(func, *value))?;
    }
    writeln!(out, "endmodule")?;
    Ok(())
}

/// Emit a single function to a string. Split-output mode writes one file
/// per function.
pub fn function_to_string(module: &Module, func: &Function) -> PycResult<String> {
    let mut buf = Vec::new();
    writeln!(buf, "// Generated by pyc-compile")?;
    writeln!(buf)?;
    emit_function(module, func, &mut buf)?;
    String::from_utf8(buf).map_err(|_| Error::emission("verilog emitter produced non-UTF-8"))
}

/// Emit the whole module to a string, callees before callers.
pub fn module_to_string(module: &Module) -> PycResult<String> {
    let mut buf = Vec::new();
    writeln!(buf, "// Generated by pyc-compile")?;
    for name in functions_postorder(module)? {
        let func = module.resolve_callee(name)?;
        writeln!(buf)?;
        emit_function(module, func, &mut buf)?;
    }
    String::from_utf8(buf).map_err(|_| Error::emission("verilog emitter produced non-UTF-8"))
}

/// The stable file names of the runtime Verilog primitives, in
/// concatenation order.
pub const PRIMITIVE_FILES: [&str; 7] = [
    "pyc_reg.v",
    "pyc_fifo.v",
    "pyc_byte_mem.v",
    "pyc_sync_mem.v",
    "pyc_sync_mem_dp.v",
    "pyc_async_fifo.v",
    "pyc_cdc_sync.v",
];

/// Concatenate the primitive sources, prefixed with the FPGA macro when
/// targeting an FPGA.
pub fn bundle_primitives(sources: &[(String, String)], target_fpga: bool) -> String {
    let mut out = String::from("// pyCircuit Verilog primitives (concatenated)\n\n");
    if target_fpga {
        out.push_str("`define PYC_TARGET_FPGA 1\n\n");
    }
    for (name, contents) in sources {
        out.push_str(&format!("// --- {name}\n"));
        out.push_str(contents);
        out.push_str("\n\n");
    }
    out
}

