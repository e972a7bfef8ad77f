//! Implements a formatter for the in-memory representation of modules.
//! The output is the compiler's textual IR; `pyc-frontend` parses exactly
//! this format back.

use std::io;

use itertools::Itertools;

use crate::{Function, Module, Op, OpIdx, OpKind, Region, Value};

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Write a whole module.
    pub fn write_module<W: io::Write>(module: &Module, f: &mut W) -> io::Result<()> {
        if module.attributes.is_empty() {
            writeln!(f, "module {{")?;
        } else {
            let attrs = module
                .attributes
                .iter()
                .map(|(k, v)| format!("{k} = {v}"))
                .join(", ");
            writeln!(f, "module attributes {{{attrs}}} {{")?;
        }
        for func in &module.functions {
            Self::write_function(func, 2, f)?;
        }
        writeln!(f, "}}")
    }

    /// Write a single function at the given indentation level.
    pub fn write_function<W: io::Write>(
        func: &Function,
        indent: usize,
        f: &mut W,
    ) -> io::Result<()> {
        let inputs = func
            .input_ports()
            .map(|p| format!("%{}: w{}", p.name, p.width))
            .join(", ");
        let outputs = func
            .output_ports()
            .map(|p| format!("{}: w{}", p.name, p.width))
            .join(", ");
        write!(f, "{:indent$}func @{}({inputs})", "", func.name)?;
        if !outputs.is_empty() {
            write!(f, " -> ({outputs})")?;
        }
        if !func.attributes.is_empty() {
            let attrs = func
                .attributes
                .iter()
                .map(|(k, v)| format!("{k} = {v}"))
                .join(", ");
            write!(f, " attributes {{{attrs}}}")?;
        }
        writeln!(f, " {{")?;
        for &idx in &func.body {
            Self::write_op(func, idx, indent + 2, f)?;
        }
        for (port, value) in &func.outputs {
            writeln!(
                f,
                "{:indent$}output {port} = %{}",
                "",
                func.value_name(*value),
                indent = indent + 2
            )?;
        }
        writeln!(f, "{:indent$}}}", "")
    }

    fn results(func: &Function, idx: OpIdx) -> String {
        let op = func.op(idx);
        (0..op.widths.len())
            .map(|i| format!("%{}", func.value_name(Value::new(idx, i as u8))))
            .join(", ")
    }

    fn operand(func: &Function, v: Value) -> String {
        format!("%{}", func.value_name(v))
    }

    fn operands(func: &Function, op: &Op) -> String {
        op.operands
            .iter()
            .map(|v| Self::operand(func, *v))
            .join(", ")
    }

    fn result_types(op: &Op) -> String {
        if op.widths.len() == 1 {
            format!("w{}", op.widths[0])
        } else {
            format!("({})", op.widths.iter().map(|w| format!("w{w}")).join(", "))
        }
    }

    fn write_region<W: io::Write>(
        func: &Function,
        region: &Region,
        indent: usize,
        f: &mut W,
    ) -> io::Result<()> {
        for &idx in &region.ops {
            Self::write_op(func, idx, indent, f)?;
        }
        Ok(())
    }

    /// Write one op (and its regions, recursively).
    pub fn write_op<W: io::Write>(
        func: &Function,
        idx: OpIdx,
        indent: usize,
        f: &mut W,
    ) -> io::Result<()> {
        let op = func.op(idx);
        if matches!(
            op.kind,
            OpKind::Nop | OpKind::Input | OpKind::IndVar | OpKind::IterArg { .. }
        ) {
            // Inputs print in the signature; indvars and iter-args print in
            // their `for` header.
            return Ok(());
        }
        let results = Self::results(func, idx);
        let types = Self::result_types(op);
        write!(f, "{:indent$}", "")?;
        match &op.kind {
            OpKind::Nop | OpKind::Input => Ok(()),
            OpKind::Const(v) => {
                writeln!(f, "{results} = const {} : {types}", v.value())
            }
            OpKind::Wire => {
                writeln!(
                    f,
                    "{results} = wire {} : {types}",
                    Self::operand(func, op.operands[0])
                )
            }
            OpKind::Add
            | OpKind::Sub
            | OpKind::And
            | OpKind::Or
            | OpKind::Xor
            | OpKind::Not
            | OpKind::Eq
            | OpKind::Ult
            | OpKind::Shl
            | OpKind::Lshr
            | OpKind::Ashr
            | OpKind::Mux
            | OpKind::Trunc
            | OpKind::Zext
            | OpKind::Sext
            | OpKind::Concat => {
                writeln!(
                    f,
                    "{results} = {} {} : {types}",
                    op.kind.mnemonic(),
                    Self::operands(func, op)
                )
            }
            OpKind::Extract { lsb } => {
                writeln!(
                    f,
                    "{results} = extract {} lsb={lsb} : {types}",
                    Self::operand(func, op.operands[0])
                )
            }
            OpKind::Reg { init } => {
                writeln!(
                    f,
                    "{results} = reg {} clk={} rst={} en={} init={init} : {types}",
                    Self::operand(func, op.operands[3]),
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                )
            }
            OpKind::MemSync { depth } => {
                writeln!(
                    f,
                    "{results} = mem_sync clk={} addr={} wdata={} wen={} depth={depth} : {types}",
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                    Self::operand(func, op.operands[3]),
                )
            }
            OpKind::MemSyncDp { depth } => {
                writeln!(
                    f,
                    "{results} = mem_sync_dp clk={} raddr0={} raddr1={} waddr={} wdata={} wen={} depth={depth} : {types}",
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                    Self::operand(func, op.operands[3]),
                    Self::operand(func, op.operands[4]),
                    Self::operand(func, op.operands[5]),
                )
            }
            OpKind::ByteMem { size } => {
                writeln!(
                    f,
                    "{results} = byte_mem clk={} addr={} wdata={} wen={} size={size} : {types}",
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                    Self::operand(func, op.operands[3]),
                )
            }
            OpKind::Fifo { depth } => {
                writeln!(
                    f,
                    "{results} = fifo clk={} rst={} push_valid={} push_data={} pop_ready={} depth={depth} : {types}",
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                    Self::operand(func, op.operands[3]),
                    Self::operand(func, op.operands[4]),
                )
            }
            OpKind::AsyncFifo { depth } => {
                writeln!(
                    f,
                    "{results} = async_fifo wclk={} wrst={} rclk={} rrst={} push_valid={} push_data={} pop_ready={} depth={depth} : {types}",
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                    Self::operand(func, op.operands[3]),
                    Self::operand(func, op.operands[4]),
                    Self::operand(func, op.operands[5]),
                    Self::operand(func, op.operands[6]),
                )
            }
            OpKind::CdcSync { stages } => {
                writeln!(
                    f,
                    "{results} = cdc_sync clk={} rst={} d={} stages={stages} : {types}",
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                )
            }
            OpKind::Instance => {
                let callee = op
                    .attributes
                    .get_sym(crate::attribute::reserved::CALLEE)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                writeln!(
                    f,
                    "{results} = instance @{callee}({}) : {types}",
                    Self::operands(func, op)
                )
            }
            OpKind::If {
                then_region,
                else_region,
            } => {
                writeln!(
                    f,
                    "{results} = if {} : {types} {{",
                    Self::operand(func, op.operands[0])
                )?;
                Self::write_region(func, then_region, indent + 2, f)?;
                writeln!(f, "{:indent$}}} else {{", "")?;
                Self::write_region(func, else_region, indent + 2, f)?;
                writeln!(f, "{:indent$}}}", "")
            }
            OpKind::For { body } => {
                // Scan the body for the induction variable and iter-args so
                // their bindings print in the header.
                let indvar = body
                    .ops
                    .iter()
                    .find(|&&i| matches!(func.op(i).kind, OpKind::IndVar));
                let indvar_str = indvar
                    .map(|&i| {
                        format!(
                            "%{}: w{}",
                            func.value_name(Value::from(i)),
                            func.op(i).widths[0]
                        )
                    })
                    .unwrap_or_else(|| "%_: w1".to_string());
                let iters = body
                    .ops
                    .iter()
                    .filter_map(|&i| match func.op(i).kind {
                        OpKind::IterArg { index } => Some((index, i)),
                        _ => None,
                    })
                    .sorted()
                    .map(|(index, i)| {
                        format!(
                            "%{} = {}",
                            func.value_name(Value::from(i)),
                            Self::operand(func, op.operands[3 + index as usize])
                        )
                    })
                    .join(", ");
                writeln!(
                    f,
                    "{results} = for {indvar_str} = {} to {} step {} iter({iters}) : {types} {{",
                    Self::operand(func, op.operands[0]),
                    Self::operand(func, op.operands[1]),
                    Self::operand(func, op.operands[2]),
                )?;
                Self::write_region(func, body, indent + 2, f)?;
                writeln!(f, "{:indent$}}}", "")
            }
            OpKind::IndVar | OpKind::IterArg { .. } => unreachable!(),
            OpKind::Yield => {
                writeln!(f, "yield {}", Self::operands(func, op))
            }
        }
    }

    /// Render a module to a string. Used by `--dump-ir` and tests.
    pub fn module_to_string(module: &Module) -> String {
        let mut buf = Vec::new();
        Self::write_module(module, &mut buf).expect("write to Vec cannot fail");
        String::from_utf8(buf).expect("printer emits UTF-8")
    }
}
