//! Width-checked construction of IR ops.
//!
//! The builder is the only way ops should enter a function: every method
//! checks the operator table's width discipline, so a mismatch is caught at
//! graph-construction time rather than in a back-end.

use smallvec::{smallvec, SmallVec};

use crate::attribute::reserved;
use crate::bits::MAX_WIDTH;
use crate::{Bits, Direction, Function, Op, OpKind, Port, Value};
use pyc_utils::{bits_needed_for, Error, Id, PycResult};

/// Snapshot of a function's external signature, used to wire `instance` ops
/// without borrowing the callee.
#[derive(Clone, Debug)]
pub struct Signature {
    pub name: Id,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl Signature {
    pub fn of(func: &Function) -> Self {
        Signature {
            name: func.name,
            inputs: func.input_ports().cloned().collect(),
            outputs: func.output_ports().cloned().collect(),
        }
    }
}

/// IR builder for a single function.
pub struct Builder<'a> {
    pub func: &'a mut Function,
}

impl<'a> Builder<'a> {
    pub fn new(func: &'a mut Function) -> Self {
        Builder { func }
    }

    fn push(&mut self, kind: OpKind, operands: SmallVec<[Value; 4]>, widths: SmallVec<[u8; 2]>) -> Value {
        Value::from(self.func.push_op(Op::new(kind, operands, widths)))
    }

    fn check_width(&self, width: u8) -> PycResult<()> {
        if width < 1 || width > MAX_WIDTH {
            return Err(Error::unknown_width(format!(
                "width {width} outside the supported range 1..=64"
            ))
            .with_location(self.func.name));
        }
        Ok(())
    }

    fn expect_width(&self, v: Value, width: u8, what: &str) -> PycResult<()> {
        let found = self.func.value_width(v);
        if found != width {
            return Err(Error::malformed_structure(format!(
                "{what} must be w{width}, found w{found}"
            ))
            .with_location(self.func.name));
        }
        Ok(())
    }

    fn same_width(&self, a: Value, b: Value, op: &str) -> PycResult<u8> {
        let wa = self.func.value_width(a);
        let wb = self.func.value_width(b);
        if wa != wb {
            return Err(Error::malformed_structure(format!(
                "`{op}' operand widths differ: w{wa} vs w{wb}"
            ))
            .with_location(self.func.name));
        }
        Ok(wa)
    }

    /// Attach a stable name to the op that produced `v`.
    pub fn name(&mut self, v: Value, name: impl Into<Id>) -> Value {
        let name = name.into();
        self.func.op_mut(v.op).name = Some(name);
        v
    }

    pub fn input(&self, name: impl Into<Id>) -> PycResult<Value> {
        let name = name.into();
        self.func.input_value(name).ok_or_else(|| {
            Error::malformed_structure(format!("no input port named `{name}'"))
                .with_location(self.func.name)
        })
    }

    pub fn constant(&mut self, value: Bits) -> Value {
        self.func.add_const(value)
    }

    pub fn const_u64(&mut self, width: u8, v: u64) -> PycResult<Value> {
        self.check_width(width)?;
        Ok(self.constant(Bits::new(width, v)))
    }

    pub fn wire(&mut self, v: Value, name: impl Into<Id>) -> Value {
        let width = self.func.value_width(v);
        let out = self.push(OpKind::Wire, smallvec![v], smallvec![width]);
        self.name(out, name)
    }

    fn binary(&mut self, kind: OpKind, a: Value, b: Value) -> PycResult<Value> {
        let w = self.same_width(a, b, kind.mnemonic())?;
        Ok(self.push(kind, smallvec![a, b], smallvec![w]))
    }

    pub fn add(&mut self, a: Value, b: Value) -> PycResult<Value> {
        self.binary(OpKind::Add, a, b)
    }

    pub fn sub(&mut self, a: Value, b: Value) -> PycResult<Value> {
        self.binary(OpKind::Sub, a, b)
    }

    pub fn and(&mut self, a: Value, b: Value) -> PycResult<Value> {
        self.binary(OpKind::And, a, b)
    }

    pub fn or(&mut self, a: Value, b: Value) -> PycResult<Value> {
        self.binary(OpKind::Or, a, b)
    }

    pub fn xor(&mut self, a: Value, b: Value) -> PycResult<Value> {
        self.binary(OpKind::Xor, a, b)
    }

    pub fn not(&mut self, a: Value) -> Value {
        let w = self.func.value_width(a);
        self.push(OpKind::Not, smallvec![a], smallvec![w])
    }

    pub fn eq(&mut self, a: Value, b: Value) -> PycResult<Value> {
        self.same_width(a, b, "eq")?;
        Ok(self.push(OpKind::Eq, smallvec![a, b], smallvec![1]))
    }

    pub fn ult(&mut self, a: Value, b: Value) -> PycResult<Value> {
        self.same_width(a, b, "ult")?;
        Ok(self.push(OpKind::Ult, smallvec![a, b], smallvec![1]))
    }

    fn shift(&mut self, kind: OpKind, a: Value, amount: Value) -> Value {
        let w = self.func.value_width(a);
        self.push(kind, smallvec![a, amount], smallvec![w])
    }

    pub fn shl(&mut self, a: Value, amount: Value) -> Value {
        self.shift(OpKind::Shl, a, amount)
    }

    pub fn lshr(&mut self, a: Value, amount: Value) -> Value {
        self.shift(OpKind::Lshr, a, amount)
    }

    pub fn ashr(&mut self, a: Value, amount: Value) -> Value {
        self.shift(OpKind::Ashr, a, amount)
    }

    pub fn mux(&mut self, sel: Value, a: Value, b: Value) -> PycResult<Value> {
        self.expect_width(sel, 1, "mux selector")?;
        let w = self.same_width(a, b, "mux")?;
        Ok(self.push(OpKind::Mux, smallvec![sel, a, b], smallvec![w]))
    }

    pub fn trunc(&mut self, a: Value, width: u8) -> PycResult<Value> {
        self.check_width(width)?;
        let wa = self.func.value_width(a);
        if width > wa {
            return Err(Error::malformed_structure(format!(
                "trunc to w{width} from narrower w{wa}"
            ))
            .with_location(self.func.name));
        }
        Ok(self.push(OpKind::Trunc, smallvec![a], smallvec![width]))
    }

    pub fn zext(&mut self, a: Value, width: u8) -> PycResult<Value> {
        self.extend(OpKind::Zext, a, width)
    }

    pub fn sext(&mut self, a: Value, width: u8) -> PycResult<Value> {
        self.extend(OpKind::Sext, a, width)
    }

    fn extend(&mut self, kind: OpKind, a: Value, width: u8) -> PycResult<Value> {
        self.check_width(width)?;
        let wa = self.func.value_width(a);
        if width < wa {
            return Err(Error::malformed_structure(format!(
                "{} to w{width} from wider w{wa}",
                kind.mnemonic()
            ))
            .with_location(self.func.name));
        }
        Ok(self.push(kind, smallvec![a], smallvec![width]))
    }

    pub fn extract(&mut self, a: Value, lsb: u8, width: u8) -> PycResult<Value> {
        self.check_width(width)?;
        let wa = self.func.value_width(a);
        if lsb as u16 + width as u16 > wa as u16 {
            return Err(Error::malformed_structure(format!(
                "extract [{}:{lsb}] out of range for w{wa}",
                lsb + width - 1
            ))
            .with_location(self.func.name));
        }
        Ok(self.push(OpKind::Extract { lsb }, smallvec![a], smallvec![width]))
    }

    /// Concatenate values, most significant first.
    pub fn concat(&mut self, parts: &[Value]) -> PycResult<Value> {
        if parts.is_empty() {
            return Err(Error::malformed_structure("concat of zero values")
                .with_location(self.func.name));
        }
        let total: u16 = parts
            .iter()
            .map(|v| self.func.value_width(*v) as u16)
            .sum();
        if total > MAX_WIDTH as u16 {
            return Err(Error::unknown_width(format!(
                "concat result is w{total}, wider than 64"
            ))
            .with_location(self.func.name));
        }
        Ok(self.push(
            OpKind::Concat,
            parts.iter().copied().collect(),
            smallvec![total as u8],
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reg(
        &mut self,
        clk: Value,
        rst: Value,
        en: Value,
        d: Value,
        init: u64,
    ) -> PycResult<Value> {
        self.expect_width(clk, 1, "reg clock")?;
        self.expect_width(rst, 1, "reg reset")?;
        self.expect_width(en, 1, "reg clock-enable")?;
        let w = self.func.value_width(d);
        Ok(self.push(
            OpKind::Reg { init },
            smallvec![clk, rst, en, d],
            smallvec![w],
        ))
    }

    pub fn mem_sync(
        &mut self,
        clk: Value,
        addr: Value,
        wdata: Value,
        wen: Value,
        depth: u32,
    ) -> PycResult<Value> {
        self.expect_width(clk, 1, "mem_sync clock")?;
        self.expect_width(wen, 1, "mem_sync write-enable")?;
        self.expect_width(addr, bits_needed_for(depth as u64) as u8, "mem_sync address")?;
        let w = self.func.value_width(wdata);
        Ok(self.push(
            OpKind::MemSync { depth },
            smallvec![clk, addr, wdata, wen],
            smallvec![w],
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mem_sync_dp(
        &mut self,
        clk: Value,
        raddr0: Value,
        raddr1: Value,
        waddr: Value,
        wdata: Value,
        wen: Value,
        depth: u32,
    ) -> PycResult<(Value, Value)> {
        self.expect_width(clk, 1, "mem_sync_dp clock")?;
        self.expect_width(wen, 1, "mem_sync_dp write-enable")?;
        let aw = bits_needed_for(depth as u64) as u8;
        self.expect_width(raddr0, aw, "mem_sync_dp read address 0")?;
        self.expect_width(raddr1, aw, "mem_sync_dp read address 1")?;
        self.expect_width(waddr, aw, "mem_sync_dp write address")?;
        let w = self.func.value_width(wdata);
        let idx = self.func.push_op(Op::new(
            OpKind::MemSyncDp { depth },
            smallvec![clk, raddr0, raddr1, waddr, wdata, wen],
            smallvec![w, w],
        ));
        Ok((Value::new(idx, 0), Value::new(idx, 1)))
    }

    pub fn byte_mem(
        &mut self,
        clk: Value,
        addr: Value,
        wdata: Value,
        wen: Value,
        size: u32,
    ) -> PycResult<Value> {
        self.expect_width(clk, 1, "byte_mem clock")?;
        self.expect_width(wen, 1, "byte_mem write-enable")?;
        self.expect_width(addr, bits_needed_for(size as u64) as u8, "byte_mem address")?;
        let w = self.func.value_width(wdata);
        if w % 8 != 0 {
            return Err(Error::malformed_structure(format!(
                "byte_mem data width w{w} is not a whole number of bytes"
            ))
            .with_location(self.func.name));
        }
        Ok(self.push(
            OpKind::ByteMem { size },
            smallvec![clk, addr, wdata, wen],
            smallvec![w],
        ))
    }

    /// Returns `(pop_data, pop_valid, push_ready)`.
    pub fn fifo(
        &mut self,
        clk: Value,
        rst: Value,
        push_valid: Value,
        push_data: Value,
        pop_ready: Value,
        depth: u32,
    ) -> PycResult<(Value, Value, Value)> {
        self.expect_width(clk, 1, "fifo clock")?;
        self.expect_width(rst, 1, "fifo reset")?;
        self.expect_width(push_valid, 1, "fifo push valid")?;
        self.expect_width(pop_ready, 1, "fifo pop ready")?;
        let w = self.func.value_width(push_data);
        let idx = self.func.push_op(Op::new(
            OpKind::Fifo { depth },
            smallvec![clk, rst, push_valid, push_data, pop_ready],
            smallvec![w, 1, 1],
        ));
        Ok((Value::new(idx, 0), Value::new(idx, 1), Value::new(idx, 2)))
    }

    /// Returns `(pop_data, pop_valid, push_ready)`.
    #[allow(clippy::too_many_arguments)]
    pub fn async_fifo(
        &mut self,
        wclk: Value,
        wrst: Value,
        rclk: Value,
        rrst: Value,
        push_valid: Value,
        push_data: Value,
        pop_ready: Value,
        depth: u32,
    ) -> PycResult<(Value, Value, Value)> {
        for (v, what) in [
            (wclk, "async_fifo write clock"),
            (wrst, "async_fifo write reset"),
            (rclk, "async_fifo read clock"),
            (rrst, "async_fifo read reset"),
            (push_valid, "async_fifo push valid"),
            (pop_ready, "async_fifo pop ready"),
        ] {
            self.expect_width(v, 1, what)?;
        }
        let w = self.func.value_width(push_data);
        let idx = self.func.push_op(Op::new(
            OpKind::AsyncFifo { depth },
            smallvec![wclk, wrst, rclk, rrst, push_valid, push_data, pop_ready],
            smallvec![w, 1, 1],
        ));
        Ok((Value::new(idx, 0), Value::new(idx, 1), Value::new(idx, 2)))
    }

    pub fn cdc_sync(
        &mut self,
        clk: Value,
        rst: Value,
        d: Value,
        stages: u8,
    ) -> PycResult<Value> {
        self.expect_width(clk, 1, "cdc_sync clock")?;
        self.expect_width(rst, 1, "cdc_sync reset")?;
        let w = self.func.value_width(d);
        Ok(self.push(
            OpKind::CdcSync { stages },
            smallvec![clk, rst, d],
            smallvec![w],
        ))
    }

    /// Instantiate `callee` as a submodule. `inputs` map to the callee's
    /// input ports in order; the returned values map to its output ports in
    /// order.
    pub fn instance(&mut self, callee: &Signature, inputs: &[Value]) -> PycResult<Vec<Value>> {
        if inputs.len() != callee.inputs.len() {
            return Err(Error::malformed_structure(format!(
                "instance of `{}' takes {} inputs, got {}",
                callee.name,
                callee.inputs.len(),
                inputs.len()
            ))
            .with_location(self.func.name));
        }
        for (v, port) in inputs.iter().zip(&callee.inputs) {
            self.expect_width(
                *v,
                port.width,
                &format!("instance input `{}'", port.name),
            )?;
        }
        let widths: SmallVec<[u8; 2]> =
            callee.outputs.iter().map(|p| p.width).collect();
        let mut op = Op::new(OpKind::Instance, inputs.iter().copied().collect(), widths);
        op.attributes.insert_sym(reserved::CALLEE, callee.name);
        let idx = self.func.push_op(op);
        Ok((0..callee.outputs.len())
            .map(|i| Value::new(idx, i as u8))
            .collect())
    }

    /// Wire an output port to a value, checking the port's width.
    pub fn output(&mut self, port: impl Into<Id>, v: Value) -> PycResult<()> {
        let port = port.into();
        let Some(p) = self.func.port(port) else {
            return Err(Error::malformed_structure(format!(
                "no output port named `{port}'"
            ))
            .with_location(self.func.name));
        };
        if p.direction != Direction::Output {
            return Err(Error::malformed_structure(format!(
                "port `{port}' is not an output"
            ))
            .with_location(self.func.name));
        }
        let pw = p.width;
        self.expect_width(v, pw, &format!("output port `{port}'"))?;
        self.func.set_output(port, v);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_shell() -> Function {
        Function::new(
            "counter",
            vec![
                Port::new("clk", 1, Direction::Input),
                Port::new("rst", 1, Direction::Input),
                Port::new("count", 8, Direction::Output),
            ],
        )
    }

    #[test]
    fn builds_a_counter() {
        let mut func = counter_shell();
        let mut b = Builder::new(&mut func);
        let clk = b.input("clk").unwrap();
        let rst = b.input("rst").unwrap();
        let one = b.const_u64(8, 1).unwrap();
        let en = b.const_u64(1, 1).unwrap();
        // Build the register on a placeholder and patch the feedback.
        let q = b.reg(clk, rst, en, one, 0).unwrap();
        let next = b.add(q, one).unwrap();
        b.func.op_mut(q.op).operands[3] = next;
        b.output("count", q).unwrap();
        crate::typecheck::check_function(&func).unwrap();
        assert_eq!(func.outputs.len(), 1);
    }

    #[test]
    fn rejects_mismatched_operand_widths() {
        let mut func = counter_shell();
        let mut b = Builder::new(&mut func);
        let a = b.const_u64(8, 1).unwrap();
        let narrow = b.const_u64(4, 1).unwrap();
        assert!(b.add(a, narrow).is_err());
        assert!(b.eq(a, narrow).is_err());
    }

    #[test]
    fn rejects_widths_outside_the_algebra() {
        let mut func = counter_shell();
        let mut b = Builder::new(&mut func);
        assert!(b.const_u64(0, 0).is_err());
        assert!(b.const_u64(65, 0).is_err());
        let a = b.const_u64(8, 3).unwrap();
        assert!(b.trunc(a, 12).is_err());
        assert!(b.zext(a, 4).is_err());
        assert!(b.extract(a, 5, 4).is_err());
    }

    #[test]
    fn mux_selector_must_be_one_bit() {
        let mut func = counter_shell();
        let mut b = Builder::new(&mut func);
        let a = b.const_u64(8, 1).unwrap();
        let bb = b.const_u64(8, 2).unwrap();
        let wide_sel = b.const_u64(2, 1).unwrap();
        assert!(b.mux(wide_sel, a, bb).is_err());
    }

    #[test]
    fn concat_wider_than_64_is_rejected() {
        let mut func = counter_shell();
        let mut b = Builder::new(&mut func);
        let x = b.const_u64(40, 1).unwrap();
        let y = b.const_u64(40, 2).unwrap();
        assert!(b.concat(&[x, y]).is_err());
    }

    #[test]
    fn output_width_is_checked() {
        let mut func = counter_shell();
        let mut b = Builder::new(&mut func);
        let narrow = b.const_u64(4, 0).unwrap();
        assert!(b.output("count", narrow).is_err());
        assert!(b.output("missing", narrow).is_err());
    }
}
