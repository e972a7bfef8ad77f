//! Recursive-descent parser for the textual IR.
//!
//! The grammar is exactly what [`pyc_ir::Printer`] emits. Functions are
//! graph regions: an op may read a value defined later in the body (a
//! register closing a feedback loop), so ops are materialized in two passes,
//! first creating every op, then resolving operand names.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::lexer::{tokenize, Spanned, Token};
use pyc_ir::attribute::reserved;
use pyc_ir::{Bits, Direction, Function, Module, Op, OpIdx, OpKind, Port, Region, Value};
use pyc_utils::{Error, Id, PycResult};

/// Parse a textual IR module.
pub fn parse_module(src: &str) -> PycResult<Module> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.module()
}

#[derive(Debug)]
struct PendingOp {
    /// Result names, in order.
    names: Vec<String>,
    /// Result widths, in order.
    widths: Vec<u8>,
    kind: PendingKind,
    /// Operand value names, in op-defined order.
    operands: Vec<String>,
    /// Nested regions: `[then, else]` for `if`, `[body]` for `for`.
    regions: Vec<Vec<PendingOp>>,
    line: usize,
}

#[derive(Debug)]
enum PendingKind {
    Const(u64),
    Wire,
    Simple(&'static str),
    Extract(u8),
    Reg { init: u64 },
    MemSync(u32),
    MemSyncDp(u32),
    ByteMem(u32),
    Fifo(u32),
    AsyncFifo(u32),
    CdcSync(u8),
    Instance(String),
    If,
    For { indvar: String, indvar_width: u8 },
    Yield,
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn next(&mut self) -> Token {
        let tok = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error<T>(&self, msg: impl std::fmt::Display) -> PycResult<T> {
        Err(Error::parse(format!("line {}: {msg}", self.line())))
    }

    fn expect(&mut self, tok: Token) -> PycResult<()> {
        if *self.peek() == tok {
            self.next();
            Ok(())
        } else {
            self.error(format!("expected {tok}, found {}", self.peek()))
        }
    }

    fn expect_ident(&mut self) -> PycResult<String> {
        match self.peek().clone() {
            Token::Ident(s) => {
                self.next();
                Ok(s)
            }
            other => self.error(format!("expected an identifier, found {other}")),
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> PycResult<()> {
        let found = self.expect_ident()?;
        if found == kw {
            Ok(())
        } else {
            self.error(format!("expected `{kw}', found `{found}'"))
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Token::Ident(s) if s == kw) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect_value(&mut self) -> PycResult<String> {
        match self.peek().clone() {
            Token::Value(s) => {
                self.next();
                Ok(s)
            }
            other => self.error(format!("expected a %value, found {other}")),
        }
    }

    fn expect_symbol(&mut self) -> PycResult<String> {
        match self.peek().clone() {
            Token::Symbol(s) => {
                self.next();
                Ok(s)
            }
            other => self.error(format!("expected an @symbol, found {other}")),
        }
    }

    fn expect_int(&mut self) -> PycResult<u64> {
        match *self.peek() {
            Token::Int(v) => {
                self.next();
                Ok(v)
            }
            ref other => self.error(format!("expected an integer, found {other}")),
        }
    }

    /// `wN`
    fn width(&mut self) -> PycResult<u8> {
        let text = self.expect_ident()?;
        let digits = text.strip_prefix('w').unwrap_or("");
        match digits.parse::<u8>() {
            Ok(w) if (1..=64).contains(&w) => Ok(w),
            _ => self.error(format!("expected a width `w1'..`w64', found `{text}'")),
        }
    }

    /// `wN` or `(wN, wN, ...)`
    fn type_list(&mut self) -> PycResult<Vec<u8>> {
        if *self.peek() == Token::LParen {
            self.next();
            let mut widths = vec![self.width()?];
            while *self.peek() == Token::Comma {
                self.next();
                widths.push(self.width()?);
            }
            self.expect(Token::RParen)?;
            Ok(widths)
        } else {
            Ok(vec![self.width()?])
        }
    }

    /// `key=%value`, enforcing the key.
    fn keyed_value(&mut self, key: &str) -> PycResult<String> {
        self.expect_keyword(key)?;
        self.expect(Token::Equals)?;
        self.expect_value()
    }

    /// `key=int`, enforcing the key.
    fn keyed_int(&mut self, key: &str) -> PycResult<u64> {
        self.expect_keyword(key)?;
        self.expect(Token::Equals)?;
        self.expect_int()
    }

    /// `%a, %b, ...` (at least one)
    fn value_list(&mut self) -> PycResult<Vec<String>> {
        let mut values = vec![self.expect_value()?];
        while *self.peek() == Token::Comma {
            self.next();
            values.push(self.expect_value()?);
        }
        Ok(values)
    }

    fn module(&mut self) -> PycResult<Module> {
        let mut module = Module::new();
        self.expect_keyword("module")?;
        if self.eat_keyword("attributes") {
            self.attributes(&mut module.attributes)?;
        }
        self.expect(Token::LBrace)?;
        while *self.peek() != Token::RBrace {
            let func = self.function()?;
            module.push_function(func);
        }
        self.expect(Token::RBrace)?;
        self.expect(Token::Eof)?;
        Ok(module)
    }

    fn attributes(&mut self, attrs: &mut pyc_ir::Attributes) -> PycResult<()> {
        self.expect(Token::LBrace)?;
        while *self.peek() != Token::RBrace {
            let key = self.expect_ident()?;
            self.expect(Token::Equals)?;
            match self.peek().clone() {
                Token::Int(v) => {
                    self.next();
                    attrs.insert_int(key.as_str(), v as i64);
                }
                Token::Symbol(s) => {
                    self.next();
                    attrs.insert_sym(key.as_str(), Id::new(s));
                }
                other => return self.error(format!("expected an attribute value, found {other}")),
            }
            if *self.peek() == Token::Comma {
                self.next();
            }
        }
        self.expect(Token::RBrace)?;
        Ok(())
    }

    fn function(&mut self) -> PycResult<Function> {
        self.expect_keyword("func")?;
        let name = self.expect_symbol()?;
        let mut ports = Vec::new();

        self.expect(Token::LParen)?;
        while *self.peek() != Token::RParen {
            let pname = self.expect_value()?;
            self.expect(Token::Colon)?;
            let width = self.width()?;
            ports.push(Port::new(pname, width, Direction::Input));
            if *self.peek() == Token::Comma {
                self.next();
            }
        }
        self.expect(Token::RParen)?;

        if *self.peek() == Token::Arrow {
            self.next();
            self.expect(Token::LParen)?;
            while *self.peek() != Token::RParen {
                let pname = self.expect_ident()?;
                self.expect(Token::Colon)?;
                let width = self.width()?;
                ports.push(Port::new(pname, width, Direction::Output));
                if *self.peek() == Token::Comma {
                    self.next();
                }
            }
            self.expect(Token::RParen)?;
        }

        let mut func = Function::new(name.as_str(), ports);
        if self.eat_keyword("attributes") {
            self.attributes(&mut func.attributes)?;
        }

        let mut outputs = Vec::new();
        let pending = self.op_list(&mut outputs)?;
        Materializer::run(&mut func, &pending, &outputs)?;
        pyc_ir::typecheck::check_function(&func)?;
        Ok(func)
    }

    /// `{ stmt* }` collecting output statements separately.
    fn op_list(&mut self, outputs: &mut Vec<(String, String, usize)>) -> PycResult<Vec<PendingOp>> {
        self.expect(Token::LBrace)?;
        let mut ops = Vec::new();
        loop {
            match self.peek().clone() {
                Token::RBrace => {
                    self.next();
                    return Ok(ops);
                }
                Token::Ident(kw) if kw == "output" => {
                    self.next();
                    let port = self.expect_ident()?;
                    self.expect(Token::Equals)?;
                    let value = self.expect_value()?;
                    outputs.push((port, value, self.line()));
                }
                Token::Ident(kw) if kw == "yield" => {
                    let line = self.line();
                    self.next();
                    let operands = self.value_list()?;
                    ops.push(PendingOp {
                        names: Vec::new(),
                        widths: Vec::new(),
                        kind: PendingKind::Yield,
                        operands,
                        regions: Vec::new(),
                        line,
                    });
                }
                Token::Value(..) => {
                    ops.push(self.op_stmt(outputs)?);
                }
                other => return self.error(format!("expected an op, found {other}")),
            }
        }
    }

    fn op_stmt(&mut self, outputs: &mut Vec<(String, String, usize)>) -> PycResult<PendingOp> {
        let line = self.line();
        let names = self.value_list()?;
        self.expect(Token::Equals)?;
        let kind = self.expect_ident()?;

        let mut op = PendingOp {
            names,
            widths: Vec::new(),
            kind: PendingKind::Yield, // replaced below
            operands: Vec::new(),
            regions: Vec::new(),
            line,
        };

        match kind.as_str() {
            "const" => {
                let v = self.expect_int()?;
                op.kind = PendingKind::Const(v);
                self.finish_types(&mut op)?;
            }
            "wire" => {
                op.operands = vec![self.expect_value()?];
                op.kind = PendingKind::Wire;
                self.finish_types(&mut op)?;
            }
            "add" | "sub" | "and" | "or" | "xor" | "not" | "eq" | "ult" | "shl" | "lshr"
            | "ashr" | "mux" | "trunc" | "zext" | "sext" | "concat" => {
                op.operands = self.value_list()?;
                op.kind = PendingKind::Simple(match kind.as_str() {
                    "add" => "add",
                    "sub" => "sub",
                    "and" => "and",
                    "or" => "or",
                    "xor" => "xor",
                    "not" => "not",
                    "eq" => "eq",
                    "ult" => "ult",
                    "shl" => "shl",
                    "lshr" => "lshr",
                    "ashr" => "ashr",
                    "mux" => "mux",
                    "trunc" => "trunc",
                    "zext" => "zext",
                    "sext" => "sext",
                    _ => "concat",
                });
                self.finish_types(&mut op)?;
            }
            "extract" => {
                op.operands = vec![self.expect_value()?];
                let lsb = self.keyed_int("lsb")?;
                op.kind = PendingKind::Extract(lsb as u8);
                self.finish_types(&mut op)?;
            }
            "reg" => {
                let d = self.expect_value()?;
                let clk = self.keyed_value("clk")?;
                let rst = self.keyed_value("rst")?;
                let en = self.keyed_value("en")?;
                let init = self.keyed_int("init")?;
                op.operands = vec![clk, rst, en, d];
                op.kind = PendingKind::Reg { init };
                self.finish_types(&mut op)?;
            }
            "mem_sync" => {
                let clk = self.keyed_value("clk")?;
                let addr = self.keyed_value("addr")?;
                let wdata = self.keyed_value("wdata")?;
                let wen = self.keyed_value("wen")?;
                let depth = self.keyed_int("depth")?;
                op.operands = vec![clk, addr, wdata, wen];
                op.kind = PendingKind::MemSync(depth as u32);
                self.finish_types(&mut op)?;
            }
            "mem_sync_dp" => {
                let clk = self.keyed_value("clk")?;
                let raddr0 = self.keyed_value("raddr0")?;
                let raddr1 = self.keyed_value("raddr1")?;
                let waddr = self.keyed_value("waddr")?;
                let wdata = self.keyed_value("wdata")?;
                let wen = self.keyed_value("wen")?;
                let depth = self.keyed_int("depth")?;
                op.operands = vec![clk, raddr0, raddr1, waddr, wdata, wen];
                op.kind = PendingKind::MemSyncDp(depth as u32);
                self.finish_types(&mut op)?;
            }
            "byte_mem" => {
                let clk = self.keyed_value("clk")?;
                let addr = self.keyed_value("addr")?;
                let wdata = self.keyed_value("wdata")?;
                let wen = self.keyed_value("wen")?;
                let size = self.keyed_int("size")?;
                op.operands = vec![clk, addr, wdata, wen];
                op.kind = PendingKind::ByteMem(size as u32);
                self.finish_types(&mut op)?;
            }
            "fifo" => {
                let clk = self.keyed_value("clk")?;
                let rst = self.keyed_value("rst")?;
                let push_valid = self.keyed_value("push_valid")?;
                let push_data = self.keyed_value("push_data")?;
                let pop_ready = self.keyed_value("pop_ready")?;
                let depth = self.keyed_int("depth")?;
                op.operands = vec![clk, rst, push_valid, push_data, pop_ready];
                op.kind = PendingKind::Fifo(depth as u32);
                self.finish_types(&mut op)?;
            }
            "async_fifo" => {
                let wclk = self.keyed_value("wclk")?;
                let wrst = self.keyed_value("wrst")?;
                let rclk = self.keyed_value("rclk")?;
                let rrst = self.keyed_value("rrst")?;
                let push_valid = self.keyed_value("push_valid")?;
                let push_data = self.keyed_value("push_data")?;
                let pop_ready = self.keyed_value("pop_ready")?;
                let depth = self.keyed_int("depth")?;
                op.operands = vec![wclk, wrst, rclk, rrst, push_valid, push_data, pop_ready];
                op.kind = PendingKind::AsyncFifo(depth as u32);
                self.finish_types(&mut op)?;
            }
            "cdc_sync" => {
                let clk = self.keyed_value("clk")?;
                let rst = self.keyed_value("rst")?;
                let d = self.keyed_value("d")?;
                let stages = self.keyed_int("stages")?;
                op.operands = vec![clk, rst, d];
                op.kind = PendingKind::CdcSync(stages as u8);
                self.finish_types(&mut op)?;
            }
            "instance" => {
                let callee = self.expect_symbol()?;
                self.expect(Token::LParen)?;
                if *self.peek() != Token::RParen {
                    op.operands = self.value_list()?;
                }
                self.expect(Token::RParen)?;
                op.kind = PendingKind::Instance(callee);
                self.finish_types(&mut op)?;
            }
            "if" => {
                op.operands = vec![self.expect_value()?];
                op.kind = PendingKind::If;
                self.expect(Token::Colon)?;
                op.widths = self.type_list()?;
                let then_ops = self.op_list(outputs)?;
                self.expect_keyword("else")?;
                let else_ops = self.op_list(outputs)?;
                op.regions = vec![then_ops, else_ops];
            }
            "for" => {
                let indvar = self.expect_value()?;
                self.expect(Token::Colon)?;
                let indvar_width = self.width()?;
                self.expect(Token::Equals)?;
                let lb = self.expect_value()?;
                self.expect_keyword("to")?;
                let ub = self.expect_value()?;
                self.expect_keyword("step")?;
                let step = self.expect_value()?;
                self.expect_keyword("iter")?;
                self.expect(Token::LParen)?;
                let mut iter_names = Vec::new();
                let mut inits = Vec::new();
                while *self.peek() != Token::RParen {
                    iter_names.push(self.expect_value()?);
                    self.expect(Token::Equals)?;
                    inits.push(self.expect_value()?);
                    if *self.peek() == Token::Comma {
                        self.next();
                    }
                }
                self.expect(Token::RParen)?;
                op.operands = vec![lb, ub, step];
                op.operands.extend(inits);
                op.kind = PendingKind::For {
                    indvar,
                    indvar_width,
                };
                self.expect(Token::Colon)?;
                op.widths = self.type_list()?;
                if op.widths.len() != iter_names.len() {
                    return self.error(format!(
                        "`for' declares {} iter-args but {} result types",
                        iter_names.len(),
                        op.widths.len()
                    ));
                }
                let mut body = self.op_list(outputs)?;
                // Iter-arg bindings become leading region ops.
                for (index, name) in iter_names.into_iter().enumerate().rev() {
                    body.insert(
                        0,
                        PendingOp {
                            names: vec![name],
                            widths: vec![op.widths[index]],
                            kind: PendingKind::Simple("iterarg"),
                            operands: vec![],
                            regions: vec![],
                            line,
                        },
                    );
                }
                op.regions = vec![body];
            }
            other => return self.error(format!("unknown op `{other}'")),
        }

        if op.names.len() != op.widths.len() {
            return Err(Error::parse(format!(
                "line {line}: op defines {} results but declares {} types",
                op.names.len(),
                op.widths.len()
            )));
        }
        Ok(op)
    }

    /// ` : wN` or ` : (wN, ...)` filling `op.widths`.
    fn finish_types(&mut self, op: &mut PendingOp) -> PycResult<()> {
        self.expect(Token::Colon)?;
        let declared = self.type_list()?;
        op.widths = match &op.kind {
            // The declared type of a FIFO is its data width; the valid and
            // ready results are always w1.
            PendingKind::Fifo(..) | PendingKind::AsyncFifo(..) => {
                vec![declared[0], 1, 1]
            }
            PendingKind::MemSyncDp(..) => vec![declared[0], declared[0]],
            _ => declared,
        };
        Ok(())
    }
}

/// Creates ops from the pending tree: pass A allocates every op and names
/// its results, pass B resolves operand names. Graph regions make the two
/// passes necessary: a `reg` may read a value defined below it.
struct Materializer<'a> {
    func: &'a mut Function,
    map: HashMap<String, Value>,
    /// Output port names: reserved so no op can shadow one.
    reserved: Vec<String>,
    /// `(op index, pending op)` in traversal order, for pass B.
    created: Vec<(OpIdx, &'a PendingOp)>,
}

impl<'a> Materializer<'a> {
    fn run(
        func: &mut Function,
        pending: &[PendingOp],
        outputs: &[(String, String, usize)],
    ) -> PycResult<()> {
        let reserved = func.output_ports().map(|p| p.name.to_string()).collect();
        let mut m = Materializer {
            map: HashMap::new(),
            reserved,
            created: Vec::new(),
            func,
        };
        for port in m.func.input_ports().map(|p| p.name).collect::<Vec<_>>() {
            let value = m.func.input_value(port).expect("input op exists");
            m.map.insert(port.to_string(), value);
        }
        let top: Vec<OpIdx> = m.create_ops(pending)?;
        m.func.body = top;
        m.resolve_operands()?;
        for (port, value, line) in outputs {
            let value = *m.map.get(value).ok_or_else(|| {
                Error::parse(format!("line {line}: unknown value `%{value}'"))
            })?;
            m.func.set_output(Id::new(port), value);
        }
        Ok(())
    }

    fn define(&mut self, name: &str, value: Value, line: usize) -> PycResult<()> {
        if self.reserved.iter().any(|r| r == name) {
            return Err(Error::parse(format!(
                "line {line}: `%{name}' shadows an output port"
            )));
        }
        if self.map.insert(name.to_string(), value).is_some() {
            return Err(Error::parse(format!(
                "line {line}: value `%{name}' defined twice"
            )));
        }
        Ok(())
    }

    fn create_ops(&mut self, pending: &'a [PendingOp]) -> PycResult<Vec<OpIdx>> {
        let mut indices = Vec::with_capacity(pending.len());
        for p in pending {
            indices.push(self.create_op(p)?);
        }
        Ok(indices)
    }

    fn create_op(&mut self, p: &'a PendingOp) -> PycResult<OpIdx> {
        let widths: SmallVec<[u8; 2]> = p.widths.iter().copied().collect();
        let kind = match &p.kind {
            PendingKind::Const(v) => {
                if p.widths.len() != 1 {
                    return Err(Error::parse(format!("line {}: const has one result", p.line)));
                }
                OpKind::Const(Bits::new(p.widths[0], *v))
            }
            PendingKind::Wire => OpKind::Wire,
            PendingKind::Simple(mnemonic) => match *mnemonic {
                "add" => OpKind::Add,
                "sub" => OpKind::Sub,
                "and" => OpKind::And,
                "or" => OpKind::Or,
                "xor" => OpKind::Xor,
                "not" => OpKind::Not,
                "eq" => OpKind::Eq,
                "ult" => OpKind::Ult,
                "shl" => OpKind::Shl,
                "lshr" => OpKind::Lshr,
                "ashr" => OpKind::Ashr,
                "mux" => OpKind::Mux,
                "trunc" => OpKind::Trunc,
                "zext" => OpKind::Zext,
                "sext" => OpKind::Sext,
                "concat" => OpKind::Concat,
                "iterarg" => OpKind::IterArg { index: 0 }, // fixed below
                _ => unreachable!("unhandled simple op"),
            },
            PendingKind::Extract(lsb) => OpKind::Extract { lsb: *lsb },
            PendingKind::Reg { init } => OpKind::Reg { init: *init },
            PendingKind::MemSync(depth) => OpKind::MemSync { depth: *depth },
            PendingKind::MemSyncDp(depth) => OpKind::MemSyncDp { depth: *depth },
            PendingKind::ByteMem(size) => OpKind::ByteMem { size: *size },
            PendingKind::Fifo(depth) => OpKind::Fifo { depth: *depth },
            PendingKind::AsyncFifo(depth) => OpKind::AsyncFifo { depth: *depth },
            PendingKind::CdcSync(stages) => OpKind::CdcSync { stages: *stages },
            PendingKind::Instance(..) => OpKind::Instance,
            PendingKind::If => OpKind::If {
                then_region: Region::default(),
                else_region: Region::default(),
            },
            PendingKind::For { .. } => OpKind::For {
                body: Region::default(),
            },
            PendingKind::Yield => OpKind::Yield,
        };

        let mut op = Op::new(kind, SmallVec::new(), widths);
        if let PendingKind::Instance(callee) = &p.kind {
            op.attributes
                .insert_sym(reserved::CALLEE, Id::new(callee));
        }
        if p.names.len() == 1 {
            op.name = Some(Id::new(&p.names[0]));
        }
        let idx = self.func.append_op(op);
        self.created.push((idx, p));
        for (i, name) in p.names.iter().enumerate() {
            self.define(name, Value::new(idx, i as u8), p.line)?;
        }

        // Regions: create children after the parent, then attach their
        // indices and the scaffolding (indvar, iter-arg indices).
        match &p.kind {
            PendingKind::If => {
                let then_ops = self.create_ops(&p.regions[0])?;
                let else_ops = self.create_ops(&p.regions[1])?;
                if let OpKind::If {
                    then_region,
                    else_region,
                } = &mut self.func.op_mut(idx).kind
                {
                    then_region.ops = then_ops;
                    else_region.ops = else_ops;
                }
            }
            PendingKind::For {
                indvar,
                indvar_width,
            } => {
                // Induction variable leads the body.
                let mut iv = Op::new(
                    OpKind::IndVar,
                    SmallVec::new(),
                    smallvec::smallvec![*indvar_width],
                );
                iv.name = Some(Id::new(indvar));
                let iv_idx = self.func.append_op(iv);
                self.define(indvar, Value::from(iv_idx), p.line)?;

                let mut body_ops = self.create_ops(&p.regions[0])?;
                // Fix up iter-arg indices: they were created in order.
                let mut next_index = 0u8;
                for &child in &body_ops {
                    if let OpKind::IterArg { index } = &mut self.func.op_mut(child).kind {
                        *index = next_index;
                        next_index += 1;
                    }
                }
                body_ops.insert(0, iv_idx);
                if let OpKind::For { body } = &mut self.func.op_mut(idx).kind {
                    body.ops = body_ops;
                }
            }
            _ => {}
        }
        Ok(idx)
    }

    fn resolve_operands(&mut self) -> PycResult<()> {
        for (idx, p) in &self.created {
            let mut operands: SmallVec<[Value; 4]> = SmallVec::new();
            for name in &p.operands {
                let value = *self.map.get(name).ok_or_else(|| {
                    Error::parse(format!("line {}: unknown value `%{name}'", p.line))
                })?;
                operands.push(value);
            }
            self.func.op_mut(*idx).operands = operands;
        }
        Ok(())
    }
}
