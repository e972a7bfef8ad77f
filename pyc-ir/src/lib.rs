//! Internal representation for the pyCircuit compiler.
//!
//! The IR is a netlist: each function owns an arena of ops, and values are
//! `(op, result)` pairs into that arena. Aggregate types never appear; every
//! value is a wire with a statically known width in 1..=64.

mod bits;
mod builder;
mod function;
mod idx;
mod module;
mod op;
mod printer;

pub mod attribute;
pub mod typecheck;

pub use attribute::{AttrValue, Attributes};
pub use bits::{Bits, MAX_WIDTH};
pub use builder::{Builder, Signature};
pub use function::{CombBlock, Function};
pub use idx::{FuncIdx, IndexRef, OpIdx, Value};
pub use module::Module;
pub use op::{Direction, Op, OpKind, Port, Region};
pub use printer::Printer;
