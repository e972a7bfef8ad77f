//! All passes implemented by the compiler.

mod canonicalize;
mod check_comb_cycles;
mod check_logic_depth;
mod collect_stats;
mod comb_canonicalize;
mod cse;
mod dce;
mod eliminate_dead_state;
mod eliminate_wires;
mod fuse_comb;
mod inline;
mod lower_scf;
mod pack_i1_regs;
mod sccp;
mod slp_pack_wires;
mod symbol_dce;
mod verify;

pub use canonicalize::Canonicalize;
pub use check_comb_cycles::CheckCombCycles;
pub use check_logic_depth::CheckLogicDepth;
pub use collect_stats::CollectCompileStats;
pub use comb_canonicalize::CombCanonicalize;
pub use cse::Cse;
pub use dce::DeadValueRemoval;
pub use eliminate_dead_state::EliminateDeadState;
pub use eliminate_wires::EliminateWires;
pub use fuse_comb::FuseComb;
pub use inline::Inline;
pub use lower_scf::LowerScfStatic;
pub use pack_i1_regs::PackI1Regs;
pub use sccp::Sccp;
pub use slp_pack_wires::SlpPackWires;
pub use symbol_dce::SymbolDce;
pub use verify::{CheckFlatTypes, CheckInstances, CheckNoDynamic};
