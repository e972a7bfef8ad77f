//! Removal of unused pure values.

use pyc_ir::Function;
use pyc_utils::PycResult;

use crate::passes::canonicalize::sweep_dead_pure_ops;
use crate::traversal::{FunctionPass, Named, SigContext};

/// Erases pure ops whose results nothing reads. Sequential and
/// side-effecting ops are out of scope; `eliminate-dead-state` reasons
/// about those.
#[derive(Default)]
pub struct DeadValueRemoval;

impl Named for DeadValueRemoval {
    fn name() -> &'static str {
        "dead-value-removal"
    }

    fn description() -> &'static str {
        "remove unused pure values"
    }
}

impl FunctionPass for DeadValueRemoval {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        if sweep_dead_pure_ops(func) {
            log::debug!("dead-value-removal changed `{}'", func.name);
        }
        Ok(())
    }
}
