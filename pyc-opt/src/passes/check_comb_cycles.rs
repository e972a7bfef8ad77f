//! Combinational-cycle detection.

use itertools::Itertools;
use pyc_ir::Module;
use pyc_utils::{Error, PycResult};

use crate::analysis::{instance_comb_io, CombGraph};
use crate::traversal::{Named, Pass};

/// Verifies that the dependence graph cut at sequential elements is
/// acyclic. Comb paths through purely combinational submodule instances
/// count. On failure, reports one cycle with every op involved.
#[derive(Default)]
pub struct CheckCombCycles;

impl Named for CheckCombCycles {
    fn name() -> &'static str {
        "check-comb-cycles"
    }

    fn description() -> &'static str {
        "reject combinational cycles"
    }
}

impl Pass for CheckCombCycles {
    fn run(&mut self, module: &mut Module) -> PycResult<()> {
        let comb_io = instance_comb_io(module)?;
        for func in &module.functions {
            let graph = CombGraph::build(func, &comb_io);
            if let Some(cycle) = graph.find_cycle() {
                let members = cycle
                    .iter()
                    .map(|v| format!("`{}'", func.value_name(*v)))
                    .join(" -> ");
                return Err(Error::comb_cycle(format!(
                    "combinational cycle through {members}"
                ))
                .with_location(func.name));
            }
        }
        Ok(())
    }
}
