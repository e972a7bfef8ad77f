//! The default pass pipeline.

use pyc_utils::PycResult;

use crate::pass_manager::PassManager;
use crate::passes::*;
use crate::traversal::Pass;

/// Configuration the driver feeds into pipeline construction.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Bound used by `check-logic-depth`.
    pub logic_depth_limit: u64,
    /// False when op-granular simulation scheduling was requested.
    pub enable_fuse_comb: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            logic_depth_limit: 32,
            enable_fuse_comb: true,
        }
    }
}

impl PassManager {
    /// Construct the default pass manager: every pass registered, plus the
    /// `all` alias holding the standard netlist-emission pipeline.
    pub fn default_passes(config: PipelineConfig) -> PycResult<Self> {
        let mut pm = PassManager::default();

        // Generic middle-end.
        pm.register_pass::<Inline>()?;
        pm.register_function_pass::<Canonicalize>()?;
        pm.register_function_pass::<Cse>()?;
        pm.register_function_pass::<Sccp>()?;
        pm.register_function_pass::<DeadValueRemoval>()?;
        pm.register_pass::<SymbolDce>()?;

        // Netlist legalization and optimization.
        pm.register_function_pass::<LowerScfStatic>()?;
        pm.register_function_pass::<EliminateWires>()?;
        pm.register_function_pass::<EliminateDeadState>()?;
        pm.register_function_pass::<CombCanonicalize>()?;
        pm.register_function_pass::<SlpPackWires>()?;
        pm.register_function_pass::<PackI1Regs>()?;
        pm.register_function_pass::<FuseComb>()?;

        // Verification.
        pm.register_pass::<CheckInstances>()?;
        pm.register_pass::<CheckCombCycles>()?;
        pm.register_function_pass::<CheckFlatTypes>()?;
        pm.register_function_pass::<CheckNoDynamic>()?;
        let limit = config.logic_depth_limit;
        pm.register_closure(
            "check-logic-depth",
            "bound combinational depth between sequential boundaries",
            Box::new(move |module| CheckLogicDepth::new(limit).run(module)),
        )?;
        pm.register_function_pass::<CollectCompileStats>()?;

        // Comb blocks reference ops by identity, so `fuse-comb` runs after
        // the final cleanup round; everything downstream of it only reads
        // the IR.
        let mut pipeline: Vec<&str> = vec![
            "inline",
            "canonicalize",
            "cse",
            "sccp",
            "dead-value-removal",
            "symbol-dce",
            "lower-scf-static",
            "eliminate-wires",
            "eliminate-dead-state",
            "comb-canonicalize",
            "slp-pack-wires",
            "check-instances",
            "check-comb-cycles",
            "pack-i1-regs",
            "canonicalize",
            "cse",
            "dead-value-removal",
            "symbol-dce",
        ];
        if config.enable_fuse_comb {
            pipeline.push("fuse-comb");
        }
        pipeline.extend([
            "check-flat-types",
            "check-no-dynamic",
            "check-logic-depth",
            "collect-compile-stats",
        ]);
        pm.add_alias(
            "all",
            pipeline.into_iter().map(String::from).collect(),
        )?;
        Ok(pm)
    }
}
