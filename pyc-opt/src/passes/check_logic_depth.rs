//! Combinational logic-depth verification.

use pyc_ir::attribute::reserved;
use pyc_ir::Module;
use pyc_utils::{Error, PycResult};

use crate::analysis::{instance_comb_io, logic_depths, timing_endpoints};
use crate::traversal::{Named, Pass};

/// Computes the longest register-to-register (or port-to-register)
/// combinational path per function and rejects modules whose depth exceeds
/// the limit. On success the per-function `pyc.logic_depth.*` attributes
/// record `max`, `wns = limit - max`, and `tns = sum over endpoints of
/// max(0, depth - limit)`.
pub struct CheckLogicDepth {
    limit: i64,
}

impl CheckLogicDepth {
    pub fn new(limit: u64) -> Self {
        CheckLogicDepth {
            limit: limit as i64,
        }
    }
}

impl Default for CheckLogicDepth {
    fn default() -> Self {
        CheckLogicDepth::new(32)
    }
}

impl Named for CheckLogicDepth {
    fn name() -> &'static str {
        "check-logic-depth"
    }

    fn description() -> &'static str {
        "bound combinational depth between sequential boundaries"
    }
}

impl Pass for CheckLogicDepth {
    fn run(&mut self, module: &mut Module) -> PycResult<()> {
        let comb_io = instance_comb_io(module)?;
        for func in &mut module.functions {
            let depths = logic_depths(func, &comb_io)?;
            let mut max_depth = 0i64;
            let mut tns = 0i64;
            // Endpoints are visited in discovery order; the first endpoint
            // reaching the maximum is the one reported.
            let mut worst_endpoint: Option<String> = None;
            for (endpoint, value) in timing_endpoints(func) {
                let depth = depths.get(&value).copied().unwrap_or(0);
                if depth > max_depth {
                    max_depth = depth;
                    worst_endpoint = Some(endpoint);
                }
                tns = tns.saturating_add((depth - self.limit).max(0));
            }
            let wns = self.limit - max_depth;

            func.attributes.insert_int(reserved::DEPTH_MAX, max_depth);
            func.attributes.insert_int(reserved::DEPTH_WNS, wns);
            func.attributes.insert_int(reserved::DEPTH_TNS, tns);

            if max_depth > self.limit {
                return Err(Error::logic_depth_exceeded(format!(
                    "`{}' has combinational depth {max_depth}, limit is {} \
                     (WNS={wns}, TNS={tns}, worst endpoint `{}')",
                    func.name,
                    self.limit,
                    worst_endpoint.unwrap_or_default()
                )));
            }
        }
        Ok(())
    }
}
