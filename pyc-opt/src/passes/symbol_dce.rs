//! Removal of functions unreachable from the top symbol.

use std::collections::HashSet;

use pyc_ir::attribute::reserved;
use pyc_ir::{Module, OpKind};
use pyc_utils::{Id, PycResult};

use crate::traversal::{Named, Pass};

/// Deletes functions that the top symbol does not transitively instantiate.
#[derive(Default)]
pub struct SymbolDce;

impl Named for SymbolDce {
    fn name() -> &'static str {
        "symbol-dce"
    }

    fn description() -> &'static str {
        "remove functions unreachable from the top symbol"
    }
}

impl Pass for SymbolDce {
    fn run(&mut self, module: &mut Module) -> PycResult<()> {
        let Some(top) = module.top_symbol() else {
            return Ok(());
        };
        let mut live: HashSet<Id> = HashSet::new();
        let mut stack = vec![top];
        while let Some(name) = stack.pop() {
            if !live.insert(name) {
                continue;
            }
            let Some(func) = module.get_function(name) else {
                // An unresolved callee is reported by the verifier passes;
                // here it simply contributes no reachability.
                continue;
            };
            for (_, op) in func.iter_ops() {
                if matches!(op.kind, OpKind::Instance) {
                    if let Some(callee) = op.attributes.get_sym(reserved::CALLEE) {
                        stack.push(callee);
                    }
                }
            }
        }
        let before = module.functions.len();
        module.functions.retain(|f| live.contains(&f.name));
        if module.functions.len() != before {
            log::info!(
                "symbol-dce removed {} function(s)",
                before - module.functions.len()
            );
        }
        Ok(())
    }
}
