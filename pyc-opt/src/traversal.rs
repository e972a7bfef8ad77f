//! Traits implemented by passes and the helpers they share.

use std::collections::HashMap;

use pyc_ir::{Function, Module, Signature};
use pyc_utils::{Id, PycResult};

/// Trait that describes named things. Every pass implements this; the pass
/// manager uses it for registration and `--list-passes`.
pub trait Named {
    /// The name of the pass, as used on the command line.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
}

/// A transform over a whole module.
pub trait Pass: Named {
    fn run(&mut self, module: &mut Module) -> PycResult<()>;
}

/// Signatures of every function in the module, snapshotted so a function
/// pass can resolve instance callees while mutating its own function.
pub struct SigContext {
    sigs: HashMap<Id, Signature>,
}

impl SigContext {
    pub fn of(module: &Module) -> Self {
        SigContext {
            sigs: module
                .functions
                .iter()
                .map(|f| (f.name, Signature::of(f)))
                .collect(),
        }
    }

    pub fn get(&self, name: Id) -> Option<&Signature> {
        self.sigs.get(&name)
    }
}

/// A transform applied to each function in program order.
pub trait FunctionPass: Named {
    fn run_on_function(&mut self, func: &mut Function, sigs: &SigContext) -> PycResult<()>;
}

/// Apply a function pass to every function, in program order.
pub fn run_function_pass<P: FunctionPass>(pass: &mut P, module: &mut Module) -> PycResult<()> {
    let sigs = SigContext::of(module);
    for func in &mut module.functions {
        log::debug!("{} on `{}'", P::name(), func.name);
        pass.run_on_function(func, &sigs)?;
    }
    Ok(())
}
