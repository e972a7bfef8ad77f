//! A module: an ordered set of functions and module-level attributes.

use crate::attribute::reserved;
use crate::{Attributes, Function};
use pyc_utils::{Error, Id, PycResult};

/// The unit the driver compiles: functions in program order plus module
/// attributes. The `pyc.top` attribute names the synthesizable root; absent
/// that, the first function is the top.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub attributes: Attributes,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_function(&mut self, func: Function) {
        self.functions.push(func);
    }

    pub fn get_function(&self, name: Id) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_function_mut(&mut self, name: Id) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// The top symbol: `pyc.top` when present, else the first function.
    pub fn top_symbol(&self) -> Option<Id> {
        self.attributes
            .get_sym(reserved::TOP)
            .or_else(|| self.functions.first().map(|f| f.name))
    }

    pub fn set_top(&mut self, name: Id) {
        self.attributes.insert_sym(reserved::TOP, name);
    }

    /// Resolve an instance callee, or report it unresolved.
    pub fn resolve_callee(&self, callee: Id) -> PycResult<&Function> {
        self.get_function(callee)
            .ok_or_else(|| Error::instance_unresolved(callee))
    }
}
