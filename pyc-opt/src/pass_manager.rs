//! Define the PassManager structure that is used to construct and run
//! compiler passes.

use std::collections::{HashMap, HashSet};

use pyc_ir::{Module, Printer};
use pyc_utils::{Error, PycResult};

use crate::traversal::{run_function_pass, FunctionPass, Named, Pass};

/// Top-level type for all registered passes.
pub type PassClosure = Box<dyn Fn(&mut Module) -> PycResult<()>>;

/// Structure that tracks all registered passes for the compiler.
#[derive(Default)]
pub struct PassManager {
    /// All registered passes.
    passes: HashMap<String, PassClosure>,
    /// Tracks aliases for groups of passes that run together.
    aliases: HashMap<String, Vec<String>>,
    /// Track the help information for passes.
    help: HashMap<String, String>,
}

impl PassManager {
    /// Register a new module pass and return an error if another pass with
    /// the same name has already been registered.
    pub fn register_pass<P>(&mut self) -> PycResult<()>
    where
        P: Pass + Default,
    {
        self.register_closure(P::name(), P::description(), Box::new(|module| {
            P::default().run(module)
        }))
    }

    /// Register a pass that runs function by function.
    pub fn register_function_pass<P>(&mut self) -> PycResult<()>
    where
        P: FunctionPass + Default,
    {
        self.register_closure(P::name(), P::description(), Box::new(|module| {
            run_function_pass(&mut P::default(), module)
        }))
    }

    /// Register a pass constructed by the given closure. Used by passes that
    /// take configuration, e.g. the logic-depth limit.
    pub fn register_closure(
        &mut self,
        name: &str,
        description: &str,
        pass: PassClosure,
    ) -> PycResult<()> {
        if self.passes.contains_key(name) {
            return Err(Error::misc(format!(
                "Pass with name '{name}' is already registered."
            )));
        }
        self.passes.insert(name.to_string(), pass);
        self.help
            .insert(name.to_string(), format!("- {name}: {description}"));
        Ok(())
    }

    /// Adds a new alias for groups of passes. An alias is a list of strings
    /// that represent valid pass names OR another alias.
    /// The passes and aliases are executed in the order of specification.
    pub fn add_alias(&mut self, name: &str, passes: Vec<String>) -> PycResult<()> {
        if self.aliases.contains_key(name) {
            return Err(Error::misc(format!(
                "Alias with name '{name}' already registered."
            )));
        }
        // Expand any aliases used in defining this alias.
        let all_passes = passes
            .into_iter()
            .flat_map(|pass| {
                if let Some(expanded) = self.aliases.get(&pass) {
                    expanded.clone()
                } else if self.passes.contains_key(&pass) {
                    vec![pass]
                } else {
                    panic!("No pass or alias named: {pass}")
                }
            })
            .collect();
        self.aliases.insert(name.to_string(), all_passes);
        Ok(())
    }

    /// Return a string representation of all available passes and aliases.
    pub fn show_names(&self) -> String {
        let mut ret = String::new();
        let mut pass_names: Vec<_> = self.passes.keys().collect();
        pass_names.sort();
        ret.push_str("Passes:\n");
        for pass in pass_names {
            ret.push_str(&self.help[pass]);
            ret.push('\n');
        }
        let mut alias_names: Vec<_> = self.aliases.keys().collect();
        alias_names.sort();
        ret.push_str("\nAliases:\n");
        for alias in alias_names {
            ret.push_str(&format!(
                "- {alias}: {}\n",
                self.aliases[alias].join(", ")
            ));
        }
        ret
    }

    /// Expand a plan (pass and alias names) into a flat list of pass names.
    fn create_plan(&self, incls: &[String]) -> PycResult<Vec<String>> {
        let mut plan = Vec::new();
        for name in incls {
            if let Some(passes) = self.aliases.get(name) {
                plan.extend(passes.iter().cloned());
            } else if self.passes.contains_key(name) {
                plan.push(name.clone());
            } else {
                return Err(Error::misc(format!(
                    "Unknown pass or alias: '{name}'"
                )));
            }
        }
        Ok(plan)
    }

    /// Run the passes in `incls` (default: the `all` alias) over the module,
    /// skipping any pass named in `excls`. When `dump_ir` is set, the IR is
    /// printed to stderr after every pass.
    pub fn execute_plan(
        &self,
        module: &mut Module,
        incls: &[String],
        excls: &[String],
        dump_ir: bool,
    ) -> PycResult<()> {
        let plan = if incls.is_empty() {
            self.create_plan(&["all".to_string()])?
        } else {
            self.create_plan(incls)?
        };
        let excl_set: HashSet<&String> = excls.iter().collect();
        // Validate the disables so a typo is an error rather than a no-op.
        for excl in excls {
            if !self.passes.contains_key(excl) && !self.aliases.contains_key(excl) {
                return Err(Error::misc(format!(
                    "Unknown pass or alias: '{excl}'"
                )));
            }
        }

        for name in &plan {
            if excl_set.contains(name) {
                log::info!("skipping disabled pass `{name}'");
                continue;
            }
            log::info!("running pass `{name}'");
            (self.passes[name])(module)?;
            if dump_ir {
                eprintln!("; after {name}");
                eprintln!("{}", Printer::module_to_string(module));
            }
        }
        Ok(())
    }
}
