//! Back-end legality verifiers: flat types and no dynamic behavior.

use pyc_ir::{typecheck, Function, Module, OpKind, Value};
use pyc_utils::{Error, PycResult};

use crate::passes::canonicalize::const_of;
use crate::traversal::{FunctionPass, Named, Pass, SigContext};

/// Verifies that only flat, width-typed values remain: no structured
/// control, every width in range, and every operator obeying the width
/// table.
#[derive(Default)]
pub struct CheckFlatTypes;

impl Named for CheckFlatTypes {
    fn name() -> &'static str {
        "check-flat-types"
    }

    fn description() -> &'static str {
        "verify that only flat width-typed values reach the back-end"
    }
}

impl FunctionPass for CheckFlatTypes {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        for (idx, op) in func.iter_ops() {
            if op.kind.is_structured_control() {
                return Err(Error::non_static_control(format!(
                    "`{}' survived lowering; the back-end only accepts flat netlists",
                    op.kind.mnemonic()
                ))
                .with_location(format!(
                    "{}.{}",
                    func.name,
                    func.value_name(Value::from(idx))
                )));
            }
        }
        typecheck::check_function(func)
    }
}

/// Verifies the absence of anything dynamic: runtime-variable shift
/// amounts are the only way the op vocabulary can express non-static
/// indexing, so they are the check.
#[derive(Default)]
pub struct CheckNoDynamic;

impl Named for CheckNoDynamic {
    fn name() -> &'static str {
        "check-no-dynamic"
    }

    fn description() -> &'static str {
        "verify that no op implies runtime-variable behavior"
    }
}

impl FunctionPass for CheckNoDynamic {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        for (idx, op) in func.iter_ops() {
            let dynamic_shift = matches!(
                op.kind,
                OpKind::Shl | OpKind::Lshr | OpKind::Ashr
            ) && const_of(func, op.operands[1]).is_none();
            if dynamic_shift {
                return Err(Error::non_static_control(
                    "shift amount is not a compile-time constant",
                )
                .with_location(format!(
                    "{}.{}",
                    func.name,
                    func.value_name(Value::from(idx))
                )));
            }
        }
        Ok(())
    }
}

/// Verifies that every `instance` resolves to a function in the module and
/// that its operand and result widths match the callee's ports.
#[derive(Default)]
pub struct CheckInstances;

impl Named for CheckInstances {
    fn name() -> &'static str {
        "check-instances"
    }

    fn description() -> &'static str {
        "resolve instance callees and check port widths"
    }
}

impl Pass for CheckInstances {
    fn run(&mut self, module: &mut Module) -> PycResult<()> {
        for func in &module.functions {
            for (idx, op) in func.iter_ops() {
                if !matches!(op.kind, OpKind::Instance) {
                    continue;
                }
                let callee_name = op
                    .attributes
                    .get_sym(pyc_ir::attribute::reserved::CALLEE)
                    .ok_or_else(|| {
                        Error::malformed_structure("instance without a `callee' attribute")
                            .with_location(func.name)
                    })?;
                let callee = module.resolve_callee(callee_name).map_err(|e| {
                    e.with_location(format!(
                        "{}.{}",
                        func.name,
                        func.value_name(Value::from(idx))
                    ))
                })?;
                let inputs: Vec<_> = callee.input_ports().collect();
                let outputs: Vec<_> = callee.output_ports().collect();
                if op.operands.len() != inputs.len() || op.widths.len() != outputs.len() {
                    return Err(Error::malformed_structure(format!(
                        "instance of `{callee_name}' has {} operands and {} results; the callee has {} inputs and {} outputs",
                        op.operands.len(),
                        op.widths.len(),
                        inputs.len(),
                        outputs.len()
                    ))
                    .with_location(func.name));
                }
                for (operand, port) in op.operands.iter().zip(&inputs) {
                    if func.value_width(*operand) != port.width {
                        return Err(Error::malformed_structure(format!(
                            "instance input `{}' wants w{}, got w{}",
                            port.name,
                            port.width,
                            func.value_width(*operand)
                        ))
                        .with_location(func.name));
                    }
                }
                for (width, port) in op.widths.iter().zip(&outputs) {
                    if *width != port.width {
                        return Err(Error::malformed_structure(format!(
                            "instance output `{}' wants w{}, got w{width}",
                            port.name, port.width
                        ))
                        .with_location(func.name));
                    }
                }
            }
        }
        Ok(())
    }
}
