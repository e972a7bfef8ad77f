//! Lowering of structured control flow (`if`/`for`) into mux networks.

use std::collections::HashMap;

use pyc_ir::{Bits, Function, Op, OpIdx, OpKind, Value};
use pyc_utils::{Error, PycResult};

use crate::passes::canonicalize::const_of;
use crate::traversal::{FunctionPass, Named, SigContext};

/// Replaces `if` with muxes over both arms and fully unrolls `for` loops
/// with compile-time-known bounds. Anything dynamic is a NonStaticControl
/// diagnostic: a non-constant bound, a zero step, or stateful ops inside a
/// region.
#[derive(Default)]
pub struct LowerScfStatic;

impl Named for LowerScfStatic {
    fn name() -> &'static str {
        "lower-scf-static"
    }

    fn description() -> &'static str {
        "lower static structured control flow to mux networks"
    }
}

/// Upper bound on unrolled loop iterations; beyond this the loop is treated
/// as non-static.
const MAX_TRIP_COUNT: u64 = 1 << 20;

/// Where an op list lives: the function body or a region of a structured op.
#[derive(Clone, Copy)]
enum Container {
    Body,
    Then(OpIdx),
    Else(OpIdx),
    ForBody(OpIdx),
}

fn container_ops<'f>(func: &'f Function, c: Container) -> &'f [OpIdx] {
    match c {
        Container::Body => &func.body,
        Container::Then(idx) => match &func.op(idx).kind {
            OpKind::If { then_region, .. } => &then_region.ops,
            _ => unreachable!(),
        },
        Container::Else(idx) => match &func.op(idx).kind {
            OpKind::If { else_region, .. } => &else_region.ops,
            _ => unreachable!(),
        },
        Container::ForBody(idx) => match &func.op(idx).kind {
            OpKind::For { body } => &body.ops,
            _ => unreachable!(),
        },
    }
}

fn splice(func: &mut Function, c: Container, at: OpIdx, replacement: Vec<OpIdx>) {
    let rewrite = |list: &mut Vec<OpIdx>| {
        if let Some(pos) = list.iter().position(|&i| i == at) {
            list.splice(pos..pos + 1, replacement.iter().copied());
        }
    };
    match c {
        Container::Body => rewrite(&mut func.body),
        Container::Then(idx) => {
            if let OpKind::If { then_region, .. } = &mut func.op_mut(idx).kind {
                rewrite(&mut then_region.ops);
            }
        }
        Container::Else(idx) => {
            if let OpKind::If { else_region, .. } = &mut func.op_mut(idx).kind {
                rewrite(&mut else_region.ops);
            }
        }
        Container::ForBody(idx) => {
            if let OpKind::For { body } = &mut func.op_mut(idx).kind {
                rewrite(&mut body.ops);
            }
        }
    }
}

/// All containers in the function, parents before children.
fn containers(func: &Function) -> Vec<Container> {
    let mut out = vec![Container::Body];
    let mut cursor = 0;
    while cursor < out.len() {
        let c = out[cursor];
        cursor += 1;
        for &idx in container_ops(func, c) {
            match &func.op(idx).kind {
                OpKind::If { .. } => {
                    out.push(Container::Then(idx));
                    out.push(Container::Else(idx));
                }
                OpKind::For { .. } => out.push(Container::ForBody(idx)),
                _ => {}
            }
        }
    }
    out
}

fn has_structured_children(func: &Function, idx: OpIdx) -> bool {
    let check = |ops: &[OpIdx]| {
        ops.iter()
            .any(|&i| matches!(func.op(i).kind, OpKind::If { .. } | OpKind::For { .. }))
    };
    match &func.op(idx).kind {
        OpKind::If {
            then_region,
            else_region,
        } => check(&then_region.ops) || check(&else_region.ops),
        OpKind::For { body } => check(&body.ops),
        _ => false,
    }
}

fn check_region_is_comb(func: &Function, ops: &[OpIdx]) -> PycResult<()> {
    for &idx in ops {
        let op = func.op(idx);
        let allowed = op.kind.is_pure_comb()
            || matches!(
                op.kind,
                OpKind::Yield | OpKind::IndVar | OpKind::IterArg { .. }
            );
        if !allowed {
            return Err(Error::non_static_control(format!(
                "`{}' op inside a structured region; regions must be purely combinational",
                op.kind.mnemonic()
            ))
            .with_location(format!("{}.{}", func.name, func.value_name(Value::from(idx)))));
        }
    }
    Ok(())
}

fn region_yield(func: &Function, ops: &[OpIdx]) -> PycResult<(OpIdx, Vec<Value>)> {
    let yield_idx = ops
        .iter()
        .rev()
        .find(|&&i| matches!(func.op(i).kind, OpKind::Yield))
        .copied()
        .ok_or_else(|| {
            Error::non_static_control("structured region without a `yield'")
                .with_location(func.name)
        })?;
    Ok((yield_idx, func.op(yield_idx).operands.to_vec()))
}

fn lower_if(func: &mut Function, container: Container, idx: OpIdx) -> PycResult<Vec<OpIdx>> {
    let (cond, then_ops, else_ops) = match &func.op(idx).kind {
        OpKind::If {
            then_region,
            else_region,
        } => (
            func.op(idx).operands[0],
            then_region.ops.clone(),
            else_region.ops.clone(),
        ),
        _ => unreachable!(),
    };
    check_region_is_comb(func, &then_ops)?;
    check_region_is_comb(func, &else_ops)?;
    let (then_yield, then_values) = region_yield(func, &then_ops)?;
    let (else_yield, else_values) = region_yield(func, &else_ops)?;
    let widths = func.op(idx).widths.clone();
    if then_values.len() != widths.len() || else_values.len() != widths.len() {
        return Err(Error::non_static_control(format!(
            "`if' yields {} and {} values but has {} results",
            then_values.len(),
            else_values.len(),
            widths.len()
        ))
        .with_location(func.name));
    }

    // Both arms evaluate; each result becomes mux(cond, then, else).
    let mut spliced: Vec<OpIdx> = Vec::new();
    spliced.extend(then_ops.iter().filter(|&&i| i != then_yield));
    spliced.extend(else_ops.iter().filter(|&&i| i != else_yield));
    for (result, width) in widths.iter().enumerate() {
        let mux = func.append_op(Op::new(
            OpKind::Mux,
            smallvec::smallvec![cond, then_values[result], else_values[result]],
            smallvec::smallvec![*width],
        ));
        spliced.push(mux);
        func.replace_uses(Value::new(idx, result as u8), Value::from(mux));
    }
    // The yields die with the `if` itself.
    func.op_mut(then_yield).operands.clear();
    func.op_mut(else_yield).operands.clear();
    func.erase_op(then_yield);
    func.erase_op(else_yield);
    func.op_mut(idx).operands.clear();
    splice(func, container, idx, spliced.clone());
    func.erase_op(idx);
    Ok(spliced)
}

fn const_operand(func: &Function, idx: OpIdx, slot: usize, what: &str) -> PycResult<Bits> {
    const_of(func, func.op(idx).operands[slot]).ok_or_else(|| {
        Error::non_static_control(format!("`for' {what} is not a compile-time constant"))
            .with_location(format!("{}.{}", func.name, func.value_name(Value::from(idx))))
    })
}

fn lower_for(func: &mut Function, container: Container, idx: OpIdx) -> PycResult<Vec<OpIdx>> {
    let body_ops = match &func.op(idx).kind {
        OpKind::For { body } => body.ops.clone(),
        _ => unreachable!(),
    };
    check_region_is_comb(func, &body_ops)?;
    let lb = const_operand(func, idx, 0, "lower bound")?;
    let ub = const_operand(func, idx, 1, "upper bound")?;
    let step = const_operand(func, idx, 2, "step")?;
    if step.is_zero() {
        return Err(Error::non_static_control("`for' step is zero")
            .with_location(format!("{}.{}", func.name, func.value_name(Value::from(idx)))));
    }
    let trip_count = ub.value().saturating_sub(lb.value()).div_ceil(step.value());
    if trip_count > MAX_TRIP_COUNT {
        return Err(Error::non_static_control(format!(
            "`for' trip count {trip_count} exceeds the static unrolling limit"
        ))
        .with_location(format!("{}.{}", func.name, func.value_name(Value::from(idx)))));
    }

    let (yield_idx, yield_values) = region_yield(func, &body_ops)?;
    let inits: Vec<Value> = func.op(idx).operands[3..].to_vec();
    let widths = func.op(idx).widths.clone();
    if yield_values.len() != inits.len() || inits.len() != widths.len() {
        return Err(Error::non_static_control(format!(
            "`for' carries {} iter-args but yields {} values",
            inits.len(),
            yield_values.len()
        ))
        .with_location(func.name));
    }
    let indvar_width = body_ops
        .iter()
        .find_map(|&i| match func.op(i).kind {
            OpKind::IndVar => Some(func.op(i).widths[0]),
            _ => None,
        })
        .unwrap_or(lb.width());

    let mut spliced: Vec<OpIdx> = Vec::new();
    let mut carried = inits;
    let mut iv = lb.value();
    for _ in 0..trip_count {
        // Clone the body, substituting the induction variable and the
        // carried values of this iteration.
        let mut map: HashMap<Value, Value> = HashMap::new();
        let mut clones: Vec<(OpIdx, OpIdx)> = Vec::new();
        for &body_idx in &body_ops {
            let (kind, operands, widths) = {
                let op = func.op(body_idx);
                (op.kind.clone(), op.operands.clone(), op.widths.clone())
            };
            match kind {
                OpKind::IndVar => {
                    let c = func.append_op(Op::new(
                        OpKind::Const(Bits::new(indvar_width, iv)),
                        Default::default(),
                        smallvec::smallvec![indvar_width],
                    ));
                    spliced.push(c);
                    map.insert(Value::from(body_idx), Value::from(c));
                }
                OpKind::IterArg { index } => {
                    map.insert(Value::from(body_idx), carried[index as usize]);
                }
                OpKind::Yield => {}
                _ => {
                    let num_results = widths.len();
                    let new_idx = func.append_op(Op::new(kind, operands, widths));
                    spliced.push(new_idx);
                    clones.push((body_idx, new_idx));
                    for result in 0..num_results {
                        map.insert(
                            Value::new(body_idx, result as u8),
                            Value::new(new_idx, result as u8),
                        );
                    }
                }
            }
        }
        for (_, new_idx) in &clones {
            let op = func.op_mut(*new_idx);
            for operand in &mut op.operands {
                if let Some(mapped) = map.get(operand) {
                    *operand = *mapped;
                }
            }
        }
        carried = yield_values
            .iter()
            .map(|v| map.get(v).copied().unwrap_or(*v))
            .collect();
        iv = iv.wrapping_add(step.value());
    }

    for (result, final_value) in carried.iter().enumerate() {
        func.replace_uses(Value::new(idx, result as u8), *final_value);
    }
    // Tear down the template body: drop every operand first so no template
    // op still references another while they are erased.
    func.op_mut(yield_idx).operands.clear();
    for &body_idx in &body_ops {
        func.op_mut(body_idx).operands.clear();
    }
    for &body_idx in &body_ops {
        func.erase_op(body_idx);
    }
    func.op_mut(idx).operands.clear();
    splice(func, container, idx, spliced.clone());
    func.erase_op(idx);
    Ok(spliced)
}

impl FunctionPass for LowerScfStatic {
    fn run_on_function(&mut self, func: &mut Function, _sigs: &SigContext) -> PycResult<()> {
        // Lower innermost-first so cloned regions never contain structured
        // ops themselves.
        loop {
            let mut target = None;
            'search: for container in containers(func) {
                for &idx in container_ops(func, container) {
                    if matches!(func.op(idx).kind, OpKind::If { .. } | OpKind::For { .. })
                        && !has_structured_children(func, idx)
                    {
                        target = Some((container, idx));
                        break 'search;
                    }
                }
            }
            let Some((container, idx)) = target else {
                return Ok(());
            };
            match func.op(idx).kind {
                OpKind::If { .. } => lower_if(func, container, idx)?,
                OpKind::For { .. } => lower_for(func, container, idx)?,
                _ => unreachable!(),
            };
        }
    }
}
