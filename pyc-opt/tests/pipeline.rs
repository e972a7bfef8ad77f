//! End-to-end pass pipeline tests over small hand-written modules.

use pyc_frontend::parse_module;
use pyc_ir::attribute::reserved;
use pyc_ir::{Module, OpKind, Printer};
use pyc_opt::{PassManager, PipelineConfig};

fn run_pipeline(src: &str, config: PipelineConfig) -> Result<Module, pyc_utils::Error> {
    let mut module = parse_module(src).expect("test input parses");
    let pm = PassManager::default_passes(config)?;
    pm.execute_plan(&mut module, &[], &[], false)?;
    Ok(module)
}

const COUNTER: &str = r#"
    module attributes {pyc.top = @counter} {
      func @counter(%clk: w1, %rst: w1) -> (count: w8) {
        %one = const 1 : w8
        %en = const 1 : w1
        %next = add %q, %one : w8
        %q = reg %next clk=%clk rst=%rst en=%en init=0 : w8
        output count = %q
      }
    }
"#;

#[test]
fn counter_stats() {
    let module = run_pipeline(COUNTER, PipelineConfig::default()).unwrap();
    let func = &module.functions[0];
    assert_eq!(func.attributes.get_int(reserved::REG_COUNT), Some(1));
    assert_eq!(func.attributes.get_int(reserved::REG_BITS), Some(8));
    assert_eq!(func.attributes.get_int(reserved::DEPTH_MAX), Some(1));
    assert_eq!(func.attributes.get_int(reserved::DEPTH_WNS), Some(31));
    assert_eq!(func.attributes.get_int(reserved::DEPTH_TNS), Some(0));
}

#[test]
fn optimization_pipeline_is_idempotent() {
    let mut module = parse_module(COUNTER).unwrap();
    let pm = PassManager::default_passes(PipelineConfig::default()).unwrap();
    pm.execute_plan(&mut module, &[], &[], false).unwrap();
    let after_first = Printer::module_to_string(&module);

    let opts: Vec<String> = ["canonicalize", "cse", "sccp", "dead-value-removal"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    pm.execute_plan(&mut module, &opts, &[], false).unwrap();
    assert_eq!(Printer::module_to_string(&module), after_first);
}

#[test]
fn comb_cycle_is_rejected_naming_every_op() {
    let src = r#"
        module {
          func @loopy(%clk: w1) -> (o: w1) {
            %a = not %b : w1
            %b = not %a : w1
            output o = %a
          }
        }
    "#;
    let err = run_pipeline(src, PipelineConfig::default()).unwrap_err();
    assert!(err.is_comb_cycle(), "expected a comb-cycle diagnostic: {err}");
    let msg = err.to_string();
    assert!(msg.contains("`a'"), "cycle must name `a': {msg}");
    assert!(msg.contains("`b'"), "cycle must name `b': {msg}");
}

#[test]
fn deep_xor_chain_is_rejected_with_slack() {
    let mut body = String::new();
    body.push_str("%en = const 1 : w1\n");
    body.push_str("%t0 = xor %q1, %b : w8\n");
    for i in 1..40 {
        body.push_str(&format!("%t{i} = xor %t{}, %b : w8\n", i - 1));
    }
    let src = format!(
        r#"
        module {{
          func @deep(%clk: w1, %rst: w1, %a: w8, %b: w8) -> (o: w8) {{
            {body}
            %q1 = reg %a clk=%clk rst=%rst en=%en init=0 : w8
            %q2 = reg %t39 clk=%clk rst=%rst en=%en init=0 : w8
            output o = %q2
          }}
        }}
    "#
    );
    let err = run_pipeline(
        &src,
        PipelineConfig {
            logic_depth_limit: 32,
            enable_fuse_comb: true,
        },
    )
    .unwrap_err();
    assert!(err.is_logic_depth(), "expected a depth diagnostic: {err}");
    let msg = err.to_string();
    assert!(msg.contains("depth 40"), "must report max depth 40: {msg}");
    assert!(msg.contains("WNS=-8"), "must report WNS=-8: {msg}");
    assert!(msg.contains("TNS=8"), "must report TNS>=8: {msg}");
}

#[test]
fn if_lowers_to_mux() {
    let src = r#"
        module {
          func @sel(%c: w1, %a: w8, %b: w8) -> (o: w8) {
            %r = if %c : w8 {
              %t = add %a, %b : w8
              yield %t
            } else {
              yield %b
            }
            output o = %r
          }
        }
    "#;
    let module = run_pipeline(src, PipelineConfig::default()).unwrap();
    let func = &module.functions[0];
    assert!(!func
        .iter_ops()
        .any(|(_, op)| op.kind.is_structured_control()));
    assert!(func
        .iter_ops()
        .any(|(_, op)| matches!(op.kind, OpKind::Mux)));
}

#[test]
fn static_for_unrolls_completely() {
    // sum = a + a + a + a, built by a trip-count-4 loop.
    let src = r#"
        module {
          func @unroll(%a: w8) -> (o: w8) {
            %lb = const 0 : w8
            %ub = const 4 : w8
            %st = const 1 : w8
            %init = const 0 : w8
            %sum = for %i: w8 = %lb to %ub step %st iter(%acc = %init) : w8 {
              %next = add %acc, %a : w8
              yield %next
            }
            output o = %sum
          }
        }
    "#;
    let module = run_pipeline(src, PipelineConfig::default()).unwrap();
    let func = &module.functions[0];
    assert!(!func
        .iter_ops()
        .any(|(_, op)| op.kind.is_structured_control()));
    let adds = func
        .iter_ops()
        .filter(|(_, op)| matches!(op.kind, OpKind::Add))
        .count();
    assert!(adds >= 1 && adds <= 4, "unrolled adds, got {adds}");
}

#[test]
fn dynamic_loop_bound_is_rejected() {
    let src = r#"
        module {
          func @dynamic(%a: w8, %n: w8) -> (o: w8) {
            %lb = const 0 : w8
            %st = const 1 : w8
            %init = const 0 : w8
            %sum = for %i: w8 = %lb to %n step %st iter(%acc = %init) : w8 {
              %next = add %acc, %a : w8
              yield %next
            }
            output o = %sum
          }
        }
    "#;
    let err = run_pipeline(src, PipelineConfig::default()).unwrap_err();
    assert!(
        err.is_non_static_control(),
        "expected NonStaticControl: {err}"
    );
}

#[test]
fn unobserved_register_is_removed() {
    let src = r#"
        module {
          func @dead(%clk: w1, %rst: w1, %a: w8) -> (o: w8) {
            %en = const 1 : w1
            %live = reg %a clk=%clk rst=%rst en=%en init=0 : w8
            %unused = reg %a clk=%clk rst=%rst en=%en init=0 : w8
            output o = %live
          }
        }
    "#;
    let module = run_pipeline(src, PipelineConfig::default()).unwrap();
    let func = &module.functions[0];
    let regs = func
        .iter_ops()
        .filter(|(_, op)| matches!(op.kind, OpKind::Reg { .. }))
        .count();
    assert_eq!(regs, 1);
    assert_eq!(func.attributes.get_int(reserved::REG_COUNT), Some(1));
}

#[test]
fn single_bit_registers_pack() {
    let src = r#"
        module {
          func @bits(%clk: w1, %rst: w1, %a: w1, %b: w1, %c: w1) -> (x: w1, y: w1, z: w1) {
            %en = const 1 : w1
            %qa = reg %a clk=%clk rst=%rst en=%en init=1 : w1
            %qb = reg %b clk=%clk rst=%rst en=%en init=0 : w1
            %qc = reg %c clk=%clk rst=%rst en=%en init=1 : w1
            output x = %qa
            output y = %qb
            output z = %qc
          }
        }
    "#;
    let module = run_pipeline(src, PipelineConfig::default()).unwrap();
    let func = &module.functions[0];
    let regs: Vec<_> = func
        .iter_ops()
        .filter(|(_, op)| matches!(op.kind, OpKind::Reg { .. }))
        .collect();
    assert_eq!(regs.len(), 1, "three w1 registers pack into one");
    let (_, packed) = &regs[0];
    assert_eq!(packed.widths[0], 3);
    match packed.kind {
        OpKind::Reg { init } => assert_eq!(init, 0b101),
        _ => unreachable!(),
    }
    // Each original name is still an observable value.
    assert_eq!(func.outputs.len(), 3);
}

#[test]
fn constants_fold_through_mux_chains() {
    let src = r#"
        module {
          func @fold(%a: w8) -> (o: w8) {
            %t = const 1 : w1
            %x = const 3 : w8
            %y = const 4 : w8
            %m = mux %t, %x, %y : w8
            %s = add %m, %x : w8
            output o = %s
          }
        }
    "#;
    let module = run_pipeline(src, PipelineConfig::default()).unwrap();
    let func = &module.functions[0];
    // 3 + 3 = 6; everything folds to a single constant feeding the output.
    let (_, value) = func.outputs[0];
    match func.op(value.op).kind {
        OpKind::Const(b) => assert_eq!(b.value(), 6),
        ref k => panic!("expected a folded constant, found {}", k.mnemonic()),
    }
}

#[test]
fn comb_instances_inline() {
    let src = r#"
        module attributes {pyc.top = @top} {
          func @adder(%x: w8, %y: w8) -> (s: w8) {
            %s0 = add %x, %y : w8
            output s = %s0
          }
          func @top(%a: w8, %b: w8) -> (o: w8) {
            %r = instance @adder(%a, %b) : w8
            output o = %r
          }
        }
    "#;
    let module = run_pipeline(src, PipelineConfig::default()).unwrap();
    let top = module.get_function("top".into()).unwrap();
    assert!(!top
        .iter_ops()
        .any(|(_, op)| matches!(op.kind, OpKind::Instance)));
    // The callee is unreachable afterwards and symbol-dce removes it.
    assert!(module.get_function("adder".into()).is_none());
}

#[test]
fn fuse_comb_groups_chains() {
    let src = r#"
        module {
          func @chain(%clk: w1, %rst: w1, %a: w8, %b: w8) -> (o: w8) {
            %en = const 1 : w1
            %t0 = xor %a, %b : w8
            %t1 = add %t0, %b : w8
            %t2 = xor %t1, %a : w8
            %q = reg %t2 clk=%clk rst=%rst en=%en init=0 : w8
            output o = %q
          }
        }
    "#;
    let module = run_pipeline(src, PipelineConfig::default()).unwrap();
    let func = &module.functions[0];
    assert_eq!(func.comb_blocks.len(), 1);
    let block = &func.comb_blocks[0];
    assert_eq!(block.ops.len(), 3);
    assert_eq!(block.outputs.len(), 1, "only the chain root escapes");

    let module_off = run_pipeline(
        src,
        PipelineConfig {
            logic_depth_limit: 32,
            enable_fuse_comb: false,
        },
    )
    .unwrap();
    assert!(module_off.functions[0].comb_blocks.is_empty());
}

#[test]
fn unknown_pass_name_is_an_error() {
    let mut module = parse_module(COUNTER).unwrap();
    let pm = PassManager::default_passes(PipelineConfig::default()).unwrap();
    let err = pm
        .execute_plan(&mut module, &["no-such-pass".to_string()], &[], false)
        .unwrap_err();
    assert!(err.to_string().contains("no-such-pass"));
}
