//! Emitter tests: determinism, structure, and FuseComb on/off parity.

use pyc_backend::{
    bundle_primitives, cpp_function_to_string, verilog_function_to_string,
};
use pyc_frontend::parse_module;
use pyc_ir::Module;
use pyc_opt::{PassManager, PipelineConfig};

fn compile(src: &str, fuse: bool) -> Module {
    let mut module = parse_module(src).expect("test input parses");
    let pm = PassManager::default_passes(PipelineConfig {
        logic_depth_limit: 32,
        enable_fuse_comb: fuse,
    })
    .unwrap();
    pm.execute_plan(&mut module, &[], &[], false).unwrap();
    module
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

const PIPELINED: &str = r#"
    module attributes {pyc.top = @dp} {
      func @dp(%clk: w1, %rst: w1, %a: w8, %b: w8) -> (o: w8, flag: w1) {
        %en = const 1 : w1
        %t0 = xor %a, %b : w8
        %t1 = add %t0, %b : w8
        %t2 = xor %t1, %a : w8
        %q = reg %t2 clk=%clk rst=%rst en=%en init=0 : w8
        %z = const 0 : w8
        %f = eq %q, %z : w1
        output o = %q
        output flag = %f
      }
    }
"#;

#[test]
fn verilog_emission_is_deterministic() {
    let module = compile(PIPELINED, true);
    let func = &module.functions[0];
    let first = verilog_function_to_string(&module, func).unwrap();
    let second = verilog_function_to_string(&module, func).unwrap();
    assert_eq!(first, second);
}

#[test]
fn cpp_emission_is_deterministic() {
    let module = compile(PIPELINED, true);
    let func = &module.functions[0];
    let first = cpp_function_to_string(&module, func).unwrap();
    let second = cpp_function_to_string(&module, func).unwrap();
    assert_eq!(first, second);
}

#[test]
fn verilog_ports_are_inputs_first_in_source_order() {
    let module = compile(PIPELINED, true);
    let text = verilog_function_to_string(&module, &module.functions[0]).unwrap();
    let clk = text.find("input wire clk").unwrap();
    let rst = text.find("input wire rst").unwrap();
    let a = text.find("input wire [7:0] a").unwrap();
    let o = text.find("output wire [7:0] o").unwrap();
    let flag = text.find("output wire flag").unwrap();
    assert!(clk < rst && rst < a && a < o && o < flag);
}

#[test]
fn verilog_register_instantiates_the_primitive() {
    let module = compile(COUNTER, true);
    let text = verilog_function_to_string(&module, &module.functions[0]).unwrap();
    assert!(text.contains("pyc_reg #(.WIDTH(8), .INIT(8'd0))"), "{text}");
    assert!(text.contains(".clk(clk)"), "{text}");
    assert!(text.contains("assign count = q;"), "{text}");
}

#[test]
fn fused_blocks_emit_as_always_comb() {
    let module = compile(PIPELINED, true);
    let text = verilog_function_to_string(&module, &module.functions[0]).unwrap();
    assert!(text.contains("always_comb begin"), "{text}");
    // Fused intermediates are `logic`, free-standing ops stay `assign`.
    assert!(text.contains("logic [7:0] t0;"), "{text}");

    let module_off = compile(PIPELINED, false);
    let text_off =
        verilog_function_to_string(&module_off, &module_off.functions[0]).unwrap();
    assert!(!text_off.contains("always_comb"), "{text_off}");
    assert!(text_off.contains("assign t0 ="), "{text_off}");
}

#[test]
fn cpp_struct_has_two_phase_tick() {
    let module = compile(COUNTER, true);
    let text = cpp_function_to_string(&module, &module.functions[0]).unwrap();
    assert!(text.contains("struct counter {"), "{text}");
    assert!(text.contains("pyc::cpp::pyc_reg<8> q_inst;"), "{text}");
    assert!(text.contains("void tick_compute()"), "{text}");
    assert!(text.contains("void tick_commit()"), "{text}");
    let compute = text.find("tick_compute();").unwrap();
    let commit = text.find("tick_commit();").unwrap();
    assert!(
        compute < commit,
        "tick must compute every primitive before committing any"
    );
    assert!(text.contains("eval_comb_pass();"), "{text}");
}

#[test]
fn cpp_outputs_assigned_with_and_without_fusion() {
    for fuse in [true, false] {
        let module = compile(PIPELINED, fuse);
        let text = cpp_function_to_string(&module, &module.functions[0]).unwrap();
        assert!(text.contains("o = q;"), "fuse={fuse}: {text}");
        assert!(text.contains("flag = f;"), "fuse={fuse}: {text}");
    }
}

#[test]
fn cpp_block_numbering_includes_constants_block() {
    let module = compile(PIPELINED, true);
    let func = &module.functions[0];
    let text = cpp_function_to_string(&module, func).unwrap();
    let blocks = func.comb_blocks.len();
    // The constants block is numbered after the fused blocks and runs
    // first in the pass.
    assert!(text.contains(&format!("inline void eval_comb_{blocks}()")));
    let pass_body = text.split("eval_comb_pass() {").nth(1).unwrap();
    let first_call = pass_body
        .lines()
        .find(|l| l.trim().starts_with("eval_comb_"))
        .unwrap();
    assert_eq!(first_call.trim(), format!("eval_comb_{blocks}();"));
}

#[test]
fn instances_wire_by_port_name() {
    let src = r#"
        module attributes {pyc.top = @top} {
          func @stage(%clk: w1, %rst: w1, %d: w8) -> (q: w8) {
            %en = const 1 : w1
            %r = reg %d clk=%clk rst=%rst en=%en init=0 : w8
            output q = %r
          }
          func @top(%clk: w1, %rst: w1, %d: w8) -> (o: w8) {
            %q0 = instance @stage(%clk, %rst, %d) : w8
            %q1 = instance @stage(%clk, %rst, %q0) : w8
            output o = %q1
          }
        }
    "#;
    let module = compile(src, true);
    let top = module.get_function("top".into()).unwrap();
    let text = verilog_function_to_string(&module, top).unwrap();
    assert!(text.contains(".d(d)"), "{text}");
    assert!(text.contains(".d(q0)"), "{text}");
    assert!(text.contains(".q(q0)"), "{text}");

    let cpp = cpp_function_to_string(&module, top).unwrap();
    assert!(cpp.contains("#include \"stage.hpp\""), "{cpp}");
    assert!(cpp.contains(".tick_compute();"), "{cpp}");
    assert!(cpp.contains(".eval();"), "{cpp}");
}

#[test]
fn fifo_emits_library_primitive_in_both_backends() {
    let src = r#"
        module attributes {pyc.top = @queue} {
          func @queue(%clk: w1, %rst: w1, %pv: w1, %pd: w8, %pr: w1)
              -> (data: w8, valid: w1, ready: w1) {
            %d, %v, %r = fifo clk=%clk rst=%rst push_valid=%pv push_data=%pd pop_ready=%pr depth=4 : w8
            output data = %d
            output valid = %v
            output ready = %r
          }
        }
    "#;
    let module = compile(src, true);
    let func = &module.functions[0];
    let text = verilog_function_to_string(&module, func).unwrap();
    assert!(text.contains("pyc_fifo #(.WIDTH(8), .DEPTH(4))"), "{text}");
    assert!(text.contains(".push_data(pd)"), "{text}");
    assert!(text.contains(".pop_ready(pr)"), "{text}");

    let cpp = cpp_function_to_string(&module, func).unwrap();
    assert!(cpp.contains("pyc::cpp::pyc_fifo<8>"), "{cpp}");
    // All three results are distinct storage cells.
    assert!(cpp.contains("data = "), "{cpp}");
    assert!(cpp.contains("valid = "), "{cpp}");
    assert!(cpp.contains("ready = "), "{cpp}");
}

#[test]
fn primitive_bundle_gets_fpga_macro() {
    let sources = vec![("pyc_reg.v".to_string(), "module pyc_reg; endmodule\n".to_string())];
    let plain = bundle_primitives(&sources, false);
    let fpga = bundle_primitives(&sources, true);
    assert!(!plain.contains("PYC_TARGET_FPGA"));
    assert!(fpga.starts_with("// pyCircuit Verilog primitives (concatenated)\n\n`define PYC_TARGET_FPGA 1\n"));
    assert!(fpga.contains("// --- pyc_reg.v"));
}
