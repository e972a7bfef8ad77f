//! Driver-level tests: manifest merging and stats aggregation.

use pyc_compile::driver::update_manifest;
use pyc_compile::stats::CompileStatsSummary;
use pyc_ir::attribute::reserved;
use pyc_ir::{Function, Module, Port};

#[test]
fn manifest_preserves_untouched_keys() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("manifest.json"),
        r#"{"top": "old", "cpp_modules": ["old.hpp"], "extra": 42}"#,
    )
    .unwrap();

    update_manifest(
        dir.path(),
        "counter",
        Some(vec!["counter.v".to_string()]),
        None,
    )
    .unwrap();

    let text = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(manifest["top"], "counter");
    assert_eq!(manifest["verilog_modules"][0], "counter.v");
    // A Verilog invocation must not clobber the cpp list or unknown keys.
    assert_eq!(manifest["cpp_modules"][0], "old.hpp");
    assert_eq!(manifest["extra"], 42);
    assert!(text.ends_with('\n'));
}

#[test]
fn manifest_created_with_empty_lists() {
    let dir = tempfile::tempdir().unwrap();
    update_manifest(dir.path(), "top", None, Some(vec!["top.hpp".to_string()])).unwrap();
    let text = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(manifest["top"], "top");
    assert_eq!(manifest["verilog_modules"], serde_json::json!([]));
    assert_eq!(manifest["cpp_modules"][0], "top.hpp");
}

fn func_with_stats(name: &str, regs: i64, bits: i64, max: i64, wns: i64, tns: i64) -> Function {
    let mut func = Function::new(name, Vec::<Port>::new());
    func.attributes.insert_int(reserved::REG_COUNT, regs);
    func.attributes.insert_int(reserved::REG_BITS, bits);
    func.attributes.insert_int(reserved::MEM_COUNT, 0);
    func.attributes.insert_int(reserved::MEM_BITS, 0);
    func.attributes.insert_int(reserved::DEPTH_MAX, max);
    func.attributes.insert_int(reserved::DEPTH_WNS, wns);
    func.attributes.insert_int(reserved::DEPTH_TNS, tns);
    func
}

#[test]
fn stats_aggregate_across_functions() {
    let mut module = Module::new();
    module.push_function(func_with_stats("a", 2, 16, 5, 27, 0));
    module.push_function(func_with_stats("b", 3, 9, 12, 20, 0));
    let stats = CompileStatsSummary::collect(&module, 32, true);
    assert_eq!(stats.reg_count, 5);
    assert_eq!(stats.reg_bits, 25);
    assert_eq!(stats.max_logic_depth, 12);
    // Module WNS is the worst (minimum) of the per-function values.
    assert_eq!(stats.wns, 20);
    assert_eq!(stats.tns, 0);
    assert!(stats.fuse_comb_enabled);
    assert!(stats.summary_line().starts_with("stats: regs=5 (25 bits)"));
}

#[test]
fn stats_addition_saturates() {
    let mut module = Module::new();
    module.push_function(func_with_stats("a", i64::MAX, i64::MAX, 1, 31, 0));
    module.push_function(func_with_stats("b", 1, 1, 1, 31, 0));
    let stats = CompileStatsSummary::collect(&module, 32, false);
    assert_eq!(stats.reg_count, i64::MAX);
    assert_eq!(stats.reg_bits, i64::MAX);
}

#[test]
fn empty_module_reports_limit_as_wns() {
    let module = Module::new();
    let stats = CompileStatsSummary::collect(&module, 32, true);
    assert_eq!(stats.wns, 32);
    assert_eq!(stats.max_logic_depth, 0);
}

#[test]
fn stats_json_shape() {
    let module = Module::new();
    let stats = CompileStatsSummary::collect(&module, 32, true);
    let json: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
    for key in [
        "reg_count",
        "reg_bits",
        "mem_count",
        "mem_bits",
        "logic_depth_limit",
        "max_logic_depth",
        "wns",
        "tns",
        "fuse_comb_enabled",
    ] {
        assert!(json.get(key).is_some(), "missing key {key}");
    }
}
