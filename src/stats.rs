//! Module-wide compile statistics.

use pyc_ir::attribute::reserved;
use pyc_ir::Module;
use pyc_utils::sat_add;
use serde::Serialize;

/// The aggregated stats record written to `compile_stats.json` and printed
/// as the one-line summary. All integer fields aggregate with saturating
/// 64-bit addition.
#[derive(Serialize, Clone, Debug)]
pub struct CompileStatsSummary {
    pub reg_count: i64,
    pub reg_bits: i64,
    pub mem_count: i64,
    pub mem_bits: i64,
    pub logic_depth_limit: i64,
    pub max_logic_depth: i64,
    pub wns: i64,
    pub tns: i64,
    pub fuse_comb_enabled: bool,
}

impl CompileStatsSummary {
    /// Aggregate the per-function attributes recorded by
    /// `collect-compile-stats` and `check-logic-depth`.
    pub fn collect(module: &Module, depth_limit: i64, fuse_comb_enabled: bool) -> Self {
        let mut s = CompileStatsSummary {
            reg_count: 0,
            reg_bits: 0,
            mem_count: 0,
            mem_bits: 0,
            logic_depth_limit: depth_limit,
            max_logic_depth: 0,
            wns: depth_limit,
            tns: 0,
            fuse_comb_enabled,
        };
        let mut saw_wns = false;
        for func in &module.functions {
            let get = |key: &str| func.attributes.get_int(key).unwrap_or(0);
            s.reg_count = sat_add(s.reg_count, get(reserved::REG_COUNT));
            s.reg_bits = sat_add(s.reg_bits, get(reserved::REG_BITS));
            s.mem_count = sat_add(s.mem_count, get(reserved::MEM_COUNT));
            s.mem_bits = sat_add(s.mem_bits, get(reserved::MEM_BITS));
            s.max_logic_depth = s.max_logic_depth.max(get(reserved::DEPTH_MAX));
            let func_wns = func
                .attributes
                .get_int(reserved::DEPTH_WNS)
                .unwrap_or(depth_limit);
            if !saw_wns {
                s.wns = func_wns;
                saw_wns = true;
            } else {
                s.wns = s.wns.min(func_wns);
            }
            s.tns = sat_add(s.tns, get(reserved::DEPTH_TNS));
        }
        s
    }

    /// The one-line summary printed on stderr after a successful run.
    pub fn summary_line(&self) -> String {
        format!(
            "stats: regs={} ({} bits), mems={} ({} bits), max_depth={}/{}, WNS={}, TNS={}, fuse_comb={}",
            self.reg_count,
            self.reg_bits,
            self.mem_count,
            self.mem_bits,
            self.max_logic_depth,
            self.logic_depth_limit,
            self.wns,
            self.tns,
            if self.fuse_comb_enabled { "on" } else { "off" }
        )
    }

    pub fn to_json(&self) -> String {
        let mut text = serde_json::to_string_pretty(self).expect("stats serialize");
        text.push('\n');
        text
    }
}
