//! Command-line interface of the compiler.

use std::path::PathBuf;
use std::str::FromStr;

use argh::FromArgs;
use pyc_utils::{Error, OutputFile, PycResult};

#[derive(FromArgs)]
/// The pyCircuit compiler
pub struct Opts {
    /// input pyc program (`-` reads standard input)
    #[argh(positional, default = "PathBuf::from(\"-\")")]
    pub file: PathBuf,

    /// output file
    #[argh(option, short = 'o', default = "OutputFile::default()")]
    pub output: OutputFile,

    /// output directory (split per module; writes manifest.json)
    #[argh(option, long = "out-dir")]
    pub out_dir: Option<PathBuf>,

    /// emission target: verilog|cpp-sim
    #[argh(option, default = "EmitKind::default()")]
    pub emit: EmitKind,

    /// hardware target: default|fpga (only affects Verilog primitives)
    #[argh(option, default = "Target::default()")]
    pub target: Target,

    /// bundle the runtime Verilog primitives next to outputs (default: true)
    #[argh(option, long = "include-primitives", default = "true")]
    pub include_primitives: bool,

    /// simulation mode: default|cpp-only
    #[argh(option, long = "sim-mode", default = "SimMode::default()")]
    pub sim_mode: SimMode,

    /// preserve op-granular simulation scheduling in --sim-mode=cpp-only
    /// (disables comb fusion)
    #[argh(switch, long = "cpp-only-preserve-ops")]
    pub cpp_only_preserve_ops: bool,

    /// maximum combinational logic depth between sequential boundaries
    #[argh(option, long = "logic-depth", default = "32")]
    pub logic_depth: u64,

    /// run this pass or alias instead of the default pipeline
    #[argh(option, short = 'p')]
    pub pass: Vec<String>,

    /// disable this pass during execution
    #[argh(option, short = 'd', long = "disable-pass")]
    pub disable_pass: Vec<String>,

    /// print the IR after every pass
    #[argh(switch, long = "dump-ir")]
    pub dump_ir: bool,

    /// list all available passes
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}

/// Emission back-end selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EmitKind {
    #[default]
    Verilog,
    CppSim,
}

impl FromStr for EmitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verilog" => Ok(EmitKind::Verilog),
            "cpp-sim" => Ok(EmitKind::CppSim),
            s => Err(format!(
                "unknown --emit kind: {s} (expected: verilog|cpp-sim)"
            )),
        }
    }
}

/// Hardware target; only affects the emitted Verilog primitives.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Target {
    #[default]
    Default,
    Fpga,
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Target::Default),
            "fpga" => Ok(Target::Fpga),
            s => Err(format!("unknown --target: {s} (expected: default|fpga)")),
        }
    }
}

/// Simulation mode; `cpp-only` forbids Verilog emission.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SimMode {
    #[default]
    Default,
    CppOnly,
}

impl FromStr for SimMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(SimMode::Default),
            "cpp-only" => Ok(SimMode::CppOnly),
            s => Err(format!(
                "unknown --sim-mode: {s} (expected: default|cpp-only)"
            )),
        }
    }
}

impl Opts {
    /// Parse the command line and reject invalid flag combinations.
    pub fn get_opts() -> PycResult<Opts> {
        let opts: Opts = argh::from_env();
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> PycResult<()> {
        if self.emit == EmitKind::Verilog && self.sim_mode == SimMode::CppOnly {
            return Err(Error::config(
                "--emit=verilog is not allowed with --sim-mode=cpp-only",
            ));
        }
        Ok(())
    }

    /// Comb fusion is on unless op-granular scheduling was requested for
    /// the cpp-only simulation flow.
    pub fn fuse_comb_enabled(&self) -> bool {
        self.sim_mode != SimMode::CppOnly || !self.cpp_only_preserve_ops
    }
}
