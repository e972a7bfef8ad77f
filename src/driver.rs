//! Driver for the pyCircuit compiler.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use pyc_backend::{Backend, CppBackend, VerilogBackend, PRIMITIVE_FILES};
use pyc_ir::Module;
use pyc_opt::{PassManager, PipelineConfig};
use pyc_utils::{Error, PycResult};

use crate::cmdline::{EmitKind, Opts, Target};
use crate::stats::CompileStatsSummary;

/// Run the compiler from the command line.
pub fn run_compiler() -> PycResult<()> {
    let opts = Opts::get_opts()?;

    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let pm = PassManager::default_passes(PipelineConfig {
        logic_depth_limit: opts.logic_depth,
        enable_fuse_comb: opts.fuse_comb_enabled(),
    })?;

    if opts.list_passes {
        println!("{}", pm.show_names());
        return Ok(());
    }

    let source = read_input(&opts.file)?;
    let mut module = pyc_frontend::parse_module(&source)?;

    pm.execute_plan(&mut module, &opts.pass, &opts.disable_pass, opts.dump_ir)?;

    let stats = CompileStatsSummary::collect(
        &module,
        opts.logic_depth as i64,
        opts.fuse_comb_enabled(),
    );
    eprintln!("{}", stats.summary_line());

    match &opts.out_dir {
        Some(dir) => emit_split(&opts, &module, dir, &stats),
        None => emit_single(&opts, &module, &stats),
    }
}

fn read_input(path: &Path) -> PycResult<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| Error::invalid_file(format!("cannot read standard input: {e}")))?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
            .map_err(|e| Error::invalid_file(format!("cannot read {}: {e}", path.display())))
    }
}

/// Locate the runtime Verilog primitives: `PYC_PRIMITIVES_DIR` when set,
/// with `runtime/verilog` under the current directory as the only
/// fallback.
fn find_primitives_dir() -> PycResult<PathBuf> {
    let has_reg = |dir: &Path| dir.join("pyc_reg.v").is_file();
    if let Ok(env) = std::env::var("PYC_PRIMITIVES_DIR") {
        let dir = PathBuf::from(env);
        if has_reg(&dir) {
            return Ok(dir);
        }
    }
    let fallback = PathBuf::from("runtime").join("verilog");
    if has_reg(&fallback) {
        return Ok(fallback);
    }
    Err(Error::invalid_file(
        "cannot locate the Verilog primitives; set PYC_PRIMITIVES_DIR",
    ))
}

fn read_primitive_sources() -> PycResult<Vec<(String, String)>> {
    let dir = find_primitives_dir()?;
    PRIMITIVE_FILES
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::read_to_string(&path)
                .map(|contents| (name.to_string(), contents))
                .map_err(|e| {
                    Error::invalid_file(format!(
                        "cannot read primitive file {}: {e}",
                        path.display()
                    ))
                })
        })
        .collect()
}

fn write_text(path: &Path, contents: &str) -> PycResult<()> {
    fs::write(path, contents)
        .map_err(|e| Error::write_error(format!("cannot write {}: {e}", path.display())))
}

fn emit_single(opts: &Opts, module: &Module, stats: &CompileStatsSummary) -> PycResult<()> {
    let mut output = opts.output.clone();
    match opts.emit {
        EmitKind::Verilog => {
            VerilogBackend::validate(module)?;
            if opts.include_primitives {
                // The bundled primitives precede the design in the stream.
                let mut text = pyc_backend::bundle_primitives(
                    &read_primitive_sources()?,
                    opts.target == Target::Fpga,
                );
                text.push('\n');
                text.push_str(&pyc_backend::verilog_module_to_string(module)?);
                let mut out = output.get_write()?;
                use std::io::Write;
                out.write_all(text.as_bytes())?;
                out.flush()?;
            } else {
                VerilogBackend::emit(module, &mut output)?;
            }
        }
        EmitKind::CppSim => {
            CppBackend::validate(module)?;
            CppBackend::emit(module, &mut output)?;
        }
    }
    write_single_output_stats(opts, stats)
}

/// Next to a named single-file output, write `<output>.stats.json`; no
/// side-car for standard output.
fn write_single_output_stats(opts: &Opts, stats: &CompileStatsSummary) -> PycResult<()> {
    if let Some(path) = opts.output.as_path() {
        let mut stats_path = path.as_os_str().to_owned();
        stats_path.push(".stats.json");
        write_text(Path::new(&stats_path), &stats.to_json())?;
    }
    Ok(())
}

fn emit_split(
    opts: &Opts,
    module: &Module,
    dir: &Path,
    stats: &CompileStatsSummary,
) -> PycResult<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::write_error(format!("cannot create --out-dir {}: {e}", dir.display())))?;
    let top = module
        .top_symbol()
        .ok_or_else(|| Error::emission("cannot determine top symbol: module has no functions"))?;

    match opts.emit {
        EmitKind::Verilog => {
            VerilogBackend::validate(module)?;
            let mut verilog_files: Vec<String> = Vec::new();
            if opts.include_primitives {
                let bundle = pyc_backend::bundle_primitives(
                    &read_primitive_sources()?,
                    opts.target == Target::Fpga,
                );
                write_text(&dir.join("pyc_primitives.v"), &bundle)?;
                verilog_files.push("pyc_primitives.v".to_string());
            }
            for func in &module.functions {
                let file_name = format!("{}.v", func.name);
                let text = pyc_backend::verilog_function_to_string(module, func)?;
                write_text(&dir.join(&file_name), &text)?;
                verilog_files.push(file_name);
            }
            update_manifest(dir, &top.to_string(), Some(verilog_files.clone()), None)?;
            write_yosys_script(dir, module, &top.to_string(), opts.include_primitives)?;
        }
        EmitKind::CppSim => {
            CppBackend::validate(module)?;
            let mut cpp_files: Vec<String> = Vec::new();
            for func in &module.functions {
                let file_name = format!("{}.hpp", func.name);
                let text = pyc_backend::cpp_function_to_string(module, func)?;
                write_text(&dir.join(&file_name), &text)?;
                cpp_files.push(file_name);
            }
            update_manifest(dir, &top.to_string(), None, Some(cpp_files))?;
        }
    }

    // compile_stats.json always overwrites: the on-disk record describes
    // exactly this invocation.
    write_text(&dir.join("compile_stats.json"), &stats.to_json())
}

/// Merge-update `manifest.json`: set `top` and whichever module list this
/// invocation produced, preserve everything else.
pub fn update_manifest(
    dir: &Path,
    top: &str,
    verilog_modules: Option<Vec<String>>,
    cpp_modules: Option<Vec<String>>,
) -> PycResult<()> {
    let path = dir.join("manifest.json");
    let mut manifest: serde_json::Map<String, serde_json::Value> = match fs::read_to_string(&path)
    {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(..) => Default::default(),
    };
    manifest.insert("top".to_string(), serde_json::json!(top));
    manifest
        .entry("verilog_modules")
        .or_insert_with(|| serde_json::json!([]));
    manifest
        .entry("cpp_modules")
        .or_insert_with(|| serde_json::json!([]));
    if let Some(files) = verilog_modules {
        manifest.insert("verilog_modules".to_string(), serde_json::json!(files));
    }
    if let Some(files) = cpp_modules {
        manifest.insert("cpp_modules".to_string(), serde_json::json!(files));
    }
    let mut text = serde_json::to_string_pretty(&serde_json::Value::Object(manifest))
        .expect("manifest serialize");
    text.push('\n');
    write_text(&path, &text)
}

/// Sanity-synthesis stub consumed by Yosys.
fn write_yosys_script(
    dir: &Path,
    module: &Module,
    top: &str,
    include_primitives: bool,
) -> PycResult<()> {
    let mut script = String::from("# Generated by pyc-compile\n");
    if include_primitives {
        script.push_str("read_verilog -sv pyc_primitives.v\n");
    }
    for func in &module.functions {
        script.push_str(&format!("read_verilog -sv {}.v\n", func.name));
    }
    script.push_str(&format!("hierarchy -top {top}\n"));
    script.push_str("proc; opt; memory; opt\n");
    script.push_str(&format!("synth -top {top}\n"));
    write_text(&dir.join("yosys_synth.ys"), &script)
}
