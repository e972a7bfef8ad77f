//! Backends for the pyCircuit compiler.
mod cpp;
mod traits;
mod util;
mod verilog;

pub use cpp::{emit_function as emit_cpp_function, function_to_string as cpp_function_to_string, CppBackend};
pub use traits::Backend;
pub use verilog::{
    bundle_primitives, emit_function as emit_verilog_function,
    function_to_string as verilog_function_to_string,
    module_to_string as verilog_module_to_string, VerilogBackend, PRIMITIVE_FILES,
};
