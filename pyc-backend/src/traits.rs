//! Interface for the back-ends.

use pyc_ir::Module;
use pyc_utils::{OutputFile, PycResult};

/// A backend turns a legalized module into text on an output stream.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;

    /// Validate that the module is in a form this backend accepts.
    /// Backends run after verification, so this only guards against
    /// misconfigured pipelines (e.g. `-d lower-scf-static`).
    fn validate(module: &Module) -> PycResult<()>;

    /// Emit the entire module into a single stream.
    fn emit(module: &Module, file: &mut OutputFile) -> PycResult<()>;
}
