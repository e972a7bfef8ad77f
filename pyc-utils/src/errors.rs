//! Errors generated by the pyCircuit compiler.

use crate::Id;

/// Convenience wrapper to pass a result around the compiler.
pub type PycResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler.
///
/// Every error names the kind of failure and, where it exists, the op or
/// function responsible. Passes either succeed or return exactly one of
/// these; the driver turns it into a non-zero exit code.
pub struct Error {
    kind: ErrorKind,
    /// Name of the op or function the error is attached to.
    location: Option<String>,
    /// Optional post-amble for the error message.
    post_msg: Option<String>,
}

/// The different kinds of failure the compiler can report.
enum ErrorKind {
    /// Structured control flow that cannot be lowered statically.
    NonStaticControl(String),
    /// A value without a statically-known width reached the back-end.
    UnknownWidth(String),
    /// A combinational cycle was found.
    CombCycle(String),
    /// Combinational depth between sequential boundaries exceeds the limit.
    LogicDepthExceeded(String),
    /// An `instance` references a function that is not in the module.
    InstanceUnresolved(String),
    /// A back-end failed to emit the module.
    Emission(String),
    /// Invalid combination of command-line options.
    Config(String),
    /// The input IR is malformed.
    Parse(String),
    /// The op or module violates the IR's structural rules.
    MalformedStructure(String),
    /// A file could not be read.
    InvalidFile(String),
    /// An output could not be written.
    WriteError(String),
    /// Miscellaneous.
    Misc(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        let (tag, msg) = match &self.kind {
            NonStaticControl(msg) => ("non-static control", msg),
            UnknownWidth(msg) => ("unknown width", msg),
            CombCycle(msg) => ("combinational cycle", msg),
            LogicDepthExceeded(msg) => ("logic depth exceeded", msg),
            InstanceUnresolved(msg) => ("unresolved instance", msg),
            Emission(msg) => ("emission error", msg),
            Config(msg) => ("invalid configuration", msg),
            Parse(msg) => ("parse error", msg),
            MalformedStructure(msg) => ("malformed structure", msg),
            InvalidFile(msg) => ("invalid file", msg),
            WriteError(msg) => ("write error", msg),
            Misc(msg) => ("error", msg),
        };
        write!(f, "{tag}: {msg}")?;
        if let Some(loc) = &self.location {
            write!(f, " (in `{loc}')")?;
        }
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
            post_msg: None,
        }
    }

    /// Attach the name of the op or function responsible for this error.
    pub fn with_location<S: ToString>(mut self, name: S) -> Self {
        self.location = Some(name.to_string());
        self
    }

    /// Add a post-amble shown after the main message.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn non_static_control<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::NonStaticControl(msg.to_string()))
    }

    pub fn unknown_width<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::UnknownWidth(msg.to_string()))
    }

    pub fn comb_cycle<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::CombCycle(msg.to_string()))
    }

    pub fn logic_depth_exceeded<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::LogicDepthExceeded(msg.to_string()))
    }

    pub fn instance_unresolved(callee: Id) -> Self {
        Self::new(ErrorKind::InstanceUnresolved(format!(
            "`{callee}' does not name a function in this module"
        )))
    }

    pub fn emission<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Emission(msg.to_string()))
    }

    pub fn config<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Config(msg.to_string()))
    }

    pub fn parse<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Parse(msg.to_string()))
    }

    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedStructure(msg.to_string()))
    }

    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidFile(msg.to_string()))
    }

    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::WriteError(msg.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    /// True when this error is a comb-cycle diagnostic. Used by tests.
    pub fn is_comb_cycle(&self) -> bool {
        matches!(self.kind, ErrorKind::CombCycle(..))
    }

    /// True when this error is a logic-depth diagnostic. Used by tests.
    pub fn is_logic_depth(&self) -> bool {
        matches!(self.kind, ErrorKind::LogicDepthExceeded(..))
    }

    /// True when this error is a non-static-control diagnostic.
    pub fn is_non_static_control(&self) -> bool {
        matches!(self.kind, ErrorKind::NonStaticControl(..))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::write_error(e.to_string())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Error::write_error(e.to_string())
    }
}
