//! Shared utilities for the pyCircuit compiler.
mod errors;
mod id;
mod namegenerator;
mod out_file;

mod math;

pub use errors::{Error, PycResult};
pub use id::{GSym, GetName, Id};
pub use math::{bits_needed_for, sat_add};
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
