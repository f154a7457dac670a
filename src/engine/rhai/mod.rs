//! Rhai sandbox: engine construction, compile cache, host modules and value
//! conversions.

pub mod compiler;
pub mod conversions;
mod create_engine;
pub mod host;

pub use compiler::{RhaiCompiler, RhaiCompilerError};
pub use create_engine::{create_engine, set_deadline};
pub use host::{HostFailure, HostServices};
