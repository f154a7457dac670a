//! Command-line subcommands beyond the long-running supervisor.

pub mod exec;

pub use exec::ExecArgs;
