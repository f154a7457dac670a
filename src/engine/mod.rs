//! The script engine: the Rhai sandbox scripts run in and the host
//! capabilities they can call.

pub mod rhai;
