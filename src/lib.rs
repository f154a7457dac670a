#![warn(missing_docs)]
//! Vigil runs sandboxed Rhai check scripts on demand, on a schedule, or as
//! activities of workflow-engine tasks, all through one execution funnel.

pub mod cmd;
pub mod config;
pub mod datasource;
pub mod engine;
pub mod http_client;
pub mod http_server;
pub mod kv;
pub mod notification;
pub mod runner;
pub mod scheduler;
pub mod scripts;
pub mod supervisor;
pub mod upload;
pub mod workflow;
