#[macro_use]
extern crate tracing;

pub mod cmd;
pub mod config;
mod constants;
pub mod dependency_graph;
pub mod discovery;
pub mod engine;
pub mod env_file;
pub mod errors;
pub mod events;
pub mod logger;
pub mod manifest;
pub mod models;
pub mod naming;
pub mod orchestrator;
pub mod planner;
pub mod provisioner;
mod runtime;
