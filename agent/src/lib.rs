//! DeployPilot Agent Library
//!
//! Core modules for the DeployPilot node agent.

pub mod app;
pub mod build;
pub mod dispatch;
pub mod errors;
pub mod handlers;
pub mod http;
pub mod kube;
pub mod logs;
pub mod models;
pub mod server;
pub mod shell;
pub mod telemetry;
pub mod utils;
pub mod workers;
