//! Helmsman HTTP Clients
//!
//! Typed clients for the external services the change pipeline consumes:
//!
//! - [`BuildServerClient`]: a Jenkins-style build server (trigger, queue
//!   lookup, build status, console log, stop)
//! - [`MonitorClient`]: the monitoring backend (sessions, stages, logs)
//! - [`AnalyzerClient`]: the requirement-analysis completion endpoint
//!
//! All clients are thin request/response wrappers; retry, polling, and
//! failure policy live with the callers in `helmsman-pipeline`.

pub mod error;

mod analyzer;
mod build;
mod monitor;
mod response;

pub use analyzer::AnalyzerClient;
pub use build::BuildServerClient;
pub use error::{ClientError, Result};
pub use monitor::MonitorClient;
