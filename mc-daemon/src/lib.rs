//! micctl daemon library
//!
//! HTTP API, deferred restart handling and the host collaborators behind the
//! `micctld` binary.

pub mod deferred;
pub mod host;
pub mod sampler;
pub mod server;

pub use deferred::{DeferredActionScheduler, ExecRestarter, ProcessRestarter};
pub use server::{router, run_server, AppState};
