//! Harbory Backend Library
//!
//! Core modules for the Harbory dashboard backend: password sessions and
//! Docker deployments of Git repositories with streamed progress.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
