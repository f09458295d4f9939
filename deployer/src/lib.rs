//! sqldeploy library
//!
//! Runs SQL change scripts against registered database targets, classifies the
//! command processor output and aggregates the errors into one report.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod report;
pub mod storage;
pub mod utils;
