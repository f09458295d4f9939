//! REST payload models shared by the sqldeploy HTTP clients

pub mod models;
