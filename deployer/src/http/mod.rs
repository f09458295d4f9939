//! HTTP clients for the registry and the issue tracker

pub mod client;
pub mod registry;
pub mod tracker;
