//! Deployment orchestration

pub mod coordinator;
pub mod engine;
pub mod fsm;
pub mod policy;
pub mod resolver;
pub mod runner;
pub mod signatures;
