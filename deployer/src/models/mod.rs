//! Deployment models

pub mod request;
pub mod result;
pub mod target;
