//! Result reporting

pub mod aggregate;
pub mod publish;
pub mod summary;
