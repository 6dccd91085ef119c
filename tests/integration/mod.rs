//! Integration tests module
//!
//! Release pipeline scenarios run against mocked collaborators; CLI tests
//! run the built binary.

pub mod cli;
pub mod common;
pub mod pipeline;
