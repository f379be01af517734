//! Lifecycle engine behind the `cb-bdti` binary.
//!
//! The binary is a thin clap front end over [`commands`]; the services are exposed so the
//! integration tests can drive [`services::orchestrator::Orchestrator`] with in-process fakes.

pub mod cli;
pub mod commands;
pub mod domain;
pub mod error;
pub mod services;

pub use error::{BdtiError, ErrorKind, Result};
