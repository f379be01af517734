//! Integration lifecycle services.
//!
//! `orchestrator` drives every batch; the other modules are the stores, clients and drivers it
//! is built from, each behind a trait so tests can swap in fakes.
//!
//! ## Modules
//! - `orchestrator.rs`: integrate/modify/delete/reset over batches of data models.
//! - `store.rs`: desired configuration and integration record stores (TOML).
//! - `subscription.rs`: Orion LD subscription client.
//! - `artifacts.rs`: agent.conf and grouping_rules.conf rendering.
//! - `deploy.rs`: Cygnus redeployment state machine.
//! - `docker.rs`: container lifecycle through the docker CLI.
//! - `channel.rs`: local and SSH command execution with timeouts.
//! - `validators.rs`: host, data model and storage settings checks.
//! - `confirm.rs`: yes/no policies for mid-batch questions.
//! - `logging.rs`: tracing subscriber setup.
//! - `output.rs`: JSON/text output helpers.
//!
//! Rendering and validation are pure functions. Filesystem, HTTP and process side effects
//! stay in the store, subscription, channel and docker modules.

pub mod artifacts;
pub mod channel;
pub mod confirm;
pub mod deploy;
pub mod docker;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod store;
pub mod subscription;
pub mod validators;
