//! Plain data shared by the services and the command handlers.
//!
//! - `models.rs`: data model specs, integration records, host settings, deployment target,
//!   grouping rules and the report/view structs printed with `--json`.
//! - `constants.rs`: configuration section and key names, ports, Cygnus image and mounts, and
//!   the FIWARE data model catalog.
//!
//! Nothing here touches the filesystem or the network. Field renames change the `--json`
//! output and the record file, so keep `docs/contracts/*` in step.

pub mod constants;
pub mod models;
