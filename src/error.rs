//! Crate error type.
//!
//! Every failure the operator can act on has its own variant so the message carries the data
//! model, URL or status code involved. [`BdtiError::code`] is the stable identifier printed in
//! `--json` error output.

use thiserror::Error;

/// Error taxonomy used to decide how a failure propagates through a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Protocol,
    Connectivity,
    StateStore,
    Internal,
}

#[derive(Error, Debug)]
pub enum BdtiError {
    #[error("there is no \"{0}\" section in the configuration file")]
    SectionNotFound(String),
    #[error("\"{key}\" key is not present in \"{section}\" section")]
    KeyNotFound { section: String, key: String },
    #[error("{key} key is not informed in {section} section")]
    FieldNotInformed { key: String, section: String },
    #[error("there is no {0} section in the configuration file")]
    DataModelNotPresent(String),
    #[error("the {0} Data Model has not been previously integrated")]
    DataModelNotIntegrated(String),
    #[error("not valid types for {name} Data Model. Must be one or more of these values: {}", .allowed.join(", "))]
    InvalidTypes { name: String, allowed: Vec<String> },
    #[error("not valid throttling for {0} Data Model. It must be a non-negative integer value")]
    InvalidThrottling(String),
    #[error("not valid expires for {0} Data Model. Must be in ISO8601 format. E.g. 2020-01-01, 2020-01-01T10:10")]
    InvalidExpires(String),
    #[error("\"{0}\" file format is not valid. Allowed file formats: json-row, json-column, csv-row, csv-column")]
    InvalidFileFormat(String),
    #[error("not valid {kind} host: {host}")]
    InvalidHost { kind: String, host: String },
    #[error("remote deployment needs both cygnus_ssh_key_path and cygnus_ssh_username; only {0} is informed")]
    IncompleteRemoteTarget(String),
    #[error("no such config file: {0}")]
    ConfigFileNotFound(String),
    #[error("config file already exists: {0}")]
    ConfigFileExists(String),
    #[error("broker endpoints are not configured for this operation")]
    BrokerNotConfigured,
    #[error("no deployment driver is available for this operation")]
    DeployerNotConfigured,

    #[error("Orion's subscription service is not reachable at {0}")]
    BrokerUnreachable(String),
    #[error("Orion request subscription failed. Code error: {code}")]
    SubscriptionCreateFailed { code: u16 },
    #[error("Orion accepted the subscription at {0} but returned no location header")]
    SubscriptionIdMissing(String),
    #[error("error trying to delete a {name} subscription at {url}{}", reason_suffix(.reason))]
    SubscriptionDeleteFailed {
        name: String,
        url: String,
        reason: Option<String>,
    },

    #[error("HDFS is not reachable. Unable to connect to {host}:{port}{}", remote_suffix(.is_remote, .agent_host))]
    StorageUnreachable {
        host: String,
        port: String,
        is_remote: bool,
        agent_host: String,
    },
    #[error("Cygnus host {0} is not reachable via SSH")]
    AgentHostUnreachable(String),
    #[error("Docker image from Cygnus ({0}) was not found")]
    AgentImageNotFound(String),
    #[error("Cygnus container did not come up from image {0}")]
    AgentNotRunning(String),
    #[error("command `{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("command `{command}` timed out after {secs}s")]
    CommandTimedOut { command: String, secs: u64 },
    #[error("deployment step `{step}` is not allowed while {phase}")]
    InvalidPhase { step: String, phase: String },

    #[error("malformed store {path}: {message}")]
    MalformedStore { path: String, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(". {r}"))
        .unwrap_or_default()
}

fn remote_suffix(is_remote: &bool, agent_host: &str) -> String {
    if *is_remote {
        format!(" from Cygnus ({agent_host})")
    } else {
        String::new()
    }
}

impl BdtiError {
    pub fn code(&self) -> &'static str {
        match self {
            BdtiError::SectionNotFound(_) => "SECTION_NOT_FOUND",
            BdtiError::KeyNotFound { .. } => "KEY_NOT_FOUND",
            BdtiError::FieldNotInformed { .. } => "FIELD_NOT_INFORMED",
            BdtiError::DataModelNotPresent(_) => "DATA_MODEL_NOT_PRESENT",
            BdtiError::DataModelNotIntegrated(_) => "DATA_MODEL_NOT_INTEGRATED",
            BdtiError::InvalidTypes { .. } => "INVALID_TYPES",
            BdtiError::InvalidThrottling(_) => "INVALID_THROTTLING",
            BdtiError::InvalidExpires(_) => "INVALID_EXPIRES",
            BdtiError::InvalidFileFormat(_) => "INVALID_FILE_FORMAT",
            BdtiError::InvalidHost { .. } => "INVALID_HOST",
            BdtiError::IncompleteRemoteTarget(_) => "INCOMPLETE_REMOTE_TARGET",
            BdtiError::ConfigFileNotFound(_) => "CONFIG_NOT_FOUND",
            BdtiError::ConfigFileExists(_) => "CONFIG_EXISTS",
            BdtiError::BrokerNotConfigured => "BROKER_NOT_CONFIGURED",
            BdtiError::DeployerNotConfigured => "DEPLOYER_NOT_CONFIGURED",
            BdtiError::BrokerUnreachable(_) => "BROKER_UNREACHABLE",
            BdtiError::SubscriptionCreateFailed { .. } => "SUBSCRIPTION_CREATE_FAILED",
            BdtiError::SubscriptionIdMissing(_) => "SUBSCRIPTION_ID_MISSING",
            BdtiError::SubscriptionDeleteFailed { .. } => "SUBSCRIPTION_DELETE_FAILED",
            BdtiError::StorageUnreachable { .. } => "STORAGE_UNREACHABLE",
            BdtiError::AgentHostUnreachable(_) => "AGENT_HOST_UNREACHABLE",
            BdtiError::AgentImageNotFound(_) => "AGENT_IMAGE_NOT_FOUND",
            BdtiError::AgentNotRunning(_) => "AGENT_NOT_RUNNING",
            BdtiError::CommandFailed { .. } => "COMMAND_FAILED",
            BdtiError::CommandTimedOut { .. } => "COMMAND_TIMED_OUT",
            BdtiError::InvalidPhase { .. } => "INVALID_PHASE",
            BdtiError::MalformedStore { .. } => "MALFORMED_STORE",
            BdtiError::Http(_) => "HTTP_ERROR",
            BdtiError::Io(_) => "IO_ERROR",
            BdtiError::Json(_) | BdtiError::TomlSer(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BdtiError::FieldNotInformed { .. }
            | BdtiError::DataModelNotPresent(_)
            | BdtiError::DataModelNotIntegrated(_)
            | BdtiError::InvalidTypes { .. }
            | BdtiError::InvalidThrottling(_)
            | BdtiError::InvalidExpires(_)
            | BdtiError::InvalidFileFormat(_)
            | BdtiError::InvalidHost { .. }
            | BdtiError::IncompleteRemoteTarget(_)
            | BdtiError::ConfigFileNotFound(_)
            | BdtiError::ConfigFileExists(_)
            | BdtiError::BrokerNotConfigured
            | BdtiError::DeployerNotConfigured => ErrorKind::Configuration,
            BdtiError::SubscriptionCreateFailed { .. }
            | BdtiError::SubscriptionIdMissing(_)
            | BdtiError::SubscriptionDeleteFailed { .. } => ErrorKind::Protocol,
            BdtiError::BrokerUnreachable(_)
            | BdtiError::StorageUnreachable { .. }
            | BdtiError::AgentHostUnreachable(_)
            | BdtiError::AgentImageNotFound(_)
            | BdtiError::AgentNotRunning(_)
            | BdtiError::CommandFailed { .. }
            | BdtiError::CommandTimedOut { .. }
            | BdtiError::Http(_) => ErrorKind::Connectivity,
            BdtiError::SectionNotFound(_)
            | BdtiError::KeyNotFound { .. }
            | BdtiError::MalformedStore { .. } => ErrorKind::StateStore,
            BdtiError::InvalidPhase { .. }
            | BdtiError::Io(_)
            | BdtiError::Json(_)
            | BdtiError::TomlSer(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, BdtiError>;
