use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BdtiError;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct JsonErr {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Desired integration of one data model, as authored in the desired configuration.
///
/// `throttling` and `expires` keep their raw text until validation; an empty value in the
/// file reads as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataModelSpec {
    pub name: String,
    pub allowed_types: Vec<String>,
    pub service: String,
    pub service_path: String,
    pub throttling: Option<String>,
    pub expires: Option<String>,
    pub storage_file_path: String,
    pub storage_file_name: String,
}

impl DataModelSpec {
    /// Parsed throttling; `None` when unset or not a valid integer.
    pub fn throttling_secs(&self) -> Option<u64> {
        self.throttling.as_deref().and_then(|t| t.trim().parse().ok())
    }

    /// Whitespace separated form used by the configuration files.
    pub fn types_field(&self) -> String {
        self.allowed_types.join(" ")
    }
}

/// Persisted proof that a subscription exists for a data model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationRecord {
    pub spec: DataModelSpec,
    pub subscription_id: String,
    pub broker_url: String,
    pub integrated_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl IntegrationRecord {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshCredentials {
    pub key_path: String,
    pub username: String,
}

/// Where the downstream agent runs for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentTarget {
    Local {
        host: String,
    },
    Remote {
        host: String,
        credentials: SshCredentials,
    },
}

impl DeploymentTarget {
    pub fn host(&self) -> &str {
        match self {
            DeploymentTarget::Local { host } | DeploymentTarget::Remote { host, .. } => host,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, DeploymentTarget::Remote { .. })
    }
}

/// `[fiware]` section of the desired configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerSettings {
    pub orion_host: String,
    pub cygnus_host: String,
    pub ssh_key_path: String,
    pub ssh_username: String,
}

/// `[hdfs]` section of the desired configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    pub host: String,
    pub port: String,
    pub username: String,
    pub format_file: String,
    pub oauth2_token: String,
    pub krb5_auth: String,
    pub krb5_user: String,
    pub krb5_password: String,
}

impl StorageSettings {
    /// Logical setting names paired with their values, in agent file order.
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        use crate::domain::constants::*;
        [
            (HDFS_HOST, self.host.as_str()),
            (HDFS_PORT, self.port.as_str()),
            (HDFS_USERNAME, self.username.as_str()),
            (HDFS_FORMAT_FILE, self.format_file.as_str()),
            (HDFS_OAUTH2_TOKEN, self.oauth2_token.as_str()),
            (HDFS_KRB5_AUTH, self.krb5_auth.as_str()),
            (HDFS_KRB5_USER, self.krb5_user.as_str()),
            (HDFS_KRB5_PASSWORD, self.krb5_password.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    JsonRow,
    JsonColumn,
    CsvRow,
    CsvColumn,
}

impl FileFormat {
    pub const ALL: [&'static str; 4] = ["json-row", "json-column", "csv-row", "csv-column"];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::JsonRow => "json-row",
            FileFormat::JsonColumn => "json-column",
            FileFormat::CsvRow => "csv-row",
            FileFormat::CsvColumn => "csv-column",
        }
    }

    /// Form used as a destination prefix, e.g. `json_row`.
    pub fn normalized(&self) -> String {
        self.as_str().replace('-', "_")
    }
}

impl FromStr for FileFormat {
    type Err = BdtiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "json-row" => Ok(FileFormat::JsonRow),
            "json-column" => Ok(FileFormat::JsonColumn),
            "csv-row" => Ok(FileFormat::CsvRow),
            "csv-column" => Ok(FileFormat::CsvColumn),
            other => Err(BdtiError::InvalidFileFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingRule {
    pub id: usize,
    pub fields: Vec<String>,
    pub regex: String,
    pub destination: String,
    pub fiware_service_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingRules {
    pub grouping_rules: Vec<GroupingRule>,
}

/// Data models requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Named(Vec<String>),
}

impl Selection {
    /// `all` anywhere in the first position selects every known data model.
    pub fn from_args(args: &[String]) -> Self {
        match args.first() {
            Some(first) if first == "all" => Selection::All,
            _ => Selection::Named(args.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Integrated,
    Modified,
    Deleted,
    ForceDeleted,
    Skipped,
    NotIntegrated,
    Failed,
}

impl OutcomeStatus {
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::Integrated
                | OutcomeStatus::Modified
                | OutcomeStatus::Deleted
                | OutcomeStatus::ForceDeleted
        )
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Integrated => "integrated",
            OutcomeStatus::Modified => "modified",
            OutcomeStatus::Deleted => "deleted",
            OutcomeStatus::ForceDeleted => "force_deleted",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::NotIntegrated => "not_integrated",
            OutcomeStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelOutcome {
    pub data_model: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub operation: String,
    pub outcomes: Vec<ModelOutcome>,
    pub redeployed: bool,
}

impl BatchReport {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            outcomes: Vec::new(),
            redeployed: false,
        }
    }

    pub fn push(&mut self, data_model: &str, status: OutcomeStatus) -> &mut ModelOutcome {
        self.outcomes.push(ModelOutcome {
            data_model: data_model.to_string(),
            status,
            subscription_id: None,
            detail: None,
        });
        let last = self.outcomes.len() - 1;
        &mut self.outcomes[last]
    }

    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|o| o.status.is_change())
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count()
    }
}

#[derive(Serialize)]
pub struct IntegratedView {
    pub data_model: String,
    pub types: String,
    pub fiware_service: String,
    pub fiware_servicepath: String,
    pub throttling: Option<String>,
    pub expires: Option<String>,
    pub file_path: String,
    pub file_name: String,
    pub subscription_id: String,
    pub orion_url: String,
    pub integration_date: String,
    pub modification_date: Option<String>,
}

impl From<&IntegrationRecord> for IntegratedView {
    fn from(r: &IntegrationRecord) -> Self {
        Self {
            data_model: r.spec.name.clone(),
            types: r.spec.types_field(),
            fiware_service: r.spec.service.clone(),
            fiware_servicepath: r.spec.service_path.clone(),
            throttling: r.spec.throttling.clone(),
            expires: r.spec.expires.clone(),
            file_path: r.spec.storage_file_path.clone(),
            file_name: r.spec.storage_file_name.clone(),
            subscription_id: r.subscription_id.clone(),
            orion_url: r.broker_url.clone(),
            integration_date: r.integrated_at.to_rfc3339(),
            modification_date: r.modified_at.map(|m| m.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct CheckItem {
    pub name: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct CheckReport {
    pub overall: String,
    pub checks: Vec<CheckItem>,
}
