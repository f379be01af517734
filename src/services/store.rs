//! On-disk stores: the operator-authored desired configuration and the integration records.
//!
//! Both are TOML documents with one table per data model. Table order is kept on load and save
//! so `all` batches and the grouping rules follow the order the operator sees in the files.

use crate::domain::constants::{
    BROKER_SECTION, CYGNUS_HOST, CYGNUS_KEY_PATH, CYGNUS_USERNAME, DATA_MODEL_EXPIRES,
    DATA_MODEL_FILE_NAME, DATA_MODEL_FILE_PATH, DATA_MODEL_SERVICE, DATA_MODEL_SERVICE_PATH,
    DATA_MODEL_THROTTLING, DATA_MODEL_TYPES, HDFS_FORMAT_FILE, HDFS_HOST, HDFS_KRB5_AUTH,
    HDFS_KRB5_PASSWORD, HDFS_KRB5_USER, HDFS_OAUTH2_TOKEN, HDFS_PORT, HDFS_USERNAME,
    ORION_HOST, RESERVED_SECTIONS, STORAGE_SECTION,
};
use crate::domain::models::{BrokerSettings, DataModelSpec, IntegrationRecord, StorageSettings};
use crate::error::{BdtiError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_TEMPLATE: &str = include_str!("../../templates/cb_bdti.toml");

/// Read access to the desired configuration.
pub trait SpecSource {
    fn get_spec(&self, name: &str) -> Result<DataModelSpec>;
    fn list_spec_names(&self, include_reserved: bool) -> Vec<String>;
    fn broker_settings(&self) -> Result<BrokerSettings>;
    fn storage_settings(&self) -> Result<StorageSettings>;
    /// Removes the backing file. Used by `reset`.
    fn discard(&mut self) -> Result<()>;
}

/// Integration record store. Mutations stay in memory until [`RecordStore::persist`].
pub trait RecordStore {
    fn get_record(&self, name: &str) -> Option<IntegrationRecord>;
    fn list_records(&self) -> Vec<IntegrationRecord>;
    fn put_record(&mut self, name: &str, record: IntegrationRecord);
    fn remove_record(&mut self, name: &str) -> Option<IntegrationRecord>;
    fn persist(&mut self) -> Result<()>;
}

pub struct DesiredConfig {
    path: PathBuf,
    table: toml::Table,
}

impl DesiredConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BdtiError::ConfigFileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let table: toml::Table =
            toml::from_str(&raw).map_err(|e| BdtiError::MalformedStore {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            table,
        })
    }

    /// Stand-in for a configuration file that is not there, e.g. after `reset`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            table: toml::Table::new(),
        }
    }

    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::empty(path))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn section(&self, name: &str) -> Result<&toml::Table> {
        self.table
            .get(name)
            .and_then(|v| v.as_table())
            .ok_or_else(|| BdtiError::SectionNotFound(name.to_string()))
    }

    fn required(&self, section: &str, key: &str) -> Result<String> {
        self.section(section)?
            .get(key)
            .map(value_text)
            .ok_or_else(|| BdtiError::KeyNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Missing and empty values both read as `None`.
    fn optional(&self, section: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .section(section)?
            .get(key)
            .map(value_text)
            .filter(|v| !v.trim().is_empty()))
    }

    fn optional_or_empty(&self, section: &str, key: &str) -> Result<String> {
        Ok(self.optional(section, key)?.unwrap_or_default())
    }
}

fn value_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.trim().to_string(),
        toml::Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

impl SpecSource for DesiredConfig {
    fn get_spec(&self, name: &str) -> Result<DataModelSpec> {
        if RESERVED_SECTIONS.contains(&name) || self.section(name).is_err() {
            return Err(BdtiError::DataModelNotPresent(name.to_string()));
        }
        let types = self.required(name, DATA_MODEL_TYPES)?;
        Ok(DataModelSpec {
            name: name.to_string(),
            allowed_types: types.split_whitespace().map(str::to_string).collect(),
            service: self.required(name, DATA_MODEL_SERVICE)?,
            service_path: self.required(name, DATA_MODEL_SERVICE_PATH)?,
            throttling: self.optional(name, DATA_MODEL_THROTTLING)?,
            expires: self.optional(name, DATA_MODEL_EXPIRES)?,
            storage_file_path: self.required(name, DATA_MODEL_FILE_PATH)?,
            storage_file_name: self.required(name, DATA_MODEL_FILE_NAME)?,
        })
    }

    fn list_spec_names(&self, include_reserved: bool) -> Vec<String> {
        self.table
            .iter()
            .filter(|(_, v)| v.is_table())
            .map(|(k, _)| k.clone())
            .filter(|k| include_reserved || !RESERVED_SECTIONS.contains(&k.as_str()))
            .collect()
    }

    fn broker_settings(&self) -> Result<BrokerSettings> {
        Ok(BrokerSettings {
            orion_host: self.required(BROKER_SECTION, ORION_HOST)?,
            cygnus_host: self.required(BROKER_SECTION, CYGNUS_HOST)?,
            ssh_key_path: self.optional_or_empty(BROKER_SECTION, CYGNUS_KEY_PATH)?,
            ssh_username: self.optional_or_empty(BROKER_SECTION, CYGNUS_USERNAME)?,
        })
    }

    fn storage_settings(&self) -> Result<StorageSettings> {
        let s = STORAGE_SECTION;
        Ok(StorageSettings {
            host: self.optional_or_empty(s, HDFS_HOST)?,
            port: self.optional_or_empty(s, HDFS_PORT)?,
            username: self.optional_or_empty(s, HDFS_USERNAME)?,
            format_file: self.optional_or_empty(s, HDFS_FORMAT_FILE)?,
            oauth2_token: self.optional_or_empty(s, HDFS_OAUTH2_TOKEN)?,
            krb5_auth: self.optional_or_empty(s, HDFS_KRB5_AUTH)?,
            krb5_user: self.optional_or_empty(s, HDFS_KRB5_USER)?,
            krb5_password: self.optional_or_empty(s, HDFS_KRB5_PASSWORD)?,
        })
    }

    fn discard(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            tracing::info!(path = %self.path.display(), "desired configuration removed");
        }
        self.table.clear();
        Ok(())
    }
}

/// On-disk shape of one record table.
#[derive(Debug, Serialize, Deserialize)]
struct RecordEntry {
    types: String,
    fiware_service: String,
    fiware_servicepath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    throttling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires: Option<String>,
    file_path: String,
    file_name: String,
    subscription_id: String,
    orion_url: String,
    integration_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modification_date: Option<DateTime<Utc>>,
}

impl RecordEntry {
    fn into_record(self, name: &str) -> IntegrationRecord {
        IntegrationRecord {
            spec: DataModelSpec {
                name: name.to_string(),
                allowed_types: self.types.split_whitespace().map(str::to_string).collect(),
                service: self.fiware_service,
                service_path: self.fiware_servicepath,
                throttling: self.throttling.filter(|t| !t.is_empty()),
                expires: self.expires.filter(|e| !e.is_empty()),
                storage_file_path: self.file_path,
                storage_file_name: self.file_name,
            },
            subscription_id: self.subscription_id,
            broker_url: self.orion_url,
            integrated_at: self.integration_date,
            modified_at: self.modification_date,
        }
    }
}

impl From<&IntegrationRecord> for RecordEntry {
    fn from(r: &IntegrationRecord) -> Self {
        Self {
            types: r.spec.types_field(),
            fiware_service: r.spec.service.clone(),
            fiware_servicepath: r.spec.service_path.clone(),
            throttling: r.spec.throttling.clone(),
            expires: r.spec.expires.clone(),
            file_path: r.spec.storage_file_path.clone(),
            file_name: r.spec.storage_file_name.clone(),
            subscription_id: r.subscription_id.clone(),
            orion_url: r.broker_url.clone(),
            integration_date: r.integrated_at,
            modification_date: r.modified_at,
        }
    }
}

/// Integration records in insertion order. `toml` keeps table order on disk.
pub struct RecordFile {
    path: PathBuf,
    records: Vec<IntegrationRecord>,
}

impl RecordFile {
    /// A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let mut records = Vec::new();
        if path.exists() {
            let malformed = |message: String| BdtiError::MalformedStore {
                path: path.display().to_string(),
                message,
            };
            let raw = std::fs::read_to_string(path)?;
            let table: toml::Table = toml::from_str(&raw).map_err(|e| malformed(e.to_string()))?;
            for (name, value) in table {
                let entry: RecordEntry = value
                    .try_into()
                    .map_err(|e: toml::de::Error| malformed(format!("[{name}] {e}")))?;
                records.push(entry.into_record(&name));
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for RecordFile {
    fn get_record(&self, name: &str) -> Option<IntegrationRecord> {
        self.records.iter().find(|r| r.name() == name).cloned()
    }

    fn list_records(&self) -> Vec<IntegrationRecord> {
        self.records.clone()
    }

    /// Replaces in place, so a modified record keeps its position.
    fn put_record(&mut self, name: &str, mut record: IntegrationRecord) {
        record.spec.name = name.to_string();
        match self.records.iter_mut().find(|r| r.name() == name) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    fn remove_record(&mut self, name: &str) -> Option<IntegrationRecord> {
        let pos = self.records.iter().position(|r| r.name() == name)?;
        Some(self.records.remove(pos))
    }

    fn persist(&mut self) -> Result<()> {
        let mut table = toml::Table::new();
        for record in &self.records {
            table.insert(
                record.name().to_string(),
                toml::Value::try_from(RecordEntry::from(record))?,
            );
        }
        let raw = toml::to_string(&table)?;
        write_atomic(&self.path, &raw)?;
        tracing::debug!(path = %self.path.display(), records = table.len(), "records persisted");
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes the desired-config template and an empty record store.
pub fn write_template(config_path: &Path, records_path: &Path) -> Result<()> {
    if config_path.exists() {
        return Err(BdtiError::ConfigFileExists(
            config_path.display().to_string(),
        ));
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, CONFIG_TEMPLATE)?;
    write_atomic(records_path, "")?;
    Ok(())
}
