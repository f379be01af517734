use crate::domain::constants::{AGENT_CONF_KEYS, AGENT_FILE_NAME, GROUPING_RULES_FILE_NAME};
use crate::domain::models::{
    FileFormat, GroupingRule, GroupingRules, IntegrationRecord, StorageSettings,
};
use crate::error::Result;
use crate::services::subscription::type_pattern;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const AGENT_TEMPLATE: &str = include_str!("../../templates/agent_hdfs.conf");

pub fn render_agent_config(settings: &StorageSettings, template: &str) -> String {
    let mut out = template.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    for (setting, value) in settings.entries() {
        if value.is_empty() {
            continue;
        }
        if let Some((_, agent_key)) = AGENT_CONF_KEYS.iter().find(|(k, _)| *k == setting) {
            out.push_str(&format!("{agent_key} = {value}\n"));
        }
    }
    out
}

pub fn render_grouping_rules(records: &[IntegrationRecord], format: FileFormat) -> GroupingRules {
    let grouping_rules = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let spec = &record.spec;
            let mut fields = vec!["entityType".to_string()];
            let mut regex = type_pattern(&spec.allowed_types);
            if !spec.service_path.is_empty() {
                fields.push("servicePath".to_string());
                regex.push_str(&spec.service_path);
            }
            let mut fiware_service_path =
                format!("{}_{}", format.normalized(), spec.storage_file_path);
            if !fiware_service_path.starts_with('/') {
                fiware_service_path.insert(0, '/');
            }
            GroupingRule {
                id: i + 1,
                fields,
                regex,
                destination: spec.storage_file_name.clone(),
                fiware_service_path,
            }
        })
        .collect();
    GroupingRules { grouping_rules }
}

/// Pretty JSON with four-space indentation, as Cygnus ships its own examples.
pub fn to_json(rules: &GroupingRules) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    rules.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Destination of the rendered artifacts.
pub trait ArtifactSink {
    fn regenerate(&mut self, records: &[IntegrationRecord]) -> Result<()>;
}

pub struct ArtifactWriter {
    pub agent_path: PathBuf,
    pub rules_path: PathBuf,
    storage: StorageSettings,
    format: FileFormat,
    template: String,
}

impl ArtifactWriter {
    pub fn new(dir: &Path, storage: StorageSettings, format: FileFormat) -> Self {
        Self {
            agent_path: dir.join(AGENT_FILE_NAME),
            rules_path: dir.join(GROUPING_RULES_FILE_NAME),
            storage,
            format,
            template: AGENT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }
}

impl ArtifactSink for ArtifactWriter {
    fn regenerate(&mut self, records: &[IntegrationRecord]) -> Result<()> {
        if let Some(parent) = self.agent_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(
            &self.agent_path,
            render_agent_config(&self.storage, &self.template),
        )?;
        tracing::debug!(path = %self.agent_path.display(), "agent file written");

        let rules = render_grouping_rules(records, self.format);
        std::fs::write(&self.rules_path, to_json(&rules)?)?;
        tracing::debug!(
            path = %self.rules_path.display(),
            rules = rules.grouping_rules.len(),
            "grouping rules written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DataModelSpec;
    use chrono::Utc;

    fn record(name: &str, types: &str, service_path: &str, file_path: &str) -> IntegrationRecord {
        IntegrationRecord {
            spec: DataModelSpec {
                name: name.into(),
                allowed_types: types.split_whitespace().map(String::from).collect(),
                service: "openiot".into(),
                service_path: service_path.into(),
                throttling: None,
                expires: None,
                storage_file_path: file_path.into(),
                storage_file_name: format!("{}_data", name.to_lowercase()),
            },
            subscription_id: "abc123".into(),
            broker_url: "http://10.0.0.1:1026/ngsi-ld/v1/subscriptions".into(),
            integrated_at: Utc::now(),
            modified_at: None,
        }
    }

    #[test]
    fn weather_rule_matches_expected_shape() {
        let records = vec![record("Weather", "WeatherObserved WeatherAlert", "/spain", "weather")];
        let rules = render_grouping_rules(&records, FileFormat::JsonRow);
        let rule = &rules.grouping_rules[0];
        assert_eq!(rule.id, 1);
        assert_eq!(rule.regex, "(WeatherObserved|WeatherAlert)/spain");
        assert_eq!(rule.fields, vec!["entityType", "servicePath"]);
        assert_eq!(rule.destination, "weather_data");
        assert_eq!(rule.fiware_service_path, "/json_row_weather");
    }

    #[test]
    fn empty_service_path_only_groups_by_type() {
        let records = vec![
            record("Weather", "WeatherObserved", "/spain", "weather"),
            record("Parking", "OnStreetParking", "", "parking"),
        ];
        let rules = render_grouping_rules(&records, FileFormat::CsvColumn);
        let rule = &rules.grouping_rules[1];
        assert_eq!(rule.id, 2);
        assert_eq!(rule.fields, vec!["entityType"]);
        assert_eq!(rule.regex, "(OnStreetParking)");
        assert_eq!(rule.fiware_service_path, "/csv_column_parking");
    }

    #[test]
    fn empty_records_render_empty_list() {
        let json = to_json(&render_grouping_rules(&[], FileFormat::JsonRow)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, serde_json::json!({"grouping_rules": []}));
    }

    #[test]
    fn json_uses_four_space_indent() {
        let records = vec![record("Alert", "Alert", "", "alerts")];
        let json = to_json(&render_grouping_rules(&records, FileFormat::JsonRow)).unwrap();
        assert!(json.contains("\n    \"grouping_rules\": ["));
        assert!(json.contains("\n        {"));
    }

    #[test]
    fn agent_config_appends_informed_settings() {
        let settings = StorageSettings {
            host: "hdfs.local".into(),
            port: "50070".into(),
            username: "hdfs".into(),
            format_file: "json-row".into(),
            ..Default::default()
        };
        let out = render_agent_config(&settings, "cygnus-ngsi.sinks = hdfs-sink");
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "cygnus-ngsi.sinks = hdfs-sink");
        assert_eq!(lines[1], "cygnus-ngsi.sinks.hdfs-sink.hdfs_host = hdfs.local");
        assert_eq!(lines[4], "cygnus-ngsi.sinks.hdfs-sink.file_format = json-row");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn writer_puts_both_files_in_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut writer = ArtifactWriter::new(dir.path(), StorageSettings::default(), FileFormat::JsonRow)
            .with_template("# agent\n");
        writer.regenerate(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(&writer.agent_path).unwrap(), "# agent\n");
        assert!(writer.rules_path.ends_with("grouping_rules.conf"));
        assert!(std::fs::read_to_string(&writer.rules_path)
            .unwrap()
            .contains("grouping_rules"));
    }
}
