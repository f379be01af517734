use crate::domain::constants::{
    BROKER_PORT, BROKER_SECTION, BROKER_SUBSCRIPTIONS_PATH, CYGNUS_HOST, CYGNUS_KEY_PATH,
    CYGNUS_USERNAME, DATA_MODEL_FILE_NAME,
    DATA_MODEL_FILE_PATH, DATA_MODEL_TYPES, FIWARE_DATAMODELS, HDFS_FORMAT_FILE, HDFS_HOST,
    HDFS_PORT, HDFS_USERNAME, NOTIFICATION_PATH, NOTIFICATION_PORT, ORION_HOST, STORAGE_SECTION,
};
use crate::domain::models::{
    BrokerSettings, DataModelSpec, DeploymentTarget, FileFormat, SshCredentials, StorageSettings,
};
use crate::error::{BdtiError, Result};
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^(?:http|ftp)s?://",
            r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|",
            r"localhost|",
            r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
            r"(?::\d+)?",
            r"(?:/?|[/?]\S+)$",
        ))
        .expect("static url regex")
    })
}

fn iso8601_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^(-?(?:[1-9][0-9]*)?[0-9]{4})-(1[0-2]|0[1-9])-(3[01]|0[1-9]|[12][0-9])",
            r"(T(2[0-3]|[01][0-9]):([0-5][0-9])",
            r"(:([0-5][0-9])(\.[0-9]+)?(Z|[+-](?:2[0-3]|[01][0-9]):[0-5][0-9])?)?)?$",
        ))
        .expect("static iso8601 regex")
    })
}

pub fn is_ip(host: &str) -> bool {
    host.trim().parse::<Ipv4Addr>().is_ok()
}

pub fn is_valid_url(host: &str) -> bool {
    url_regex().is_match(host.trim())
}

/// Subscription collection URL for the configured Orion host.
pub fn broker_subscriptions_url(host: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(BdtiError::FieldNotInformed {
            key: ORION_HOST.to_string(),
            section: BROKER_SECTION.to_string(),
        });
    }
    if is_ip(host) {
        Ok(format!(
            "http://{host}:{BROKER_PORT}/{BROKER_SUBSCRIPTIONS_PATH}"
        ))
    } else if is_valid_url(host) {
        Ok(format!(
            "{}/{BROKER_SUBSCRIPTIONS_PATH}",
            host.trim_end_matches('/')
        ))
    } else {
        Err(BdtiError::InvalidHost {
            kind: "Orion LD".to_string(),
            host: host.to_string(),
        })
    }
}

/// Notification endpoint Orion posts to on the Cygnus host.
pub fn agent_notify_url(host: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(BdtiError::FieldNotInformed {
            key: CYGNUS_HOST.to_string(),
            section: BROKER_SECTION.to_string(),
        });
    }
    if is_ip(host) {
        Ok(format!(
            "http://{host}:{NOTIFICATION_PORT}{NOTIFICATION_PATH}"
        ))
    } else if is_valid_url(host) {
        Ok(format!(
            "{}:{NOTIFICATION_PORT}{NOTIFICATION_PATH}",
            host.trim_end_matches('/')
        ))
    } else {
        Err(BdtiError::InvalidHost {
            kind: "Cygnus".to_string(),
            host: host.to_string(),
        })
    }
}

/// Remote when both SSH settings are informed, local when neither is.
pub fn deployment_target(settings: &BrokerSettings) -> Result<DeploymentTarget> {
    let host = settings.cygnus_host.trim();
    if host.is_empty() {
        return Err(BdtiError::FieldNotInformed {
            key: CYGNUS_HOST.to_string(),
            section: BROKER_SECTION.to_string(),
        });
    }
    let key_path = settings.ssh_key_path.trim();
    let username = settings.ssh_username.trim();
    match (key_path.is_empty(), username.is_empty()) {
        (true, true) => Ok(DeploymentTarget::Local {
            host: host.to_string(),
        }),
        (false, false) => Ok(DeploymentTarget::Remote {
            host: host.to_string(),
            credentials: SshCredentials {
                key_path: key_path.to_string(),
                username: username.to_string(),
            },
        }),
        (false, true) => Err(BdtiError::IncompleteRemoteTarget(CYGNUS_KEY_PATH.to_string())),
        (true, false) => Err(BdtiError::IncompleteRemoteTarget(CYGNUS_USERNAME.to_string())),
    }
}

/// Catalog entry of the model family `name` belongs to, if any.
pub fn family_types(name: &str) -> Option<&'static [&'static str]> {
    FIWARE_DATAMODELS
        .iter()
        .find(|(family, _)| name.contains(family))
        .map(|(_, types)| *types)
}

pub fn validate_types(spec: &DataModelSpec) -> Result<()> {
    if spec.allowed_types.is_empty() {
        return Err(BdtiError::FieldNotInformed {
            key: DATA_MODEL_TYPES.to_string(),
            section: spec.name.clone(),
        });
    }
    let Some(catalog) = family_types(&spec.name) else {
        tracing::debug!(data_model = %spec.name, "no catalog family, types left unconstrained");
        return Ok(());
    };
    if spec
        .allowed_types
        .iter()
        .all(|t| catalog.contains(&t.as_str()))
    {
        Ok(())
    } else {
        Err(BdtiError::InvalidTypes {
            name: spec.name.clone(),
            allowed: catalog.iter().map(|t| t.to_string()).collect(),
        })
    }
}

pub fn validate_throttling(throttling: Option<&str>, data_model: &str) -> Result<()> {
    match throttling {
        None => Ok(()),
        Some(t) if t.trim().parse::<u64>().is_ok() => Ok(()),
        Some(_) => Err(BdtiError::InvalidThrottling(data_model.to_string())),
    }
}

pub fn validate_expires(expires: Option<&str>, data_model: &str) -> Result<()> {
    match expires {
        None => Ok(()),
        Some(e) if iso8601_regex().is_match(e.trim()) => Ok(()),
        Some(_) => Err(BdtiError::InvalidExpires(data_model.to_string())),
    }
}

/// Full check run before any subscription is created for `spec`.
pub fn validate_spec(spec: &DataModelSpec) -> Result<()> {
    validate_types(spec)?;
    validate_throttling(spec.throttling.as_deref(), &spec.name)?;
    validate_expires(spec.expires.as_deref(), &spec.name)?;
    for (key, value) in [
        (DATA_MODEL_FILE_NAME, &spec.storage_file_name),
        (DATA_MODEL_FILE_PATH, &spec.storage_file_path),
    ] {
        if value.trim().is_empty() {
            return Err(BdtiError::FieldNotInformed {
                key: key.to_string(),
                section: spec.name.clone(),
            });
        }
    }
    Ok(())
}

/// Required storage settings are informed and the file format is known.
pub fn check_storage_settings(settings: &StorageSettings) -> Result<FileFormat> {
    for (key, value) in [
        (HDFS_HOST, &settings.host),
        (HDFS_PORT, &settings.port),
        (HDFS_FORMAT_FILE, &settings.format_file),
        (HDFS_USERNAME, &settings.username),
    ] {
        if value.trim().is_empty() {
            return Err(BdtiError::FieldNotInformed {
                key: key.to_string(),
                section: STORAGE_SECTION.to_string(),
            });
        }
    }
    settings.format_file.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, types: &[&str]) -> DataModelSpec {
        DataModelSpec {
            name: name.to_string(),
            allowed_types: types.iter().map(|t| t.to_string()).collect(),
            service: "openiot".to_string(),
            service_path: "/spain".to_string(),
            throttling: None,
            expires: None,
            storage_file_path: "weather".to_string(),
            storage_file_name: "weather_data".to_string(),
        }
    }

    #[test]
    fn expires_accepts_dates_and_minutes_and_rejects_bad_month() {
        assert!(validate_expires(Some("2020-01-01"), "Weather").is_ok());
        assert!(validate_expires(Some("2020-01-01T10:10"), "Weather").is_ok());
        assert!(validate_expires(Some("2020-01-01T10:10:05.120Z"), "Weather").is_ok());
        assert!(matches!(
            validate_expires(Some("2020-13-01"), "Weather"),
            Err(BdtiError::InvalidExpires(name)) if name == "Weather"
        ));
        assert!(validate_expires(None, "Weather").is_ok());
    }

    #[test]
    fn throttling_must_be_non_negative_integer() {
        assert!(validate_throttling(Some("5"), "Weather").is_ok());
        assert!(validate_throttling(None, "Weather").is_ok());
        assert!(validate_throttling(Some("-1"), "Weather").is_err());
        assert!(validate_throttling(Some("ten"), "Weather").is_err());
    }

    #[test]
    fn types_must_belong_to_the_model_family() {
        assert!(validate_types(&spec("Weather", &["WeatherObserved", "WeatherAlert"])).is_ok());
        assert!(validate_types(&spec("WeatherSpain", &["WeatherForecast"])).is_ok());

        let err = validate_types(&spec("Weather", &["Vehicle"])).unwrap_err();
        assert_eq!(err.code(), "INVALID_TYPES");

        let err = validate_types(&spec("Weather", &[])).unwrap_err();
        assert_eq!(err.code(), "FIELD_NOT_INFORMED");
    }

    #[test]
    fn unknown_family_is_unconstrained() {
        assert!(validate_types(&spec("CustomSensors", &["Anything"])).is_ok());
    }

    #[test]
    fn spec_requires_storage_destination() {
        let mut s = spec("Weather", &["WeatherObserved"]);
        s.storage_file_name = String::new();
        let err = validate_spec(&s).unwrap_err();
        assert!(err.to_string().contains("file_name"));
    }

    #[test]
    fn broker_url_from_ip_or_url() {
        assert_eq!(
            broker_subscriptions_url("10.0.0.1").unwrap(),
            "http://10.0.0.1:1026/ngsi-ld/v1/subscriptions"
        );
        assert_eq!(
            broker_subscriptions_url("http://orion.example.com:1026/").unwrap(),
            "http://orion.example.com:1026/ngsi-ld/v1/subscriptions"
        );
        assert_eq!(
            broker_subscriptions_url("not a host").unwrap_err().code(),
            "INVALID_HOST"
        );
        assert_eq!(
            broker_subscriptions_url("").unwrap_err().code(),
            "FIELD_NOT_INFORMED"
        );
    }

    #[test]
    fn notify_url_from_ip_or_url() {
        assert_eq!(
            agent_notify_url("10.0.0.2").unwrap(),
            "http://10.0.0.2:5050/notify"
        );
        assert_eq!(
            agent_notify_url("http://cygnus.local").unwrap(),
            "http://cygnus.local:5050/notify"
        );
    }

    #[test]
    fn deployment_target_needs_both_or_neither_ssh_setting() {
        let mut s = BrokerSettings {
            orion_host: "10.0.0.1".into(),
            cygnus_host: "10.0.0.2".into(),
            ..Default::default()
        };
        assert_eq!(
            deployment_target(&s).unwrap(),
            DeploymentTarget::Local { host: "10.0.0.2".into() }
        );

        s.ssh_username = "op".into();
        let err = deployment_target(&s).unwrap_err();
        assert_eq!(err.code(), "INCOMPLETE_REMOTE_TARGET");
        assert!(err.to_string().contains("only cygnus_ssh_username is informed"));

        s.ssh_key_path = "/home/op/.ssh/id_rsa".into();
        assert!(deployment_target(&s).unwrap().is_remote());

        s.cygnus_host = String::new();
        assert_eq!(deployment_target(&s).unwrap_err().code(), "FIELD_NOT_INFORMED");
    }

    #[test]
    fn storage_settings_need_core_fields_and_known_format() {
        let mut s = StorageSettings {
            host: "hdfs.local".into(),
            port: "50070".into(),
            username: "hdfs".into(),
            format_file: "json-row".into(),
            ..Default::default()
        };
        assert_eq!(check_storage_settings(&s).unwrap(), FileFormat::JsonRow);

        s.format_file = "parquet".into();
        assert_eq!(check_storage_settings(&s).unwrap_err().code(), "INVALID_FILE_FORMAT");

        s.port = String::new();
        assert!(check_storage_settings(&s)
            .unwrap_err()
            .to_string()
            .contains("port key is not informed in hdfs section"));
    }
}
