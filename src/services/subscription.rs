use crate::domain::models::DataModelSpec;
use crate::error::{BdtiError, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Subscription protocol of the context broker.
pub trait SubscriptionApi {
    /// Succeeds only when the subscription collection answers `200 OK`.
    fn probe(&self, subscriptions_url: &str) -> Result<()>;
    /// Returns the id of the new subscription.
    fn create(
        &self,
        spec: &DataModelSpec,
        subscriptions_url: &str,
        notify_url: &str,
    ) -> Result<String>;
    fn remove(
        &self,
        name: &str,
        subscriptions_url: &str,
        subscription_id: &str,
        service: &str,
    ) -> Result<()>;
}

/// `"A B C"` style type lists become `(A|B|C)`.
pub fn type_pattern(types: &[String]) -> String {
    format!("({})", types.join("|"))
}

pub fn description(data_model: &str) -> String {
    format!("Notify Cygnus of all context changes about {data_model} datamodel")
}

#[derive(Debug, Serialize)]
pub struct SubscriptionPayload {
    pub description: String,
    pub subject: Subject,
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttling: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Subject {
    pub entities: Vec<EntitySelector>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySelector {
    pub id_pattern: String,
    pub type_pattern: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub http: HttpEndpoint,
    pub attrs_format: String,
}

#[derive(Debug, Serialize)]
pub struct HttpEndpoint {
    pub url: String,
}

impl SubscriptionPayload {
    pub fn for_spec(spec: &DataModelSpec, notify_url: &str) -> Self {
        Self {
            description: description(&spec.name),
            subject: Subject {
                entities: vec![EntitySelector {
                    id_pattern: ".*".to_string(),
                    type_pattern: type_pattern(&spec.allowed_types),
                }],
            },
            notification: Notification {
                http: HttpEndpoint {
                    url: notify_url.to_string(),
                },
                attrs_format: "legacy".to_string(),
            },
            throttling: spec.throttling_secs(),
            expires: spec.expires.clone(),
        }
    }
}

/// Blocking HTTP client for the Orion LD subscription endpoint.
pub struct BrokerClient {
    http: Client,
    probe: Client,
}

impl BrokerClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: Client::builder().build()?,
            probe: Client::builder().timeout(PROBE_TIMEOUT).build()?,
        })
    }
}

impl SubscriptionApi for BrokerClient {
    fn probe(&self, subscriptions_url: &str) -> Result<()> {
        match self.probe.get(subscriptions_url).send() {
            Ok(resp) if resp.status() == StatusCode::OK => Ok(()),
            Ok(resp) => {
                tracing::debug!(url = subscriptions_url, status = resp.status().as_u16(), "broker probe rejected");
                Err(BdtiError::BrokerUnreachable(subscriptions_url.to_string()))
            }
            Err(e) => {
                tracing::debug!(url = subscriptions_url, error = %e, "broker probe failed");
                Err(BdtiError::BrokerUnreachable(subscriptions_url.to_string()))
            }
        }
    }

    fn create(
        &self,
        spec: &DataModelSpec,
        subscriptions_url: &str,
        notify_url: &str,
    ) -> Result<String> {
        let payload = SubscriptionPayload::for_spec(spec, notify_url);
        tracing::debug!(data_model = %spec.name, url = subscriptions_url, "posting subscription");
        let resp = self
            .http
            .post(subscriptions_url)
            .header("fiware-service", &spec.service)
            .header("fiware-servicepath", &spec.service_path)
            .json(&payload)
            .send()?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            return Err(BdtiError::SubscriptionCreateFailed {
                code: status.as_u16(),
            });
        }
        resp.headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| BdtiError::SubscriptionIdMissing(subscriptions_url.to_string()))
    }

    fn remove(
        &self,
        name: &str,
        subscriptions_url: &str,
        subscription_id: &str,
        service: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/{}",
            subscriptions_url.trim_end_matches('/'),
            subscription_id
        );
        tracing::debug!(data_model = name, url = %url, "deleting subscription");
        let resp = self
            .http
            .delete(&url)
            .header("fiware-service", service)
            .send()?;

        let reason = match resp.status() {
            StatusCode::NO_CONTENT => return Ok(()),
            StatusCode::NOT_FOUND => Some("Subscription ID not found: 404".to_string()),
            StatusCode::METHOD_NOT_ALLOWED => Some("Empty subscription ID".to_string()),
            other => {
                tracing::debug!(data_model = name, status = other.as_u16(), "unexpected delete status");
                None
            }
        };
        Err(BdtiError::SubscriptionDeleteFailed {
            name: name.to_string(),
            url: subscriptions_url.to_string(),
            reason,
        })
    }
}
