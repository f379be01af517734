//! Integration lifecycle: `integrate`, `modify`, `delete` and `reset` over batches of data
//! models.
//!
//! The record store is the only source of truth for whether a model is integrated. A record is
//! persisted right after its broker call succeeds (or a removal failure is forced through), and
//! artifacts are regenerated and the agent redeployed once per batch when anything changed.

use crate::domain::models::{
    BatchReport, DataModelSpec, IntegrationRecord, OutcomeStatus, Selection,
};
use crate::error::{BdtiError, ErrorKind, Result};
use crate::services::artifacts::ArtifactSink;
use crate::services::confirm::Confirm;
use crate::services::deploy::Deployer;
use crate::services::store::{RecordStore, SpecSource};
use crate::services::subscription::SubscriptionApi;
use crate::services::validators::validate_spec;
use chrono::{DateTime, Utc};

/// Broker URLs used for new subscriptions in this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub subscriptions_url: String,
    pub notify_url: String,
}

pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

pub struct Orchestrator {
    specs: Box<dyn SpecSource>,
    records: Box<dyn RecordStore>,
    broker: Box<dyn SubscriptionApi>,
    confirm: Box<dyn Confirm>,
    redeploy: Option<(Box<dyn ArtifactSink>, Box<dyn Deployer>)>,
    endpoints: Option<Endpoints>,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        specs: Box<dyn SpecSource>,
        records: Box<dyn RecordStore>,
        broker: Box<dyn SubscriptionApi>,
        confirm: Box<dyn Confirm>,
    ) -> Self {
        Self {
            specs,
            records,
            broker,
            confirm,
            redeploy: None,
            endpoints: None,
            clock: Box::new(Utc::now),
        }
    }

    /// Artifact sink and deployer used when a batch needs the agent redeployed.
    pub fn with_redeploy(
        mut self,
        artifacts: Box<dyn ArtifactSink>,
        deployer: Box<dyn Deployer>,
    ) -> Self {
        self.redeploy = Some((artifacts, deployer));
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }

    fn endpoints(&self) -> Result<Endpoints> {
        self.endpoints.clone().ok_or(BdtiError::BrokerNotConfigured)
    }

    /// Names from the desired configuration, reserved sections excluded.
    fn resolve_desired(&self, selection: &Selection) -> Vec<String> {
        match selection {
            Selection::All => self.specs.list_spec_names(false),
            Selection::Named(names) => dedup(names),
        }
    }

    fn resolve_integrated(&self, selection: &Selection) -> Vec<String> {
        match selection {
            Selection::All => self
                .records
                .list_records()
                .iter()
                .map(|r| r.name().to_string())
                .collect(),
            Selection::Named(names) => dedup(names),
        }
    }

    pub fn integrate(&mut self, selection: &Selection) -> Result<BatchReport> {
        let endpoints = self.endpoints()?;
        let names = self.resolve_desired(selection);
        tracing::info!(data_models = ?names, "starting integration");
        self.broker.probe(&endpoints.subscriptions_url)?;

        let mut report = BatchReport::new("integrate");
        for name in &names {
            let spec = self.specs.get_spec(name)?;
            match self.records.get_record(name) {
                Some(old) => {
                    tracing::warn!(data_model = %name, "data model already integrated");
                    let question =
                        format!("{name} Data Model is already integrated. Do you want to modify it?");
                    if self.confirm.confirm(&question) {
                        self.replace_subscription(spec, old, false, &endpoints, &mut report)?;
                    } else {
                        report.push(name, OutcomeStatus::Skipped);
                    }
                }
                None => self.create_subscription(spec, &endpoints, &mut report)?,
            }
        }

        let changed = report.changed();
        self.finish(&mut report, changed)?;
        tracing::info!(changed, "integration finished");
        Ok(report)
    }

    pub fn modify(&mut self, selection: &Selection, force: bool) -> Result<BatchReport> {
        let endpoints = self.endpoints()?;
        let names = self.resolve_desired(selection);
        tracing::info!(data_models = ?names, force, "starting modification");
        self.broker.probe(&endpoints.subscriptions_url)?;

        let mut report = BatchReport::new("modify");
        for name in &names {
            let spec = self.specs.get_spec(name)?;
            match self.records.get_record(name) {
                Some(old) => self.replace_subscription(spec, old, force, &endpoints, &mut report)?,
                None => {
                    tracing::warn!(data_model = %name, "data model not integrated");
                    let question = format!(
                        "{name} Data Model has not been integrated. Do you want to integrate it?"
                    );
                    if self.confirm.confirm(&question) {
                        self.create_subscription(spec, &endpoints, &mut report)?;
                    } else {
                        report.push(name, OutcomeStatus::NotIntegrated);
                    }
                }
            }
        }

        let changed = report.changed();
        self.finish(&mut report, changed)?;
        tracing::info!(changed, "modification finished");
        Ok(report)
    }

    /// Broker refusals are reported per model and the batch carries on. An unreachable broker
    /// aborts it unless `force` is set.
    pub fn delete(&mut self, selection: &Selection, deploy: bool, force: bool) -> Result<BatchReport> {
        let names = self.resolve_integrated(selection);
        tracing::info!(data_models = ?names, deploy, force, "starting removal");

        let mut report = BatchReport::new("delete");
        let mut probed: Vec<String> = Vec::new();
        for name in &names {
            let Some(record) = self.records.get_record(name) else {
                tracing::error!(data_model = %name, "{}", BdtiError::DataModelNotIntegrated(name.clone()));
                report.push(name, OutcomeStatus::NotIntegrated);
                continue;
            };
            if !probed.contains(&record.broker_url) {
                probed.push(record.broker_url.clone());
                if let Err(e) = self.broker.probe(&record.broker_url) {
                    if !force {
                        return Err(e);
                    }
                    tracing::warn!(url = %record.broker_url, error = %e, "broker unreachable, forcing removal");
                }
            }
            if let Err(e) = self.delete_recorded(record, force, &mut report) {
                if force || e.kind() != ErrorKind::Connectivity {
                    report.push(name, OutcomeStatus::Failed).detail = Some(e.to_string());
                    continue;
                }
                return Err(e);
            }
        }

        self.finish(&mut report, deploy)?;
        tracing::info!(deploy, "removal finished");
        Ok(report)
    }

    /// Drops the desired configuration and every integration. Declining leaves both untouched.
    pub fn reset(&mut self, force: bool) -> Result<BatchReport> {
        let mut report = BatchReport::new("reset");
        let question =
            "This removes the configuration file and every integrated Data Model. Continue?";
        if !self.confirm.confirm(question) {
            tracing::info!("reset cancelled");
            return Ok(report);
        }

        if let Err(e) = self.specs.discard() {
            tracing::error!(error = %e, "could not remove configuration file");
        }
        for record in self.records.list_records() {
            let name = record.name().to_string();
            if let Err(e) = self.delete_recorded(record, force, &mut report) {
                report.push(&name, OutcomeStatus::Failed).detail = Some(e.to_string());
            }
        }
        tracing::info!(removed = report.outcomes.len() - report.failed(), "reset finished");
        Ok(report)
    }

    fn create_subscription(
        &mut self,
        spec: DataModelSpec,
        endpoints: &Endpoints,
        report: &mut BatchReport,
    ) -> Result<()> {
        validate_spec(&spec)?;
        let id = self
            .broker
            .create(&spec, &endpoints.subscriptions_url, &endpoints.notify_url)?;
        tracing::info!(data_model = %spec.name, subscription_id = %id, "subscription created");

        let name = spec.name.clone();
        let record = IntegrationRecord {
            spec,
            subscription_id: id.clone(),
            broker_url: endpoints.subscriptions_url.clone(),
            integrated_at: (self.clock)(),
            modified_at: None,
        };
        self.records.put_record(&name, record);
        self.records.persist()?;
        report.push(&name, OutcomeStatus::Integrated).subscription_id = Some(id);
        Ok(())
    }

    /// Removes the old subscription at the URL it was created on and subscribes again.
    fn replace_subscription(
        &mut self,
        spec: DataModelSpec,
        old: IntegrationRecord,
        force: bool,
        endpoints: &Endpoints,
        report: &mut BatchReport,
    ) -> Result<()> {
        let name = spec.name.clone();
        validate_spec(&spec)?;

        if let Err(e) = self.broker.remove(
            &name,
            &old.broker_url,
            &old.subscription_id,
            &old.spec.service,
        ) {
            if !force {
                return Err(e);
            }
            tracing::warn!(data_model = %name, error = %e, "forcing past failed removal");
        }

        let id = match self
            .broker
            .create(&spec, &endpoints.subscriptions_url, &endpoints.notify_url)
        {
            Ok(id) => id,
            Err(e) => {
                // The old subscription is gone; keeping its record would point at nothing.
                self.records.remove_record(&name);
                self.records.persist()?;
                tracing::error!(data_model = %name, "record dropped after failed re-subscription");
                return Err(e);
            }
        };

        let modified_at = self.next_modification(&old);
        let record = IntegrationRecord {
            spec,
            subscription_id: id.clone(),
            broker_url: endpoints.subscriptions_url.clone(),
            integrated_at: old.integrated_at,
            modified_at: Some(modified_at),
        };
        self.records.put_record(&name, record);
        self.records.persist()?;
        tracing::info!(data_model = %name, subscription_id = %id, "subscription modified");
        report.push(&name, OutcomeStatus::Modified).subscription_id = Some(id);
        Ok(())
    }

    /// Strictly later than the record's previous timestamps, even on a coarse clock.
    fn next_modification(&self, old: &IntegrationRecord) -> DateTime<Utc> {
        let floor = old.modified_at.unwrap_or(old.integrated_at);
        let now = (self.clock)();
        if now > floor {
            now
        } else {
            floor + chrono::Duration::microseconds(1)
        }
    }

    /// Records the outcome on success; failures are handed back for the caller to decide on.
    fn delete_recorded(
        &mut self,
        record: IntegrationRecord,
        force: bool,
        report: &mut BatchReport,
    ) -> Result<()> {
        let name = record.name().to_string();
        match self.delete_one(&record, force) {
            Ok(status) => {
                report.push(&name, status).subscription_id = Some(record.subscription_id);
                Ok(())
            }
            Err(e) => {
                tracing::error!(data_model = %name, code = e.code(), "{e}");
                Err(e)
            }
        }
    }

    fn delete_one(&mut self, record: &IntegrationRecord, force: bool) -> Result<OutcomeStatus> {
        let name = record.name();
        tracing::info!(data_model = %name, "removing subscription");
        let status = match self.broker.remove(
            name,
            &record.broker_url,
            &record.subscription_id,
            &record.spec.service,
        ) {
            Ok(()) => OutcomeStatus::Deleted,
            Err(e) if force => {
                tracing::warn!(data_model = %name, error = %e, "forcing removal of record");
                OutcomeStatus::ForceDeleted
            }
            Err(e) => return Err(e),
        };
        self.records.remove_record(name);
        self.records.persist()?;
        Ok(status)
    }

    fn finish(&mut self, report: &mut BatchReport, redeploy: bool) -> Result<()> {
        if !redeploy {
            return Ok(());
        }
        let (artifacts, deployer) = self
            .redeploy
            .as_mut()
            .ok_or(BdtiError::DeployerNotConfigured)?;
        artifacts.regenerate(&self.records.list_records())?;
        deployer.redeploy()?;
        report.redeployed = true;
        Ok(())
    }

    /// Hands the deployment target back, whether or not a redeploy ran.
    pub fn close(&mut self) {
        if let Some((_, deployer)) = self.redeploy.as_mut() {
            deployer.release();
        }
    }
}

fn dedup(names: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(name) {
            unique.push(name.clone());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let names: Vec<String> = ["Weather", "Alert", "Weather", "Building", "Alert"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(dedup(&names), vec!["Weather", "Alert", "Building"]);
    }
}
