use crate::cli::{Cli, Commands};
use crate::commands::{confirm_policy, exit_code, records_path};
use crate::domain::models::{BatchReport, Selection};
use crate::services::artifacts::ArtifactWriter;
use crate::services::deploy::DeploymentDriver;
use crate::services::orchestrator::{Endpoints, Orchestrator};
use crate::services::output::{print_one, print_out};
use crate::services::store::{DesiredConfig, RecordFile, SpecSource};
use crate::services::subscription::BrokerClient;
use crate::services::validators::{
    agent_notify_url, broker_subscriptions_url, check_storage_settings, deployment_target,
};
use std::process::ExitCode;

pub fn handle_lifecycle_commands(cli: &Cli) -> anyhow::Result<ExitCode> {
    let report = match &cli.command {
        Commands::Integrate { target } => {
            let selection = Selection::from_args(&target.datamodels);
            let specs = DesiredConfig::load(&cli.config)?;
            run_batch(build(cli, specs, true, true)?, |o| o.integrate(&selection))?
        }
        Commands::Modify { target, force } => {
            let selection = Selection::from_args(&target.datamodels);
            let specs = DesiredConfig::load(&cli.config)?;
            run_batch(build(cli, specs, true, true)?, |o| o.modify(&selection, *force))?
        }
        Commands::Delete {
            target,
            deploy,
            force,
        } => {
            let selection = Selection::from_args(&target.datamodels);
            let specs = if *deploy {
                DesiredConfig::load(&cli.config)?
            } else {
                DesiredConfig::load_or_empty(&cli.config)?
            };
            run_batch(build(cli, specs, false, *deploy)?, |o| {
                o.delete(&selection, *deploy, *force)
            })?
        }
        Commands::Reset { force } => {
            // Only removed, never parsed: a broken file must not block the reset.
            let specs = DesiredConfig::empty(&cli.config);
            run_batch(build(cli, specs, false, false)?, |o| o.reset(*force))?
        }
        _ => return Ok(ExitCode::SUCCESS),
    };

    print_report(cli.json, &report)?;
    Ok(exit_code(report.failed() > 0))
}

fn run_batch(
    mut orchestrator: Orchestrator,
    batch: impl FnOnce(&mut Orchestrator) -> crate::error::Result<BatchReport>,
) -> crate::error::Result<BatchReport> {
    let result = batch(&mut orchestrator);
    orchestrator.close();
    result
}

/// Wires the stores and clients for one invocation. Host settings and storage reachability are
/// checked here, before any subscription is touched.
fn build(
    cli: &Cli,
    specs: DesiredConfig,
    with_broker: bool,
    with_redeploy: bool,
) -> anyhow::Result<Orchestrator> {
    let records = RecordFile::load(&records_path(cli)?)?;

    let mut endpoints = None;
    let mut redeploy = None;
    if with_broker || with_redeploy {
        let broker = specs.broker_settings()?;
        if with_broker {
            endpoints = Some(Endpoints {
                subscriptions_url: broker_subscriptions_url(&broker.orion_host)?,
                notify_url: agent_notify_url(&broker.cygnus_host)?,
            });
        }
        if with_redeploy {
            let target = deployment_target(&broker)?;
            let storage = specs.storage_settings()?;
            let format = check_storage_settings(&storage)?;
            tracing::debug!(remote = target.is_remote(), host = %target.host(), "deployment target");

            let mut driver = DeploymentDriver::new(target, &cli.artifacts_dir, &storage);
            driver.connect()?;
            driver.check_storage_reachable()?;
            let artifacts = ArtifactWriter::new(&cli.artifacts_dir, storage, format);
            redeploy = Some((artifacts, driver));
        }
    }

    let mut orchestrator = Orchestrator::new(
        Box::new(specs),
        Box::new(records),
        Box::new(BrokerClient::new()?),
        confirm_policy(cli),
    );
    if let Some(endpoints) = endpoints {
        orchestrator = orchestrator.with_endpoints(endpoints);
    }
    if let Some((artifacts, driver)) = redeploy {
        orchestrator = orchestrator.with_redeploy(Box::new(artifacts), Box::new(driver));
    }
    Ok(orchestrator)
}

fn print_report(json: bool, report: &BatchReport) -> anyhow::Result<()> {
    if json {
        return print_one(true, report, |_| String::new());
    }
    print_out(false, &report.outcomes, |o| {
        let extra = o
            .detail
            .as_deref()
            .or(o.subscription_id.as_deref())
            .unwrap_or("");
        format!("{}\t{}\t{}", o.data_model, o.status, extra)
    })?;
    if report.redeployed {
        println!("cygnus redeployed");
    }
    Ok(())
}
