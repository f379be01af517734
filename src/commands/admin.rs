use crate::cli::{Cli, Commands};
use crate::commands::{exit_code, records_path};
use crate::domain::models::{CheckItem, CheckReport, IntegratedView};
use crate::services::output::{print_one, print_out};
use crate::services::store::{write_template, DesiredConfig, RecordFile, RecordStore, SpecSource};
use crate::services::validators::{
    agent_notify_url, broker_subscriptions_url, check_storage_settings, deployment_target,
    validate_spec,
};
use serde::Serialize;
use std::process::ExitCode;

#[derive(Serialize)]
struct NewConfigOut {
    config: String,
    records: String,
}

pub fn handle_admin_commands(cli: &Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::ShowIntegrated => {
            let records = RecordFile::load(&records_path(cli)?)?;
            let views: Vec<IntegratedView> =
                records.list_records().iter().map(IntegratedView::from).collect();
            if !cli.json && views.is_empty() {
                println!("no data models integrated");
                return Ok(ExitCode::SUCCESS);
            }
            print_out(cli.json, &views, |v| {
                format!(
                    "{}\t{}\t{}\t{}\t{}",
                    v.data_model,
                    v.subscription_id,
                    v.types,
                    v.orion_url,
                    v.modification_date.as_deref().unwrap_or(&v.integration_date)
                )
            })?;
        }
        Commands::NewConfig => {
            let records = records_path(cli)?;
            write_template(&cli.config, &records)?;
            tracing::info!(path = %cli.config.display(), "configuration file created");
            let out = NewConfigOut {
                config: cli.config.display().to_string(),
                records: records.display().to_string(),
            };
            print_one(cli.json, out, |o| format!("created {}", o.config))?;
        }
        Commands::Check => {
            let report = check_config(cli)?;
            let failed = report.overall != "ok";
            print_one(cli.json, report, |r| {
                let mut lines: Vec<String> = r
                    .checks
                    .iter()
                    .map(|c| format!("{}\t{}", c.name, c.status))
                    .collect();
                lines.push(format!("overall\t{}", r.overall));
                lines.join("\n")
            })?;
            return Ok(exit_code(failed));
        }
        _ => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn item<T>(name: &str, result: crate::error::Result<T>) -> CheckItem {
    CheckItem {
        name: name.to_string(),
        status: match result {
            Ok(_) => "ok".to_string(),
            Err(e) => e.to_string(),
        },
    }
}

/// Offline validation: nothing is contacted and nothing is written.
fn check_config(cli: &Cli) -> anyhow::Result<CheckReport> {
    let specs = DesiredConfig::load(&cli.config)?;
    let mut checks = Vec::new();

    match specs.broker_settings() {
        Ok(broker) => {
            checks.push(item("orion_host", broker_subscriptions_url(&broker.orion_host)));
            checks.push(item("cygnus_host", agent_notify_url(&broker.cygnus_host)));
            checks.push(item("deployment_target", deployment_target(&broker)));
        }
        Err(e) => checks.push(item::<()>("fiware", Err(e))),
    }
    checks.push(item(
        "hdfs",
        specs
            .storage_settings()
            .and_then(|s| check_storage_settings(&s)),
    ));
    for name in specs.list_spec_names(false) {
        checks.push(item(
            &name,
            specs.get_spec(&name).and_then(|spec| validate_spec(&spec)),
        ));
    }

    let overall = if checks.iter().all(|c| c.status == "ok") {
        "ok"
    } else {
        "failed"
    };
    Ok(CheckReport {
        overall: overall.to_string(),
        checks,
    })
}
