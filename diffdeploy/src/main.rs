use anyhow::Context;
use clap::Parser;
use tracing::info;

use diffdeploy::config::{DeployArgs, DeployConfig};
use diffdeploy::logging::init_logging;
use diffdeploy::sync::backend::HttpConnector;
use diffdeploy::sync::entry::resolve_entries;
use diffdeploy::sync::run::{Deployment, RunStage};
use diffdeploy::sync::tree::expand_tree;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = DeployConfig::from_args(DeployArgs::parse())?;
    init_logging(config.verbose);

    let pairs = expand_tree(&config.source)
        .with_context(|| format!("failed to list {:?}", config.source))?;
    let entries = resolve_entries(pairs)
        .await
        .context("failed to read local entries")?;
    info!(entries = entries.len(), source = ?config.source, "local tree loaded");

    let deployment = Deployment::new(
        HttpConnector,
        config.host.clone(),
        config.credentials.clone(),
        config.options.clone(),
    );
    let outcome = deployment.run(&entries).await?;

    match outcome.stage {
        RunStage::Done => {
            let report = outcome.report;
            info!(
                created = report.directories_created,
                uploaded = report.files_uploaded,
                chmod = report.permissions_set,
                deleted = report.deleted,
                "deploy finished"
            );
        }
        _ => {
            for operation in &outcome.plan {
                println!("{operation}");
            }
            info!(operations = outcome.plan.len(), "dry run, remote untouched");
        }
    }
    Ok(())
}
