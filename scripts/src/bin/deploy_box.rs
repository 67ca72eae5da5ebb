//! Deploy `Box` behind a new upgrade beacon and proxy.
use beacon_upgrades::{deploy, AlloyUpgrades, Config, DeployPlan};
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    box_scripts::init();

    let config = Config::from_env()?;
    let upgrades = AlloyUpgrades::connect(&config).await?;
    info!(deployer = %upgrades.deployer(), "deploying");

    let report = deploy(&upgrades, &DeployPlan::default()).await?;
    println!("{report}");
    Ok(())
}
