//! Upgrade the beacon at `BEACON_ADDRESS` to `BoxV2`, then set `y` through
//! the proxy at `BEACON_PROXY_ADDRESS`.
use beacon_upgrades::{
    upgrade, AlloyUpgrades, Config, UpgradePlan, UpgradeTargets,
};
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    box_scripts::init();

    let config = Config::from_env()?;
    let targets = UpgradeTargets::from_env()?;
    let upgrades = AlloyUpgrades::connect(&config).await?;
    info!(
        deployer = %upgrades.deployer(),
        beacon = %targets.beacon,
        proxy = %targets.proxy,
        "upgrading"
    );

    let report = upgrade(&upgrades, &UpgradePlan::new(targets)).await?;
    println!("{report}");
    Ok(())
}
